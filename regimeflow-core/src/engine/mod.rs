//! Event loop, dispatcher, generator, order manager, execution pipeline,
//! portfolio, hook layers, caches, and the strategy context facade (§4.3
//! through §4.10).

pub mod cache;
pub mod context;
pub mod dispatcher;
pub mod execution;
pub mod generator;
pub mod hooks;
pub mod order_manager;
pub mod portfolio;
pub mod timer;

pub use cache::{MarketDataCache, OrderBookCache};
pub use context::{HookKind, HookManager as TypedHookManager, StrategyContext, TypedHook};
pub use dispatcher::{EventHandler, EventLoop, ProgressCallback, StopHandle};
pub use execution::{
    CommissionModel, ExecutionModel, ExecutionPipeline, ImpactPolicy, LatencyModel, MarketImpactModel,
    ReferencePrice, TransactionCostModel,
};
pub use generator::{EventGenerator, GeneratorConfig};
pub use hooks::{Hook, HookDecision, HookManager};
pub use order_manager::{FillListener, OrderManager, OrderModification, OrderStatusListener, PreSubmitValidator};
pub use portfolio::{EquityListener, Portfolio, PositionListener};
pub use timer::TimerService;
