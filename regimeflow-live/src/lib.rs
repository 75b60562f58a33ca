//! regimeflow-live — broker connectivity, the live order manager, and the
//! multi-threaded live engine glue that drives them (§4.9, §5, §6).
//!
//! Concrete broker wire protocols, message-queue transports, and
//! regime-detection algorithms are out of scope; this crate ships the
//! seams (`BrokerAdapter`, the pipe-delimited wire codec, `RegimeRetrainer`)
//! an embedding application plugs concrete implementations into.

pub mod backoff;
pub mod broker;
pub mod codec;
pub mod engine;
pub mod event_bus;
pub mod live_order_manager;
pub mod reconnect;

pub use backoff::ReconnectBackoff;
pub use broker::{AccountInfo, BrokerAdapter, BrokerRateLimitHints, ExecutionReport, MarketMessage, NewOrderRequest};
pub use codec::LiveMessage;
pub use engine::{LiveEngine, RegimeRetrainer};
pub use event_bus::{BusMessage, EventBus, Topic};
pub use live_order_manager::{LiveOrderListener, LiveOrderManager};
pub use reconnect::{connect_with_backoff, ReconnectNotification};
