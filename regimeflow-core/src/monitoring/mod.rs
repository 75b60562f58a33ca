//! Live-alert surface (§4.12, §7): a bounded ring of structured alerts fed
//! by the conditions spec §7 names as "surface as live alert" — market
//! queue overflow, heartbeat stall, MQ disconnect, reconnect failure,
//! daily-loss breach. The engine keeps running after any of these.

pub mod alerts;

pub use alerts::{Alert, AlertManager, AlertSeverity};
