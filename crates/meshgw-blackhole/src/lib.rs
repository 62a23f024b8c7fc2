//! The black-hole detector (§4.9): a `Healthy`/`Degraded` state machine
//! driven by the outbound transport queue, discouraging or halting mesh
//! ingress while the broker connection is stuck.

pub mod monitor;

pub use monitor::{BlackHoleConfig, BlackHoleMonitor};
