//! Top-level composition, configuration, and the uplink-forwarding glue
//! (§2, §9). Every other `meshgw-*` crate is a component; this one wires
//! them into a single running gateway and is the only crate that owns a
//! binary entry point.

pub mod config;
pub mod gateway;
pub mod uplink;

pub use config::GatewayConfig;
pub use gateway::{build, GatewayHandles};
pub use uplink::UplinkForwarder;
