//! Shared data model and error taxonomy for the mesh gateway transport.
//!
//! Every other `meshgw-*` crate depends on this one for the vocabulary that
//! crosses component boundaries: sink identity and configuration, the
//! scratchpad (OTAP) view, the gateway status document, uplink events, the
//! endpoint-filter sets and the `GatewayResultCode`/`GatewayError` taxonomy.
//! Nothing in here talks to a socket, a bus, or the clock.

pub mod endpoints;
pub mod error;
pub mod event;
pub mod identity;
pub mod scratchpad;
pub mod sink_config;
pub mod status;

pub use endpoints::EndpointFilters;
pub use error::{GatewayError, GatewayResultCode};
pub use event::ReceivedDataEvent;
pub use identity::SinkIdentity;
pub use scratchpad::{ScratchpadAction, ScratchpadStatus, TargetScratchpad};
pub use sink_config::SinkConfiguration;
pub use status::GatewayStatus;
