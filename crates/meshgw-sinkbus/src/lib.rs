//! The `SinkBus` capability: the boundary between the gateway core and the
//! local system-bus binding that actually talks to radio concentrators.
//!
//! Everything in this crate is external-collaborator plumbing: a trait the
//! core depends on, and an in-memory implementation used as the test seam
//! for every other `meshgw-*` crate's test suite. The real bus binding lives
//! outside this workspace.

mod memory;
mod traits;

pub use memory::InMemorySinkBus;
pub use traits::{
    AppConfig, AttributeKey, AttributeValue, OutboundMessage, SinkLifecycleListener, SinkBus,
    UplinkFrame, UplinkListener,
};
