//! Sink state management: the per-sink facade, the live sink registry, and
//! the at-most-once request-id cache (§4.3, §4.4, §4.5).

pub mod error;
pub mod message_cache;
pub mod sink;
pub mod sink_manager;

pub use error::SwitchError;
pub use message_cache::MessageCache;
pub use sink::Sink;
pub use sink_manager::SinkManager;
