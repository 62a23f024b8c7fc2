//! The retained gateway status document publisher (§4.8): debounced,
//! suppressing, self-healing via backup emission, with a compatibility
//! side-channel for legacy `get_configs`/`set_config` subscribers.

pub mod publisher;

pub use publisher::StatusPublisher;
