//! The MQTT transport worker (§4.6): the single task that owns the broker
//! connection, the rate-limited/in-flight-limited outbound queue, and
//! reconnect-with-backoff. Everything else in the gateway only ever
//! enqueues outbound items or installs callbacks — it never touches the
//! socket directly.

pub mod config;
pub mod error;
pub mod queue;
pub mod worker;

pub use config::{CertRequirement, MqttTransportConfig, TlsSettings};
pub use error::TransportError;
pub use queue::{OutboundItem, OutboundQueue};
pub use worker::{ConnectedHandler, InboundHandler, MqttTransport};
