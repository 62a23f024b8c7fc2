//! Sink identity (§3).

use std::fmt;

/// Stable short name plus the transient owner identifier issued by the local
/// bus. The owner→name mapping is authoritative for attributing inbound
/// uplink to a sink (§4.4).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SinkIdentity {
    name: String,
    owner: String,
}

impl SinkIdentity {
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }
}

impl fmt::Display for SinkIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(owner={})", self.name, self.owner)
    }
}

/// Sentinel returned when an owner identifier cannot be resolved to a known
/// sink name (§4.4 "unknown owner resolution").
pub const UNKNOWN_SINK_NAME: &str = "unknown";
