//! Errors raised while driving a [`crate::sink::Sink`] or the
//! [`crate::sink_manager::SinkManager`] registry.

use thiserror::Error;

/// Domain error for the sink/sink-manager layer.
///
/// Every variant carries enough context (sink name, states involved) to log
/// without a second lookup; [`From<BusError>`](meshgw_core::error::BusError)
/// is deliberately not implemented here — callers map bus failures to a
/// [`meshgw_core::error::GatewayResultCode`] directly, since that is what a
/// client-facing response actually carries (§7).
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SwitchError {
    #[error("sink `{name}` already registered")]
    SinkAlreadyExists { name: String },

    #[error("sink `{name}` is not registered")]
    SinkNotFound { name: String },

    #[error("cost {value} is out of range 0..=254 for sink `{name}`")]
    CostOutOfRange { name: String, value: u16 },

    #[error("scratchpad upload/process requires sink `{name}` to be stopped first")]
    StackMustBeStopped { name: String },

    #[error("internal switch failure: {detail}")]
    Internal { detail: String },
}

impl SwitchError {
    pub fn sink_already_exists(name: impl Into<String>) -> Self {
        SwitchError::SinkAlreadyExists { name: name.into() }
    }

    pub fn sink_not_found(name: impl Into<String>) -> Self {
        SwitchError::SinkNotFound { name: name.into() }
    }
}
