//! Transport-level error type (§4.6).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("mqtt client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("mqtt connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    #[error("reconnect budget of {budget_s}s exceeded after {attempts} attempts")]
    ReconnectBudgetExceeded { budget_s: u64, attempts: u32 },
}
