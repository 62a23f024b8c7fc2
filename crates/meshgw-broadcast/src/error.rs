//! Crate-level error type (§9 ambient error handling): every failure this
//! crate can observe either delays the next broadcast cycle or is logged —
//! nothing here is ever propagated up as a process-fatal error.

use thiserror::Error;

use crate::clock::ClockError;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("no sinks registered")]
    NoSinks,
    #[error("clock sourcing failed: {0}")]
    Clock(#[from] ClockError),
}
