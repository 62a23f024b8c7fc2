//! `ParseError` (§4.1): the one error a decode can raise.

use thiserror::Error;

/// Raised when a payload is malformed, a required field is missing, or an
/// enumerated field is out of range (§4.1). Encoding never fails for
/// well-typed inputs, so there is no corresponding `EncodeError`.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ParseError {
    #[error("topic `{topic}` does not match any known pattern")]
    UnknownTopic { topic: String },

    #[error("malformed payload on topic `{topic}`: {reason}")]
    MalformedPayload { topic: String, reason: String },

    #[error("field `{field}` missing from payload on topic `{topic}`")]
    MissingField { topic: String, field: String },

    #[error("field `{field}` out of range on topic `{topic}`: {detail}")]
    OutOfRange {
        topic: String,
        field: String,
        detail: String,
    },
}
