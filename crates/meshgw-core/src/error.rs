//! Result code taxonomy (§7) and the internal error type.

use thiserror::Error;

/// The wire-visible result code taxonomy of spec §7.
///
/// This is the type every client-facing response carries in its `res` field.
/// It is total: every bus failure and every local validation failure maps to
/// exactly one of these, with `INTERNAL_ERROR`/`UNKNOWN_ERROR` as the
/// catch-alls (§4.3 bus-code mapping, last line).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[non_exhaustive]
pub enum GatewayResultCode {
    Ok,
    InvalidSinkId,
    InvalidSinkState,
    InvalidRole,
    InvalidDestAddress,
    InvalidParam,
    InvalidDataPayload,
    InvalidScratchpad,
    InvalidSequenceNumber,
    InvalidRebootDelay,
    InvalidDiagInterval,
    InvalidMaxHopCount,
    NoScratchpadPresent,
    AccessDenied,
    InternalError,
    UnknownError,
}

impl GatewayResultCode {
    /// Numeric wire representation, stable across releases.
    pub const fn code(self) -> u16 {
        match self {
            GatewayResultCode::Ok => 0,
            GatewayResultCode::InvalidSinkId => 1,
            GatewayResultCode::InvalidSinkState => 2,
            GatewayResultCode::InvalidRole => 3,
            GatewayResultCode::InvalidDestAddress => 4,
            GatewayResultCode::InvalidParam => 5,
            GatewayResultCode::InvalidDataPayload => 6,
            GatewayResultCode::InvalidScratchpad => 7,
            GatewayResultCode::InvalidSequenceNumber => 8,
            GatewayResultCode::InvalidRebootDelay => 9,
            GatewayResultCode::InvalidDiagInterval => 10,
            GatewayResultCode::InvalidMaxHopCount => 11,
            GatewayResultCode::NoScratchpadPresent => 12,
            GatewayResultCode::AccessDenied => 13,
            GatewayResultCode::InternalError => 14,
            GatewayResultCode::UnknownError => 15,
        }
    }

    /// Worst-case combination of two result codes, used when a single
    /// operation (e.g. `write_config`) performs several sub-writes and must
    /// report one summary code (§4.3 `write_config`).
    ///
    /// `Ok` loses to everything; among failures the first one observed wins,
    /// since the spec does not rank failures against each other.
    pub const fn worst_of(self, other: GatewayResultCode) -> GatewayResultCode {
        match self {
            GatewayResultCode::Ok => other,
            _ => self,
        }
    }

    pub const fn is_ok(self) -> bool {
        matches!(self, GatewayResultCode::Ok)
    }
}

/// Internal error type for failures that occur before a `GatewayResultCode`
/// can be computed (codec/config/io failures), or that are never meant to
/// reach a wire response (parse errors on inbound messages are logged and
/// the message dropped, per §7 propagation policy).
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("malformed payload on topic `{topic}`: {reason}")]
    Parse { topic: String, reason: String },

    #[error("sink `{sink_id}` is not known to the sink manager")]
    UnknownSink { sink_id: String },

    #[error("bus operation failed: {0}")]
    Bus(#[from] BusError),

    #[error("mqtt transport error: {0}")]
    Transport(String),

    #[error("configuration invalid: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Structured error surfaced by the external `SinkBus` capability (§4.2).
///
/// Bus implementations return either a numeric code (mapped via the table in
/// §4.3) or a structured exception matching `[<name>]: C Mesh Lib ret = <n>`;
/// anything else is an opaque message that becomes `INTERNAL_ERROR`.
#[derive(Clone, Debug, Error)]
pub enum BusError {
    #[error("bus returned code {0}")]
    Code(i32),

    #[error("[{name}]: C Mesh Lib ret = {code}")]
    MeshLib { name: String, code: i32 },

    #[error("bus exception: {0}")]
    Opaque(String),
}

impl GatewayResultCode {
    /// Bus-code mapping table, abridged in §4.3. Total over `i32`: anything
    /// not listed here falls through to `InternalError`.
    pub fn from_bus_code(code: i32) -> GatewayResultCode {
        match code {
            0 => GatewayResultCode::Ok,
            1 | 2 | 3 | 9 => GatewayResultCode::InvalidSinkState,
            4 => GatewayResultCode::InvalidParam,
            10 => GatewayResultCode::InvalidRole,
            11 => GatewayResultCode::InvalidDestAddress,
            16 => GatewayResultCode::AccessDenied,
            17 => GatewayResultCode::InvalidDataPayload,
            19 => GatewayResultCode::NoScratchpadPresent,
            22 => GatewayResultCode::InvalidDiagInterval,
            23 => GatewayResultCode::InvalidSequenceNumber,
            26 => GatewayResultCode::InvalidScratchpad,
            27 => GatewayResultCode::InvalidRebootDelay,
            _ => GatewayResultCode::InternalError,
        }
    }

    /// Maps a [`BusError`] to a result code, per §4.3.
    pub fn from_bus_error(err: &BusError) -> GatewayResultCode {
        match err {
            BusError::Code(code) => GatewayResultCode::from_bus_code(*code),
            BusError::MeshLib { code, .. } => GatewayResultCode::from_bus_code(*code),
            BusError::Opaque(_) => GatewayResultCode::InternalError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_code_mapping_matches_table() {
        let cases: &[(i32, GatewayResultCode)] = &[
            (0, GatewayResultCode::Ok),
            (1, GatewayResultCode::InvalidSinkState),
            (2, GatewayResultCode::InvalidSinkState),
            (3, GatewayResultCode::InvalidSinkState),
            (9, GatewayResultCode::InvalidSinkState),
            (4, GatewayResultCode::InvalidParam),
            (10, GatewayResultCode::InvalidRole),
            (11, GatewayResultCode::InvalidDestAddress),
            (16, GatewayResultCode::AccessDenied),
            (17, GatewayResultCode::InvalidDataPayload),
            (19, GatewayResultCode::NoScratchpadPresent),
            (22, GatewayResultCode::InvalidDiagInterval),
            (23, GatewayResultCode::InvalidSequenceNumber),
            (26, GatewayResultCode::InvalidScratchpad),
            (27, GatewayResultCode::InvalidRebootDelay),
            (999, GatewayResultCode::InternalError),
        ];
        for (code, expected) in cases {
            assert_eq!(GatewayResultCode::from_bus_code(*code), *expected);
        }
    }

    #[test]
    fn unmapped_mesh_lib_exception_is_internal_error() {
        let err = BusError::MeshLib {
            name: "send".into(),
            code: 4242,
        };
        assert_eq!(
            GatewayResultCode::from_bus_error(&err),
            GatewayResultCode::InternalError
        );
    }

    #[test]
    fn worst_of_prefers_first_failure() {
        let ok = GatewayResultCode::Ok;
        let bad = GatewayResultCode::InvalidParam;
        assert_eq!(ok.worst_of(bad), bad);
        assert_eq!(bad.worst_of(ok), bad);
        assert_eq!(
            GatewayResultCode::InvalidRole.worst_of(GatewayResultCode::AccessDenied),
            GatewayResultCode::InvalidRole
        );
    }
}
