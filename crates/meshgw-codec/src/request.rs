//! Typed request values (§4.1, §4.7). A [`GatewayRequest`] is what a
//! [`crate::json::Codec`] implementation produces from an inbound payload —
//! everything downstream (the dispatcher, the sinks) works against this
//! enum and never touches raw JSON again.

use meshgw_core::{ScratchpadAction, SinkConfiguration};

/// `(action, target_sequence, target_crc, param)` as carried by
/// `otap_set_target_scratchpad` (§3 `TargetScratchpad`, minus the status
/// fields that only a read ever populates).
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TargetScratchpadRequest {
    pub action: ScratchpadAction,
    pub target_sequence: u8,
    pub target_crc: u16,
    /// Exactly one of `param`/`delay` is present on the wire (§3); both
    /// absent is treated as `param = 0`.
    pub param: Option<u8>,
    pub delay: Option<u8>,
}

/// One decoded inbound request (§4.7), tagged with the `req_id` the
/// response must echo.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum GatewayRequest {
    GetGwInfo {
        req_id: u64,
    },
    GetConfigs {
        req_id: u64,
    },
    SetConfig {
        req_id: u64,
        sink_id: String,
        config: SinkConfiguration,
    },
    SendData {
        req_id: u64,
        sink_id: String,
        dst: u32,
        src_ep: u8,
        dst_ep: u8,
        qos: u8,
        initial_delay_ms: u32,
        unack_csma: bool,
        hop_limit: u8,
        payload: Vec<u8>,
    },
    OtapStatus {
        req_id: u64,
        sink_id: String,
    },
    OtapLoadScratchpad {
        req_id: u64,
        sink_id: String,
        seq: u8,
        /// An empty blob means "clear local scratchpad" (§4.3).
        blob: Vec<u8>,
    },
    OtapProcessScratchpad {
        req_id: u64,
        sink_id: String,
    },
    OtapSetTargetScratchpad {
        req_id: u64,
        sink_id: String,
        target: TargetScratchpadRequest,
    },
}

impl GatewayRequest {
    pub fn req_id(&self) -> u64 {
        match self {
            GatewayRequest::GetGwInfo { req_id }
            | GatewayRequest::GetConfigs { req_id }
            | GatewayRequest::SetConfig { req_id, .. }
            | GatewayRequest::SendData { req_id, .. }
            | GatewayRequest::OtapStatus { req_id, .. }
            | GatewayRequest::OtapLoadScratchpad { req_id, .. }
            | GatewayRequest::OtapProcessScratchpad { req_id, .. }
            | GatewayRequest::OtapSetTargetScratchpad { req_id, .. } => *req_id,
        }
    }

    /// `None` for the two gateway-level requests that have no `<sink>`
    /// topic segment.
    pub fn sink_id(&self) -> Option<&str> {
        match self {
            GatewayRequest::GetGwInfo { .. } | GatewayRequest::GetConfigs { .. } => None,
            GatewayRequest::SetConfig { sink_id, .. }
            | GatewayRequest::SendData { sink_id, .. }
            | GatewayRequest::OtapStatus { sink_id, .. }
            | GatewayRequest::OtapLoadScratchpad { sink_id, .. }
            | GatewayRequest::OtapProcessScratchpad { sink_id, .. }
            | GatewayRequest::OtapSetTargetScratchpad { sink_id, .. } => Some(sink_id),
        }
    }
}
