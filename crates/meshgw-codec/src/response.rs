//! Typed response values (§4.1, §4.7). Every [`GatewayResponse`] carries the
//! `req_id` of the request it answers (or `0` for the compatibility
//! side-channel, §4.8) and a [`GatewayResultCode`].

use std::collections::BTreeMap;

use meshgw_core::{GatewayResultCode, ScratchpadStatus, SinkConfiguration};

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum GatewayResponse {
    GwInfo {
        req_id: u64,
        current_time_s_epoch: u64,
        gateway_model: String,
        gateway_version: String,
        implemented_api_version: String,
    },
    Configs {
        req_id: u64,
        res: GatewayResultCode,
        sinks: BTreeMap<String, SinkConfiguration>,
    },
    SetConfig {
        req_id: u64,
        res: GatewayResultCode,
        sink_id: String,
        config: SinkConfiguration,
    },
    SendData {
        req_id: u64,
        res: GatewayResultCode,
        sink_id: String,
    },
    OtapStatus {
        req_id: u64,
        res: GatewayResultCode,
        sink_id: String,
        status: Option<ScratchpadStatus>,
    },
    OtapLoadScratchpad {
        req_id: u64,
        res: GatewayResultCode,
        sink_id: String,
    },
    OtapProcessScratchpad {
        req_id: u64,
        res: GatewayResultCode,
        sink_id: String,
    },
    OtapSetTargetScratchpad {
        req_id: u64,
        res: GatewayResultCode,
        sink_id: String,
    },
}

impl GatewayResponse {
    pub fn req_id(&self) -> u64 {
        match self {
            GatewayResponse::GwInfo { req_id, .. }
            | GatewayResponse::Configs { req_id, .. }
            | GatewayResponse::SetConfig { req_id, .. }
            | GatewayResponse::SendData { req_id, .. }
            | GatewayResponse::OtapStatus { req_id, .. }
            | GatewayResponse::OtapLoadScratchpad { req_id, .. }
            | GatewayResponse::OtapProcessScratchpad { req_id, .. }
            | GatewayResponse::OtapSetTargetScratchpad { req_id, .. } => *req_id,
        }
    }

    /// `None` for `GwInfo`/`Configs`, which publish on a gateway-level topic
    /// with no `<sink>` segment.
    pub fn sink_id(&self) -> Option<&str> {
        match self {
            GatewayResponse::GwInfo { .. } | GatewayResponse::Configs { .. } => None,
            GatewayResponse::SetConfig { sink_id, .. }
            | GatewayResponse::SendData { sink_id, .. }
            | GatewayResponse::OtapStatus { sink_id, .. }
            | GatewayResponse::OtapLoadScratchpad { sink_id, .. }
            | GatewayResponse::OtapProcessScratchpad { sink_id, .. }
            | GatewayResponse::OtapSetTargetScratchpad { sink_id, .. } => Some(sink_id),
        }
    }
}
