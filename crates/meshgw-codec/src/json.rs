//! The wire [`Codec`] (§4.1) and its JSON implementation.
//!
//! The real protocol's payload encoding is opaque per the spec's own scope
//! (§1) — any self-describing format is conformant as long as it carries the
//! fields named above. `JsonCodec` uses `serde_json`, matching the rest of
//! the workspace's wire-serialization idiom.

use meshgw_core::{GatewayStatus, ReceivedDataEvent};
use serde::Deserialize;

use crate::error::ParseError;
use crate::event::{received_data_topic, status_topic, ReceivedDataWire};
use crate::request::{GatewayRequest, TargetScratchpadRequest};
use crate::response::GatewayResponse;
use crate::topic::{build_topic, parse_topic, TopicKind};

/// Parses inbound request payloads and serializes outbound responses,
/// events, and status documents (§4.1).
pub trait Codec: Send + Sync {
    /// Decodes one inbound request. `topic` supplies the `<gw>`/`<sink>`
    /// addressing the payload itself does not repeat.
    fn decode_request(&self, topic: &str, payload: &[u8]) -> Result<GatewayRequest, ParseError>;

    /// Encodes a response onto its `(topic, payload)` pair.
    fn encode_response(&self, gateway_id: &str, response: &GatewayResponse) -> (String, Vec<u8>);

    /// Encodes an uplink event onto its `(topic, payload)` pair.
    fn encode_event(&self, gateway_id: &str, event: &ReceivedDataEvent) -> (String, Vec<u8>);

    /// Encodes the retained status document onto its `(topic, payload)` pair.
    fn encode_status(&self, status: &GatewayStatus) -> (String, Vec<u8>);
}

#[derive(Deserialize)]
struct GwInfoBody {
    req_id: u64,
}

#[derive(Deserialize)]
struct SetConfigBody {
    req_id: u64,
    config: meshgw_core::SinkConfiguration,
}

#[derive(Deserialize)]
struct SendDataBody {
    req_id: u64,
    dst: u32,
    src_ep: u8,
    dst_ep: u8,
    qos: u8,
    #[serde(default)]
    initial_delay_ms: u32,
    #[serde(default)]
    unack_csma: bool,
    hop_limit: u8,
    #[serde(default)]
    payload: Vec<u8>,
}

#[derive(Deserialize)]
struct OtapStatusBody {
    req_id: u64,
}

#[derive(Deserialize)]
struct OtapLoadScratchpadBody {
    req_id: u64,
    seq: u8,
    #[serde(default)]
    blob: Vec<u8>,
}

#[derive(Deserialize)]
struct OtapSetTargetScratchpadBody {
    req_id: u64,
    target: TargetScratchpadRequest,
}

/// `serde_json`-backed [`Codec`] (§4.1).
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        JsonCodec
    }

    fn malformed<E: std::fmt::Display>(topic: &str, err: E) -> ParseError {
        ParseError::MalformedPayload {
            topic: topic.to_string(),
            reason: err.to_string(),
        }
    }
}

impl Codec for JsonCodec {
    fn decode_request(&self, topic: &str, payload: &[u8]) -> Result<GatewayRequest, ParseError> {
        let parsed = parse_topic(topic)?;

        macro_rules! sink_id {
            () => {
                parsed.sink_id.clone().ok_or_else(|| ParseError::MissingField {
                    topic: topic.to_string(),
                    field: "sink_id".to_string(),
                })?
            };
        }

        Ok(match parsed.kind {
            TopicKind::ReqGetGwInfo => {
                let body: GwInfoBody =
                    serde_json::from_slice(payload).map_err(|e| Self::malformed(topic, e))?;
                GatewayRequest::GetGwInfo { req_id: body.req_id }
            }
            TopicKind::ReqGetConfigs => {
                let body: GwInfoBody =
                    serde_json::from_slice(payload).map_err(|e| Self::malformed(topic, e))?;
                GatewayRequest::GetConfigs { req_id: body.req_id }
            }
            TopicKind::ReqSetConfig => {
                let body: SetConfigBody =
                    serde_json::from_slice(payload).map_err(|e| Self::malformed(topic, e))?;
                GatewayRequest::SetConfig {
                    req_id: body.req_id,
                    sink_id: sink_id!(),
                    config: body.config,
                }
            }
            TopicKind::ReqSendData => {
                let body: SendDataBody =
                    serde_json::from_slice(payload).map_err(|e| Self::malformed(topic, e))?;
                GatewayRequest::SendData {
                    req_id: body.req_id,
                    sink_id: sink_id!(),
                    dst: body.dst,
                    src_ep: body.src_ep,
                    dst_ep: body.dst_ep,
                    qos: body.qos,
                    initial_delay_ms: body.initial_delay_ms,
                    unack_csma: body.unack_csma,
                    hop_limit: body.hop_limit,
                    payload: body.payload,
                }
            }
            TopicKind::ReqOtapStatus => {
                let body: OtapStatusBody =
                    serde_json::from_slice(payload).map_err(|e| Self::malformed(topic, e))?;
                GatewayRequest::OtapStatus {
                    req_id: body.req_id,
                    sink_id: sink_id!(),
                }
            }
            TopicKind::ReqOtapLoadScratchpad => {
                let body: OtapLoadScratchpadBody =
                    serde_json::from_slice(payload).map_err(|e| Self::malformed(topic, e))?;
                GatewayRequest::OtapLoadScratchpad {
                    req_id: body.req_id,
                    sink_id: sink_id!(),
                    seq: body.seq,
                    blob: body.blob,
                }
            }
            TopicKind::ReqOtapProcessScratchpad => {
                let body: OtapStatusBody =
                    serde_json::from_slice(payload).map_err(|e| Self::malformed(topic, e))?;
                GatewayRequest::OtapProcessScratchpad {
                    req_id: body.req_id,
                    sink_id: sink_id!(),
                }
            }
            TopicKind::ReqOtapSetTargetScratchpad => {
                let body: OtapSetTargetScratchpadBody =
                    serde_json::from_slice(payload).map_err(|e| Self::malformed(topic, e))?;
                GatewayRequest::OtapSetTargetScratchpad {
                    req_id: body.req_id,
                    sink_id: sink_id!(),
                    target: body.target,
                }
            }
            _ => {
                return Err(ParseError::UnknownTopic {
                    topic: topic.to_string(),
                })
            }
        })
    }

    fn encode_response(&self, gateway_id: &str, response: &GatewayResponse) -> (String, Vec<u8>) {
        let kind = match response {
            GatewayResponse::GwInfo { .. } => TopicKind::RespGetGwInfo,
            GatewayResponse::Configs { .. } => TopicKind::RespGetConfigs,
            GatewayResponse::SetConfig { .. } => TopicKind::RespSetConfig,
            GatewayResponse::SendData { .. } => TopicKind::RespSendData,
            GatewayResponse::OtapStatus { .. } => TopicKind::RespOtapStatus,
            GatewayResponse::OtapLoadScratchpad { .. } => TopicKind::RespOtapLoadScratchpad,
            GatewayResponse::OtapProcessScratchpad { .. } => TopicKind::RespOtapProcessScratchpad,
            GatewayResponse::OtapSetTargetScratchpad { .. } => {
                TopicKind::RespOtapSetTargetScratchpad
            }
        };
        let topic = build_topic(kind, gateway_id, response.sink_id(), None, None, None);
        let payload =
            serde_json::to_vec(response).expect("GatewayResponse always serializes to JSON");
        (topic, payload)
    }

    fn encode_event(&self, gateway_id: &str, event: &ReceivedDataEvent) -> (String, Vec<u8>) {
        let topic = received_data_topic(gateway_id, event);
        let wire = ReceivedDataWire::from(event);
        let payload = serde_json::to_vec(&wire).expect("ReceivedDataWire always serializes to JSON");
        (topic, payload)
    }

    fn encode_status(&self, status: &GatewayStatus) -> (String, Vec<u8>) {
        let topic = status_topic(&status.gateway_id);
        let payload = serde_json::to_vec(status).expect("GatewayStatus always serializes to JSON");
        (topic, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshgw_core::GatewayResultCode;

    #[test]
    fn decodes_send_data_request_from_the_spec_example() {
        let codec = JsonCodec::new();
        let payload = br#"{"req_id":42,"dst":1,"src_ep":1,"dst_ep":1,"qos":0,"hop_limit":10,"payload":[170]}"#;
        let request = codec
            .decode_request("gw-request/send_data/gw-1/sink0", payload)
            .unwrap();
        match request {
            GatewayRequest::SendData {
                req_id,
                sink_id,
                dst,
                hop_limit,
                payload,
                ..
            } => {
                assert_eq!(req_id, 42);
                assert_eq!(sink_id, "sink0");
                assert_eq!(dst, 1);
                assert_eq!(hop_limit, 10);
                assert_eq!(payload, vec![0xAA]);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_payload_missing_required_field() {
        let codec = JsonCodec::new();
        let err = codec
            .decode_request("gw-request/send_data/gw-1/sink0", b"{}")
            .unwrap_err();
        assert!(matches!(err, ParseError::MalformedPayload { .. }));
    }

    #[test]
    fn encode_response_builds_matching_topic() {
        let codec = JsonCodec::new();
        let response = GatewayResponse::SendData {
            req_id: 42,
            res: GatewayResultCode::Ok,
            sink_id: "sink0".to_string(),
        };
        let (topic, payload) = codec.encode_response("gw-1", &response);
        assert_eq!(topic, "gw-response/send_data/gw-1/sink0");
        let decoded: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(decoded["req_id"], 42);
    }

    #[test]
    fn encode_decode_round_trips_get_gw_info() {
        let codec = JsonCodec::new();
        let request = codec
            .decode_request("gw-request/get_gw_info/gw-1", br#"{"req_id":7}"#)
            .unwrap();
        assert_eq!(request, GatewayRequest::GetGwInfo { req_id: 7 });
    }
}
