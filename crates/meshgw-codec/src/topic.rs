//! MQTT topic builder/parser (§4.1, §6). Topic generation is deterministic
//! and collision-free across every kind; parsing is the exact inverse for
//! well-formed topics and a [`ParseError`] otherwise.

use crate::error::ParseError;

/// One of the fixed topic shapes exchanged with the broker (§6).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TopicKind {
    EventStatus,
    EventReceivedData,
    ReqGetGwInfo,
    ReqGetConfigs,
    ReqSetConfig,
    ReqSendData,
    ReqOtapStatus,
    ReqOtapLoadScratchpad,
    ReqOtapProcessScratchpad,
    ReqOtapSetTargetScratchpad,
    RespGetGwInfo,
    RespGetConfigs,
    RespSetConfig,
    RespSendData,
    RespOtapStatus,
    RespOtapLoadScratchpad,
    RespOtapProcessScratchpad,
    RespOtapSetTargetScratchpad,
}

impl TopicKind {
    fn prefix(self) -> &'static str {
        match self {
            TopicKind::EventStatus | TopicKind::EventReceivedData => "gw-event",
            TopicKind::ReqGetGwInfo
            | TopicKind::ReqGetConfigs
            | TopicKind::ReqSetConfig
            | TopicKind::ReqSendData
            | TopicKind::ReqOtapStatus
            | TopicKind::ReqOtapLoadScratchpad
            | TopicKind::ReqOtapProcessScratchpad
            | TopicKind::ReqOtapSetTargetScratchpad => "gw-request",
            TopicKind::RespGetGwInfo
            | TopicKind::RespGetConfigs
            | TopicKind::RespSetConfig
            | TopicKind::RespSendData
            | TopicKind::RespOtapStatus
            | TopicKind::RespOtapLoadScratchpad
            | TopicKind::RespOtapProcessScratchpad
            | TopicKind::RespOtapSetTargetScratchpad => "gw-response",
        }
    }

    fn leaf(self) -> &'static str {
        match self {
            TopicKind::EventStatus => "status",
            TopicKind::EventReceivedData => "received_data",
            TopicKind::ReqGetGwInfo | TopicKind::RespGetGwInfo => "get_gw_info",
            TopicKind::ReqGetConfigs | TopicKind::RespGetConfigs => "get_configs",
            TopicKind::ReqSetConfig | TopicKind::RespSetConfig => "set_config",
            TopicKind::ReqSendData | TopicKind::RespSendData => "send_data",
            TopicKind::ReqOtapStatus | TopicKind::RespOtapStatus => "otap_status",
            TopicKind::ReqOtapLoadScratchpad | TopicKind::RespOtapLoadScratchpad => {
                "otap_load_scratchpad"
            }
            TopicKind::ReqOtapProcessScratchpad | TopicKind::RespOtapProcessScratchpad => {
                "otap_process_scratchpad"
            }
            TopicKind::ReqOtapSetTargetScratchpad | TopicKind::RespOtapSetTargetScratchpad => {
                "otap_set_target_scratchpad"
            }
        }
    }

    /// Whether this kind's topic carries a `<sink>` segment after `<gw>`.
    fn has_sink_segment(self) -> bool {
        !matches!(
            self,
            TopicKind::EventStatus
                | TopicKind::ReqGetGwInfo
                | TopicKind::RespGetGwInfo
                | TopicKind::ReqGetConfigs
                | TopicKind::RespGetConfigs
        )
    }

    fn from_prefix_and_leaf(prefix: &str, leaf: &str) -> Option<TopicKind> {
        Some(match (prefix, leaf) {
            ("gw-event", "status") => TopicKind::EventStatus,
            ("gw-event", "received_data") => TopicKind::EventReceivedData,
            ("gw-request", "get_gw_info") => TopicKind::ReqGetGwInfo,
            ("gw-request", "get_configs") => TopicKind::ReqGetConfigs,
            ("gw-request", "set_config") => TopicKind::ReqSetConfig,
            ("gw-request", "send_data") => TopicKind::ReqSendData,
            ("gw-request", "otap_status") => TopicKind::ReqOtapStatus,
            ("gw-request", "otap_load_scratchpad") => TopicKind::ReqOtapLoadScratchpad,
            ("gw-request", "otap_process_scratchpad") => TopicKind::ReqOtapProcessScratchpad,
            ("gw-request", "otap_set_target_scratchpad") => TopicKind::ReqOtapSetTargetScratchpad,
            ("gw-response", "get_gw_info") => TopicKind::RespGetGwInfo,
            ("gw-response", "get_configs") => TopicKind::RespGetConfigs,
            ("gw-response", "set_config") => TopicKind::RespSetConfig,
            ("gw-response", "send_data") => TopicKind::RespSendData,
            ("gw-response", "otap_status") => TopicKind::RespOtapStatus,
            ("gw-response", "otap_load_scratchpad") => TopicKind::RespOtapLoadScratchpad,
            ("gw-response", "otap_process_scratchpad") => TopicKind::RespOtapProcessScratchpad,
            ("gw-response", "otap_set_target_scratchpad") => {
                TopicKind::RespOtapSetTargetScratchpad
            }
            _ => return None,
        })
    }
}

/// The parsed form of a topic: its kind plus whichever address segments it
/// carries (§6).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedTopic {
    pub kind: TopicKind,
    pub gateway_id: String,
    pub sink_id: Option<String>,
    pub network_address: Option<u32>,
    pub src_ep: Option<u8>,
    pub dst_ep: Option<u8>,
}

/// Builds the deterministic topic string for `kind` (§4.1, §6).
///
/// `sink_id` must be `Some` for every kind where
/// [`TopicKind::has_sink_segment`] is true and `None` otherwise; `network`,
/// `src_ep`, `dst_ep` are only meaningful for
/// [`TopicKind::EventReceivedData`]. Mismatches between `kind` and the
/// optional arguments are a caller bug, not a `ParseError` — encoding is
/// infallible for well-typed inputs (§4.1).
pub fn build_topic(
    kind: TopicKind,
    gateway_id: &str,
    sink_id: Option<&str>,
    network_address: Option<u32>,
    src_ep: Option<u8>,
    dst_ep: Option<u8>,
) -> String {
    match kind {
        TopicKind::EventReceivedData => {
            let sink_id = sink_id.unwrap_or_default();
            let network_address = network_address.unwrap_or_default();
            let src_ep = src_ep.unwrap_or_default();
            let dst_ep = dst_ep.unwrap_or_default();
            format!(
                "{}/{}/{gateway_id}/{sink_id}/{network_address}/{src_ep}/{dst_ep}",
                kind.prefix(),
                kind.leaf(),
            )
        }
        kind if kind.has_sink_segment() => {
            format!(
                "{}/{}/{gateway_id}/{}",
                kind.prefix(),
                kind.leaf(),
                sink_id.unwrap_or_default()
            )
        }
        kind => format!("{}/{}/{gateway_id}", kind.prefix(), kind.leaf()),
    }
}

/// Parses a topic produced by [`build_topic`], or any wire topic received
/// from the broker, into its kind plus address segments.
pub fn parse_topic(topic: &str) -> Result<ParsedTopic, ParseError> {
    let segments: Vec<&str> = topic.split('/').collect();
    if segments.len() < 3 {
        return Err(ParseError::UnknownTopic { topic: topic.to_string() });
    }

    let kind = TopicKind::from_prefix_and_leaf(segments[0], segments[1])
        .ok_or_else(|| ParseError::UnknownTopic { topic: topic.to_string() })?;
    let gateway_id = segments[2].to_string();

    match kind {
        TopicKind::EventReceivedData => {
            if segments.len() != 7 {
                return Err(ParseError::MalformedPayload {
                    topic: topic.to_string(),
                    reason: "received_data topic expects 7 segments".to_string(),
                });
            }
            let sink_id = segments[3].to_string();
            let network_address = segments[4].parse::<u32>().map_err(|_| ParseError::OutOfRange {
                topic: topic.to_string(),
                field: "network_address".to_string(),
                detail: segments[4].to_string(),
            })?;
            let src_ep = segments[5].parse::<u8>().map_err(|_| ParseError::OutOfRange {
                topic: topic.to_string(),
                field: "src_ep".to_string(),
                detail: segments[5].to_string(),
            })?;
            let dst_ep = segments[6].parse::<u8>().map_err(|_| ParseError::OutOfRange {
                topic: topic.to_string(),
                field: "dst_ep".to_string(),
                detail: segments[6].to_string(),
            })?;
            Ok(ParsedTopic {
                kind,
                gateway_id,
                sink_id: Some(sink_id),
                network_address: Some(network_address),
                src_ep: Some(src_ep),
                dst_ep: Some(dst_ep),
            })
        }
        kind if kind.has_sink_segment() => {
            if segments.len() != 4 {
                return Err(ParseError::MalformedPayload {
                    topic: topic.to_string(),
                    reason: "expected a `<gw>/<sink>` suffix".to_string(),
                });
            }
            Ok(ParsedTopic {
                kind,
                gateway_id,
                sink_id: Some(segments[3].to_string()),
                network_address: None,
                src_ep: None,
                dst_ep: None,
            })
        }
        kind => {
            if segments.len() != 3 {
                return Err(ParseError::MalformedPayload {
                    topic: topic.to_string(),
                    reason: "expected a bare `<gw>` suffix".to_string(),
                });
            }
            Ok(ParsedTopic {
                kind,
                gateway_id,
                sink_id: None,
                network_address: None,
                src_ep: None,
                dst_ep: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn received_data_topic_round_trips() {
        let topic = build_topic(
            TopicKind::EventReceivedData,
            "gw-1",
            Some("sink0"),
            Some(42),
            Some(78),
            Some(79),
        );
        assert_eq!(topic, "gw-event/received_data/gw-1/sink0/42/78/79");

        let parsed = parse_topic(&topic).unwrap();
        assert_eq!(parsed.kind, TopicKind::EventReceivedData);
        assert_eq!(parsed.gateway_id, "gw-1");
        assert_eq!(parsed.sink_id.as_deref(), Some("sink0"));
        assert_eq!(parsed.network_address, Some(42));
        assert_eq!(parsed.src_ep, Some(78));
        assert_eq!(parsed.dst_ep, Some(79));
    }

    #[test]
    fn set_config_request_topic_round_trips() {
        let topic = build_topic(TopicKind::ReqSetConfig, "gw-1", Some("sink0"), None, None, None);
        assert_eq!(topic, "gw-request/set_config/gw-1/sink0");

        let parsed = parse_topic(&topic).unwrap();
        assert_eq!(parsed.kind, TopicKind::ReqSetConfig);
        assert_eq!(parsed.sink_id.as_deref(), Some("sink0"));
    }

    #[test]
    fn get_gw_info_topic_has_no_sink_segment() {
        let topic = build_topic(TopicKind::ReqGetGwInfo, "gw-1", None, None, None, None);
        assert_eq!(topic, "gw-request/get_gw_info/gw-1");
        assert_eq!(parse_topic(&topic).unwrap().sink_id, None);
    }

    #[test]
    fn unknown_topic_is_rejected() {
        assert!(parse_topic("gw-request/nonsense/gw-1").is_err());
        assert!(parse_topic("too/short").is_err());
    }

    #[test]
    fn every_kind_builds_a_distinct_topic() {
        let kinds = [
            TopicKind::EventStatus,
            TopicKind::ReqGetGwInfo,
            TopicKind::ReqGetConfigs,
            TopicKind::ReqSetConfig,
            TopicKind::ReqSendData,
            TopicKind::ReqOtapStatus,
            TopicKind::ReqOtapLoadScratchpad,
            TopicKind::ReqOtapProcessScratchpad,
            TopicKind::ReqOtapSetTargetScratchpad,
            TopicKind::RespGetGwInfo,
            TopicKind::RespGetConfigs,
            TopicKind::RespSetConfig,
            TopicKind::RespSendData,
            TopicKind::RespOtapStatus,
            TopicKind::RespOtapLoadScratchpad,
            TopicKind::RespOtapProcessScratchpad,
            TopicKind::RespOtapSetTargetScratchpad,
        ];
        let mut seen = std::collections::HashSet::new();
        for kind in kinds {
            let topic = build_topic(kind, "gw-1", Some("sink0"), None, None, None);
            assert!(seen.insert(topic), "collision for {kind:?}");
        }
    }
}
