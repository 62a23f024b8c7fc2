//! Wire projection of [`ReceivedDataEvent`] (§3, §6, §8.3). The gateway-level
//! fields that the topic carries (`sink_id`, `network_address`, `src_ep`,
//! `dst_ep`) are dropped from the payload; what remains is either a full
//! payload or, for a whitened endpoint, only its size.

use meshgw_core::{EventPayload, ReceivedDataEvent};

use crate::topic::{build_topic, TopicKind};

/// The payload published on `gw-event/received_data/...` (§8.3 rule 3: a
/// whitened destination endpoint carries `data_size` with `payload` absent).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReceivedDataWire {
    pub timestamp_ms: u64,
    pub src: u32,
    pub dst: u32,
    pub travel_time_ms: u32,
    pub qos: u8,
    pub hop_count: u8,
    pub event_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<u8>>,
    pub data_size: usize,
}

impl From<&ReceivedDataEvent> for ReceivedDataWire {
    fn from(event: &ReceivedDataEvent) -> Self {
        ReceivedDataWire {
            timestamp_ms: event.received_at_ms,
            src: event.source_address,
            dst: event.destination_address,
            travel_time_ms: event.travel_time_ms,
            qos: event.qos,
            hop_count: event.hop_count,
            event_id: event.event_id,
            data_size: event.payload.size(),
            payload: match &event.payload {
                EventPayload::Full(bytes) => Some(bytes.clone()),
                EventPayload::SizeOnly(_) => None,
            },
        }
    }
}

/// The topic an uplink event publishes on, derived from the event's own
/// address fields rather than passed in separately (§6).
pub fn received_data_topic(gateway_id: &str, event: &ReceivedDataEvent) -> String {
    build_topic(
        TopicKind::EventReceivedData,
        gateway_id,
        Some(&event.sink_id),
        Some(event.network_address),
        Some(event.source_endpoint),
        Some(event.destination_endpoint),
    )
}

/// The topic the retained status document publishes on (§6, §8.4).
pub fn status_topic(gateway_id: &str) -> String {
    build_topic(TopicKind::EventStatus, gateway_id, None, None, None, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshgw_core::EventPayload;

    fn sample_event(payload: EventPayload) -> ReceivedDataEvent {
        ReceivedDataEvent {
            sink_id: "sink0".to_string(),
            received_at_ms: 1_700_000_000_000,
            source_address: 1,
            destination_address: 4_294_967_295,
            source_endpoint: 5,
            destination_endpoint: 7,
            travel_time_ms: 12,
            qos: 1,
            hop_count: 2,
            payload,
            network_address: 0x00AB_CDEF,
            event_id: 9,
        }
    }

    #[test]
    fn whitened_event_omits_payload_but_keeps_size() {
        let event = sample_event(EventPayload::SizeOnly(3));
        let wire = ReceivedDataWire::from(&event);
        assert_eq!(wire.payload, None);
        assert_eq!(wire.data_size, 3);
    }

    #[test]
    fn full_event_carries_payload_bytes() {
        let event = sample_event(EventPayload::Full(vec![1, 2, 3]));
        let wire = ReceivedDataWire::from(&event);
        assert_eq!(wire.payload, Some(vec![1, 2, 3]));
        assert_eq!(wire.data_size, 3);
    }

    #[test]
    fn topic_matches_the_published_example() {
        let event = sample_event(EventPayload::SizeOnly(3));
        assert_eq!(
            received_data_topic("gw-1", &event),
            "gw-event/received_data/gw-1/sink0/11259375/5/7"
        );
    }
}
