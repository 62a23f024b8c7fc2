//! Uplink forwarding (§2 data flow: SinkBus → Sink → Gateway → Codec →
//! MQTTTransport → broker; §3 `ReceivedDataEvent`; §8.3).
//!
//! The only [`UplinkListener`] in the workspace: everything upstream of it
//! (owner resolution, endpoint filtering, event-id generation, encoding) is
//! already built in [`meshgw_switch`], [`meshgw_core`], and [`meshgw_codec`]
//! — this module is the glue that wires them together the way
//! [`meshgw_dispatcher::Dispatcher::inbound_handler`] wires the downlink
//! side.

use std::sync::Arc;

use meshgw_codec::Codec;
use meshgw_core::endpoints::EndpointFilters;
use meshgw_core::event::{EventIdGenerator, EventPayload, ReceivedDataEvent};
use meshgw_sinkbus::{UplinkFrame, UplinkListener};
use meshgw_switch::SinkManager;
use meshgw_transport_mqtt::{OutboundItem, OutboundQueue};
use rumqttc::QoS;

pub struct UplinkForwarder {
    gateway_id: String,
    sink_manager: Arc<SinkManager>,
    filters: EndpointFilters,
    event_ids: EventIdGenerator,
    codec: Arc<dyn Codec>,
    queue: Arc<OutboundQueue>,
}

impl UplinkForwarder {
    pub fn new(
        gateway_id: impl Into<String>,
        sink_manager: Arc<SinkManager>,
        filters: EndpointFilters,
        event_ids: EventIdGenerator,
        codec: Arc<dyn Codec>,
        queue: Arc<OutboundQueue>,
    ) -> Arc<Self> {
        Arc::new(Self {
            gateway_id: gateway_id.into(),
            sink_manager,
            filters,
            event_ids,
            codec,
            queue,
        })
    }
}

impl UplinkListener for UplinkForwarder {
    fn on_uplink(&self, owner: &str, frame: UplinkFrame) {
        if self.filters.is_ignored(frame.dst_ep) {
            return;
        }

        let sink_id = self.sink_manager.resolve_owner(owner);
        let network_address = self
            .sink_manager
            .get(&sink_id)
            .and_then(|sink| sink.cached_network_address())
            .unwrap_or(0);

        let payload = if self.filters.is_whitened(frame.dst_ep) {
            EventPayload::SizeOnly(frame.payload.len())
        } else {
            EventPayload::Full(frame.payload)
        };

        let event = ReceivedDataEvent {
            sink_id,
            received_at_ms: frame.timestamp_ms,
            source_address: frame.src,
            destination_address: frame.dst,
            source_endpoint: frame.src_ep,
            destination_endpoint: frame.dst_ep,
            travel_time_ms: frame.travel_time_ms,
            qos: frame.qos,
            hop_count: frame.hop_count,
            payload,
            network_address,
            event_id: self.event_ids.next(),
        };

        let (topic, payload) = self.codec.encode_event(&self.gateway_id, &event);
        self.queue.push(OutboundItem {
            topic,
            payload,
            qos: QoS::AtLeastOnce,
            retain: false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshgw_codec::JsonCodec;
    use meshgw_core::sink_config::NetworkAddress;
    use meshgw_core::SinkConfiguration;
    use meshgw_sinkbus::InMemorySinkBus;

    fn sample_frame(dst_ep: u8) -> UplinkFrame {
        UplinkFrame {
            timestamp_ms: 1_700_000_000_000,
            src: 1,
            dst: 4_294_967_295,
            src_ep: 5,
            dst_ep,
            travel_time_ms: 12,
            qos: 1,
            hop_count: 2,
            payload: vec![1, 2, 3],
        }
    }

    async fn forwarder_with(
        ignored: Vec<u8>,
        whitened: Vec<u8>,
    ) -> (Arc<UplinkForwarder>, Arc<InMemorySinkBus>, Arc<OutboundQueue>) {
        let bus = Arc::new(InMemorySinkBus::new());
        let sink_manager = SinkManager::new(bus.clone());
        bus.insert_sink("sink0", "owner-1");
        let mut config = SinkConfiguration::empty();
        config.network_address = Some(NetworkAddress::new(0x00AB_CDEF));
        let sink = sink_manager.get("sink0").unwrap();
        sink.write_config(&config).await;
        let queue = Arc::new(OutboundQueue::new());
        let filters = EndpointFilters::new(ignored, whitened).unwrap();
        let forwarder = UplinkForwarder::new(
            "gw-1",
            sink_manager,
            filters,
            EventIdGenerator::monotonic(),
            Arc::new(JsonCodec::new()),
            queue.clone(),
        );
        (forwarder, bus, queue)
    }

    #[tokio::test]
    async fn whitened_endpoint_publishes_size_only_payload_at_the_documented_topic() {
        let (forwarder, _bus, queue) = forwarder_with(vec![], vec![7]).await;
        forwarder.on_uplink("owner-1", sample_frame(7));

        let item = queue.pop().expect("uplink event enqueued");
        assert_eq!(item.topic, "gw-event/received_data/gw-1/sink0/11259375/5/7");
        assert_eq!(item.qos, QoS::AtLeastOnce);
        let decoded: serde_json::Value = serde_json::from_slice(&item.payload).unwrap();
        assert!(decoded.get("payload").is_none());
        assert_eq!(decoded["data_size"], 3);
    }

    #[tokio::test]
    async fn ignored_endpoint_is_dropped_entirely() {
        let (forwarder, _bus, queue) = forwarder_with(vec![7], vec![]).await;
        forwarder.on_uplink("owner-1", sample_frame(7));
        assert!(queue.pop().is_none());
    }

    #[tokio::test]
    async fn unfiltered_endpoint_carries_the_full_payload() {
        let (forwarder, _bus, queue) = forwarder_with(vec![], vec![]).await;
        forwarder.on_uplink("owner-1", sample_frame(9));

        let item = queue.pop().expect("uplink event enqueued");
        let decoded: serde_json::Value = serde_json::from_slice(&item.payload).unwrap();
        assert_eq!(decoded["payload"], serde_json::json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn unresolved_owner_falls_back_to_the_unknown_sink_sentinel() {
        let (forwarder, _bus, queue) = forwarder_with(vec![], vec![]).await;
        forwarder.on_uplink("ghost-owner", sample_frame(9));

        let item = queue.pop().expect("uplink event enqueued");
        assert!(item.topic.contains("/unknown/"));
    }
}
