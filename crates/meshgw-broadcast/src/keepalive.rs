//! Keep-alive broadcaster (§4.10): every `period`, push a TLV keep-alive to
//! endpoints (67,67) on every sink, retrying a stuck sink up to 3 times with
//! 1 s spacing before moving on (§8 testable property 9).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use meshgw_core::GatewayResultCode;
use meshgw_sinkbus::OutboundMessage;
use meshgw_switch::SinkManager;
use tokio::task::JoinHandle;

use crate::clock::{now_ms, RtcClockSource};
use crate::tlv::{encode_keep_alive_payload, gateway_status_byte};

const KEEP_ALIVE_VERSION: u8 = 1;
const KEEP_ALIVE_SRC_EP: u8 = 67;
const KEEP_ALIVE_DST_EP: u8 = 67;
const BROADCAST_DST: u32 = 0xFFFF_FFFF;
const MAX_ATTEMPTS: u32 = 3;
const RETRY_SPACING: Duration = Duration::from_secs(1);

pub struct KeepAliveBroadcasterConfig {
    pub period: Duration,
    pub interval_s: u16,
    pub timezone_offset_mn: i16,
    pub clock_source: RtcClockSource,
    /// §9 Open Question 1: opt in to one immediate keep-alive to every sink
    /// on a successful MQTT reconnect, in addition to the periodic schedule.
    pub burst_on_reconnect: bool,
}

pub struct KeepAliveBroadcaster {
    config: KeepAliveBroadcasterConfig,
    sink_manager: Arc<SinkManager>,
    mqtt_connected: AtomicBool,
}

impl KeepAliveBroadcaster {
    pub fn new(config: KeepAliveBroadcasterConfig, sink_manager: Arc<SinkManager>) -> Arc<Self> {
        Arc::new(Self {
            config,
            sink_manager,
            mqtt_connected: AtomicBool::new(false),
        })
    }

    pub fn set_mqtt_connected(&self, connected: bool) {
        let was_connected = self.mqtt_connected.swap(connected, Ordering::SeqCst);
        if connected && !was_connected && self.config.burst_on_reconnect {
            let sink_manager = Arc::clone(&self.sink_manager);
            let status_byte = gateway_status_byte(true);
            let interval_s = self.config.interval_s;
            let timezone_offset_mn = self.config.timezone_offset_mn;
            let clock_source = self.config.clock_source.clone();
            tokio::spawn(async move {
                let timestamp_ms = now_ms(&clock_source).await.unwrap_or(0);
                let payload = encode_keep_alive_payload(
                    KEEP_ALIVE_VERSION,
                    status_byte,
                    timestamp_ms,
                    timezone_offset_mn,
                    interval_s,
                );
                for sink in sink_manager.get_sinks() {
                    send_with_retry(&sink, &payload).await;
                }
            });
        }
    }

    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run().await })
    }

    async fn run(self: Arc<Self>) {
        loop {
            let started = Instant::now();
            self.broadcast_once().await;
            let elapsed = started.elapsed();
            tokio::time::sleep(self.config.period.saturating_sub(elapsed)).await;
        }
    }

    async fn broadcast_once(&self) {
        let timestamp_ms = now_ms(&self.config.clock_source).await.unwrap_or(0);
        let status_byte = gateway_status_byte(self.mqtt_connected.load(Ordering::SeqCst));
        let payload = encode_keep_alive_payload(
            KEEP_ALIVE_VERSION,
            status_byte,
            timestamp_ms,
            self.config.timezone_offset_mn,
            self.config.interval_s,
        );
        for sink in self.sink_manager.get_sinks() {
            send_with_retry(&sink, &payload).await;
        }
    }
}

async fn send_with_retry(sink: &meshgw_switch::Sink, payload: &[u8]) {
    for attempt in 1..=MAX_ATTEMPTS {
        let result = sink
            .send(OutboundMessage {
                dst: BROADCAST_DST,
                src_ep: KEEP_ALIVE_SRC_EP,
                dst_ep: KEEP_ALIVE_DST_EP,
                qos: 0,
                initial_delay_ms: 0,
                unack_csma: false,
                hop_limit: 0,
                payload: payload.to_vec(),
            })
            .await;
        if result == GatewayResultCode::Ok || attempt == MAX_ATTEMPTS {
            return;
        }
        tokio::time::sleep(RETRY_SPACING).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshgw_sinkbus::InMemorySinkBus;

    fn test_broadcaster(burst_on_reconnect: bool) -> (Arc<KeepAliveBroadcaster>, Arc<InMemorySinkBus>) {
        let bus = Arc::new(InMemorySinkBus::new());
        let sink_manager = SinkManager::new(bus.clone());
        let broadcaster = KeepAliveBroadcaster::new(
            KeepAliveBroadcasterConfig {
                period: Duration::from_secs(300),
                interval_s: 300,
                timezone_offset_mn: -60,
                clock_source: RtcClockSource::Local,
                burst_on_reconnect,
            },
            sink_manager,
        );
        (broadcaster, bus)
    }

    #[tokio::test]
    async fn broadcast_once_sends_to_every_sink_on_the_documented_endpoints() {
        let (broadcaster, bus) = test_broadcaster(false);
        bus.insert_sink("sink0", "owner-1");
        broadcaster.broadcast_once().await;
        let sent = bus.sent_messages("sink0");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].src_ep, 67);
        assert_eq!(sent[0].dst_ep, 67);
        assert_eq!(sent[0].dst, 0xFFFF_FFFF);
    }

    #[tokio::test]
    async fn reconnect_burst_is_opt_in() {
        let (broadcaster, bus) = test_broadcaster(false);
        bus.insert_sink("sink0", "owner-1");
        broadcaster.set_mqtt_connected(true);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(bus.sent_messages("sink0").is_empty());
    }

    #[tokio::test]
    async fn reconnect_burst_sends_immediately_when_enabled() {
        let (broadcaster, bus) = test_broadcaster(true);
        bus.insert_sink("sink0", "owner-1");
        broadcaster.set_mqtt_connected(true);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(bus.sent_messages("sink0").len(), 1);
    }
}
