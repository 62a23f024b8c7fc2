//! Debounced, suppressing status publisher (§4.8).
//!
//! Grounded on [`meshgw_switch::MessageCache`]'s background-sweeper shape
//! (own `Arc<Self>`, spawn a loop off the current runtime, return the
//! `JoinHandle`): here the loop is a `tokio::select!` between "woken by an
//! `update()` call" and "the backup-emission tick", rather than a plain
//! interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use meshgw_codec::{Codec, GatewayResponse};
use meshgw_core::{GatewayResultCode, GatewayStatus};
use meshgw_switch::SinkManager;
use meshgw_transport_mqtt::{OutboundItem, OutboundQueue};
use parking_lot::RwLock;
use rumqttc::QoS;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::error;

const AGGREGATE_DELAY: Duration = Duration::from_millis(500);
const BACKUP_DELAY: Duration = Duration::from_secs(3600);
const PARTIAL_RETRY_DELAYS_S: [u64; 5] = [1, 2, 4, 8, 16];

pub struct StatusPublisher {
    gateway_id: String,
    gateway_model: String,
    gateway_version: String,
    sink_manager: Arc<SinkManager>,
    codec: Arc<dyn Codec>,
    queue: Arc<OutboundQueue>,
    online: AtomicBool,
    notify: Notify,
    last_published: RwLock<Option<GatewayStatus>>,
}

impl StatusPublisher {
    pub fn new(
        gateway_id: impl Into<String>,
        gateway_model: impl Into<String>,
        gateway_version: impl Into<String>,
        sink_manager: Arc<SinkManager>,
        codec: Arc<dyn Codec>,
        queue: Arc<OutboundQueue>,
    ) -> Arc<Self> {
        Arc::new(Self {
            gateway_id: gateway_id.into(),
            gateway_model: gateway_model.into(),
            gateway_version: gateway_version.into(),
            sink_manager,
            codec,
            queue,
            online: AtomicBool::new(false),
            notify: Notify::new(),
            last_published: RwLock::new(None),
        })
    }

    /// Nudges the publisher (§4.7 "also nudges the `StatusPublisher`").
    /// Debounced: the actual rebuild happens `AGGREGATE_DELAY` after the
    /// first nudge of a burst.
    pub fn update(&self) {
        self.notify.notify_one();
    }

    /// Tracks the MQTT connection state carried in the status document's
    /// `online` field.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
        self.update();
    }

    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run().await })
    }

    async fn run(self: Arc<Self>) {
        let mut backup = tokio::time::interval(BACKUP_DELAY);
        backup.tick().await; // first tick fires immediately; skip it.
        loop {
            tokio::select! {
                _ = self.notify.notified() => {
                    tokio::time::sleep(AGGREGATE_DELAY).await;
                    self.publish_if_changed().await;
                }
                _ = backup.tick() => {
                    self.publish_forced().await;
                }
            }
        }
    }

    async fn build_status(&self) -> (GatewayStatus, bool) {
        let mut sinks = std::collections::BTreeMap::new();
        let mut partial = false;
        for sink in self.sink_manager.get_sinks() {
            let (config, sink_partial) = sink.read_config().await;
            partial |= sink_partial;
            sinks.insert(sink.identity().name().to_string(), config);
        }
        let status = GatewayStatus {
            gateway_id: self.gateway_id.clone(),
            gateway_model: self.gateway_model.clone(),
            gateway_version: self.gateway_version.clone(),
            online: self.online.load(Ordering::SeqCst),
            sinks,
        };
        (status, partial)
    }

    /// Rebuilds the status document, retrying while any sink read is
    /// partial (§4.8). Publishes the partial document anyway after the
    /// retry budget is exhausted.
    async fn build_status_with_retry(&self) -> GatewayStatus {
        let (mut status, mut partial) = self.build_status().await;
        for delay_s in PARTIAL_RETRY_DELAYS_S {
            if !partial {
                return status;
            }
            tokio::time::sleep(Duration::from_secs(delay_s)).await;
            let (next_status, next_partial) = self.build_status().await;
            status = next_status;
            partial = next_partial;
        }
        if partial {
            error!(gateway_id = %self.gateway_id, "status still partial after retry budget, publishing anyway");
        }
        status
    }

    async fn publish_if_changed(&self) {
        let status = self.build_status_with_retry().await;
        let previous = self.last_published.read().clone();
        if previous.as_ref() == Some(&status) {
            return;
        }
        self.publish(status, previous);
    }

    /// Backup emission (§4.8): bypasses the suppression check entirely.
    async fn publish_forced(&self) {
        let status = self.build_status_with_retry().await;
        let previous = self.last_published.read().clone();
        self.publish(status, previous);
    }

    fn publish(&self, status: GatewayStatus, previous: Option<GatewayStatus>) {
        self.publish_compat(&status, previous.as_ref());
        let (topic, payload) = self.codec.encode_status(&status);
        self.queue.push(OutboundItem {
            topic,
            payload,
            qos: QoS::AtLeastOnce,
            retain: true,
        });
        *self.last_published.write() = Some(status);
    }

    /// Compatibility side-channel (§4.8): a `get_configs` echo plus, per
    /// sink whose configuration actually changed, a `set_config` echo. Both
    /// carry `req_id = 0`. On the very first publish every sink counts as
    /// changed, since there is no previous document to diff against.
    fn publish_compat(&self, status: &GatewayStatus, previous: Option<&GatewayStatus>) {
        self.enqueue_response(&GatewayResponse::Configs {
            req_id: 0,
            res: GatewayResultCode::Ok,
            sinks: status.sinks.clone(),
        });

        let changed: Vec<&str> = match previous {
            Some(previous) => status.changed_sinks(previous),
            None => status.sinks.keys().map(String::as_str).collect(),
        };
        for sink_id in changed {
            if let Some(config) = status.sinks.get(sink_id) {
                self.enqueue_response(&GatewayResponse::SetConfig {
                    req_id: 0,
                    res: GatewayResultCode::Ok,
                    sink_id: sink_id.to_string(),
                    config: config.clone(),
                });
            }
        }
    }

    fn enqueue_response(&self, response: &GatewayResponse) {
        let (topic, payload) = self.codec.encode_response(&self.gateway_id, response);
        self.queue.push(OutboundItem {
            topic,
            payload,
            qos: QoS::ExactlyOnce,
            retain: false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshgw_codec::JsonCodec;
    use meshgw_sinkbus::InMemorySinkBus;

    fn test_publisher() -> (Arc<StatusPublisher>, Arc<InMemorySinkBus>, Arc<OutboundQueue>) {
        let bus = Arc::new(InMemorySinkBus::new());
        let sink_manager = SinkManager::new(bus.clone());
        let queue = Arc::new(OutboundQueue::new());
        let publisher = StatusPublisher::new(
            "gw-1",
            "model",
            "1.0",
            sink_manager,
            Arc::new(JsonCodec::new()),
            queue.clone(),
        );
        (publisher, bus, queue)
    }

    #[tokio::test]
    async fn first_publish_emits_status_and_compat_echoes_for_every_sink() {
        let (publisher, bus, queue) = test_publisher();
        bus.insert_sink("sink0", "owner-1");
        publisher.publish_if_changed().await;

        let mut topics = Vec::new();
        while let Some(item) = queue.pop() {
            topics.push(item.topic);
        }
        assert!(topics.contains(&"gw-event/status/gw-1".to_string()));
        assert!(topics.contains(&"gw-response/get_configs/gw-1".to_string()));
        assert!(topics.contains(&"gw-response/set_config/gw-1/sink0".to_string()));
    }

    #[tokio::test]
    async fn unchanged_status_is_suppressed_on_the_second_call() {
        let (publisher, bus, queue) = test_publisher();
        bus.insert_sink("sink0", "owner-1");
        publisher.publish_if_changed().await;
        while queue.pop().is_some() {}

        publisher.publish_if_changed().await;
        assert!(queue.pop().is_none());
    }

    #[tokio::test]
    async fn backup_emission_republishes_even_without_changes() {
        let (publisher, bus, queue) = test_publisher();
        bus.insert_sink("sink0", "owner-1");
        publisher.publish_if_changed().await;
        while queue.pop().is_some() {}

        publisher.publish_forced().await;
        assert!(queue.pop().is_some());
    }
}
