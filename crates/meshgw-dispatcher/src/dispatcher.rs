//! Request routing (§4.7): decode, per-operation execution on a bounded
//! worker pool, and exactly-one response per request.
//!
//! Grounded on the teacher's dispatch-then-spawn shape used throughout
//! `spark-switch::applications` (accept on the listener task, hand the
//! actual work to a freshly spawned task, never block the accept loop) —
//! here the "listener" is [`meshgw_transport_mqtt::MqttTransport`]'s inbound
//! callback, and every request but `get_gw_info` gets its own task, gated by
//! a `Semaphore` sized to `worker_pool_size` rather than an unbounded spawn.
//! `MessageCache` is deliberately not consulted here: it is wired up as
//! available infrastructure, not mandatory dispatch dedup.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use meshgw_codec::{Codec, GatewayRequest, GatewayResponse, TargetScratchpadRequest};
use meshgw_core::scratchpad::TargetParam;
use meshgw_core::{ScratchpadStatus, SinkConfiguration, TargetScratchpad};
use meshgw_sinkbus::OutboundMessage;
use meshgw_switch::SinkManager;
use meshgw_transport_mqtt::{InboundHandler, OutboundItem, OutboundQueue};
use rumqttc::QoS;
use tokio::sync::Semaphore;
use tracing::warn;

/// Default size of the deferred-handler worker pool (§9 "small").
pub const DEFAULT_WORKER_POOL_SIZE: usize = 4;

/// Invoked after any operation that can change a sink's reported
/// configuration or scratchpad state (§4.6, §4.7 "nudges the status
/// publisher"). The status publisher owns its own debouncing; this is
/// just a wake-up.
pub type StatusNudge = Arc<dyn Fn() + Send + Sync>;

/// Static gateway identity echoed by `get_gw_info` (§4.7).
pub struct GatewayIdentity {
    pub gateway_id: String,
    pub gateway_model: String,
    pub gateway_version: String,
    pub implemented_api_version: String,
}

pub struct Dispatcher {
    identity: GatewayIdentity,
    codec: Arc<dyn Codec>,
    sink_manager: Arc<SinkManager>,
    queue: Arc<OutboundQueue>,
    status_nudge: StatusNudge,
    worker_pool: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(
        identity: GatewayIdentity,
        codec: Arc<dyn Codec>,
        sink_manager: Arc<SinkManager>,
        queue: Arc<OutboundQueue>,
        status_nudge: StatusNudge,
        worker_pool_size: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            identity,
            codec,
            sink_manager,
            queue,
            status_nudge,
            worker_pool: Arc::new(Semaphore::new(worker_pool_size)),
        })
    }

    /// The callback handed to [`meshgw_transport_mqtt::MqttTransport::new`].
    /// Decoding happens inline (cheap, no I/O); anything beyond
    /// `get_gw_info` is handed to its own task, behind a worker-pool permit,
    /// so the transport worker is never blocked on a sink/bus round-trip
    /// (§4.7).
    pub fn inbound_handler(self: &Arc<Self>) -> InboundHandler {
        let this = Arc::clone(self);
        Arc::new(move |topic: String, payload: Vec<u8>| {
            let this = Arc::clone(&this);
            this.route(topic, payload);
        })
    }

    fn route(self: Arc<Self>, topic: String, payload: Vec<u8>) {
        let request = match self.codec.decode_request(&topic, &payload) {
            Ok(request) => request,
            Err(err) => {
                warn!(%topic, error = %err, "dropping request: decode failed");
                return;
            }
        };

        match request {
            GatewayRequest::GetGwInfo { req_id } => self.respond_gw_info(req_id),
            other => {
                let pool = Arc::clone(&self.worker_pool);
                tokio::spawn(async move {
                    let _permit = pool.acquire_owned().await.expect("worker pool semaphore never closes");
                    self.dispatch(other).await;
                });
            }
        }
    }

    fn respond_gw_info(&self, req_id: u64) {
        let current_time_s_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.publish(&GatewayResponse::GwInfo {
            req_id,
            current_time_s_epoch,
            gateway_model: self.identity.gateway_model.clone(),
            gateway_version: self.identity.gateway_version.clone(),
            implemented_api_version: self.identity.implemented_api_version.clone(),
        });
    }

    async fn dispatch(&self, request: GatewayRequest) {
        let response = match request {
            GatewayRequest::GetGwInfo { .. } => unreachable!("handled inline in route()"),
            GatewayRequest::GetConfigs { req_id } => self.get_configs(req_id).await,
            GatewayRequest::SetConfig { req_id, sink_id, config } => {
                self.set_config(req_id, sink_id, config).await
            }
            GatewayRequest::SendData {
                req_id,
                sink_id,
                dst,
                src_ep,
                dst_ep,
                qos,
                initial_delay_ms,
                unack_csma,
                hop_limit,
                payload,
            } => {
                self.send_data(
                    req_id,
                    sink_id,
                    OutboundMessage {
                        dst,
                        src_ep,
                        dst_ep,
                        qos,
                        initial_delay_ms,
                        unack_csma,
                        hop_limit,
                        payload,
                    },
                )
                .await
            }
            GatewayRequest::OtapStatus { req_id, sink_id } => self.otap_status(req_id, sink_id).await,
            GatewayRequest::OtapLoadScratchpad { req_id, sink_id, seq, blob } => {
                self.otap_load_scratchpad(req_id, sink_id, seq, blob).await
            }
            GatewayRequest::OtapProcessScratchpad { req_id, sink_id } => {
                self.otap_process_scratchpad(req_id, sink_id).await
            }
            GatewayRequest::OtapSetTargetScratchpad { req_id, sink_id, target } => {
                self.otap_set_target_scratchpad(req_id, sink_id, target).await
            }
        };
        self.publish(&response);
    }

    async fn get_configs(&self, req_id: u64) -> GatewayResponse {
        let mut sinks = std::collections::BTreeMap::new();
        for sink in self.sink_manager.get_sinks() {
            let (config, _partial) = sink.read_config().await;
            sinks.insert(sink.identity().name().to_string(), config);
        }
        GatewayResponse::Configs {
            req_id,
            res: meshgw_core::GatewayResultCode::Ok,
            sinks,
        }
    }

    async fn set_config(&self, req_id: u64, sink_id: String, config: SinkConfiguration) -> GatewayResponse {
        let Some(sink) = self.sink_manager.get(&sink_id) else {
            return GatewayResponse::SetConfig {
                req_id,
                res: meshgw_core::GatewayResultCode::InvalidSinkId,
                sink_id,
                config: SinkConfiguration::empty(),
            };
        };
        let res = sink.write_config(&config).await;
        let (current, _partial) = sink.read_config().await;
        (self.status_nudge)();
        GatewayResponse::SetConfig {
            req_id,
            res,
            sink_id,
            config: current,
        }
    }

    async fn send_data(&self, req_id: u64, sink_id: String, message: OutboundMessage) -> GatewayResponse {
        let Some(sink) = self.sink_manager.get(&sink_id) else {
            return GatewayResponse::SendData {
                req_id,
                res: meshgw_core::GatewayResultCode::InvalidSinkId,
                sink_id,
            };
        };
        let res = sink.send(message).await;
        GatewayResponse::SendData { req_id, res, sink_id }
    }

    async fn otap_status(&self, req_id: u64, sink_id: String) -> GatewayResponse {
        let Some(sink) = self.sink_manager.get(&sink_id) else {
            return GatewayResponse::OtapStatus {
                req_id,
                res: meshgw_core::GatewayResultCode::InvalidSinkId,
                sink_id,
                status: None,
            };
        };
        match sink.scratchpad_status().await {
            Ok(status) => self.otap_status_response(req_id, sink_id, status),
            Err(res) => GatewayResponse::OtapStatus { req_id, res, sink_id, status: None },
        }
    }

    fn otap_status_response(&self, req_id: u64, sink_id: String, status: ScratchpadStatus) -> GatewayResponse {
        GatewayResponse::OtapStatus {
            req_id,
            res: meshgw_core::GatewayResultCode::Ok,
            sink_id,
            status: Some(status),
        }
    }

    async fn otap_load_scratchpad(&self, req_id: u64, sink_id: String, seq: u8, blob: Vec<u8>) -> GatewayResponse {
        let Some(sink) = self.sink_manager.get(&sink_id) else {
            return GatewayResponse::OtapLoadScratchpad {
                req_id,
                res: meshgw_core::GatewayResultCode::InvalidSinkId,
                sink_id,
            };
        };
        let res = sink.scratchpad_upload(seq, blob).await;
        (self.status_nudge)();
        GatewayResponse::OtapLoadScratchpad { req_id, res, sink_id }
    }

    async fn otap_process_scratchpad(&self, req_id: u64, sink_id: String) -> GatewayResponse {
        let Some(sink) = self.sink_manager.get(&sink_id) else {
            return GatewayResponse::OtapProcessScratchpad {
                req_id,
                res: meshgw_core::GatewayResultCode::InvalidSinkId,
                sink_id,
            };
        };
        let res = sink.scratchpad_process().await;
        (self.status_nudge)();
        GatewayResponse::OtapProcessScratchpad { req_id, res, sink_id }
    }

    async fn otap_set_target_scratchpad(
        &self,
        req_id: u64,
        sink_id: String,
        target: TargetScratchpadRequest,
    ) -> GatewayResponse {
        let Some(sink) = self.sink_manager.get(&sink_id) else {
            return GatewayResponse::OtapSetTargetScratchpad {
                req_id,
                res: meshgw_core::GatewayResultCode::InvalidSinkId,
                sink_id,
            };
        };
        let res = sink
            .scratchpad_set_target(TargetScratchpad {
                action: target.action,
                target_sequence: target.target_sequence,
                target_crc: target.target_crc,
                param: match (target.delay, target.param) {
                    (Some(delay), _) => TargetParam::QuantizedDelay(delay),
                    (None, Some(param)) => TargetParam::Param(param),
                    (None, None) => TargetParam::Param(0),
                },
            })
            .await;
        (self.status_nudge)();
        GatewayResponse::OtapSetTargetScratchpad { req_id, res, sink_id }
    }

    fn publish(&self, response: &GatewayResponse) {
        let (topic, payload) = self.codec.encode_response(&self.identity.gateway_id, response);
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
    use meshgw_transport_mqtt::OutboundQueue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn test_dispatcher() -> (Arc<Dispatcher>, Arc<InMemorySinkBus>, Arc<OutboundQueue>, Arc<AtomicUsize>) {
        let bus = Arc::new(InMemorySinkBus::new());
        let sink_manager = SinkManager::new(bus.clone());
        let queue = Arc::new(OutboundQueue::new());
        let nudges = Arc::new(AtomicUsize::new(0));
        let nudges_clone = nudges.clone();
        let dispatcher = Dispatcher::new(
            GatewayIdentity {
                gateway_id: "gw-1".to_string(),
                gateway_model: "model".to_string(),
                gateway_version: "1.0".to_string(),
                implemented_api_version: "v1".to_string(),
            },
            Arc::new(JsonCodec::new()),
            sink_manager,
            queue.clone(),
            Arc::new(move || {
                nudges_clone.fetch_add(1, Ordering::SeqCst);
            }),
            DEFAULT_WORKER_POOL_SIZE,
        );
        (dispatcher, bus, queue, nudges)
    }

    #[tokio::test]
    async fn get_gw_info_answers_inline_without_spawning() {
        let (dispatcher, _bus, queue, _nudges) = test_dispatcher();
        let handler = dispatcher.inbound_handler();
        handler("gw-request/get_gw_info/gw-1".to_string(), br#"{"req_id":7}"#.to_vec());
        let item = queue.pop().expect("response enqueued");
        assert_eq!(item.topic, "gw-response/get_gw_info/gw-1");
    }

    #[tokio::test]
    async fn set_config_on_unknown_sink_returns_invalid_sink_id() {
        let (dispatcher, _bus, _queue, _nudges) = test_dispatcher();
        let response = dispatcher
            .set_config(1, "ghost".to_string(), SinkConfiguration::empty())
            .await;
        match response {
            GatewayResponse::SetConfig { res, .. } => {
                assert_eq!(res, meshgw_core::GatewayResultCode::InvalidSinkId)
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn set_config_on_known_sink_nudges_status() {
        let (dispatcher, bus, _queue, nudges) = test_dispatcher();
        bus.insert_sink("sink0", "owner-1");
        let response = dispatcher
            .set_config(1, "sink0".to_string(), SinkConfiguration::empty())
            .await;
        match response {
            GatewayResponse::SetConfig { res, .. } => assert_eq!(res, meshgw_core::GatewayResultCode::Ok),
            other => panic!("unexpected response: {other:?}"),
        }
        assert_eq!(nudges.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn two_send_data_requests_each_produce_their_own_response() {
        let (dispatcher, bus, queue, _nudges) = test_dispatcher();
        bus.insert_sink("sink0", "owner-1");
        let handler = dispatcher.inbound_handler();
        let first = br#"{"req_id":5,"dst":1,"src_ep":1,"dst_ep":1,"qos":0,"hop_limit":1,"payload":[]}"#.to_vec();
        let second = br#"{"req_id":6,"dst":1,"src_ep":1,"dst_ep":1,"qos":0,"hop_limit":1,"payload":[]}"#.to_vec();
        handler("gw-request/send_data/gw-1/sink0".to_string(), first);
        handler("gw-request/send_data/gw-1/sink0".to_string(), second);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(queue.len(), 2);
    }
}
