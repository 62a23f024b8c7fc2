//! Top-level composition (§9 "Global state... replaced by per-component
//! lifecycles owned by the top-level Gateway, which exposes start()/stop()").
//!
//! `Gateway` owns every long-lived component and the order they must be
//! built in: the sink registry and message cache exist before anything that
//! reads them, the outbound queue exists before anything that writes to it,
//! and the transport is built last since it is the one component whose
//! constructor takes callbacks closing over everything else.

use std::sync::Arc;
use std::time::Duration;

use meshgw_blackhole::{BlackHoleConfig, BlackHoleMonitor};
use meshgw_broadcast::{
    KeepAliveBroadcaster, KeepAliveBroadcasterConfig, RtcBroadcaster, RtcBroadcasterConfig, RtcClockSource,
};
use meshgw_codec::{Codec, JsonCodec};
use meshgw_core::event::EventIdGenerator;
use meshgw_core::GatewayStatus;
use meshgw_dispatcher::{Dispatcher, GatewayIdentity};
use meshgw_sinkbus::SinkBus;
use meshgw_switch::{MessageCache, SinkManager};
use meshgw_transport_mqtt::{MqttTransport, OutboundQueue};

use crate::config::GatewayConfig;
use crate::uplink::UplinkForwarder;

/// `window`/`period` for the at-most-once request cache (§4.5). Not named in
/// the configuration surface, so fixed here rather than exposed as a knob.
const MESSAGE_CACHE_WINDOW: Duration = Duration::from_secs(60);
const MESSAGE_CACHE_SWEEP_PERIOD: Duration = Duration::from_secs(30);

const RTC_PERIOD: Duration = Duration::from_secs(3600);
const RTC_RETRY_PERIOD: Duration = Duration::from_secs(60);
const KEEP_ALIVE_PERIOD: Duration = Duration::from_secs(180);

/// Every background task a running gateway owns, for an orderly shutdown.
pub struct GatewayHandles {
    pub status: tokio::task::JoinHandle<()>,
    pub blackhole: tokio::task::JoinHandle<()>,
    pub rtc: tokio::task::JoinHandle<()>,
    pub keep_alive: tokio::task::JoinHandle<()>,
    pub message_cache_sweeper: tokio::task::JoinHandle<()>,
}

impl GatewayHandles {
    pub fn abort_all(&self) {
        self.status.abort();
        self.blackhole.abort();
        self.rtc.abort();
        self.keep_alive.abort();
        self.message_cache_sweeper.abort();
    }
}

/// Builds every component except the transport itself and returns it ready
/// to run, alongside the handles of every background task already spawned.
///
/// `bus` is the only thing this crate does not construct: the real system
/// bus binding is an external collaborator (§1), so the caller supplies
/// whatever [`SinkBus`] implementation fits its deployment.
pub fn build(config: &GatewayConfig, bus: Arc<dyn SinkBus>) -> Result<(MqttTransport, GatewayHandles), crate::config::ConfigError> {
    let filters = config.endpoint_filters()?;

    let sink_manager = SinkManager::new(bus.clone());
    let message_cache = MessageCache::new(MESSAGE_CACHE_WINDOW);
    let message_cache_sweeper = message_cache.spawn_cleaner(MESSAGE_CACHE_SWEEP_PERIOD);

    let codec: Arc<dyn Codec> = Arc::new(JsonCodec::new());
    let event_ids = if config.debug.incr_data_event_id {
        EventIdGenerator::monotonic()
    } else {
        EventIdGenerator::random()
    };

    let offline_status = GatewayStatus::offline(
        &config.gateway.gateway_id,
        &config.gateway.gateway_model,
        &config.gateway.gateway_version,
    );
    let (_topic, offline_status_payload) = codec.encode_status(&offline_status);

    let queue = Arc::new(OutboundQueue::new());

    let identity = GatewayIdentity {
        gateway_id: config.gateway.gateway_id.clone(),
        gateway_model: config.gateway.gateway_model.clone(),
        gateway_version: config.gateway.gateway_version.clone(),
        implemented_api_version: "v1".to_string(),
    };

    let status = meshgw_status::StatusPublisher::new(
        config.gateway.gateway_id.clone(),
        config.gateway.gateway_model.clone(),
        config.gateway.gateway_version.clone(),
        sink_manager.clone(),
        codec.clone(),
        queue.clone(),
    );
    let status_for_nudge = status.clone();
    let status_nudge: meshgw_dispatcher::StatusNudge = Arc::new(move || status_for_nudge.update());

    let dispatcher = Dispatcher::new(
        identity,
        codec.clone(),
        sink_manager.clone(),
        queue.clone(),
        status_nudge,
        meshgw_dispatcher::dispatcher::DEFAULT_WORKER_POOL_SIZE,
    );

    let blackhole = BlackHoleMonitor::new(
        BlackHoleConfig {
            max_buffered_packets: config.buffering.max_buffered_packets,
            max_delay_without_publish_s: config.buffering.max_delay_without_publish,
            minimum_sink_cost: config.buffering.minimum_sink_cost,
            stop_stack: config.buffering.stop_stack,
        },
        bus.clone(),
        sink_manager.clone(),
        queue.clone(),
    );

    let rtc = RtcBroadcaster::new(
        RtcBroadcasterConfig {
            period: RTC_PERIOD,
            retry_period: RTC_RETRY_PERIOD,
            clock_source: RtcClockSource::Local,
            timezone_offset_s: 0,
        },
        sink_manager.clone(),
    );

    let keep_alive = KeepAliveBroadcaster::new(
        KeepAliveBroadcasterConfig {
            period: KEEP_ALIVE_PERIOD,
            interval_s: KEEP_ALIVE_PERIOD.as_secs() as u16,
            timezone_offset_mn: 0,
            clock_source: RtcClockSource::Local,
            burst_on_reconnect: config.gateway.keep_alive_burst_on_reconnect,
        },
        sink_manager.clone(),
    );

    let uplink_forwarder = UplinkForwarder::new(
        config.gateway.gateway_id.clone(),
        sink_manager.clone(),
        filters,
        event_ids,
        codec.clone(),
        queue.clone(),
    );
    bus.subscribe_uplink(uplink_forwarder as Arc<dyn meshgw_sinkbus::UplinkListener>);

    let keep_alive_for_connect = keep_alive.clone();
    let status_for_connect = status.clone();
    let connected_handler: meshgw_transport_mqtt::ConnectedHandler = Arc::new(move || {
        status_for_connect.set_online(true);
        keep_alive_for_connect.set_mqtt_connected(true);
    });

    let transport = MqttTransport::new(
        config.mqtt_transport_config(),
        offline_status_payload,
        queue.clone(),
        dispatcher.inbound_handler(),
        connected_handler,
    );

    let handles = GatewayHandles {
        status: status.spawn(),
        blackhole: blackhole.spawn(),
        rtc: rtc.spawn(),
        keep_alive: keep_alive.spawn(),
        message_cache_sweeper,
    };

    Ok((transport, handles))
}
