//! The single-threaded MQTT worker (§4.6).
//!
//! One task owns the `rumqttc` event loop and the outbound queue. Everyone
//! else only ever calls [`MqttTransport::enqueue`] — actual socket I/O,
//! reconnect/backoff, rate limiting, and in-flight accounting all happen
//! inside [`MqttTransport::run`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet, QoS, Transport};
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::config::MqttTransportConfig;
use crate::error::TransportError;
use crate::queue::{OutboundItem, OutboundQueue};

/// Called once per inbound `Publish` packet. Implementations are expected
/// to return immediately — the dispatcher is responsible for spawning its
/// own short-lived task per request (§4.7) so this worker is never blocked
/// on downstream I/O.
pub type InboundHandler = Arc<dyn Fn(String, Vec<u8>) + Send + Sync>;

/// Called once per successful `ConnAck`, after resubscription. Used to
/// nudge the status publisher to republish (§4.6 "the status publisher is
/// nudged to republish").
pub type ConnectedHandler = Arc<dyn Fn() + Send + Sync>;

/// Per-attempt delay is drawn uniformly from `[MIN_BACKOFF << k, MIN_BACKOFF << (k+1))`,
/// `k` capped at 5 (§9).
const MIN_BACKOFF: Duration = Duration::from_secs(1);
const KEEPALIVE_SLICE: Duration = Duration::from_secs(1);

fn subscription_topics(gateway_id: &str) -> [(String, QoS); 8] {
    let q = QoS::ExactlyOnce;
    [
        (format!("gw-request/get_gw_info/{gateway_id}"), q),
        (format!("gw-request/get_configs/{gateway_id}"), q),
        (format!("gw-request/set_config/{gateway_id}/+"), q),
        (format!("gw-request/send_data/{gateway_id}/+"), q),
        (format!("gw-request/otap_status/{gateway_id}/+"), q),
        (format!("gw-request/otap_load_scratchpad/{gateway_id}/+"), q),
        (format!("gw-request/otap_process_scratchpad/{gateway_id}/+"), q),
        (format!("gw-request/otap_set_target_scratchpad/{gateway_id}/+"), q),
    ]
}

fn build_mqtt_options(config: &MqttTransportConfig, offline_status_payload: Vec<u8>) -> MqttOptions {
    let client_id = format!("meshgw-{}", config.gateway_id);
    let mut options = MqttOptions::new(client_id, config.hostname.clone(), config.port);
    options.set_keep_alive(config.keep_alive);
    options.set_clean_session(!config.persist_session);
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        options.set_credentials(username.clone(), password.clone());
    }
    options.set_last_will(LastWill::new(
        format!("gw-event/status/{}", config.gateway_id),
        offline_status_payload,
        QoS::AtLeastOnce,
        true,
    ));
    if !config.force_unsecure {
        if let Some(transport) = build_tls_transport(config) {
            options.set_transport(transport);
        }
    }
    options
}

/// Best-effort TLS transport from raw CA/cert/key bytes (§8.1). Parsing and
/// validating those bytes is delegated entirely to `rustls`/`rumqttc` — this
/// crate does not implement certificate handling itself (§1).
fn build_tls_transport(config: &MqttTransportConfig) -> Option<Transport> {
    let ca = std::fs::read(config.tls.ca_certs.as_ref()?).ok()?;
    let client_auth = match (&config.tls.certfile, &config.tls.keyfile) {
        (Some(cert_path), Some(key_path)) => {
            let cert = std::fs::read(cert_path).ok()?;
            let key = std::fs::read(key_path).ok()?;
            Some((cert, rumqttc::Key::RSA(key)))
        }
        _ => None,
    };
    Some(Transport::tls(ca, client_auth, None))
}

/// Per-second sliding window used to enforce `rate_limit_pps` (§4.6).
struct RateLimiter {
    limit: u32,
    sent_in_window: VecDeque<Instant>,
}

impl RateLimiter {
    fn new(limit: u32) -> Self {
        Self {
            limit,
            sent_in_window: VecDeque::new(),
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&front) = self.sent_in_window.front() {
            if now.duration_since(front) >= Duration::from_secs(1) {
                self.sent_in_window.pop_front();
            } else {
                break;
            }
        }
    }

    /// `true` if a send is allowed right now; if so, records it.
    fn try_acquire(&mut self) -> bool {
        if self.limit == 0 {
            return true;
        }
        let now = Instant::now();
        self.prune(now);
        if self.sent_in_window.len() >= self.limit as usize {
            return false;
        }
        self.sent_in_window.push_back(now);
        true
    }
}

pub struct MqttTransport {
    config: MqttTransportConfig,
    client: AsyncClient,
    eventloop: EventLoop,
    queue: Arc<OutboundQueue>,
    in_flight: AtomicUsize,
    rate_limiter: RateLimiter,
    inbound_handler: InboundHandler,
    connected_handler: ConnectedHandler,
}

impl MqttTransport {
    /// `queue` is accepted rather than created internally so that
    /// components built before the transport (the dispatcher, status
    /// publisher, black-hole monitor, broadcasters) can share the very
    /// queue this worker drains, instead of each needing the transport to
    /// exist first.
    pub fn new(
        config: MqttTransportConfig,
        offline_status_payload: Vec<u8>,
        queue: Arc<OutboundQueue>,
        inbound_handler: InboundHandler,
        connected_handler: ConnectedHandler,
    ) -> Self {
        let options = build_mqtt_options(&config, offline_status_payload);
        let (client, eventloop) = AsyncClient::new(options, 64);
        let rate_limiter = RateLimiter::new(config.rate_limit_pps);
        Self {
            config,
            client,
            eventloop,
            queue,
            in_flight: AtomicUsize::new(0),
            rate_limiter,
            inbound_handler,
            connected_handler,
        }
    }

    pub fn queue_handle(&self) -> Arc<OutboundQueue> {
        Arc::clone(&self.queue)
    }

    pub fn enqueue(&self, item: OutboundItem) {
        self.queue.push(item);
    }

    /// Inputs to the black-hole detector (§4.6, §4.9).
    pub fn queue_size(&self) -> usize {
        self.queue.len()
    }

    pub fn waiting_time_s(&self) -> f64 {
        self.queue.waiting_time_s()
    }

    /// Runs until a fatal error, per §4.6 "any unexpected exception in the
    /// worker is fatal to the transport". The caller (the gateway binary)
    /// treats a returned `Err` as a signal to tear the whole process down.
    pub async fn run(mut self) -> Result<(), TransportError> {
        let mut reconnect_attempts: u32 = 0;
        let mut failing_since: Option<Instant> = None;
        let mut slice = interval(KEEPALIVE_SLICE);

        loop {
            tokio::select! {
                event = self.eventloop.poll() => {
                    match event {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            reconnect_attempts = 0;
                            failing_since = None;
                            self.resubscribe().await?;
                            (self.connected_handler)();
                        }
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            (self.inbound_handler)(publish.topic, publish.payload.to_vec());
                        }
                        Ok(Event::Incoming(Packet::PubAck(_) | Packet::PubComp(_))) => {
                            self.in_flight.fetch_sub(1, Ordering::AcqRel);
                            self.drain_queue().await?;
                        }
                        Ok(Event::Outgoing(Outgoing::PingReq)) | Ok(_) => {}
                        Err(err) => {
                            warn!(error = %err, "mqtt connection error, entering reconnect backoff");
                            let since = *failing_since.get_or_insert_with(Instant::now);
                            if let Some(budget) = self.config.reconnect_budget() {
                                if since.elapsed() >= budget {
                                    return Err(TransportError::ReconnectBudgetExceeded {
                                        budget_s: self.config.reconnect_delay_s,
                                        attempts: reconnect_attempts,
                                    });
                                }
                            }
                            self.sleep_backoff(reconnect_attempts).await;
                            reconnect_attempts += 1;
                        }
                    }
                }
                _ = self.queue.notified() => {
                    self.drain_queue().await?;
                }
                _ = slice.tick() => {
                    // Reopens rate-limited sends and retries anything left
                    // behind by a full in-flight ceiling.
                    self.drain_queue().await?;
                }
            }
        }
    }

    async fn resubscribe(&self) -> Result<(), TransportError> {
        for (topic, qos) in subscription_topics(&self.config.gateway_id) {
            self.client.subscribe(topic, qos).await?;
        }
        info!(gateway_id = %self.config.gateway_id, "resubscribed after connect");
        Ok(())
    }

    async fn sleep_backoff(&self, attempt: u32) {
        let base = MIN_BACKOFF * (1u32 << attempt.min(5));
        let base_ms = base.as_millis() as u64;
        let delay_ms = rand::thread_rng().gen_range(base_ms..base_ms * 2);
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    async fn drain_queue(&mut self) -> Result<(), TransportError> {
        loop {
            if let Some(ceiling) = self.inflight_ceiling() {
                if self.in_flight.load(Ordering::Acquire) >= ceiling {
                    return Ok(());
                }
            }
            if !self.rate_limiter.try_acquire() {
                return Ok(());
            }
            let Some(item) = self.queue.pop() else {
                return Ok(());
            };
            let OutboundItem {
                topic,
                payload,
                qos,
                retain,
            } = item;
            if qos != QoS::AtMostOnce {
                self.in_flight.fetch_add(1, Ordering::AcqRel);
            }
            self.client.publish(topic, qos, retain, payload).await?;
        }
    }

    fn inflight_ceiling(&self) -> Option<usize> {
        if self.config.max_inflight_messages == 0 {
            None
        } else {
            Some(self.config.max_inflight_messages as usize)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limiter_allows_up_to_the_configured_ceiling() {
        let mut limiter = RateLimiter::new(2);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn rate_limiter_with_zero_limit_never_blocks() {
        let mut limiter = RateLimiter::new(0);
        for _ in 0..100 {
            assert!(limiter.try_acquire());
        }
    }

    #[test]
    fn subscription_topics_cover_every_request_kind() {
        let topics = subscription_topics("gw-1");
        assert_eq!(topics.len(), 8);
        assert!(topics.iter().any(|(t, _)| t == "gw-request/get_gw_info/gw-1"));
        assert!(topics.iter().any(|(t, _)| t == "gw-request/send_data/gw-1/+"));
    }
}
