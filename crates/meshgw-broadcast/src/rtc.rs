//! RTC time broadcaster (§4.10): every `period`, push the current time as a
//! TLV payload to endpoints (78,79) on every sink.
//!
//! Grounded on [`meshgw_switch::MessageCache`]'s `spawn_cleaner` shape (own
//! `Arc<Self>`, loop on the current runtime) generalized with the
//! send-phase period compensation and no-sinks/sourcing-failure retry
//! period called out in §4.10 and §9.

use std::sync::Arc;
use std::time::{Duration, Instant};

use meshgw_sinkbus::OutboundMessage;
use meshgw_switch::SinkManager;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::clock::{now_ms, RtcClockSource};
use crate::error::BroadcastError;
use crate::tlv::encode_rtc_payload;

const RTC_VERSION: u16 = 1;
const RTC_SRC_EP: u8 = 78;
const RTC_DST_EP: u8 = 79;
const BROADCAST_DST: u32 = 0xFFFF_FFFF;

pub struct RtcBroadcasterConfig {
    pub period: Duration,
    pub retry_period: Duration,
    pub clock_source: RtcClockSource,
    pub timezone_offset_s: i32,
}

pub struct RtcBroadcaster {
    config: RtcBroadcasterConfig,
    sink_manager: Arc<SinkManager>,
}

impl RtcBroadcaster {
    pub fn new(config: RtcBroadcasterConfig, sink_manager: Arc<SinkManager>) -> Arc<Self> {
        Arc::new(Self { config, sink_manager })
    }

    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run().await })
    }

    async fn run(self: Arc<Self>) {
        loop {
            let started = Instant::now();
            let sleep_for = match self.broadcast_once().await {
                Ok(()) => self.config.period,
                Err(reason) => {
                    warn!(error = %reason, "rtc broadcast skipped, retrying after the short period");
                    self.config.retry_period
                }
            };
            let elapsed = started.elapsed();
            tokio::time::sleep(sleep_for.saturating_sub(elapsed)).await;
        }
    }

    async fn broadcast_once(&self) -> Result<(), BroadcastError> {
        let sinks = self.sink_manager.get_sinks();
        if sinks.is_empty() {
            return Err(BroadcastError::NoSinks);
        }
        let timestamp_ms = now_ms(&self.config.clock_source).await?;
        let payload = encode_rtc_payload(RTC_VERSION, timestamp_ms, self.config.timezone_offset_s);
        for sink in sinks {
            sink.send(OutboundMessage {
                dst: BROADCAST_DST,
                src_ep: RTC_SRC_EP,
                dst_ep: RTC_DST_EP,
                qos: 0,
                initial_delay_ms: 0,
                unack_csma: false,
                hop_limit: 0,
                payload: payload.clone(),
            })
            .await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshgw_sinkbus::InMemorySinkBus;

    #[tokio::test]
    async fn no_sinks_is_treated_as_a_sourcing_failure() {
        let bus = Arc::new(InMemorySinkBus::new());
        let sink_manager = SinkManager::new(bus);
        let broadcaster = RtcBroadcaster::new(
            RtcBroadcasterConfig {
                period: Duration::from_secs(1200),
                retry_period: Duration::from_secs(5),
                clock_source: RtcClockSource::Local,
                timezone_offset_s: 7200,
            },
            sink_manager,
        );
        assert!(broadcaster.broadcast_once().await.is_err());
    }

    #[tokio::test]
    async fn broadcast_sends_to_every_sink_on_the_documented_endpoints() {
        let bus = Arc::new(InMemorySinkBus::new());
        bus.insert_sink("sink0", "owner-1");
        let sink_manager = SinkManager::new(bus.clone());
        let broadcaster = RtcBroadcaster::new(
            RtcBroadcasterConfig {
                period: Duration::from_secs(1200),
                retry_period: Duration::from_secs(5),
                clock_source: RtcClockSource::Local,
                timezone_offset_s: 7200,
            },
            sink_manager,
        );
        broadcaster.broadcast_once().await.unwrap();
        let sent = bus.sent_messages("sink0");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].src_ep, 78);
        assert_eq!(sent[0].dst_ep, 79);
        assert_eq!(sent[0].dst, 0xFFFF_FFFF);
    }
}
