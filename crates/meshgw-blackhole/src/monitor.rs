//! Transport backpressure detector (§4.9): watches the outbound queue every
//! second and, when it looks stuck, discourages or halts mesh ingress until
//! it drains.
//!
//! Grounded on the same `Arc<Self>`-background-task shape as
//! [`meshgw_switch::MessageCache`]'s sweeper and
//! [`meshgw_status::StatusPublisher`]'s loop; the health transition itself
//! is a two-state machine, simpler than `Sink`'s own started/stopped flag
//! only in that it drives every sink at once rather than one.

use std::sync::Arc;
use std::time::Duration;

use meshgw_core::SinkConfiguration;
use meshgw_sinkbus::{SinkBus, SinkLifecycleListener};
use meshgw_switch::SinkManager;
use meshgw_transport_mqtt::OutboundQueue;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum HealthState {
    Healthy,
    Degraded,
}

/// Thresholds for §4.9; a `0` value disables the respective trigger.
#[derive(Clone, Debug)]
pub struct BlackHoleConfig {
    pub max_buffered_packets: usize,
    pub max_delay_without_publish_s: f64,
    pub minimum_sink_cost: u8,
    pub stop_stack: bool,
}

pub struct BlackHoleMonitor {
    config: BlackHoleConfig,
    bus: Arc<dyn SinkBus>,
    sink_manager: Arc<SinkManager>,
    queue: Arc<OutboundQueue>,
    state: RwLock<HealthState>,
}

impl BlackHoleMonitor {
    pub fn new(
        config: BlackHoleConfig,
        bus: Arc<dyn SinkBus>,
        sink_manager: Arc<SinkManager>,
        queue: Arc<OutboundQueue>,
    ) -> Arc<Self> {
        let monitor = Arc::new(Self {
            config,
            bus: bus.clone(),
            sink_manager,
            queue,
            state: RwLock::new(HealthState::Healthy),
        });
        bus.subscribe_lifecycle(monitor.clone() as Arc<dyn SinkLifecycleListener>);
        monitor
    }

    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run().await })
    }

    async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    fn is_stuck(&self) -> bool {
        let queue_size = self.queue.len();
        let waiting_s = self.queue.waiting_time_s();
        (self.config.max_buffered_packets != 0 && queue_size > self.config.max_buffered_packets)
            || (self.config.max_delay_without_publish_s != 0.0 && waiting_s > self.config.max_delay_without_publish_s)
    }

    async fn tick(&self) {
        let current = *self.state.read();
        match current {
            HealthState::Healthy if self.is_stuck() => {
                *self.state.write() = HealthState::Degraded;
                warn!("transport queue stuck, entering degraded state");
                self.enter_degraded().await;
            }
            HealthState::Degraded if self.queue.is_empty() => {
                *self.state.write() = HealthState::Healthy;
                info!("transport queue drained, returning to healthy state");
                self.enter_healthy().await;
            }
            _ => {}
        }
    }

    async fn enter_degraded(&self) {
        for sink in self.sink_manager.get_sinks() {
            if self.config.stop_stack {
                let mut stopped = SinkConfiguration::empty();
                stopped.started = Some(false);
                sink.write_config(&stopped).await;
            } else {
                sink.set_cost(254).await;
            }
        }
    }

    async fn enter_healthy(&self) {
        for sink in self.sink_manager.get_sinks() {
            if self.config.stop_stack {
                let mut restarted = SinkConfiguration::empty();
                restarted.started = Some(true);
                sink.write_config(&restarted).await;
            } else {
                sink.set_cost(self.config.minimum_sink_cost as u16).await;
            }
        }
    }
}

impl SinkLifecycleListener for BlackHoleMonitor {
    /// A sink appearing while degraded inherits the discouraged cost
    /// (§4.9); under `stop_stack` mode it is left alone, since the stack
    /// only just started and stopping it again would fight the bus.
    fn on_appear(&self, name: &str, _owner: &str) {
        if *self.state.read() == HealthState::Degraded && !self.config.stop_stack {
            let bus = self.bus.clone();
            let name = name.to_string();
            tokio::spawn(async move {
                let _ = bus.set_cost(&name, 254).await;
            });
        }
    }

    fn on_disappear(&self, _name: &str) {}
    fn on_stack_started(&self, _name: &str) {}
    fn on_stack_stopped(&self, _name: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshgw_sinkbus::InMemorySinkBus;
    use meshgw_transport_mqtt::OutboundItem;
    use rumqttc::QoS;

    fn test_monitor(config: BlackHoleConfig) -> (Arc<BlackHoleMonitor>, Arc<InMemorySinkBus>, Arc<OutboundQueue>) {
        let bus = Arc::new(InMemorySinkBus::new());
        let sink_manager = SinkManager::new(bus.clone());
        let queue = Arc::new(OutboundQueue::new());
        let monitor = BlackHoleMonitor::new(config, bus.clone(), sink_manager, queue.clone());
        (monitor, bus, queue)
    }

    fn item() -> OutboundItem {
        OutboundItem {
            topic: "t".to_string(),
            payload: vec![],
            qos: QoS::AtLeastOnce,
            retain: false,
        }
    }

    #[tokio::test]
    async fn queue_above_threshold_sets_every_sink_cost_to_254() {
        let (monitor, bus, queue) = test_monitor(BlackHoleConfig {
            max_buffered_packets: 1,
            max_delay_without_publish_s: 0.0,
            minimum_sink_cost: 10,
            stop_stack: false,
        });
        bus.insert_sink("sink0", "owner-1");
        queue.push(item());
        queue.push(item());

        monitor.tick().await;

        assert_eq!(bus.cost_of("sink0"), Some(254));
    }

    #[tokio::test]
    async fn recovery_restores_minimum_sink_cost() {
        let (monitor, bus, queue) = test_monitor(BlackHoleConfig {
            max_buffered_packets: 1,
            max_delay_without_publish_s: 0.0,
            minimum_sink_cost: 7,
            stop_stack: false,
        });
        bus.insert_sink("sink0", "owner-1");
        queue.push(item());
        queue.push(item());
        monitor.tick().await;
        assert_eq!(bus.cost_of("sink0"), Some(254));

        queue.pop();
        queue.pop();
        monitor.tick().await;
        assert_eq!(bus.cost_of("sink0"), Some(7));
    }

    #[tokio::test]
    async fn zero_thresholds_disable_detection() {
        let (monitor, bus, queue) = test_monitor(BlackHoleConfig {
            max_buffered_packets: 0,
            max_delay_without_publish_s: 0.0,
            minimum_sink_cost: 0,
            stop_stack: false,
        });
        bus.insert_sink("sink0", "owner-1");
        for _ in 0..100 {
            queue.push(item());
        }
        monitor.tick().await;
        assert_eq!(bus.cost_of("sink0"), Some(0));
    }
}
