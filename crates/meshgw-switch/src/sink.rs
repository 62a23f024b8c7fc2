//! Per-sink facade (§4.3): cached configuration read, safe config write
//! (stop/apply/restart), send, scratchpad operations, cost set.
//!
//! Grounded on the teacher's `CallSession` state holder
//! (`spark-switch::core::session::CallSession`): a struct owning its
//! identity plus a mutable view guarded for concurrent access, with plain
//! methods instead of a `Service` object. The state machine here is a
//! single `started` flag rather than `CallSession`'s four-state machine,
//! since §4.3 only distinguishes "stack running" from "stack stopped".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use meshgw_core::error::{BusError, GatewayResultCode};
use meshgw_core::identity::SinkIdentity;
use meshgw_core::scratchpad::{ScratchpadStatus, TargetScratchpad};
use meshgw_core::sink_config::{NetworkAddress, NodeRole, NodeRoleBase, SinkConfiguration};
use meshgw_sinkbus::{AppConfig, AttributeKey, AttributeValue, OutboundMessage, SinkBus};
use parking_lot::RwLock;

/// Minimum firmware (major.minor) a stack must report before a target
/// scratchpad read is trusted (§4.3).
const TARGET_SCRATCHPAD_MIN_FIRMWARE: (u8, u8) = (5, 0);

fn map_bus_err(err: BusError) -> GatewayResultCode {
    GatewayResultCode::from_bus_error(&err)
}

/// A single mesh sink: identity, a cached configuration view, and the
/// per-sink proxy operations that go through [`SinkBus`].
pub struct Sink {
    identity: SinkIdentity,
    bus: Arc<dyn SinkBus>,
    cache: RwLock<SinkConfiguration>,
    started: AtomicBool,
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sink")
            .field("identity", &self.identity)
            .field("started", &self.started.load(Ordering::Relaxed))
            .finish()
    }
}

impl Sink {
    pub fn new(identity: SinkIdentity, bus: Arc<dyn SinkBus>) -> Self {
        Self {
            identity,
            bus,
            cache: RwLock::new(SinkConfiguration::empty()),
            started: AtomicBool::new(false),
        }
    }

    pub fn identity(&self) -> &SinkIdentity {
        &self.identity
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Relaxed)
    }

    /// Last-known network address from the config cache, without a bus
    /// round-trip. Used to address uplink events (§3), which carry no
    /// network address of their own in the raw bus frame.
    pub fn cached_network_address(&self) -> Option<u32> {
        self.cache.read().network_address.map(NetworkAddress::value)
    }

    /// Invoked by [`crate::sink_manager::SinkManager`] when the bus reports
    /// this sink's stack started, independent of any `write_config` call
    /// that may be in flight.
    pub fn on_stack_started(&self) {
        self.started.store(true, Ordering::Relaxed);
    }

    /// Invoked by [`crate::sink_manager::SinkManager`] when the bus reports
    /// this sink's stack stopped.
    pub fn on_stack_stopped(&self) {
        self.started.store(false, Ordering::Relaxed);
    }

    fn name(&self) -> &str {
        self.identity.name()
    }

    async fn try_read(&self, key: AttributeKey, partial: &mut bool) -> Option<AttributeValue> {
        match self.bus.read_attribute(self.name(), key).await {
            Ok(value) => Some(value),
            Err(_) => {
                *partial = true;
                None
            }
        }
    }

    /// Best-effort read of all known attributes (§4.3). Attributes whose
    /// underlying read fails are filled from the last-known-good cache
    /// (with `partial` set), or simply omitted if never observed. The
    /// cache is replaced atomically at the end with the freshly merged
    /// view.
    pub async fn read_config(&self) -> (SinkConfiguration, bool) {
        let mut partial = false;
        let mut fresh = SinkConfiguration::empty();
        fresh.started = Some(self.is_started());

        if let Some(AttributeValue::U32(v)) = self.try_read(AttributeKey::NodeAddress, &mut partial).await {
            fresh.node_address = Some(v);
        }
        if let Some(AttributeValue::U8(v)) = self.try_read(AttributeKey::NodeRole, &mut partial).await {
            fresh.node_role = Some(NodeRole::from_raw(v));
        }
        if let Some(AttributeValue::U32(v)) = self.try_read(AttributeKey::NetworkAddress, &mut partial).await {
            fresh.network_address = Some(NetworkAddress::new(v));
        }
        if let Some(AttributeValue::U8(v)) = self.try_read(AttributeKey::NetworkChannel, &mut partial).await {
            fresh.network_channel = Some(v);
        }
        if let Some(AttributeValue::U32(v)) = self.try_read(AttributeKey::ChannelMap, &mut partial).await {
            fresh.channel_map = Some(v);
        }
        if let Some(AttributeValue::Bool(v)) = self.try_read(AttributeKey::AreKeysSet, &mut partial).await {
            fresh.are_keys_set = Some(v);
        }
        if let Some(AttributeValue::U32Range(v)) = self.try_read(AttributeKey::NodeAddressRange, &mut partial).await {
            fresh.node_address_range = Some(v);
        }
        if let Some(AttributeValue::U8Range(v)) = self.try_read(AttributeKey::AcRange, &mut partial).await {
            fresh.ac_range = Some(v);
        }
        if let Some(AttributeValue::U8Range(v)) = self.try_read(AttributeKey::ChannelRange, &mut partial).await {
            fresh.channel_range = Some(v);
        }
        if let Some(AttributeValue::U16(v)) = self.try_read(AttributeKey::MaxMtu, &mut partial).await {
            fresh.max_mtu = Some(v);
        }
        if let Some(AttributeValue::U16(v)) = self.try_read(AttributeKey::HwMagic, &mut partial).await {
            fresh.hw_magic = Some(v);
        }
        if let Some(AttributeValue::U8(v)) = self.try_read(AttributeKey::StackProfile, &mut partial).await {
            fresh.stack_profile = Some(v);
        }
        if let Some(AttributeValue::Bytes4(v)) = self.try_read(AttributeKey::FirmwareVersion, &mut partial).await {
            fresh.firmware_version = Some(v);
        }
        if let Some(AttributeValue::U8(v)) = self.try_read(AttributeKey::AppConfigMaxSize, &mut partial).await {
            fresh.app_config_max_size = Some(v);
        }

        match self.bus.get_app_config(self.name()).await {
            Ok(AppConfig { seq, diag, data }) => {
                fresh.app_config_seq = Some(seq);
                fresh.app_config_diag = Some(diag);
                fresh.app_config_data = Some(data);
            }
            Err(_) => partial = true,
        }

        match self.bus.scratchpad_status(self.name()).await {
            Ok(status) => fresh.scratchpad = Some(self.maybe_hide_target(status, &fresh)),
            Err(_) => partial = true,
        }

        {
            let cached = self.cache.read().clone();
            fresh.merge_missing_from(&cached);
        }
        *self.cache.write() = fresh.clone();

        (fresh, partial)
    }

    /// Target scratchpad is only meaningful on stacks new enough to support
    /// it (§4.3); masked out here rather than trusted blindly from the bus.
    fn maybe_hide_target(&self, mut status: ScratchpadStatus, config: &SinkConfiguration) -> ScratchpadStatus {
        if !config.firmware_above(TARGET_SCRATCHPAD_MIN_FIRMWARE.0, TARGET_SCRATCHPAD_MIN_FIRMWARE.1) {
            status.target = None;
        }
        status
    }

    /// Applies a (possibly partial) configuration write (§4.3): stops the
    /// stack first if it is running and there is anything to apply, writes
    /// role keys before app-config, restores the stack to `new.started`
    /// (or the prior state) and refreshes the network-address cache.
    pub async fn write_config(&self, new: &SinkConfiguration) -> GatewayResultCode {
        let prior_started = self.is_started();
        let has_writes = new.node_address.is_some()
            || new.node_role.is_some()
            || new.network_address.is_some()
            || new.network_channel.is_some()
            || new.channel_map.is_some()
            || new.authentication_key.is_some()
            || new.cipher_key.is_some()
            || new.app_config_data.is_some()
            || new.app_config_seq.is_some()
            || new.app_config_diag.is_some();

        let mut worst = GatewayResultCode::Ok;

        if new.are_keys_set.is_some() {
            worst = worst.worst_of(GatewayResultCode::AccessDenied);
        }

        if has_writes && prior_started {
            match self.bus.set_stack_state(self.name(), false).await {
                Ok(()) => self.started.store(false, Ordering::Relaxed),
                Err(err) => worst = worst.worst_of(map_bus_err(err)),
            }
        }

        macro_rules! write_if_present {
            ($field:expr, $key:expr, $wrap:expr) => {
                if let Some(value) = $field {
                    if let Err(err) = self.bus.write_attribute(self.name(), $key, $wrap(value)).await {
                        worst = worst.worst_of(map_bus_err(err));
                    }
                }
            };
        }

        write_if_present!(new.node_address, AttributeKey::NodeAddress, AttributeValue::U32);
        write_if_present!(new.node_role, AttributeKey::NodeRole, |r: NodeRole| AttributeValue::U8(r.raw()));
        write_if_present!(new.network_address, AttributeKey::NetworkAddress, |a: NetworkAddress| {
            AttributeValue::U32(a.value())
        });
        write_if_present!(new.network_channel, AttributeKey::NetworkChannel, AttributeValue::U8);
        write_if_present!(new.channel_map, AttributeKey::ChannelMap, AttributeValue::U32);
        write_if_present!(new.authentication_key, AttributeKey::AuthenticationKey, AttributeValue::Bytes16);
        write_if_present!(new.cipher_key, AttributeKey::CipherKey, AttributeValue::Bytes16);

        if new.app_config_data.is_some() || new.app_config_seq.is_some() || new.app_config_diag.is_some() {
            let cached = self.cache.read().clone();
            let seq = new.app_config_seq.or(cached.app_config_seq).unwrap_or(0);
            let diag = new.app_config_diag.or(cached.app_config_diag).unwrap_or(0);
            let data = new.app_config_data.clone().or(cached.app_config_data).unwrap_or_default();
            if let Err(err) = self.bus.set_app_config(self.name(), seq, diag, data).await {
                worst = worst.worst_of(map_bus_err(err));
            }
        }

        let final_started = new.started.unwrap_or(prior_started);
        match self.bus.set_stack_state(self.name(), final_started).await {
            Ok(()) => self.started.store(final_started, Ordering::Relaxed),
            Err(err) => worst = worst.worst_of(map_bus_err(err)),
        }

        if let Ok(AttributeValue::U32(raw)) = self.bus.read_attribute(self.name(), AttributeKey::NetworkAddress).await
        {
            self.cache.write().network_address = Some(NetworkAddress::new(raw));
        }

        worst
    }

    /// Sends a downlink message (§4.3). `hop_limit` above 15 is rejected
    /// locally without touching the bus.
    pub async fn send(&self, message: OutboundMessage) -> GatewayResultCode {
        if message.hop_limit > 15 {
            return GatewayResultCode::InvalidMaxHopCount;
        }
        match self.bus.send_message(self.name(), message).await {
            Ok(()) => GatewayResultCode::Ok,
            Err(err) => map_bus_err(err),
        }
    }

    /// Sets the sink's radio cost (§4.3). `value` must be in `0..=254`; the
    /// underlying role must be sink.
    pub async fn set_cost(&self, value: u16) -> GatewayResultCode {
        if value > 254 {
            return GatewayResultCode::InvalidParam;
        }

        let role = match self.bus.read_attribute(self.name(), AttributeKey::NodeRole).await {
            Ok(AttributeValue::U8(raw)) => Some(NodeRole::from_raw(raw)),
            _ => self.cache.read().node_role,
        };
        if let Some(role) = role {
            if role.base() != NodeRoleBase::Sink {
                return GatewayResultCode::InvalidRole;
            }
        }

        match self.bus.set_cost(self.name(), value as u8).await {
            Ok(()) => GatewayResultCode::Ok,
            Err(err) => map_bus_err(err),
        }
    }

    pub async fn scratchpad_status(&self) -> Result<ScratchpadStatus, GatewayResultCode> {
        self.bus.scratchpad_status(self.name()).await.map_err(map_bus_err)
    }

    /// Uploads a scratchpad image (§4.3). An empty blob clears the local
    /// scratchpad. The stack is stopped first if running and restored to
    /// its prior state on exit, regardless of outcome.
    pub async fn scratchpad_upload(&self, seq: u8, blob: Vec<u8>) -> GatewayResultCode {
        let prior_started = self.is_started();
        if prior_started {
            self.stop_for_maintenance().await;
        }
        let result = self.bus.scratchpad_upload(self.name(), seq, blob).await;
        if prior_started {
            self.restore_after_maintenance().await;
        }
        self.finish(result)
    }

    pub async fn scratchpad_process(&self) -> GatewayResultCode {
        let prior_started = self.is_started();
        if prior_started {
            self.stop_for_maintenance().await;
        }
        let result = self.bus.scratchpad_process(self.name()).await;
        if prior_started {
            self.restore_after_maintenance().await;
        }
        self.finish(result)
    }

    /// Sets the target scratchpad descriptor (§4.3). Unlike upload/process,
    /// this does not require the stack to be stopped.
    pub async fn scratchpad_set_target(&self, target: TargetScratchpad) -> GatewayResultCode {
        self.finish(self.bus.scratchpad_set_target(self.name(), target).await)
    }

    async fn stop_for_maintenance(&self) {
        if self.bus.set_stack_state(self.name(), false).await.is_ok() {
            self.started.store(false, Ordering::Relaxed);
        }
    }

    async fn restore_after_maintenance(&self) {
        if self.bus.set_stack_state(self.name(), true).await.is_ok() {
            self.started.store(true, Ordering::Relaxed);
        }
    }

    fn finish(&self, result: Result<(), BusError>) -> GatewayResultCode {
        match result {
            Ok(()) => GatewayResultCode::Ok,
            Err(err) => map_bus_err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshgw_sinkbus::InMemorySinkBus;

    fn sink_with_bus() -> (Sink, Arc<InMemorySinkBus>) {
        let bus = Arc::new(InMemorySinkBus::new());
        bus.insert_sink("sink0", "owner-1");
        let sink = Sink::new(SinkIdentity::new("sink0", "owner-1"), bus.clone());
        (sink, bus)
    }

    #[tokio::test]
    async fn set_cost_rejects_out_of_range() {
        let (sink, _bus) = sink_with_bus();
        assert_eq!(sink.set_cost(255).await, GatewayResultCode::InvalidParam);
    }

    #[tokio::test]
    async fn set_cost_applies_when_in_range_and_no_role_cached() {
        let (sink, bus) = sink_with_bus();
        assert_eq!(sink.set_cost(42).await, GatewayResultCode::Ok);
        assert_eq!(bus.cost_of("sink0"), Some(42));
    }

    #[tokio::test]
    async fn send_rejects_hop_limit_above_fifteen() {
        let (sink, _bus) = sink_with_bus();
        let message = OutboundMessage {
            dst: 1,
            src_ep: 1,
            dst_ep: 1,
            qos: 0,
            initial_delay_ms: 0,
            unack_csma: false,
            hop_limit: 16,
            payload: vec![],
        };
        assert_eq!(sink.send(message).await, GatewayResultCode::InvalidMaxHopCount);
    }

    #[tokio::test]
    async fn write_config_stops_and_restarts_around_apply() {
        let (sink, bus) = sink_with_bus();
        bus.start_stack("sink0");
        sink.on_stack_started();

        let mut new = SinkConfiguration::empty();
        new.network_channel = Some(11);
        new.started = Some(true);
        let code = sink.write_config(&new).await;

        assert_eq!(code, GatewayResultCode::Ok);
        assert_eq!(bus.is_started("sink0"), Some(true));
    }

    #[tokio::test]
    async fn read_config_marks_partial_on_unreadable_attribute() {
        let bus = Arc::new(InMemorySinkBus::new());
        // Sink never inserted on the bus: every attribute read fails.
        let sink = Sink::new(SinkIdentity::new("ghost", "owner-x"), bus);
        let (_config, partial) = sink.read_config().await;
        assert!(partial);
    }
}
