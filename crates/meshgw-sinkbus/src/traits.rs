//! The `SinkBus` trait and the value types that cross it (§4.2).

use std::sync::Arc;

use async_trait::async_trait;
use meshgw_core::error::BusError;
use meshgw_core::scratchpad::{ScratchpadStatus, TargetScratchpad};

/// One recognized attribute key in a sink's configuration (§3
/// `SinkConfiguration`). `Sink::read_config`/`write_config` drive the bus one
/// key at a time through `read_attribute`/`write_attribute`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum AttributeKey {
    NodeAddress,
    NodeRole,
    NetworkAddress,
    NetworkChannel,
    ChannelMap,
    AuthenticationKey,
    CipherKey,
    AreKeysSet,
    NodeAddressRange,
    AcRange,
    ChannelRange,
    MaxMtu,
    HwMagic,
    StackProfile,
    FirmwareVersion,
    AppConfigMaxSize,
}

/// The value carried by a single attribute read or write.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    U8(u8),
    U16(u16),
    U32(u32),
    Bool(bool),
    Bytes16([u8; 16]),
    Bytes4([u8; 4]),
    U32Range((u32, u32)),
    U8Range((u8, u8)),
}

/// The app-config triple (§4.3: `get_app_config`/`set_app_config`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub seq: u8,
    pub diag: u16,
    pub data: Vec<u8>,
}

/// A downlink message handed to `send_message` (§4.2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub dst: u32,
    pub src_ep: u8,
    pub dst_ep: u8,
    pub qos: u8,
    pub initial_delay_ms: u32,
    pub unack_csma: bool,
    pub hop_limit: u8,
    pub payload: Vec<u8>,
}

/// An uplink frame delivered through the bus's uplink callback (§4.2, §3
/// `ReceivedDataEvent`), keyed by the bus's transient owner identifier
/// rather than the stable sink name — attributing it to a sink is
/// `SinkManager`'s job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UplinkFrame {
    pub timestamp_ms: u64,
    pub src: u32,
    pub dst: u32,
    pub src_ep: u8,
    pub dst_ep: u8,
    pub travel_time_ms: u32,
    pub qos: u8,
    pub hop_count: u8,
    pub payload: Vec<u8>,
}

/// Sink appearance/disappearance and stack start/stop notifications (§4.2).
pub trait SinkLifecycleListener: Send + Sync {
    fn on_appear(&self, name: &str, owner: &str);
    fn on_disappear(&self, name: &str);
    fn on_stack_started(&self, name: &str);
    fn on_stack_stopped(&self, name: &str);
}

/// Uplink delivery, one frame at a time, attributed by bus owner id.
pub trait UplinkListener: Send + Sync {
    fn on_uplink(&self, owner: &str, frame: UplinkFrame);
}

/// The capability the gateway core consumes from the local system-bus
/// binding (§4.2). Implementations are expected to be cheap to clone /
/// already `Arc`-wrapped at the call site; every operation here is
/// per-sink and keyed by the bus's own name for that sink.
#[async_trait]
pub trait SinkBus: Send + Sync {
    /// Current sink names known to the bus, snapshot at call time.
    fn sink_names(&self) -> Vec<String>;

    /// Registers a lifecycle listener. The bus is expected to fan out every
    /// subsequent appear/disappear/start/stop signal to every registered
    /// listener; there is no unsubscribe, matching the gateway's one
    /// long-lived `SinkManager` per process.
    fn subscribe_lifecycle(&self, listener: Arc<dyn SinkLifecycleListener>);

    /// Registers an uplink listener, same fan-out contract as above.
    fn subscribe_uplink(&self, listener: Arc<dyn UplinkListener>);

    async fn read_attribute(&self, name: &str, key: AttributeKey) -> Result<AttributeValue, BusError>;

    async fn write_attribute(
        &self,
        name: &str,
        key: AttributeKey,
        value: AttributeValue,
    ) -> Result<(), BusError>;

    async fn send_message(&self, name: &str, message: OutboundMessage) -> Result<(), BusError>;

    async fn set_stack_state(&self, name: &str, started: bool) -> Result<(), BusError>;

    async fn get_app_config(&self, name: &str) -> Result<AppConfig, BusError>;

    async fn set_app_config(
        &self,
        name: &str,
        seq: u8,
        diag: u16,
        data: Vec<u8>,
    ) -> Result<(), BusError>;

    async fn scratchpad_status(&self, name: &str) -> Result<ScratchpadStatus, BusError>;

    async fn scratchpad_upload(&self, name: &str, seq: u8, blob: Vec<u8>) -> Result<(), BusError>;

    async fn scratchpad_process(&self, name: &str) -> Result<(), BusError>;

    async fn scratchpad_set_target(
        &self,
        name: &str,
        target: TargetScratchpad,
    ) -> Result<(), BusError>;

    /// The sink's radio cost, 0..=254 (§4.3 `cost = v`). Split out from
    /// `write_attribute` since it is not itself a `SinkConfiguration` field
    /// and is the one operation `BlackHoleMonitor` drives directly.
    async fn set_cost(&self, name: &str, cost: u8) -> Result<(), BusError>;
}
