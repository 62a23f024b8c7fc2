//! MQTT-facing slice of the configuration surface (§8.1). TLS credential
//! *parsing* stays out of scope per the spec's own boundary (§1) — this
//! crate reads the configured paths as raw bytes and hands them to
//! `rustls`/`rumqttc`, it does not implement certificate validation itself.

use std::time::Duration;

/// Minimum acceptable peer certificate policy (§8.1 `cert_reqs`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CertRequirement {
    Required,
    Optional,
    None,
}

#[derive(Clone, Debug, Default)]
pub struct TlsSettings {
    pub ca_certs: Option<String>,
    pub certfile: Option<String>,
    pub keyfile: Option<String>,
    pub cert_reqs: Option<CertRequirement>,
    pub allow_untrusted: bool,
}

/// MQTT connection/transport configuration (§8.1 MQTT config group).
#[derive(Clone, Debug)]
pub struct MqttTransportConfig {
    pub gateway_id: String,
    pub hostname: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub force_unsecure: bool,
    pub use_websocket: bool,
    pub tls: TlsSettings,
    pub persist_session: bool,
    /// `0` means retry forever (§4.6, §5 "cancellation and timeouts").
    pub reconnect_delay_s: u64,
    /// `0` means unlimited in-flight publishes.
    pub max_inflight_messages: u16,
    /// `0` disables rate limiting.
    pub rate_limit_pps: u32,
    pub keep_alive: Duration,
}

impl MqttTransportConfig {
    pub fn reconnect_budget(&self) -> Option<Duration> {
        if self.reconnect_delay_s == 0 {
            None
        } else {
            Some(Duration::from_secs(self.reconnect_delay_s))
        }
    }
}
