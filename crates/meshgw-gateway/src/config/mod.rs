//! The gateway's configuration surface (§6, §8.1): a TOML document mirroring
//! the MQTT/gateway/buffering/debug sections exactly. CLI handling lives in
//! the `gateway` binary; this module is pure data plus validation.

pub mod endpoints;

use std::path::Path;
use std::time::Duration;

use meshgw_core::EndpointFilters;
use meshgw_transport_mqtt::{CertRequirement, MqttTransportConfig, TlsSettings};
use thiserror::Error;

use self::endpoints::{parse_endpoint_list, EndpointListError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid endpoint list: {0}")]
    EndpointList(#[from] EndpointListError),
    #[error("ignored and whitened endpoint sets overlap: {0:?}")]
    EndpointOverlap(Vec<u8>),
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MqttSection {
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ca_certs: Option<String>,
    pub certfile: Option<String>,
    pub keyfile: Option<String>,
    pub cert_reqs: Option<CertReqs>,
    #[serde(default)]
    pub tls_version: Option<String>,
    #[serde(default)]
    pub ciphers: Option<String>,
    #[serde(default)]
    pub persist_session: bool,
    #[serde(default)]
    pub force_unsecure: bool,
    #[serde(default)]
    pub allow_untrusted: bool,
    #[serde(default = "default_reconnect_delay_s")]
    pub reconnect_delay_s: u64,
    #[serde(default)]
    pub max_inflight_messages: u16,
    #[serde(default)]
    pub rate_limit_pps: u32,
    #[serde(default)]
    pub use_websocket: bool,
}

#[derive(Clone, Copy, Debug, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CertReqs {
    Required,
    Optional,
    None,
}

impl From<CertReqs> for CertRequirement {
    fn from(value: CertReqs) -> Self {
        match value {
            CertReqs::Required => CertRequirement::Required,
            CertReqs::Optional => CertRequirement::Optional,
            CertReqs::None => CertRequirement::None,
        }
    }
}

fn default_port() -> u16 {
    8883
}

fn default_reconnect_delay_s() -> u64 {
    0
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GatewaySection {
    pub gateway_id: String,
    #[serde(default = "default_model")]
    pub gateway_model: String,
    #[serde(default = "default_version")]
    pub gateway_version: String,
    /// Kept only so existing config files deserialize; the source's
    /// Python-vs-non-Python branch has no counterpart here (§1 Non-goals).
    #[serde(default)]
    pub full_python: bool,
    #[serde(default = "default_empty_list")]
    pub ignored_endpoints: String,
    #[serde(default = "default_empty_list")]
    pub whitened_endpoints: String,
    /// Opt-in reconnect burst, default off (§9 Open Question 1).
    #[serde(default)]
    pub keep_alive_burst_on_reconnect: bool,
}

fn default_model() -> String {
    "meshgw".to_string()
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_empty_list() -> String {
    "[]".to_string()
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BufferingSection {
    #[serde(default)]
    pub max_buffered_packets: usize,
    #[serde(default)]
    pub max_delay_without_publish: f64,
    #[serde(default)]
    pub minimum_sink_cost: u8,
    #[serde(default)]
    pub stop_stack: bool,
}

#[derive(Clone, Debug, Default, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DebugSection {
    #[serde(default)]
    pub incr_data_event_id: bool,
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct GatewayConfig {
    pub mqtt: MqttSection,
    pub gateway: GatewaySection,
    #[serde(default = "default_buffering")]
    pub buffering: BufferingSection,
    #[serde(default)]
    pub debug: DebugSection,
}

fn default_buffering() -> BufferingSection {
    BufferingSection {
        max_buffered_packets: 0,
        max_delay_without_publish: 0.0,
        minimum_sink_cost: 0,
        stop_stack: false,
    }
}

impl GatewayConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Validates the endpoint-filter disjointness invariant (§3, §8 property
    /// 2) and returns the parsed [`EndpointFilters`].
    pub fn endpoint_filters(&self) -> Result<EndpointFilters, ConfigError> {
        let ignored = parse_endpoint_list(&self.gateway.ignored_endpoints)?;
        let whitened = parse_endpoint_list(&self.gateway.whitened_endpoints)?;
        EndpointFilters::new(ignored, whitened).map_err(|err| ConfigError::EndpointOverlap(err.0))
    }

    pub fn mqtt_transport_config(&self) -> MqttTransportConfig {
        let mqtt = &self.mqtt;
        MqttTransportConfig {
            gateway_id: self.gateway.gateway_id.clone(),
            hostname: mqtt.hostname.clone(),
            port: mqtt.port,
            username: mqtt.username.clone(),
            password: mqtt.password.clone(),
            force_unsecure: mqtt.force_unsecure,
            use_websocket: mqtt.use_websocket,
            tls: TlsSettings {
                ca_certs: mqtt.ca_certs.clone(),
                certfile: mqtt.certfile.clone(),
                keyfile: mqtt.keyfile.clone(),
                cert_reqs: mqtt.cert_reqs.map(CertRequirement::from),
                allow_untrusted: mqtt.allow_untrusted,
            },
            persist_session: mqtt.persist_session,
            reconnect_delay_s: mqtt.reconnect_delay_s,
            max_inflight_messages: mqtt.max_inflight_messages,
            rate_limit_pps: mqtt.rate_limit_pps,
            keep_alive: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ignored: &str, whitened: &str) -> GatewayConfig {
        GatewayConfig {
            mqtt: MqttSection {
                hostname: "broker.example".to_string(),
                port: 8883,
                username: None,
                password: None,
                ca_certs: None,
                certfile: None,
                keyfile: None,
                cert_reqs: None,
                tls_version: None,
                ciphers: None,
                persist_session: false,
                force_unsecure: false,
                allow_untrusted: false,
                reconnect_delay_s: 0,
                max_inflight_messages: 0,
                rate_limit_pps: 0,
                use_websocket: false,
            },
            gateway: GatewaySection {
                gateway_id: "gw-1".to_string(),
                gateway_model: "model".to_string(),
                gateway_version: "1.0".to_string(),
                full_python: false,
                ignored_endpoints: ignored.to_string(),
                whitened_endpoints: whitened.to_string(),
                keep_alive_burst_on_reconnect: false,
            },
            buffering: default_buffering(),
            debug: DebugSection::default(),
        }
    }

    #[test]
    fn disjoint_endpoint_lists_validate() {
        let config = sample("[1,2]", "[3,4]");
        assert!(config.endpoint_filters().is_ok());
    }

    #[test]
    fn overlapping_endpoint_lists_are_rejected() {
        let config = sample("[1,2]", "[2,3]");
        assert!(config.endpoint_filters().is_err());
    }

    #[test]
    fn toml_document_deserializes_into_every_section() {
        let doc = r#"
            [mqtt]
            hostname = "broker.example"
            port = 8883

            [gateway]
            gateway-id = "gw-1"
            ignored-endpoints = "[1]"
            whitened-endpoints = "[2]"

            [buffering]
            max-buffered-packets = 5
            minimum-sink-cost = 1

            [debug]
            incr-data-event-id = true
        "#;
        let config: GatewayConfig = toml::from_str(doc).unwrap();
        assert_eq!(config.mqtt.hostname, "broker.example");
        assert_eq!(config.buffering.max_buffered_packets, 5);
        assert!(config.debug.incr_data_event_id);
    }
}
