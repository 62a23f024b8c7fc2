//! Gateway status document (§3 `GatewayStatus`).

use std::collections::BTreeMap;

use crate::sink_config::SinkConfiguration;

/// The retained gateway status document, republished on every observable
/// change (§4.8). Sinks are keyed by name in a `BTreeMap` rather than a
/// `Vec` so that two documents built from the same underlying state compare
/// equal regardless of iteration order — the spec calls the collection
/// "unordered" and `StatusPublisher` suppression (§4.8, §8.4) depends on
/// value equality, not insertion order.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GatewayStatus {
    pub gateway_id: String,
    pub gateway_model: String,
    pub gateway_version: String,
    pub online: bool,
    pub sinks: BTreeMap<String, SinkConfiguration>,
}

impl GatewayStatus {
    pub fn offline(gateway_id: impl Into<String>, model: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            gateway_id: gateway_id.into(),
            gateway_model: model.into(),
            gateway_version: version.into(),
            online: false,
            sinks: BTreeMap::new(),
        }
    }

    /// Per-sink diff against a previous status document, used by the
    /// compatibility side-channel (§4.8): suppression there is per-sink, so
    /// only sinks whose configuration actually changed get the legacy
    /// `set_config` echo.
    pub fn changed_sinks<'a>(&'a self, previous: &'a GatewayStatus) -> Vec<&'a str> {
        self.sinks
            .iter()
            .filter(|(name, config)| previous.sinks.get(*name) != Some(config))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_statuses_with_same_sinks_in_different_order_are_equal() {
        let mut a = GatewayStatus::offline("gw-1", "model", "1.0");
        a.sinks.insert("sink1".into(), SinkConfiguration::empty());
        a.sinks.insert("sink0".into(), SinkConfiguration::empty());

        let mut b = GatewayStatus::offline("gw-1", "model", "1.0");
        b.sinks.insert("sink0".into(), SinkConfiguration::empty());
        b.sinks.insert("sink1".into(), SinkConfiguration::empty());

        assert_eq!(a, b);
    }

    #[test]
    fn changed_sinks_reports_only_differing_entries() {
        let mut previous = GatewayStatus::offline("gw-1", "model", "1.0");
        previous.sinks.insert("sink0".into(), SinkConfiguration::empty());
        let mut unchanged_cfg = SinkConfiguration::empty();
        unchanged_cfg.node_address = Some(1);
        previous.sinks.insert("sink1".into(), unchanged_cfg.clone());

        let mut current = previous.clone();
        current.sinks.get_mut("sink0").unwrap().node_address = Some(99);

        assert_eq!(current.changed_sinks(&previous), vec!["sink0"]);
    }
}
