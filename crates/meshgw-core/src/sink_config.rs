//! Sink configuration (§3): a sparse mapping from a fixed set of recognized
//! keys to scalar/byte-string values. Keys absent from a read remain absent
//! (not null/default) — every field here is `Option`. A write accepts any
//! subset; keys not present in the write are left untouched by `Sink`.

use crate::scratchpad::ScratchpadStatus;

/// `node_role`: base role (2 bits) plus independent CSMA-CA / autorole flags.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NodeRole(u8);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeRoleBase {
    Sink,
    Headnode,
    Subnode,
    Reserved(u8),
}

impl NodeRole {
    const BASE_MASK: u8 = 0b0000_0011;
    const CSMA_CA_BIT: u8 = 0b0001_0000;
    const AUTOROLE_BIT: u8 = 0b1000_0000;

    pub fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    pub fn new(base: NodeRoleBase, csma_ca: bool, autorole: bool) -> Self {
        let base_bits = match base {
            NodeRoleBase::Sink => 0,
            NodeRoleBase::Headnode => 1,
            NodeRoleBase::Subnode => 2,
            NodeRoleBase::Reserved(v) => v & Self::BASE_MASK,
        };
        let mut raw = base_bits;
        if csma_ca {
            raw |= Self::CSMA_CA_BIT;
        }
        if autorole {
            raw |= Self::AUTOROLE_BIT;
        }
        Self(raw)
    }

    pub fn raw(self) -> u8 {
        self.0
    }

    pub fn base(self) -> NodeRoleBase {
        match self.0 & Self::BASE_MASK {
            0 => NodeRoleBase::Sink,
            1 => NodeRoleBase::Headnode,
            2 => NodeRoleBase::Subnode,
            other => NodeRoleBase::Reserved(other),
        }
    }

    pub fn is_sink(self) -> bool {
        self.base() == NodeRoleBase::Sink
    }

    pub fn csma_ca(self) -> bool {
        self.0 & Self::CSMA_CA_BIT != 0
    }

    pub fn autorole(self) -> bool {
        self.0 & Self::AUTOROLE_BIT != 0
    }
}

/// A 24-bit network address. Values are masked to the low 24 bits on
/// construction so callers never have to remember to do it themselves.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct NetworkAddress(u32);

impl NetworkAddress {
    pub const MASK: u32 = 0x00FF_FFFF;

    pub fn new(raw: u32) -> Self {
        Self(raw & Self::MASK)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

/// Sparse, per-sink configuration view (§3 `SinkConfiguration`).
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SinkConfiguration {
    pub started: Option<bool>,
    pub node_address: Option<u32>,
    pub node_role: Option<NodeRole>,
    pub network_address: Option<NetworkAddress>,
    pub network_channel: Option<u8>,
    pub channel_map: Option<u32>,
    /// Write-only: never populated by a read.
    pub authentication_key: Option<[u8; 16]>,
    /// Write-only: never populated by a read.
    pub cipher_key: Option<[u8; 16]>,
    /// Read-only: rejected on write.
    pub are_keys_set: Option<bool>,
    pub app_config_seq: Option<u8>,
    pub app_config_diag: Option<u16>,
    pub app_config_data: Option<Vec<u8>>,
    pub node_address_range: Option<(u32, u32)>,
    pub ac_range: Option<(u8, u8)>,
    pub channel_range: Option<(u8, u8)>,
    pub max_mtu: Option<u16>,
    pub hw_magic: Option<u16>,
    pub stack_profile: Option<u8>,
    pub firmware_version: Option<[u8; 4]>,
    pub app_config_max_size: Option<u8>,
    pub scratchpad: Option<ScratchpadStatus>,
}

impl SinkConfiguration {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Firmware version as a `major.minor` pair, used to gate target
    /// scratchpad reads (§4.3: only attempted on stacks reporting firmware
    /// version > 5.0).
    pub fn firmware_above(&self, major: u8, minor: u8) -> bool {
        match self.firmware_version {
            Some([fw_major, fw_minor, ..]) => {
                (fw_major, fw_minor) > (major, minor)
            }
            None => false,
        }
    }

    /// Merges `other` over `self`, keeping `self`'s value for any key absent
    /// in `other`. Used by `Sink::read_config`'s last-known-good fallback
    /// (§4.3): present values win, missing ones fall back to cache.
    pub fn merge_missing_from(&mut self, cached: &SinkConfiguration) {
        macro_rules! fill {
            ($field:ident) => {
                if self.$field.is_none() {
                    self.$field = cached.$field.clone();
                }
            };
        }
        fill!(started);
        fill!(node_address);
        fill!(node_role);
        fill!(network_address);
        fill!(network_channel);
        fill!(channel_map);
        fill!(are_keys_set);
        fill!(app_config_seq);
        fill!(app_config_diag);
        fill!(app_config_data);
        fill!(node_address_range);
        fill!(ac_range);
        fill!(channel_range);
        fill!(max_mtu);
        fill!(hw_magic);
        fill!(stack_profile);
        fill!(firmware_version);
        fill!(app_config_max_size);
        fill!(scratchpad);
        // authentication_key / cipher_key are write-only: never filled from cache.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_address_masks_to_24_bits() {
        let addr = NetworkAddress::new(0xFF_ABCDEF);
        assert_eq!(addr.value(), 0x00AB_CDEF);
    }

    #[test]
    fn node_role_round_trips_bits() {
        let role = NodeRole::new(NodeRoleBase::Sink, true, false);
        assert!(role.is_sink());
        assert!(role.csma_ca());
        assert!(!role.autorole());
    }

    #[test]
    fn firmware_above_compares_major_then_minor() {
        let mut cfg = SinkConfiguration::empty();
        cfg.firmware_version = Some([5, 1, 0, 0]);
        assert!(cfg.firmware_above(5, 0));
        assert!(!cfg.firmware_above(5, 1));
        assert!(!cfg.firmware_above(6, 0));
    }

    #[test]
    fn merge_missing_from_fills_only_absent_fields() {
        let mut fresh = SinkConfiguration::empty();
        fresh.node_address = Some(7);
        let mut cached = SinkConfiguration::empty();
        cached.node_address = Some(1);
        cached.network_channel = Some(3);

        fresh.merge_missing_from(&cached);
        assert_eq!(fresh.node_address, Some(7));
        assert_eq!(fresh.network_channel, Some(3));
    }
}
