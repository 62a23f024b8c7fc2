//! Scratchpad (OTAP) status view (§3).

/// Status of a stored scratchpad image.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum StoredStatus {
    Success,
    New,
    Error,
}

/// Type of a stored scratchpad image.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum StoredType {
    Blank,
    Present,
    Process,
}

/// Action requested for a target scratchpad (§3).
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ScratchpadAction {
    NoOtap,
    LegacyOtap,
    PropagateOnly,
    PropagateAndProcess,
    PropagateAndProcessWithDelay,
}

/// Either a raw `param` or a quantized `delay`, mutually exclusive, carried
/// alongside a target scratchpad request.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum TargetParam {
    Param(u8),
    QuantizedDelay(u8),
}

/// Target scratchpad descriptor: what the sink should propagate/process next
/// and under what action.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TargetScratchpad {
    pub action: ScratchpadAction,
    pub target_sequence: u8,
    pub target_crc: u16,
    pub param: TargetParam,
}

/// Full scratchpad status view returned by `Sink::read_config`/`get_status`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScratchpadStatus {
    pub stored_seq: u8,
    pub stored_crc: u16,
    pub stored_len: u32,
    pub stored_status: StoredStatus,
    pub stored_type: StoredType,
    pub processed_seq: u8,
    pub processed_crc: u16,
    pub processed_len: u32,
    pub firmware_area_id: u32,
    pub target: Option<TargetScratchpad>,
}
