//! Uplink event model (§3 `ReceivedDataEvent`).

use std::sync::atomic::{AtomicU64, Ordering};

use rand::RngCore;

/// Payload of an uplink event, either carried in full or elided to only its
/// size when the destination endpoint is in the whitening set (§3, §8.3).
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum EventPayload {
    Full(Vec<u8>),
    SizeOnly(usize),
}

impl EventPayload {
    pub fn size(&self) -> usize {
        match self {
            EventPayload::Full(bytes) => bytes.len(),
            EventPayload::SizeOnly(size) => *size,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            EventPayload::Full(bytes) => Some(bytes),
            EventPayload::SizeOnly(_) => None,
        }
    }
}

/// A single uplink event, ready for the codec to serialize onto
/// `gw-event/received_data/...` (§3, §6).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReceivedDataEvent {
    pub sink_id: String,
    pub received_at_ms: u64,
    pub source_address: u32,
    pub destination_address: u32,
    pub source_endpoint: u8,
    pub destination_endpoint: u8,
    pub travel_time_ms: u32,
    pub qos: u8,
    pub hop_count: u8,
    pub payload: EventPayload,
    pub network_address: u32,
    pub event_id: u64,
}

/// Generates the per-gateway event id (§3): monotonically increasing from 0
/// when `incr_data_event_id` is enabled, otherwise a fresh 64-bit random
/// value per event.
pub enum EventIdGenerator {
    Monotonic(AtomicU64),
    Random,
}

impl EventIdGenerator {
    pub fn monotonic() -> Self {
        EventIdGenerator::Monotonic(AtomicU64::new(0))
    }

    pub fn random() -> Self {
        EventIdGenerator::Random
    }

    /// Mutated only from the bus event thread in the real gateway, so a
    /// plain `AtomicU64` with `Relaxed` ordering is enough — there is never
    /// concurrent contention on this counter (§5 "shared resources").
    pub fn next(&self) -> u64 {
        match self {
            EventIdGenerator::Monotonic(counter) => counter.fetch_add(1, Ordering::Relaxed),
            EventIdGenerator::Random => rand::thread_rng().next_u64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_generator_starts_at_zero_and_increments() {
        let gen = EventIdGenerator::monotonic();
        assert_eq!(gen.next(), 0);
        assert_eq!(gen.next(), 1);
        assert_eq!(gen.next(), 2);
    }

    #[test]
    fn event_payload_size_only_preserves_original_size() {
        let payload = EventPayload::SizeOnly(3);
        assert_eq!(payload.size(), 3);
        assert!(payload.as_bytes().is_none());
    }
}
