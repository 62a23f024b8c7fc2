//! TLV payload encoding for the two broadcast wire formats (§6): little
//! endian throughout, `u8 type || u8 length || value` per field.

struct TlvWriter {
    buf: Vec<u8>,
}

impl TlvWriter {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn field(mut self, tag: u8, value: &[u8]) -> Self {
        self.buf.push(tag);
        self.buf.push(value.len() as u8);
        self.buf.extend_from_slice(value);
        self
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// `u16 version || TLV{0=timestamp_ms:u64, 1=timezone_offset_s:i32}` (§6, §4.10).
pub fn encode_rtc_payload(version: u16, timestamp_ms: u64, timezone_offset_s: i32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2 + 10 + 6);
    buf.extend_from_slice(&version.to_le_bytes());
    let tlv = TlvWriter::new()
        .field(0, &timestamp_ms.to_le_bytes())
        .field(1, &timezone_offset_s.to_le_bytes())
        .finish();
    buf.extend_from_slice(&tlv);
    buf
}

/// `TLV{1=version:u8, 2=gateway_status:u8, 3=rtc_timestamp_ms:u64,
/// 4=timezone_offset_mn:i16, 5=keep_alive_interval_s:u16}` (§6, §4.10).
pub fn encode_keep_alive_payload(
    version: u8,
    gateway_status: u8,
    rtc_timestamp_ms: u64,
    timezone_offset_mn: i16,
    keep_alive_interval_s: u16,
) -> Vec<u8> {
    TlvWriter::new()
        .field(1, &version.to_le_bytes())
        .field(2, &gateway_status.to_le_bytes())
        .field(3, &rtc_timestamp_ms.to_le_bytes())
        .field(4, &timezone_offset_mn.to_le_bytes())
        .field(5, &keep_alive_interval_s.to_le_bytes())
        .finish()
}

/// Bit 0 of `gateway_status`: the current MQTT connection state (§4.10).
pub fn gateway_status_byte(mqtt_connected: bool) -> u8 {
    mqtt_connected as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtc_payload_matches_the_documented_byte_layout() {
        // S6: period=1200s, timezone_offset_s=7200, timestamp_ms arbitrary.
        let payload = encode_rtc_payload(1, 0x0800_0000_0000_0000, 7200);
        assert_eq!(payload[0..2], [0x01, 0x00]);
        assert_eq!(payload[2], 0); // type 0 = timestamp_ms
        assert_eq!(payload[3], 8); // length 8
        assert_eq!(payload[12], 1); // type 1 = timezone_offset_s
        assert_eq!(payload[13], 4); // length 4
        assert_eq!(&payload[14..18], &7200i32.to_le_bytes());
    }

    #[test]
    fn keep_alive_payload_matches_the_documented_byte_layout() {
        let payload = encode_keep_alive_payload(1, gateway_status_byte(true), 42, -60, 300);
        assert_eq!(payload[0], 1);
        assert_eq!(payload[1], 1);
        assert_eq!(payload[2], 1); // version = 1
        assert_eq!(payload[3], 2);
        assert_eq!(payload[4], 1);
        assert_eq!(payload[5], 1); // gateway_status = 1 (connected)
        assert_eq!(payload[6], 3);
        assert_eq!(payload[7], 8);
        assert_eq!(&payload[8..16], &42u64.to_le_bytes());
        assert_eq!(payload[16], 4);
        assert_eq!(payload[17], 2);
        assert_eq!(&payload[18..20], &(-60i16).to_le_bytes());
        assert_eq!(payload[20], 5);
        assert_eq!(payload[21], 2);
        assert_eq!(&payload[22..24], &300u16.to_le_bytes());
    }
}
