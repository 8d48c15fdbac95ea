//! Wire frame codec.
//!
//! A transmission is the reserved marker byte followed by a 6-byte payload:
//!
//! ```text
//! +------+----+----+----+----+------+-----+
//! | MARK | C0 | C1 | C2 | C3 | CHAN | CRC |
//! +------+----+----+----+----+------+-----+
//! ```
//!
//! C0..C3 is the encrypted rolling code, little-endian. CRC covers the five
//! bytes before it. The marker never appears inside a payload: the
//! transmitter discards any assembled payload containing it and retries
//! with the next counter value instead of byte-stuffing, burning the
//! discarded counter permanently.

use crate::crypto::blowfish32::{self, Subkeys};
use crate::crypto::crc8::crc8_ccitt;

use super::MAX_CHANNELS;

/// Reserved start-of-frame marker.
pub const FRAME_MARK: u8 = 0b1001_0110;

/// Payload length, marker not included.
pub const PAYLOAD_LEN: usize = 6;

/// A 6-byte frame payload with a consistent checksum.
///
/// Values exist either because [`Frame::assemble`] computed the checksum or
/// because [`Frame::parse`] verified it, so holding a `Frame` means the
/// CRC gate has been passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; PAYLOAD_LEN],
}

impl Frame {
    /// Assemble the payload for a channel and an already-chosen counter
    /// value. Marker-avoidance retries belong to the caller (see
    /// [`super::transmitter::next_frame`]).
    pub fn assemble(keys: &Subkeys, channel: u8, counter: u32) -> Self {
        let mut bytes = [0u8; PAYLOAD_LEN];
        bytes[..4].copy_from_slice(&blowfish32::encrypt(keys, counter).to_le_bytes());
        bytes[4] = channel;
        bytes[5] = crc8_ccitt(&bytes[..5]);
        Self { bytes }
    }

    /// Accept a received payload only if its trailing CRC matches the five
    /// bytes before it. Anything else is line noise and is dropped here,
    /// before the cipher or the channel state machine see it.
    pub fn parse(bytes: [u8; PAYLOAD_LEN]) -> Option<Self> {
        (crc8_ccitt(&bytes[..5]) == bytes[5]).then_some(Self { bytes })
    }

    /// True when no payload byte collides with [`FRAME_MARK`].
    pub fn is_clean(&self) -> bool {
        self.bytes.iter().all(|&b| b != FRAME_MARK)
    }

    /// Channel id, reduced modulo the channel count.
    pub fn channel(&self) -> u8 {
        self.bytes[4] % MAX_CHANNELS as u8
    }

    /// Decrypt the rolling code carried by this frame.
    pub fn counter(&self, keys: &Subkeys) -> u32 {
        let cipher = u32::from_le_bytes(self.bytes[..4].try_into().unwrap());
        blowfish32::decrypt(keys, cipher)
    }

    /// Raw payload bytes, marker not included.
    pub fn bytes(&self) -> &[u8; PAYLOAD_LEN] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keygen;

    fn keys() -> Subkeys {
        keygen::derive("573BE15A").unwrap()
    }

    #[test]
    fn assemble_then_parse_recovers_the_counter() {
        let keys = keys();
        let frame = Frame::assemble(&keys, 0x0C, 0x0012_3456);
        let parsed = Frame::parse(*frame.bytes()).expect("checksum must hold");
        assert_eq!(parsed.channel(), 0x0C);
        assert_eq!(parsed.counter(&keys), 0x0012_3456);
    }

    #[test]
    fn layout_pins_channel_and_crc_offsets() {
        let keys = keys();
        let frame = Frame::assemble(&keys, 0x05, 42);
        let bytes = frame.bytes();
        assert_eq!(bytes[4], 0x05);
        assert_eq!(bytes[5], crc8_ccitt(&bytes[..5]));
    }

    #[test]
    fn corrupted_payloads_fail_the_crc_gate() {
        let keys = keys();
        let frame = Frame::assemble(&keys, 3, 99);
        for i in 0..PAYLOAD_LEN {
            let mut bytes = *frame.bytes();
            bytes[i] ^= 0x01;
            assert!(Frame::parse(bytes).is_none(), "flip in byte {i} must fail");
        }
    }

    #[test]
    fn out_of_range_channel_byte_wraps() {
        let keys = keys();
        let frame = Frame::assemble(&keys, 0x1A, 7);
        let parsed = Frame::parse(*frame.bytes()).unwrap();
        assert_eq!(parsed.channel(), 0x0A);
    }
}
