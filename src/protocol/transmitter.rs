//! Remote transmitter: counter management, marker-avoidance frame
//! construction, and burst transmission.
//!
//! One remote owns one channel, programmed at provisioning time, and one
//! durable rolling code. A trigger press runs the whole
//! build-persist-transmit sequence to completion; a second press landing
//! mid-burst is not observed.

use crate::crypto::blowfish32::Subkeys;
use crate::device::storage::CounterStore;
use crate::device::transport::Transport;

use super::frame::{Frame, FRAME_MARK};
use super::{DEFAULT_BURST_LEN, MAX_CHANNELS};

/// Choose the next counter value and assemble a clean frame.
///
/// The counter is incremented before every attempt, including attempts
/// discarded because [`FRAME_MARK`] showed up in the payload, so no
/// plaintext counter value is ever transmitted twice. Returns the frame and
/// the counter value it consumed.
pub fn next_frame(keys: &Subkeys, channel: u8, counter: u32) -> (Frame, u32) {
    let mut code = counter;
    loop {
        code = code.wrapping_add(1);
        let frame = Frame::assemble(keys, channel, code);
        if frame.is_clean() {
            return (frame, code);
        }
        tracing::debug!(code, "marker collision, burning counter value");
    }
}

/// Transmitter runtime for one provisioned remote.
pub struct Transmitter<S: CounterStore> {
    keys: Subkeys,
    channel: u8,
    store: S,
    burst_len: usize,
}

impl<S: CounterStore> Transmitter<S> {
    pub fn new(keys: Subkeys, channel: u8, store: S) -> Self {
        Self {
            keys,
            channel: channel % MAX_CHANNELS as u8,
            store,
            burst_len: DEFAULT_BURST_LEN,
        }
    }

    pub fn with_burst_len(mut self, burst_len: usize) -> Self {
        self.burst_len = burst_len.max(1);
        self
    }

    #[allow(dead_code)]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one trigger-to-transmit sequence: build the next clean frame,
    /// persist the consumed counter, then send the burst.
    ///
    /// The counter write happens before the first byte leaves, so a power
    /// loss mid-burst can only lose presses, never resurrect an
    /// already-transmitted counter value.
    pub fn trigger<T: Transport>(&mut self, transport: &mut T) {
        let (frame, code) = next_frame(&self.keys, self.channel, self.store.counter());
        self.store.set_counter(code);
        tracing::debug!(
            channel = self.channel,
            code,
            burst = self.burst_len,
            "transmitting"
        );

        for _ in 0..self.burst_len {
            transport.send_byte(FRAME_MARK);
            for &byte in frame.bytes() {
                transport.send_byte(byte);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keygen;
    use crate::device::storage::MemCounterStore;
    use crate::device::transport::{LineError, Loopback};
    use crate::protocol::frame::PAYLOAD_LEN;

    fn keys() -> Subkeys {
        keygen::derive("573BE15A").unwrap()
    }

    #[test]
    fn frames_never_contain_the_marker() {
        let keys = keys();
        let mut code = 0u32;
        // Walk a few thousand consecutive counters; every emitted frame
        // must be marker-free no matter how many attempts were burned.
        for _ in 0..5_000 {
            let (frame, consumed) = next_frame(&keys, 0, code);
            assert!(frame.is_clean());
            assert!(consumed.wrapping_sub(code) >= 1);
            code = consumed;
        }
    }

    #[test]
    fn discarded_attempts_consume_counter_values() {
        let keys = keys();
        // Find a counter whose frame collides with the marker, then check
        // that starting just below it skips past it.
        let mut dirty = None;
        for code in 1..200_000u32 {
            if !Frame::assemble(&keys, 0, code).is_clean() {
                dirty = Some(code);
                break;
            }
        }
        let dirty = dirty.expect("a marker collision exists in any long run");
        let (_, consumed) = next_frame(&keys, 0, dirty - 1);
        assert!(consumed > dirty);
    }

    #[test]
    fn trigger_persists_before_the_burst_and_repeats_the_frame() {
        let keys = keys();
        let mut line = Loopback::new();
        let mut tx = Transmitter::new(keys.clone(), 2, MemCounterStore::new(0)).with_burst_len(3);
        tx.trigger(&mut line);

        let persisted = tx.store().counter();
        assert!(persisted >= 1);
        assert_eq!(line.pending(), 3 * (1 + PAYLOAD_LEN));

        let mut frames = Vec::new();
        for _ in 0..3 {
            assert_eq!(line.recv_byte(), Ok(FRAME_MARK));
            let mut payload = [0u8; PAYLOAD_LEN];
            for slot in &mut payload {
                *slot = line.recv_byte().unwrap();
            }
            frames.push(payload);
        }
        assert_eq!(line.recv_byte(), Err(LineError::Closed));
        assert_eq!(frames[0], frames[1]);
        assert_eq!(frames[1], frames[2]);

        let frame = Frame::parse(frames[0]).unwrap();
        assert_eq!(frame.channel(), 2);
        assert_eq!(frame.counter(&keys), persisted);
    }

    #[test]
    fn successive_triggers_never_repeat_a_counter() {
        let keys = keys();
        let mut line = Loopback::new();
        let mut tx = Transmitter::new(keys, 0, MemCounterStore::new(0)).with_burst_len(1);
        let mut last = 0u32;
        for _ in 0..50 {
            tx.trigger(&mut line);
            let current = tx.store().counter();
            assert!(current > last);
            last = current;
        }
    }
}
