//! Receiver side: the per-channel authentication state machine and the
//! blocking event loop that feeds it one checksum-valid frame at a time.
//!
//! A channel is either disabled (no accepted baseline) or enabled with an
//! expected counter. STORE adopts a transmitted counter unconditionally;
//! it is the pairing operation. LOAD accepts a counter only inside the
//! forward window and advances the baseline past it before anything
//! physical happens. RESET drops back to disabled, gated by the operator
//! confirmation gesture.

use std::time::Duration;

use crate::crypto::blowfish32::Subkeys;
use crate::device::controls::{Command, Controls, Latch, LedPattern, ResetScope};
use crate::device::panel::Panel;
use crate::device::storage::ChannelStore;
use crate::device::transport::{LineError, Transport};

use super::frame::{Frame, FRAME_MARK, PAYLOAD_LEN};
use super::{MAX_CHANNELS, ROLLING_WINDOW};

/// What the state machine did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// LOAD accepted; the stored window advanced past the frame's counter.
    Accepted,
    /// LOAD rejected: replayed, too far ahead, or disabled channel.
    Rejected,
    /// STORE pairing completed.
    Stored,
    /// Reset performed.
    ResetDone,
    /// Reset cancelled by the confirmation gesture.
    ResetCancelled,
}

/// The rolling-code state machine over a durable channel store.
///
/// Pure protocol logic: no transport, no display, no delays. The event
/// loop in [`Receiver`] wires it to the outside world.
pub struct ChannelBank<S: ChannelStore> {
    store: S,
}

impl<S: ChannelStore> ChannelBank<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[allow(dead_code)]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// LOAD: accept iff the channel is enabled and the counter falls inside
    /// the forward window. On acceptance the advanced baseline is persisted
    /// before this returns; the unlock that follows can only happen after
    /// the durable write.
    pub fn load(&mut self, chan: u8, counter: u32) -> bool {
        if !self.store.enabled(chan) {
            return false;
        }
        let expected = self.store.counter(chan);
        if counter.wrapping_sub(expected) >= ROLLING_WINDOW {
            return false;
        }
        self.store.set_counter(chan, counter.wrapping_add(1));
        true
    }

    /// STORE: unconditionally adopt the transmitted counter as the new
    /// baseline and enable the channel. This is the first-pairing
    /// operation, so there is no prior-state check.
    pub fn store_baseline(&mut self, chan: u8, counter: u32) {
        self.store.set_counter(chan, counter.wrapping_add(1));
        self.store.set_enabled(chan, true);
    }

    /// RESET: disable one channel or every channel, discarding baselines.
    pub fn reset(&mut self, scope: ResetScope) {
        match scope {
            ResetScope::One(chan) => self.store.set_enabled(chan, false),
            ResetScope::All => {
                for chan in 0..MAX_CHANNELS as u8 {
                    self.store.set_enabled(chan, false);
                }
            }
        }
    }
}

/// Receiver runtime: owns the collaborators and processes exactly one
/// frame per iteration, never pipelining.
pub struct Receiver<S, T, P, C, L>
where
    S: ChannelStore,
    T: Transport,
    P: Panel,
    C: Controls,
    L: Latch,
{
    keys: Subkeys,
    pub bank: ChannelBank<S>,
    pub transport: T,
    pub panel: P,
    pub controls: C,
    pub latch: L,
    /// Fixed delay after every rejected LOAD; rate-limits guessing.
    pub lockout: Duration,
}

/// Tally of verdicts from a receiver run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub accepted: u32,
    pub rejected: u32,
    pub stored: u32,
    pub resets: u32,
}

impl<S, T, P, C, L> Receiver<S, T, P, C, L>
where
    S: ChannelStore,
    T: Transport,
    P: Panel,
    C: Controls,
    L: Latch,
{
    pub fn new(keys: Subkeys, store: S, transport: T, panel: P, controls: C, latch: L) -> Self {
        Self {
            keys,
            bank: ChannelBank::new(store),
            transport,
            panel,
            controls,
            latch,
            lockout: Duration::from_millis(5000),
        }
    }

    pub fn with_lockout(mut self, lockout: Duration) -> Self {
        self.lockout = lockout;
        self
    }

    /// Block until one checksum-valid payload is assembled. Corrupt bytes
    /// and checksum mismatches restart the hunt for a marker; `None` means
    /// the transport closed (loopback runs only).
    fn receive_frame(&mut self) -> Option<Frame> {
        loop {
            // Hunt for the frame marker.
            match self.transport.recv_byte() {
                Ok(FRAME_MARK) => {}
                Ok(_) | Err(LineError::Corrupt) => continue,
                Err(LineError::Closed) => return None,
            }

            // Collect the payload.
            let mut bytes = [0u8; PAYLOAD_LEN];
            let mut ok = true;
            for slot in &mut bytes {
                match self.transport.recv_byte() {
                    Ok(b) => *slot = b,
                    Err(LineError::Corrupt) => {
                        ok = false;
                        break;
                    }
                    Err(LineError::Closed) => return None,
                }
            }
            if !ok {
                continue;
            }

            match Frame::parse(bytes) {
                Some(frame) => return Some(frame),
                // Checksum mismatch: silent discard, resume waiting.
                None => tracing::trace!("frame failed CRC gate"),
            }
        }
    }

    /// Receive and process exactly one frame. Returns `None` once the
    /// transport has closed.
    pub fn step(&mut self) -> Option<Verdict> {
        let frame = self.receive_frame()?;
        let chan = frame.channel();
        let counter = frame.counter(&self.keys);

        let verdict = match self.controls.command() {
            Command::Normal => {
                if self.bank.load(chan, counter) {
                    Verdict::Accepted
                } else {
                    Verdict::Rejected
                }
            }
            Command::StoreChannel => {
                self.bank.store_baseline(chan, counter);
                Verdict::Stored
            }
            Command::ResetChannel => self.run_reset(ResetScope::One(chan)),
            Command::ResetAll => self.run_reset(ResetScope::All),
        };

        self.render(&frame, counter, chan, verdict);

        match verdict {
            // The baseline is already durable (load() wrote it), so the
            // bolt may move now.
            Verdict::Accepted => self.latch.unlock(),
            Verdict::Rejected => std::thread::sleep(self.lockout),
            _ => {}
        }

        tracing::info!(chan, counter, ?verdict, "frame processed");
        Some(verdict)
    }

    /// Drain the transport until it closes. Firmware would loop forever;
    /// simulations and tests run until the line goes quiet.
    pub fn run(&mut self) -> RunStats {
        let mut stats = RunStats::default();
        while let Some(verdict) = self.step() {
            match verdict {
                Verdict::Accepted => stats.accepted += 1,
                Verdict::Rejected => stats.rejected += 1,
                Verdict::Stored => stats.stored += 1,
                Verdict::ResetDone => stats.resets += 1,
                Verdict::ResetCancelled => {}
            }
        }
        stats
    }

    fn run_reset(&mut self, scope: ResetScope) -> Verdict {
        self.controls.leds(LedPattern::Command);
        if self.controls.confirm_reset(scope) {
            self.bank.reset(scope);
            Verdict::ResetDone
        } else {
            Verdict::ResetCancelled
        }
    }

    fn render(&mut self, frame: &Frame, counter: u32, chan: u8, verdict: Verdict) {
        match verdict {
            Verdict::Accepted | Verdict::Rejected => {
                let (title, leds) = match verdict {
                    Verdict::Accepted => ("Valid PassCode", LedPattern::Valid),
                    _ => ("Invalid PassCode", LedPattern::Invalid),
                };
                self.controls.leds(leds);
                self.panel.render_text(0, 2, title);
                self.panel.render_text(1, 0, "Code:");
                self.panel.render_hexdump(1, 8, frame.bytes());
                self.panel.render_text(2, 0, "Entry Key:");
                self.panel.render_hexdump(2, 12, &counter.to_le_bytes());
                self.panel.render_text(3, 0, "Channel:");
                self.panel.render_text(3, 18, "0");
                self.panel.render_hex(3, 19, chan);
            }
            Verdict::Stored => {
                self.controls.leds(LedPattern::Command);
                self.panel.render_text(0, 3, "Store PassCode");
                self.panel.render_text(2, 0, "Entry Key:");
                self.panel.render_hexdump(2, 12, &counter.to_le_bytes());
                self.panel.render_text(3, 0, "Channel:");
                self.panel.render_text(3, 18, "0");
                self.panel.render_hex(3, 19, chan);
            }
            Verdict::ResetDone | Verdict::ResetCancelled => {
                self.panel.render_text(0, 6, "Command");
                self.panel.render_text(1, 2, "Channel Reset");
                let done = verdict == Verdict::ResetDone;
                self.controls.leds(if done {
                    LedPattern::Command
                } else {
                    LedPattern::Invalid
                });
                self.panel
                    .render_text(2, 6, if done { "Completed!" } else { "Canceled!" });
            }
        }
        self.panel.clear();
    }
}
