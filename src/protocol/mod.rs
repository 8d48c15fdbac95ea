//! Rolling-code protocol: frame codec, remote transmitter, and receiver
//! state machine.
//!
//! A remote encrypts a strictly increasing counter and sends it with its
//! channel id and a CRC-8. The receiver keeps an expected counter per
//! channel and accepts a frame only when the decrypted counter falls inside
//! a forward window of [`ROLLING_WINDOW`] values, so a recorded
//! transmission is dead the moment the receiver has heard it (or anything
//! after it). All sixteen channels share one cipher key and differ only in
//! their counters; disabling a channel therefore revokes a lost remote's
//! baseline but not the deployment key.

pub mod frame;
pub mod receiver;
pub mod transmitter;

/// Number of independently provisioned channels per receiver.
pub const MAX_CHANNELS: usize = 16;

/// Tolerance band of acceptable future counter values. Absorbs presses the
/// receiver never heard; anything at or past the window edge is rejected.
pub const ROLLING_WINDOW: u32 = 0x0400;

/// Frames repeated per trigger press for line-noise resilience. Only the
/// first accepted copy can authorize anything; the rest fall out of the
/// window it just advanced.
pub const DEFAULT_BURST_LEN: usize = 16;
