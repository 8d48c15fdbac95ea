//! Operator controls and actuation on the receiver.
//!
//! The mode inputs decide which transition an incoming frame drives; the
//! confirmation gesture gates a reset so a brushed button cannot wipe
//! channel baselines; the LEDs and the latch are pure outputs. All of it is
//! sampled or driven by the single receiver loop, one frame at a time.

/// Which transition the operator has armed for the next received frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    /// No mode inputs held: a normal unlock attempt.
    #[default]
    Normal,
    /// Adopt the transmitted code as the channel's new baseline.
    StoreChannel,
    /// Disable the frame's channel.
    ResetChannel,
    /// Disable every channel.
    ResetAll,
}

/// Scope of a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
    One(u8),
    All,
}

/// Status LED patterns, encoded as the port value driving the LED bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LedPattern {
    Off = 0x00,
    Invalid = 0x30,
    Valid = 0x50,
    Command = 0x90,
}

/// Receiver front-panel inputs and indicators.
pub trait Controls {
    /// Sample the mode inputs. Read once per received frame.
    fn command(&mut self) -> Command;

    /// Run the confirmation gesture for a reset (a countdown the operator
    /// can abort on reference hardware). Returns false to cancel; the
    /// channel baselines are untouched in that case.
    fn confirm_reset(&mut self, scope: ResetScope) -> bool;

    /// Drive the status LEDs.
    fn leds(&mut self, pattern: LedPattern);
}

/// The door bolt. Only ever driven after the advanced counter is durable.
pub trait Latch {
    /// Run one unlock-relock actuation cycle.
    fn unlock(&mut self);
}

// ─── Scripted implementations (simulation and tests) ─────────────────────────

/// Controls fed from a pre-arranged command script. Once the script runs
/// out every frame is a normal unlock attempt.
#[derive(Debug, Clone, Default)]
pub struct ScriptedControls {
    script: std::collections::VecDeque<Command>,
    /// Whether the confirmation gesture approves resets.
    pub confirm: bool,
    /// Last LED pattern driven, for assertions.
    #[allow(dead_code)]
    pub last_leds: Option<LedPattern>,
}

impl ScriptedControls {
    pub fn new(script: impl IntoIterator<Item = Command>, confirm: bool) -> Self {
        Self {
            script: script.into_iter().collect(),
            confirm,
            last_leds: None,
        }
    }
}

impl Controls for ScriptedControls {
    fn command(&mut self) -> Command {
        self.script.pop_front().unwrap_or_default()
    }

    fn confirm_reset(&mut self, scope: ResetScope) -> bool {
        tracing::debug!(?scope, confirmed = self.confirm, "reset gesture");
        self.confirm
    }

    fn leds(&mut self, pattern: LedPattern) {
        self.last_leds = Some(pattern);
    }
}

/// Latch that counts actuations instead of moving a motor.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountingLatch {
    pub unlocks: u32,
}

impl Latch for CountingLatch {
    fn unlock(&mut self) {
        self.unlocks += 1;
        tracing::info!("bolt unlock cycle #{}", self.unlocks);
    }
}
