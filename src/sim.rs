//! Loopback simulation: a remote and a receiver wired back-to-back over an
//! in-memory line.
//!
//! Both ends load the same keyfile and persist their counters to EEPROM
//! images, so repeated `rks simulate` runs carry the rolling codes forward
//! exactly like devices surviving power cycles. If the configured channel
//! has no accepted baseline yet the first press is armed as a STORE
//! (pairing); every other press is a normal unlock attempt whose burst
//! should authorize exactly one actuation.

use std::time::Duration;

use anyhow::Result;

use crate::config::Config;
use crate::crypto::blowfish32::Subkeys;
use crate::device::controls::{Command, CountingLatch, ScriptedControls};
use crate::device::panel::ConsolePanel;
use crate::device::storage::{ChannelStore, EepromFile};
use crate::device::transport::Loopback;
use crate::protocol::receiver::{Receiver, RunStats};
use crate::protocol::transmitter::Transmitter;

/// Upper bound on the simulated lockout delay. The real receiver sits
/// through the full configured delay; the simulation only needs enough to
/// show the rejected duplicates without stalling the run.
const MAX_SIM_LOCKOUT: Duration = Duration::from_millis(25);

/// Aggregate outcome of a simulation run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimReport {
    pub presses: u32,
    pub stats: RunStats,
    pub unlocks: u32,
}

/// Drive `presses` trigger presses through the loopback line.
pub fn run(config: &Config, keys: Subkeys, presses: u32, burst_len: usize) -> Result<SimReport> {
    let mut line = Loopback::new();

    let tx_store = EepromFile::open(&config.transmitter_eeprom)?;
    let rx_store = EepromFile::open(&config.receiver_eeprom)?;

    // Pair automatically when the channel has no baseline yet.
    let pair = !rx_store.enabled(config.channel);
    if pair {
        tracing::info!(
            channel = config.channel,
            "channel has no baseline - first press will STORE"
        );
    }
    let script = if pair {
        vec![Command::StoreChannel]
    } else {
        Vec::new()
    };

    let mut tx =
        Transmitter::new(keys.clone(), config.channel, tx_store).with_burst_len(burst_len);
    let mut rx = Receiver::new(
        keys,
        rx_store,
        line.clone(),
        ConsolePanel::new(),
        ScriptedControls::new(script, true),
        CountingLatch::default(),
    )
    .with_lockout(Duration::from_millis(config.lockout_ms).min(MAX_SIM_LOCKOUT));

    let mut report = SimReport {
        presses,
        ..Default::default()
    };

    for press in 1..=presses {
        tracing::info!(press, "trigger");
        tx.trigger(&mut line);
        let stats = rx.run();
        report.stats.accepted += stats.accepted;
        report.stats.rejected += stats.rejected;
        report.stats.stored += stats.stored;
        report.stats.resets += stats.resets;
    }
    report.unlocks = rx.latch.unlocks;

    tracing::info!(
        accepted = report.stats.accepted,
        rejected = report.stats.rejected,
        stored = report.stats.stored,
        unlocks = report.unlocks,
        "simulation complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keygen;

    fn test_config(dir: &std::path::Path) -> Config {
        Config {
            keyfile: dir.join("keys.json"),
            receiver_eeprom: dir.join("receiver.eeprom"),
            lockout_ms: 0,
            transmitter_eeprom: dir.join("transmitter.eeprom"),
            channel: 1,
            burst_len: 4,
        }
    }

    #[test]
    fn rolling_codes_survive_simulated_power_cycles() {
        let dir = std::env::temp_dir().join("rks-sim-test");
        std::fs::create_dir_all(&dir).unwrap();
        let config = test_config(&dir);
        let _ = std::fs::remove_file(&config.receiver_eeprom);
        let _ = std::fs::remove_file(&config.transmitter_eeprom);

        let keys = keygen::derive("573BE15A").unwrap();

        // First run pairs on press 1, then unlocks twice.
        let report = run(&config, keys.clone(), 3, 4).unwrap();
        assert_eq!(report.stats.stored, 1);
        assert_eq!(report.stats.accepted, 2);
        assert_eq!(report.unlocks, 2);

        // Second run reopens the images: no re-pairing, every press is one
        // unlock, duplicates all rejected.
        let report = run(&config, keys, 2, 4).unwrap();
        assert_eq!(report.stats.stored, 0);
        assert_eq!(report.stats.accepted, 2);
        assert_eq!(report.stats.rejected, 2 * 3);
        assert_eq!(report.unlocks, 2);

        let _ = std::fs::remove_file(&config.receiver_eeprom);
        let _ = std::fs::remove_file(&config.transmitter_eeprom);
    }
}
