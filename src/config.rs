//! Configuration loaded from `~/.config/rks/config.ini`.
//!
//! ```text
//! ~/.config/rks/
//!   config.ini          — User configuration
//!   keys.json           — Provisioning keyfile (default location)
//!   receiver.eeprom     — Receiver EEPROM image (default location)
//!   transmitter.eeprom  — Remote EEPROM image (default location)
//! ```
//!
//! Missing keys fall back to defaults; a missing file is created with a
//! commented template on first run.

use anyhow::{Context, Result};
use configparser::ini::Ini;
use std::fs;
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // [general]
    /// Provisioning keyfile shared by both ends of the simulation.
    pub keyfile: PathBuf,

    // [receiver]
    /// Receiver EEPROM image (16 channel baselines + enable flags).
    pub receiver_eeprom: PathBuf,
    /// Delay after a rejected unlock attempt, in milliseconds.
    pub lockout_ms: u64,

    // [transmitter]
    /// Remote EEPROM image (single rolling code).
    pub transmitter_eeprom: PathBuf,
    /// Channel this remote is provisioned on (0-15).
    pub channel: u8,
    /// Identical frames per trigger press.
    pub burst_len: usize,
}

impl Config {
    /// Build the default config rooted at the given config directory.
    fn default_for(config_dir: &Path) -> Self {
        Self {
            keyfile: config_dir.join("keys.json"),
            receiver_eeprom: config_dir.join("receiver.eeprom"),
            lockout_ms: 5000,
            transmitter_eeprom: config_dir.join("transmitter.eeprom"),
            channel: 0,
            burst_len: crate::protocol::DEFAULT_BURST_LEN,
        }
    }

    /// Load config from an INI file, falling back to defaults for missing
    /// keys.
    fn load_from_ini(path: &Path, config_dir: &Path) -> Result<Self> {
        let mut ini = Ini::new();
        ini.load(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

        let defaults = Config::default_for(config_dir);

        let keyfile = ini
            .get("general", "keyfile")
            .map(|s| expand_tilde(&s))
            .unwrap_or(defaults.keyfile);

        let receiver_eeprom = ini
            .get("receiver", "eeprom_image")
            .map(|s| expand_tilde(&s))
            .unwrap_or(defaults.receiver_eeprom);

        let lockout_ms = ini
            .getuint("receiver", "lockout_ms")
            .ok()
            .flatten()
            .unwrap_or(defaults.lockout_ms);

        let transmitter_eeprom = ini
            .get("transmitter", "eeprom_image")
            .map(|s| expand_tilde(&s))
            .unwrap_or(defaults.transmitter_eeprom);

        let channel = ini
            .getuint("transmitter", "channel")
            .ok()
            .flatten()
            .map(|v| (v as u8) % crate::protocol::MAX_CHANNELS as u8)
            .unwrap_or(defaults.channel);

        let burst_len = ini
            .getuint("transmitter", "burst_len")
            .ok()
            .flatten()
            .map(|v| (v as usize).max(1))
            .unwrap_or(defaults.burst_len);

        Ok(Self {
            keyfile,
            receiver_eeprom,
            lockout_ms,
            transmitter_eeprom,
            channel,
            burst_len,
        })
    }

    /// Save config to an INI-style file with comments explaining each field.
    fn save_to_ini(&self, path: &Path) -> Result<()> {
        let content = format!(
            r#"; rks — Remote Keyless System configuration
; Location: {path}
;
; Edit this file to change default settings.
; Lines starting with ; or # are comments.

[general]
; Provisioning keyfile produced by `rks keygen`. Both ends of a deployment
; group (and of the simulation) load the same file.
; Supports ~ for home directory.
keyfile = {keyfile}

[receiver]
; EEPROM image holding the 16 channel baselines and enable flags.
eeprom_image = {receiver_eeprom}

; Fixed delay after a rejected unlock attempt, in milliseconds.
; Rate-limits brute-force guessing.
lockout_ms = {lockout_ms}

[transmitter]
; EEPROM image holding the remote's rolling code.
eeprom_image = {transmitter_eeprom}

; Channel this remote is provisioned on (0-15).
channel = {channel}

; Identical frames sent per trigger press (line-noise resilience).
burst_len = {burst_len}
"#,
            path = path.display(),
            keyfile = self.keyfile.to_string_lossy(),
            receiver_eeprom = self.receiver_eeprom.to_string_lossy(),
            lockout_ms = self.lockout_ms,
            transmitter_eeprom = self.transmitter_eeprom.to_string_lossy(),
            channel = self.channel,
            burst_len = self.burst_len,
        );

        fs::write(path, content)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        Ok(())
    }
}

/// Expand `~` at the start of a path to the user's home directory.
fn expand_tilde(s: &str) -> PathBuf {
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(s)
}

/// Resolve the rks config directory to `~/.config/rks/` regardless of OS.
pub fn resolve_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("rks"))
}

/// Load the configuration, creating the directory tree and a default
/// `config.ini` on first run.
pub fn load_or_init() -> Result<Config> {
    let config_dir = resolve_config_dir()
        .context("Could not determine home directory (is $HOME set?)")?;
    let config_path = config_dir.join("config.ini");

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config dir: {:?}", config_dir))?;
        tracing::info!("Created config directory: {:?}", config_dir);
    }

    let config = if config_path.exists() {
        tracing::info!("Loading config from {:?}", config_path);
        match Config::load_from_ini(&config_path, &config_dir) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!("Failed to parse config.ini, using defaults: {}", e);
                Config::default_for(&config_dir)
            }
        }
    } else {
        tracing::info!("No config.ini found — creating default at {:?}", config_path);
        let config = Config::default_for(&config_dir);
        if let Err(e) = config.save_to_ini(&config_path) {
            tracing::warn!("Could not write default config.ini: {}", e);
        }
        config
    };

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ini_roundtrip_preserves_fields() {
        let dir = std::env::temp_dir().join("rks-config-test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.ini");

        let mut config = Config::default_for(&dir);
        config.lockout_ms = 1234;
        config.channel = 9;
        config.burst_len = 5;
        config.save_to_ini(&path).unwrap();

        let loaded = Config::load_from_ini(&path, &dir).unwrap();
        assert_eq!(loaded.lockout_ms, 1234);
        assert_eq!(loaded.channel, 9);
        assert_eq!(loaded.burst_len, 5);
        assert_eq!(loaded.keyfile, config.keyfile);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let dir = std::env::temp_dir().join("rks-config-sparse-test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.ini");
        fs::write(&path, "[receiver]\nlockout_ms = 10\n").unwrap();

        let loaded = Config::load_from_ini(&path, &dir).unwrap();
        assert_eq!(loaded.lockout_ms, 10);
        assert_eq!(loaded.channel, 0);
        assert_eq!(loaded.burst_len, crate::protocol::DEFAULT_BURST_LEN);

        fs::remove_file(&path).unwrap();
    }
}
