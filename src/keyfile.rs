//! Keyfile: the provisioning artifact produced by `rks keygen`.
//!
//! A JSON document carrying the derived subkey tables plus enough metadata
//! to tell deployments apart. Every device of a deployment group is flashed
//! from the same keyfile; the seed itself is never written anywhere.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::blowfish32::Subkeys;

/// Format tag; a keyfile without it is rejected outright.
pub const KEYFILE_FORMAT: &str = "rks-keys";

/// Current keyfile version.
pub const KEYFILE_VERSION: &str = "1.0";

/// Top-level keyfile structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct Keyfile {
    pub format: String,
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub subkeys: Subkeys,
}

impl Keyfile {
    /// Wrap freshly derived subkeys with generation metadata.
    pub fn new(subkeys: Subkeys) -> Self {
        Self {
            format: KEYFILE_FORMAT.to_string(),
            version: KEYFILE_VERSION.to_string(),
            generated_at: Utc::now(),
            subkeys,
        }
    }

    /// Write the keyfile as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create key directory {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize keyfile")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write keyfile {:?}", path))?;
        tracing::info!("Wrote keyfile to {:?}", path);
        Ok(())
    }

    /// Load and validate a keyfile, returning the embedded subkey tables.
    pub fn load(path: &Path) -> Result<Subkeys> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read keyfile {:?}", path))?;
        let keyfile: Keyfile =
            serde_json::from_str(&data).with_context(|| format!("Malformed keyfile {:?}", path))?;
        if keyfile.format != KEYFILE_FORMAT {
            bail!(
                "{:?} is not a keyfile (format tag {:?})",
                path,
                keyfile.format
            );
        }
        Ok(keyfile.subkeys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keygen;

    #[test]
    fn json_roundtrip_preserves_every_word() {
        let subkeys = keygen::derive("573BE15A").unwrap();
        let keyfile = Keyfile::new(subkeys.clone());
        let json = serde_json::to_string(&keyfile).unwrap();
        let back: Keyfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back.subkeys, subkeys);
        assert_eq!(back.format, KEYFILE_FORMAT);
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join("rks-keyfile-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("keys.json");

        let subkeys = keygen::derive("0BADC0DE").unwrap();
        Keyfile::new(subkeys.clone()).save(&path).unwrap();
        assert_eq!(Keyfile::load(&path).unwrap(), subkeys);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn wrong_shape_or_tag_is_rejected() {
        let dir = std::env::temp_dir().join("rks-keyfile-reject-test");
        std::fs::create_dir_all(&dir).unwrap();

        let bad_tag = dir.join("bad_tag.json");
        let mut keyfile = Keyfile::new(keygen::derive("AA").unwrap());
        keyfile.format = "something-else".to_string();
        std::fs::write(&bad_tag, serde_json::to_string(&keyfile).unwrap()).unwrap();
        assert!(Keyfile::load(&bad_tag).is_err());

        let truncated = dir.join("truncated.json");
        std::fs::write(&truncated, r#"{"format":"rks-keys","subkeys":{"p":[1,2]}}"#).unwrap();
        assert!(Keyfile::load(&truncated).is_err());

        std::fs::remove_file(&bad_tag).unwrap();
        std::fs::remove_file(&truncated).unwrap();
    }
}
