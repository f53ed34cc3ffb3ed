//! Crate configuration: database location and hash work factor.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::hash::DEFAULT_ITERATION_COUNT;

/// Configuration for the credential engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Path of the SQLite credential database.
    pub db_path: PathBuf,
    /// Work factor for newly computed hashes. Stored hashes keep working at
    /// their own recorded count; raising this only affects future hashes.
    pub hash_iteration_count: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("credentials.db"),
            hash_iteration_count: DEFAULT_ITERATION_COUNT,
        }
    }
}

impl AuthConfig {
    /// Load configuration from a TOML file. Missing fields fall back to
    /// defaults; unknown fields are rejected.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_sensible() {
        let cfg = AuthConfig::default();
        assert_eq!(cfg.db_path, PathBuf::from("credentials.db"));
        assert_eq!(cfg.hash_iteration_count, DEFAULT_ITERATION_COUNT);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "hash_iteration_count = 200000").unwrap();
        let cfg = AuthConfig::load(f.path()).unwrap();
        assert_eq!(cfg.hash_iteration_count, 200_000);
        assert_eq!(cfg.db_path, PathBuf::from("credentials.db"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "lockout_threshold = 3").unwrap();
        assert!(AuthConfig::load(f.path()).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(AuthConfig::load(Path::new("/nonexistent/credgate.toml")).is_err());
    }
}
