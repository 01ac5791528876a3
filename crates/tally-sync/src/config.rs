//! # Sync Configuration
//!
//! Tunables for the managed-split layer, loadable from the terminal's
//! `tally.toml`. Every field has a sensible default, so a missing file or
//! an empty `[sync]` table is valid configuration.
//!
//! ```toml
//! [sync]
//! debounce_ms = 200        # peer-change reload debounce
//! fallback_poll_secs = 20  # disconnected reload interval
//! commit_timeout_secs = 10 # bound on any single remote commit
//! ```

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Defaults
// =============================================================================

/// Peer notifications within this window coalesce into one reload.
const DEFAULT_DEBOUNCE_MS: u64 = 200;

/// Reload interval while the realtime channel is unavailable.
const DEFAULT_FALLBACK_POLL_SECS: u64 = 20;

/// A stalled commit is failed (and rolled back) after this long. The
/// original system left stalled commits in-flight forever; bounding them
/// keeps the single-flight guard from wedging a terminal.
const DEFAULT_COMMIT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// Sync Config
// =============================================================================

/// Managed-split tunables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SyncConfig {
    /// Debounce window for peer-change reloads, in milliseconds.
    pub debounce_ms: u64,

    /// Fallback poll interval when disconnected, in seconds.
    pub fallback_poll_secs: u64,

    /// Upper bound on any single remote commit, in seconds.
    pub commit_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            fallback_poll_secs: DEFAULT_FALLBACK_POLL_SECS,
            commit_timeout_secs: DEFAULT_COMMIT_TIMEOUT_SECS,
        }
    }
}

/// Wrapper matching the `[sync]` table in `tally.toml`.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    sync: SyncConfig,
}

impl SyncConfig {
    /// Parses a `tally.toml` document, using defaults for missing fields.
    pub fn from_toml_str(text: &str) -> SyncResult<Self> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| SyncError::InvalidConfig(e.to_string()))?;
        let config = file.sync;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file path.
    pub fn load(path: impl AsRef<Path>) -> SyncResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| SyncError::InvalidConfig(e.to_string()))?;
        Self::from_toml_str(&text)
    }

    /// Rejects configurations that would disable the safety bounds.
    pub fn validate(&self) -> SyncResult<()> {
        if self.commit_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "commit_timeout_secs must be at least 1".into(),
            ));
        }
        if self.fallback_poll_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "fallback_poll_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Debounce window as a Duration.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Fallback poll interval as a Duration.
    pub fn fallback_poll(&self) -> Duration {
        Duration::from_secs(self.fallback_poll_secs)
    }

    /// Commit timeout as a Duration.
    pub fn commit_timeout(&self) -> Duration {
        Duration::from_secs(self.commit_timeout_secs)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
