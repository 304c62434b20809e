//! Run settings.
//!
//! Stored as JSON; every field is optional in the file and falls back to its
//! default. A few fields can be overridden from the environment.

use crate::pipeline::{FailurePolicy, ValidationMode};
use anyhow::{Context as _, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_FAILURE_POLICY: &str = "DATAMORPH_FAILURE_POLICY";
pub const ENV_LOG_LEVEL: &str = "DATAMORPH_LOG_LEVEL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub failure_policy: FailurePolicy,
    pub validation_mode: ValidationMode,
    /// Default `tracing` filter directive, used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Directory for daily rolling log files. Console only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            validation_mode: ValidationMode::default(),
            log_level: "info".to_owned(),
            log_dir: None,
        }
    }
}

impl Settings {
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not valid settings JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings {}", path.display()))
    }

    /// Like [`Settings::load`], but a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// # Errors
    ///
    /// Fails if the settings cannot be serialised or written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `DATAMORPH_FAILURE_POLICY` and `DATAMORPH_LOG_LEVEL`.
    ///
    /// # Errors
    ///
    /// Fails on an unrecognised failure policy.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(
            std::env::var(ENV_FAILURE_POLICY).ok().as_deref(),
            std::env::var(ENV_LOG_LEVEL).ok().as_deref(),
        )
    }

    fn apply_overrides(&mut self, policy: Option<&str>, log_level: Option<&str>) -> Result<()> {
        if let Some(policy) = policy {
            self.failure_policy = parse_failure_policy(policy)?;
        }
        if let Some(level) = log_level
            && !level.is_empty()
        {
            level.clone_into(&mut self.log_level);
        }
        Ok(())
    }
}

/// Accepts `fail_fast`/`fail-fast` and `best_effort`/`best-effort`.
///
/// # Errors
///
/// Fails on anything else.
pub fn parse_failure_policy(value: &str) -> Result<FailurePolicy> {
    match value.trim().to_lowercase().replace('-', "_").as_str() {
        "fail_fast" => Ok(FailurePolicy::FailFast),
        "best_effort" => Ok(FailurePolicy::BestEffort),
        other => bail!("unknown failure policy '{other}' (expected fail_fast or best_effort)"),
    }
}
