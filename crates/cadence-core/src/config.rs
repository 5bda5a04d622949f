//! Engine configuration
//!
//! Defaults are usable as-is. Deployments can override them from a JSON file
//! or from `CADENCE_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{EngineError, Result};
use crate::policy::PolicyConfig;

/// Level at or above which an item counts as mastered
pub const DEFAULT_MASTERY_THRESHOLD: u32 = 12;

/// New items a user may start per calendar day
pub const DEFAULT_DAILY_NEW_CAP: usize = 20;

/// Largest batch a single session request may ask for
pub const DEFAULT_MAX_SESSION_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub mastery_threshold: u32,
    pub daily_new_cap: usize,
    pub max_session_limit: usize,
    pub policy: PolicyConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mastery_threshold: DEFAULT_MASTERY_THRESHOLD,
            daily_new_cap: DEFAULT_DAILY_NEW_CAP,
            max_session_limit: DEFAULT_MAX_SESSION_LIMIT,
            policy: PolicyConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `CADENCE_MASTERY_THRESHOLD`, `CADENCE_DAILY_NEW_CAP`
    /// and `CADENCE_MAX_SESSION_LIMIT`
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(v) = env_number::<u32>("CADENCE_MASTERY_THRESHOLD")? {
            self.mastery_threshold = v;
        }
        if let Some(v) = env_number::<usize>("CADENCE_DAILY_NEW_CAP")? {
            self.daily_new_cap = v;
        }
        if let Some(v) = env_number::<usize>("CADENCE_MAX_SESSION_LIMIT")? {
            self.max_session_limit = v;
        }
        self.validate()?;
        Ok(self)
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Validation(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        let config: EngineConfig = serde_json::from_str(&raw).map_err(|e| {
            EngineError::Validation(format!("Invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.mastery_threshold == 0 {
            return Err(EngineError::Validation(
                "masteryThreshold must be at least 1".into(),
            ));
        }
        if self.max_session_limit == 0 {
            return Err(EngineError::Validation(
                "maxSessionLimit must be at least 1".into(),
            ));
        }
        self.policy.validate()
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| EngineError::Validation(format!("{} is not a valid number: {}", name, raw))),
        _ => Ok(None),
    }
}
