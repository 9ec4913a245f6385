//! Configuration for the synchronization engine.
//!
//! Layered precedence: built-in defaults, then an optional config file
//! (~/.config/codescan/sync.toml), then CODESCAN_* environment variables.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

fn default_max_batch_size() -> usize {
    100
}

fn default_initial_delay_secs() -> u64 {
    60
}

fn default_max_jitter_secs() -> u64 {
    30
}

fn default_loop_delay_secs() -> u64 {
    300
}

fn default_grace_secs() -> u64 {
    300
}

fn default_sweep_batch_size() -> usize {
    100
}

/// Settings for the background recovery sweeper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSettings {
    /// Delay before the first sweep after startup.
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,

    /// Maximum random delay added to the initial delay, to spread sweeps
    /// across nodes started together.
    #[serde(default = "default_max_jitter_secs")]
    pub max_jitter_secs: u64,

    /// Delay between sweep ticks.
    #[serde(default = "default_loop_delay_secs")]
    pub loop_delay_secs: u64,

    /// Minimum age of a queue item before a sweep picks it up. Keeps the
    /// sweeper from racing the synchronous pass that follows a commit.
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,

    /// Maximum queue items fetched per sweep pass.
    #[serde(default = "default_sweep_batch_size")]
    pub batch_size: usize,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_initial_delay_secs(),
            max_jitter_secs: default_max_jitter_secs(),
            loop_delay_secs: default_loop_delay_secs(),
            grace_secs: default_grace_secs(),
            batch_size: default_sweep_batch_size(),
        }
    }
}

/// Settings for the synchronization engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Maximum documents per bulk batch before an inline flush.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    #[serde(default)]
    pub sweep: SweepSettings,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            sweep: SweepSettings::default(),
        }
    }
}

impl SyncSettings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/codescan/sync.toml)
    /// 3. Explicit config file (optional, higher precedence)
    /// 4. Environment variables (CODESCAN_*)
    pub fn load(explicit_config_path: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir = ProjectDirs::from("", "", "codescan")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        let default_config_path = config_dir.join("sync");

        let mut builder = Config::builder()
            .add_source(Config::try_from(&SyncSettings::default())?)
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = explicit_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("CODESCAN")
                .separator("__")
                .try_parsing(true),
        );

        let settings: SyncSettings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::Invalid("max_batch_size must be > 0".into()));
        }
        if self.sweep.batch_size == 0 {
            return Err(ConfigError::Invalid("sweep.batch_size must be > 0".into()));
        }
        if self.sweep.loop_delay_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep.loop_delay_secs must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = SyncSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.max_batch_size, 100);
        assert_eq!(settings.sweep.loop_delay_secs, 300);
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let settings = SyncSettings {
            max_batch_size: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.toml");
        std::fs::write(
            &path,
            "max_batch_size = 7\n\n[sweep]\nloop_delay_secs = 11\n",
        )
        .unwrap();

        let settings = SyncSettings::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(settings.max_batch_size, 7);
        assert_eq!(settings.sweep.loop_delay_secs, 11);
        // untouched keys keep their defaults
        assert_eq!(settings.sweep.batch_size, 100);
    }
}
