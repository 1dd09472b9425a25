//! Configuration management

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Path to configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Base tick interval (milliseconds)
    pub interval_ms: u64,

    /// Align ticks to `offset_ms` past each interval boundary
    pub align: bool,

    /// Phase offset within each interval (milliseconds)
    pub offset_ms: u64,

    /// Pick the offset at random instead of using `offset_ms`
    pub random_offset: bool,

    /// Forward one random tick per this many milliseconds (0 = every tick)
    pub sample_interval_ms: u64,

    /// Seed for the random offset and the sampler (None = seeded from the clock)
    pub seed: Option<u64>,

    /// Number of independent subscribers to attach
    pub subscribers: usize,

    /// How often to report dropped-tick statistics (milliseconds, 0 = only at exit)
    pub stats_interval_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            interval_ms: 1000,
            align: true,
            offset_ms: 0,
            random_offset: false,
            sample_interval_ms: 0,
            seed: None,
            subscribers: 1,
            stats_interval_ms: 10_000,
        }
    }
}

impl DaemonConfig {
    /// Load configuration from `path`, or from the default location.
    ///
    /// A missing default config is created with defaults; a missing explicit path is an
    /// error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let config_path = Self::default_config_path();
                if config_path.exists() {
                    Self::load_from(&config_path)
                } else {
                    let config = Self::default();
                    config.save().context("Failed to save default config")?;
                    Ok(config)
                }
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let mut config: DaemonConfig =
            toml::from_str(&contents).context("Failed to parse config file")?;

        config.config_path = path.to_path_buf();
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        // Ensure config directory exists
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&self.config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Reject settings the ticker cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            bail!("interval_ms must be greater than zero");
        }
        if self.subscribers == 0 {
            bail!("subscribers must be at least 1");
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Offset to align to, or None when alignment is off
    pub fn offset(&self) -> Option<Duration> {
        self.align.then(|| Duration::from_millis(self.offset_ms))
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_ms > 0).then(|| Duration::from_millis(self.stats_interval_ms))
    }

    /// Get default config path
    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("multitick")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::default();
        assert_eq!(config.interval(), Duration::from_secs(1));
        assert_eq!(config.offset(), Some(Duration::ZERO));
        assert_eq!(config.sample_interval(), Duration::ZERO);
        assert_eq!(config.stats_interval(), Some(Duration::from_secs(10)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = DaemonConfig {
            config_path: path.clone(),
            interval_ms: 250,
            offset_ms: 50,
            sample_interval_ms: 1000,
            seed: Some(9),
            subscribers: 3,
            ..DaemonConfig::default()
        };
        config.save().unwrap();

        let loaded = DaemonConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "interval_ms = 500\nalign = false\n").unwrap();

        let config = DaemonConfig::load_from(&path).unwrap();
        assert_eq!(config.interval(), Duration::from_millis(500));
        assert_eq!(config.offset(), None);
        assert_eq!(config.subscribers, 1);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(DaemonConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "interval_ms = \"soon\"").unwrap();
        assert!(DaemonConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_validate() {
        let zero_interval = DaemonConfig {
            interval_ms: 0,
            ..DaemonConfig::default()
        };
        assert!(zero_interval.validate().is_err());

        let no_subscribers = DaemonConfig {
            subscribers: 0,
            ..DaemonConfig::default()
        };
        assert!(no_subscribers.validate().is_err());
    }

    #[test]
    fn test_stats_disabled() {
        let config = DaemonConfig {
            stats_interval_ms: 0,
            ..DaemonConfig::default()
        };
        assert_eq!(config.stats_interval(), None);
    }
}
