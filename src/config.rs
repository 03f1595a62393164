//! Runtime configuration
//!
//! Loaded from YAML at `<config_dir>/chronicle/config.yaml` or an explicit
//! path. Every field has a default, so an absent or partial file is fine.
//! A few environment variables override the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub const ENV_SESSION_THROTTLE_MS: &str = "CHRONICLE_SESSION_THROTTLE_MS";
pub const ENV_SESSION_POLL_MS: &str = "CHRONICLE_SESSION_POLL_MS";
pub const ENV_SESSION_EXPIRY_MS: &str = "CHRONICLE_SESSION_EXPIRY_MS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChronicleConfig {
    pub session: SessionConfig,
    pub bus: BusConfig,
}

/// Session lifecycle timing, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Minimum gap between two accepted activity events
    pub throttle_ms: u64,
    /// How often the expiry check runs
    pub poll_interval_ms: u64,
    /// Idle time after which the session expires
    pub expiry_window_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            throttle_ms: 30_000,
            poll_interval_ms: 60_000,
            expiry_window_ms: 30 * 60_000,
        }
    }
}

impl SessionConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn expiry_window(&self) -> Duration {
        Duration::from_millis(self.expiry_window_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Undelivered signals a subscriber may hold before it lags
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: crate::bus::InvalidationBus::DEFAULT_CAPACITY,
        }
    }
}

/// `<config_dir>/chronicle/config.yaml`, if the platform has a config dir
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chronicle").join("config.yaml"))
}

impl ChronicleConfig {
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read `path` and apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from `path`, or the default location when `None`.
    ///
    /// A missing file yields defaults. An unreadable or invalid file is
    /// logged and also yields defaults. Environment overrides apply in
    /// every case.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).or_else(default_path);
        let loaded = match path {
            Some(path) if path.exists() => Self::load(&path).map_err(|e| {
                warn!(path = %path.display(), error = %e, "config load failed, using defaults");
            }),
            _ => Err(()),
        };
        loaded.unwrap_or_else(|()| {
            let mut config = Self::default();
            config.apply_env_overrides();
            config
        })
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`, ignoring blank or malformed values.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let targets: [(&str, &mut u64); 3] = [
            (ENV_SESSION_THROTTLE_MS, &mut self.session.throttle_ms),
            (ENV_SESSION_POLL_MS, &mut self.session.poll_interval_ms),
            (ENV_SESSION_EXPIRY_MS, &mut self.session.expiry_window_ms),
        ];
        for (key, target) in targets {
            let Some(raw) = lookup(key) else { continue };
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            match trimmed.parse::<u64>() {
                Ok(value) => *target = value,
                Err(e) => warn!(%key, value = %trimmed, error = %e, "invalid override, ignoring"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = ChronicleConfig::default();
        assert_eq!(config.session.throttle(), Duration::from_secs(30));
        assert_eq!(config.session.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.session.expiry_window(), Duration::from_secs(1800));
        assert_eq!(config.bus.capacity, 256);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config = ChronicleConfig::from_yaml_str("session:\n  throttle_ms: 500\n").unwrap();
        assert_eq!(config.session.throttle_ms, 500);
        assert_eq!(config.session.poll_interval_ms, 60_000);
        assert_eq!(config.bus, BusConfig::default());

        assert_eq!(ChronicleConfig::from_yaml_str("").unwrap(), ChronicleConfig::default());
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(matches!(
            ChronicleConfig::from_yaml_str("session: [1, 2"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn overrides_replace_well_formed_values_only() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_SESSION_THROTTLE_MS, "1000"),
            (ENV_SESSION_POLL_MS, "soon"),
            (ENV_SESSION_EXPIRY_MS, "  "),
        ]);
        let mut config = ChronicleConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.session.throttle_ms, 1000);
        assert_eq!(config.session.poll_interval_ms, 60_000);
        assert_eq!(config.session.expiry_window_ms, 1_800_000);
    }

    #[test]
    fn load_reads_file_and_falls_back_on_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "bus:\n  capacity: 8\n").unwrap();
        assert_eq!(ChronicleConfig::load(&path).unwrap().bus.capacity, 8);

        std::fs::write(&path, "bus: {capacity: lots}").unwrap();
        assert!(ChronicleConfig::load(&path).is_err());
        assert_eq!(ChronicleConfig::load_or_default(Some(&path)).bus.capacity, 256);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let err = ChronicleConfig::load(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
