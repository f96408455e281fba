use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration loaded from scanward.toml.
#[derive(Debug, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct ScanwardConfig {
    pub watchdog: WatchdogConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Seconds without a heartbeat before a scan is declared dead.
    pub inactivity_threshold_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Upper bound on concurrently running scan jobs.
    pub max_concurrent_scans: usize,
}

impl WatchdogConfig {
    /// The inactivity threshold as a duration.
    pub fn inactivity_threshold(&self) -> Duration {
        Duration::from_secs(self.inactivity_threshold_secs)
    }
}

// --- Default implementations ---

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            inactivity_threshold_secs: 600,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_scans: 5,
        }
    }
}

/// Errors from loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ScanwardConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScanwardConfig::default();
        assert_eq!(config.watchdog.inactivity_threshold_secs, 600);
        assert_eq!(config.scheduler.max_concurrent_scans, 5);
        assert_eq!(
            config.watchdog.inactivity_threshold(),
            Duration::from_secs(600)
        );
    }

    #[test]
    fn test_load_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scanward.toml");
        std::fs::write(
            &path,
            "[watchdog]\ninactivity_threshold_secs = 30\n\n[scheduler]\nmax_concurrent_scans = 2\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.watchdog.inactivity_threshold_secs, 30);
        assert_eq!(config.scheduler.max_concurrent_scans, 2);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scanward.toml");
        std::fs::write(&path, "[watchdog]\ninactivity_threshold_secs = 45\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.watchdog.inactivity_threshold_secs, 45);
        assert_eq!(config.scheduler.max_concurrent_scans, 5);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = load_config(Path::new("/nonexistent/scanward.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("failed to read config"));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scanward.toml");
        std::fs::write(&path, "[watchdog\nbroken").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
