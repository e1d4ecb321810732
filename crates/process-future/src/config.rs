//! YAML settings for background processes
//!
//! ```yaml
//! poll_interval_ms: 100
//! min_graceful_timeout_ms: 100
//! default_stop_timeout_secs: 5
//! force_synchronous: false
//! isolation:
//!   stdin: true
//!   stdout: true
//!   stderr: false
//! fetch_worker: /usr/local/bin/fetch-worker
//! interpreters:
//!   sh: sh
//!   py: python3
//! ```
//!
//! Every key is optional. A given `interpreters` map replaces the defaults.

use crate::capability::Capabilities;
use crate::isolation::StreamIsolation;
use crate::options::{SpawnOptions, TerminationPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the bundled request worker binary
pub const FETCH_WORKER_NAME: &str = "fetch-worker";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Settings shared by every handle a caller creates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Interval between liveness checks during a graceful stop
    pub poll_interval_ms: u64,

    /// Graceful stop timeouts below this are treated as forced stops
    pub min_graceful_timeout_ms: u64,

    /// Grace period when a stop does not name one
    pub default_stop_timeout_secs: f64,

    /// Run every process inline, as if the host had no process control
    pub force_synchronous: bool,

    /// Which channels get their own pipes
    pub isolation: StreamIsolation,

    /// Path of the request worker binary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_worker: Option<PathBuf>,

    /// Script extension (without the dot) to interpreter program
    pub interpreters: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        let interpreters = [("sh", "sh"), ("bash", "bash"), ("py", "python3"), ("php", "php")]
            .into_iter()
            .map(|(ext, program)| (ext.to_string(), program.to_string()))
            .collect();

        Self {
            poll_interval_ms: 100,
            min_graceful_timeout_ms: 100,
            default_stop_timeout_secs: 5.0,
            force_synchronous: false,
            isolation: StreamIsolation::default(),
            fetch_worker: None,
            interpreters,
        }
    }
}

impl Settings {
    /// Parse and validate settings from YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate a settings file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Check the settings for values no handle could work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if Duration::try_from_secs_f64(self.default_stop_timeout_secs).is_err() {
            return Err(ConfigError::ValidationError(format!(
                "default_stop_timeout_secs must be a non-negative number, got {}",
                self.default_stop_timeout_secs
            )));
        }
        for (ext, program) in &self.interpreters {
            if ext.is_empty() || ext.contains('.') {
                return Err(ConfigError::ValidationError(format!(
                    "interpreter extension '{}' must be non-empty and given without a dot",
                    ext
                )));
            }
            if program.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "interpreter for '.{}' scripts is empty",
                    ext
                )));
            }
        }
        Ok(())
    }

    /// The graceful stop parameters
    pub fn termination_policy(&self) -> TerminationPolicy {
        TerminationPolicy {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            min_graceful_timeout: Duration::from_millis(self.min_graceful_timeout_ms),
            default_timeout: Duration::try_from_secs_f64(self.default_stop_timeout_secs)
                .unwrap_or(crate::options::DEFAULT_STOP_TIMEOUT),
        }
    }

    /// Host capabilities, unless synchronous execution is forced
    pub fn capabilities(&self) -> Capabilities {
        if self.force_synchronous {
            Capabilities::synchronous()
        } else {
            Capabilities::detect()
        }
    }

    /// Options for spawning a handle under these settings
    pub fn spawn_options(&self) -> SpawnOptions {
        SpawnOptions {
            isolation: self.isolation,
            capabilities: self.capabilities(),
            termination: self.termination_policy(),
        }
    }

    /// Where to find the request worker.
    ///
    /// Without an explicit path the worker is expected next to the current
    /// executable, falling back to a lookup on `PATH`.
    pub fn fetch_worker_path(&self) -> PathBuf {
        if let Some(path) = &self.fetch_worker {
            return path.clone();
        }
        let file_name = format!("{}{}", FETCH_WORKER_NAME, std::env::consts::EXE_SUFFIX);
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(&file_name)))
            .filter(|candidate| candidate.is_file())
            .unwrap_or_else(|| PathBuf::from(file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let settings = Settings::from_yaml_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.interpreters.get("py").map(String::as_str), Some("python3"));
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
poll_interval_ms: 20
min_graceful_timeout_ms: 50
default_stop_timeout_secs: 1.5
force_synchronous: true
isolation:
  stderr: false
fetch_worker: /opt/bin/fetch-worker
interpreters:
  rb: ruby
"#;
        let settings = Settings::from_yaml_str(yaml).unwrap();
        let options = settings.spawn_options();

        assert_eq!(options.termination.poll_interval, Duration::from_millis(20));
        assert_eq!(options.termination.min_graceful_timeout, Duration::from_millis(50));
        assert_eq!(options.termination.default_timeout, Duration::from_millis(1500));
        assert!(options.capabilities.requires_synchronous());
        assert!(options.isolation.stdin);
        assert!(!options.isolation.stderr);
        assert_eq!(settings.fetch_worker_path(), PathBuf::from("/opt/bin/fetch-worker"));
        assert_eq!(settings.interpreters.len(), 1);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        for yaml in [
            "poll_interval_ms: 0",
            "default_stop_timeout_secs: -1",
            "interpreters: { '.sh': sh }",
            "interpreters: { sh: '  ' }",
        ] {
            assert!(
                matches!(Settings::from_yaml_str(yaml), Err(ConfigError::ValidationError(_))),
                "{yaml} should be rejected"
            );
        }
    }

    #[test]
    fn test_yaml_errors() {
        assert!(matches!(
            Settings::from_yaml_str("poll_interval_ms: soon"),
            Err(ConfigError::YamlError(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "force_synchronous: true").unwrap();
        let settings = Settings::from_file(file.path()).unwrap();
        assert!(settings.force_synchronous);

        assert!(matches!(
            Settings::from_file("/nonexistent/settings.yaml"),
            Err(ConfigError::ReadError(_))
        ));
    }
}
