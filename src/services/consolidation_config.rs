use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid config value for {field}: must be greater than zero")]
    MustBePositive { field: &'static str },
}

/// Tuning knobs for the consolidation jobs, loaded from YAML. Missing keys
/// fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// Monte Carlo trials per forecast.
    pub trials: usize,
    /// Trailing periods of throughput fed to the weekly forecasts.
    pub throughput_window: usize,
    /// Trailing periods of throughput shown in the replenishing view.
    pub replenishing_throughput_window: usize,
    /// Periods after which a single Monte Carlo trial gives up.
    pub max_periods: u32,
    /// Weeks a single consolidation run may walk.
    pub max_weeks: usize,
    /// Extra attempts after a conflicting snapshot write.
    pub upsert_retries: u32,
    /// Base seed; when set, forecasts are reproducible across reruns.
    pub seed: Option<u64>,
    pub log_level: String,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            trials: 500,
            throughput_window: 20,
            replenishing_throughput_window: 10,
            max_periods: 520,
            max_weeks: 1560,
            upsert_retries: 3,
            seed: None,
            log_level: "info".to_string(),
        }
    }
}

impl ConsolidationConfig {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&contents).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    pub fn from_yaml_str(input: &str) -> Result<Self, ConfigError> {
        let config: ConsolidationConfig =
            serde_yaml::from_str(input).map_err(|source| ConfigError::Parse {
                path: String::new(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise the defaults.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_yaml_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trials == 0 {
            return Err(ConfigError::MustBePositive { field: "trials" });
        }
        if self.throughput_window == 0 {
            return Err(ConfigError::MustBePositive {
                field: "throughput_window",
            });
        }
        if self.replenishing_throughput_window == 0 {
            return Err(ConfigError::MustBePositive {
                field: "replenishing_throughput_window",
            });
        }
        if self.max_periods == 0 {
            return Err(ConfigError::MustBePositive { field: "max_periods" });
        }
        if self.max_weeks == 0 {
            return Err(ConfigError::MustBePositive { field: "max_weeks" });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn missing_keys_use_defaults() {
        let config = ConsolidationConfig::from_yaml_str("trials: 100\nseed: 42\n").unwrap();
        assert_eq!(config.trials, 100);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.throughput_window, 20);
        assert_eq!(config.max_periods, 520);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn zero_values_are_rejected() {
        let err = ConsolidationConfig::from_yaml_str("trials: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::MustBePositive { field: "trials" }));

        let err = ConsolidationConfig::from_yaml_str("max_weeks: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::MustBePositive { field: "max_weeks" }));
    }

    #[test]
    fn from_yaml_file_reports_the_path_on_parse_errors() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("config.yaml");
        file.write_str("trials: [1\n").unwrap();

        let err = ConsolidationConfig::from_yaml_file(file.path()).unwrap_err();
        match err {
            ConfigError::Parse { path, .. } => assert!(path.ends_with("config.yaml")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn load_without_path_is_default() {
        assert_eq!(ConsolidationConfig::load(None).unwrap(), ConsolidationConfig::default());
    }
}
