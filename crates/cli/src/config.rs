//! Runtime configuration.
//!
//! Loaded from a TOML file (every key optional), then overridden from
//! `GEOALERT_*` environment variables, then validated. The process never
//! starts with an invalid configuration.
//!
//! ```toml
//! bind_addr = "0.0.0.0:4000"
//! workers = 2
//! queue_capacity = 10000
//! log_format = "json"
//!
//! [[geofences]]
//! name = "downtown"
//! points = [[37.79, -122.42], [37.79, -122.39], [37.77, -122.39], [37.77, -122.42]]
//! ```

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use ingest::{GeofenceError, GeofenceSet};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for '{key}': {message}")]
    InvalidValue { key: &'static str, message: String },

    #[error("invalid geofence")]
    Geofence(#[from] GeofenceError),
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable multi-line output for local development.
    Pretty,
}

/// One geofence as written in the config file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeofenceConfig {
    pub name: String,
    /// `[x, y]` vertices, i.e. `[latitude, longitude]`.
    pub points: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub bind_addr: String,
    pub workers: usize,
    /// Maximum distinct events waiting for a worker. `None` means unbounded.
    pub queue_capacity: Option<usize>,
    pub max_body_bytes: usize,
    pub log_format: LogFormat,
    /// OTLP gRPC endpoint for span export, e.g. `http://localhost:4317`.
    pub otlp_endpoint: Option<String>,
    pub geofences: Vec<GeofenceConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:4000".to_string(),
            workers: 1,
            queue_capacity: None,
            max_body_bytes: 2 * 1024 * 1024,
            log_format: LogFormat::Json,
            otlp_endpoint: None,
            geofences: Vec::new(),
        }
    }
}

/// Where the configuration came from, for the startup log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// The file did not exist; defaults were used.
    Defaults(PathBuf),
}

impl AppConfig {
    /// Loads `path`, falling back to defaults when it does not exist, then
    /// applies environment overrides.
    ///
    /// Validation is left to the caller so command-line overrides can be
    /// applied first.
    pub async fn load(path: &Path) -> Result<(Self, ConfigSource), ConfigError> {
        let (mut config, source) = if tokio::fs::try_exists(path).await.unwrap_or(false) {
            let content = tokio::fs::read_to_string(path).await.map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            (Self::from_toml_str(&content)?, ConfigSource::File(path.to_path_buf()))
        } else {
            (Self::default(), ConfigSource::Defaults(path.to_path_buf()))
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok((config, source))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Applies `GEOALERT_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("GEOALERT_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(workers) = lookup("GEOALERT_WORKERS") {
            self.workers = parse_number("workers", &workers)?;
        }
        if let Some(capacity) = lookup("GEOALERT_QUEUE_CAPACITY") {
            self.queue_capacity = Some(parse_number("queue_capacity", &capacity)?);
        }
        if let Some(endpoint) = lookup("GEOALERT_OTLP_ENDPOINT") {
            self.otlp_endpoint = Some(endpoint).filter(|e| !e.trim().is_empty());
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_socket_addr()?;
        self.worker_count()?;
        if self.queue_capacity == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "queue_capacity",
                message: "must be at least 1 (omit it for an unbounded queue)".into(),
            });
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_body_bytes",
                message: "must be at least 1".into(),
            });
        }
        self.geofence_set()?;
        Ok(())
    }

    pub fn bind_socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_addr.parse().map_err(|err| ConfigError::InvalidValue {
            key: "bind_addr",
            message: format!("'{}': {err}", self.bind_addr),
        })
    }

    pub fn worker_count(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.workers).ok_or(ConfigError::InvalidValue {
            key: "workers",
            message: "must be at least 1".into(),
        })
    }

    pub fn queue_bound(&self) -> Option<NonZeroUsize> {
        self.queue_capacity.and_then(NonZeroUsize::new)
    }

    /// Builds the geofence set in file order.
    pub fn geofence_set(&self) -> Result<GeofenceSet, ConfigError> {
        let definitions = self.geofences.iter().map(|fence| {
            let points: Vec<(f64, f64)> = fence.points.iter().map(|[x, y]| (*x, *y)).collect();
            (fence.name.clone(), points)
        });
        Ok(GeofenceSet::from_definitions(definitions)?)
    }
}

fn parse_number(key: &'static str, raw: &str) -> Result<usize, ConfigError> {
    raw.trim().parse().map_err(|err| ConfigError::InvalidValue {
        key,
        message: format!("'{raw}': {err}"),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn empty_file_yields_valid_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(config.validate().is_ok());
        assert!(config.geofence_set().unwrap().is_empty());
    }

    #[test]
    fn full_file_parses() {
        let config = AppConfig::from_toml_str(
            r#"
            bind_addr = "0.0.0.0:9000"
            workers = 4
            queue_capacity = 500
            log_format = "pretty"

            [[geofences]]
            name = "square"
            points = [[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [10.0, 0.0]]
            "#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.worker_count().unwrap().get(), 4);
        assert_eq!(config.queue_bound().map(NonZeroUsize::get), Some(500));
        assert_eq!(config.log_format, LogFormat::Pretty);
        let fences = config.geofence_set().unwrap();
        assert_eq!(fences.len(), 1);
        assert!(fences.iter().next().unwrap().contains(5.0, 5.0));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            AppConfig::from_toml_str("bind_adr = \"x\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GEOALERT_BIND_ADDR", "127.0.0.1:1"),
            ("GEOALERT_WORKERS", "3"),
            ("GEOALERT_QUEUE_CAPACITY", "10"),
            ("GEOALERT_OTLP_ENDPOINT", " "),
        ]);
        let mut config = AppConfig {
            otlp_endpoint: Some("http://collector:4317".into()),
            ..AppConfig::default()
        };
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:1");
        assert_eq!(config.workers, 3);
        assert_eq!(config.queue_capacity, Some(10));
        assert_eq!(config.otlp_endpoint, None);
    }

    #[test]
    fn bad_override_is_reported() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(|key| (key == "GEOALERT_WORKERS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "workers", .. }));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let zero_workers = AppConfig {
            workers: 0,
            ..AppConfig::default()
        };
        assert!(zero_workers.validate().is_err());

        let bad_addr = AppConfig {
            bind_addr: "nowhere".into(),
            ..AppConfig::default()
        };
        assert!(matches!(
            bad_addr.validate(),
            Err(ConfigError::InvalidValue { key: "bind_addr", .. })
        ));

        let degenerate = AppConfig {
            geofences: vec![GeofenceConfig {
                name: "line".into(),
                points: vec![[0.0, 0.0], [1.0, 1.0]],
            }],
            ..AppConfig::default()
        };
        assert!(matches!(degenerate.validate(), Err(ConfigError::Geofence(_))));
    }
}
