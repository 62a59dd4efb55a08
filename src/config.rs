//! YAML configuration, loaded once at startup.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    codec::ValueType,
    error::{Error, Result},
    MetricKey,
};

pub const DEFAULT_TICK: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub db: DbConfig,
    /// How often the collector looks for due metrics.
    #[serde(default = "default_tick", deserialize_with = "human_duration")]
    pub tick: Duration,
    #[serde(default)]
    pub metrics: Vec<MetricConfig>,
    #[serde(default)]
    pub dashboard: Vec<Widget>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    /// `:memory:` for a throwaway database.
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricConfig {
    pub key: MetricKey,
    pub method: String,
    /// Seconds.
    pub interval: u64,
    #[serde(rename = "type")]
    pub value_type: ValueType,
}

/// One chart on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub key: MetricKey,
    pub title: String,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "core::ops::Not::not")]
    pub strict: bool,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }
}

fn default_tick() -> Duration {
    DEFAULT_TICK
}

fn human_duration<'de, D>(deserializer: D) -> core::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE: &str = r#"
db:
  path: /var/lib/tickmon/metrics.db
tick: 2s
metrics:
  - key: cpu.percent
    method: internal
    interval: 10
    type: float
  - key: cpu.cores
    method: internal
    interval: 3600
    type: int
dashboard:
  - key: cpu.percent
    title: CPU load
    width: 600
    height: 300
    strict: true
"#;

    #[test]
    fn test_parse_full_config() {
        let cfg = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(cfg.db.path, PathBuf::from("/var/lib/tickmon/metrics.db"));
        assert_eq!(cfg.tick, Duration::from_secs(2));
        assert_eq!(
            cfg.metrics[1],
            MetricConfig {
                key: "cpu.cores".into(),
                method: "internal".into(),
                interval: 3600,
                value_type: ValueType::Int,
            }
        );
        assert!(cfg.dashboard[0].strict);
    }

    #[test]
    fn test_example_config_parses() {
        let cfg = Config::from_yaml(include_str!("../config.example.yaml")).unwrap();
        assert_eq!(cfg.tick, DEFAULT_TICK);
        assert!(cfg.metrics.iter().all(|m| m.method == "internal"));
        assert_eq!(cfg.dashboard.len(), 2);
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::from_yaml("db:\n  path: ':memory:'\n").unwrap();
        assert_eq!(cfg.tick, DEFAULT_TICK);
        assert!(cfg.metrics.is_empty());
        assert!(cfg.dashboard.is_empty());
    }

    #[test]
    fn test_unknown_value_type_is_rejected() {
        let raw = r#"
db: { path: x.db }
metrics:
  - { key: up, method: internal, interval: 1, type: bool }
"#;
        assert!(matches!(Config::from_yaml(raw), Err(Error::ConfigParse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let cfg = Config::load(file.path()).unwrap();
        assert_eq!(cfg.metrics.len(), 2);

        let err = Config::load("/nonexistent/tickmon.yaml").unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
    }

    #[test]
    fn test_widget_serialization_omits_default_strict() {
        let w = Widget {
            key: "cpu.percent".into(),
            title: "CPU".into(),
            width: 1,
            height: 2,
            strict: false,
        };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(
            json,
            r#"{"key":"cpu.percent","title":"CPU","width":1,"height":2}"#
        );
    }
}
