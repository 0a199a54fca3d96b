use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use tasksync_core::SyncConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_path: PathBuf,
    pub sync: SyncConfig,
    pub recent_device_limit: usize,
    pub resolution_history_limit: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "TASKSYNC_BIND_ADDR", "127.0.0.1:8080");
        let database_path =
            PathBuf::from(value_or_default(&lookup, "TASKSYNC_DATABASE_PATH", "tasksync.db"));

        let sync = SyncConfig::from_tag(optional_trimmed(&lookup, "TASKSYNC_SYNC_STRATEGY"));
        let sync = match optional_trimmed(&lookup, "TASKSYNC_RECORD_RESOLUTIONS").as_deref() {
            None | Some("1" | "true" | "yes") => sync,
            Some("0" | "false" | "no") => sync.without_resolution_log(),
            Some(_) => {
                return Err(ConfigError::Invalid(
                    "TASKSYNC_RECORD_RESOLUTIONS must be true or false".to_string(),
                ));
            }
        };

        let recent_device_limit = bounded_usize(
            &lookup,
            "TASKSYNC_RECENT_DEVICE_LIMIT",
            "10",
            1..=100,
        )?;
        let resolution_history_limit = bounded_usize(
            &lookup,
            "TASKSYNC_RESOLUTION_HISTORY_LIMIT",
            "50",
            1..=1_000,
        )?;

        Ok(Self {
            bind_addr,
            database_path,
            sync,
            recent_device_limit,
            resolution_history_limit,
        })
    }
}

fn bounded_usize(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
    range: std::ops::RangeInclusive<usize>,
) -> Result<usize, ConfigError> {
    let invalid = || {
        ConfigError::Invalid(format!(
            "{name} must be an integer in [{}, {}]",
            range.start(),
            range.end()
        ))
    };

    let value = value_or_default(lookup, name, default)
        .parse::<usize>()
        .map_err(|_| invalid())?;
    if !range.contains(&value) {
        return Err(invalid());
    }
    Ok(value)
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tasksync_core::SyncStrategy;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn config_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.database_path, PathBuf::from("tasksync.db"));
        assert_eq!(config.sync.strategy, SyncStrategy::TimeBased);
        assert!(config.sync.record_resolutions);
        assert_eq!(config.recent_device_limit, 10);
    }

    #[test]
    fn config_reads_strategy_leniently() {
        let config = config_from(&[("TASKSYNC_SYNC_STRATEGY", "manual_resolve")]).unwrap();
        assert_eq!(config.sync.strategy, SyncStrategy::Manual);

        let config = config_from(&[("TASKSYNC_SYNC_STRATEGY", "bogus")]).unwrap();
        assert_eq!(config.sync.strategy, SyncStrategy::TimeBased);
    }

    #[test]
    fn config_can_disable_resolution_log() {
        let config = config_from(&[("TASKSYNC_RECORD_RESOLUTIONS", "false")]).unwrap();
        assert!(!config.sync.record_resolutions);

        let err = config_from(&[("TASKSYNC_RECORD_RESOLUTIONS", "maybe")]).unwrap_err();
        assert!(err.to_string().contains("TASKSYNC_RECORD_RESOLUTIONS"));
    }

    #[test]
    fn config_rejects_out_of_range_device_limit() {
        let err = config_from(&[("TASKSYNC_RECENT_DEVICE_LIMIT", "0")]).unwrap_err();
        assert!(err.to_string().contains("TASKSYNC_RECENT_DEVICE_LIMIT"));

        let err = config_from(&[("TASKSYNC_RECENT_DEVICE_LIMIT", "lots")]).unwrap_err();
        assert!(err.to_string().contains("[1, 100]"));
    }
}
