//! Application-level configuration: rule tuning and storage settings read from
//! a JSON file, plus the storage backend selected through the environment.

use std::{collections::BTreeMap, env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    dao::session_store::memory::DEFAULT_SESSION_TTL,
    state::{
        DEFAULT_STORAGE_TIMEOUT,
        rules::{GameRules, MISSION_COUNT},
    },
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "AVALON_BACK_CONFIG_PATH";
/// Environment variable selecting the session store.
const STORAGE_BACKEND_ENV: &str = "STORAGE_BACKEND";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Process-local TTL cache; sessions are lost on restart.
    Memory,
    /// MongoDB collection with a TTL index.
    Mongo,
}

impl StorageBackend {
    /// Read `STORAGE_BACKEND`, defaulting to the in-memory store.
    pub fn from_env() -> Self {
        match env::var(STORAGE_BACKEND_ENV) {
            Ok(value) => Self::parse(&value).unwrap_or_else(|| {
                warn!(
                    value = %value,
                    "unknown storage backend; falling back to memory"
                );
                StorageBackend::Memory
            }),
            Err(_) => StorageBackend::Memory,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Some(StorageBackend::Memory),
            "mongo" | "mongodb" => Some(StorageBackend::Mongo),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Lifetime of an untouched session in either store.
    pub session_ttl: Duration,
    /// Upper bound for a single repository call.
    pub storage_timeout: Duration,
    pub rules: GameRules,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        session_ttl_secs = app_config.session_ttl.as_secs(),
                        max_team_picking_attempts = app_config.rules.max_team_picking_attempts,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document; missing or invalid keys keep their defaults.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session_ttl: DEFAULT_SESSION_TTL,
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
            rules: GameRules::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    session_ttl_secs: Option<u64>,
    storage_timeout_ms: Option<u64>,
    max_team_picking_attempts: Option<u32>,
    protected_role: Option<String>,
    /// Team size per mission keyed by player count; merged over the defaults.
    mission_team_sizes: BTreeMap<usize, [usize; MISSION_COUNT]>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let mut config = AppConfig::default();

        match value.session_ttl_secs {
            Some(0) => warn!("session_ttl_secs must be positive; keeping default"),
            Some(secs) => config.session_ttl = Duration::from_secs(secs),
            None => {}
        }
        match value.storage_timeout_ms {
            Some(0) => warn!("storage_timeout_ms must be positive; keeping default"),
            Some(ms) => config.storage_timeout = Duration::from_millis(ms),
            None => {}
        }
        match value.max_team_picking_attempts {
            Some(0) => warn!("max_team_picking_attempts must be positive; keeping default"),
            Some(attempts) => config.rules.max_team_picking_attempts = attempts,
            None => {}
        }
        match value.protected_role {
            Some(role) if role.trim().is_empty() => {
                warn!("protected_role must not be blank; keeping default")
            }
            Some(role) => config.rules.protected_role = role.trim().to_owned(),
            None => {}
        }

        for (players, sizes) in value.mission_team_sizes {
            if sizes.iter().all(|size| (1..=players).contains(size)) {
                config.rules.mission_team_sizes.insert(players, sizes);
            } else {
                warn!(
                    players,
                    ?sizes,
                    "mission team sizes must be between 1 and the player count; ignoring entry"
                );
            }
        }

        config
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::rules::DEFAULT_MAX_TEAM_PICKING_ATTEMPTS;

    #[test]
    fn empty_document_keeps_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config.session_ttl, DEFAULT_SESSION_TTL);
        assert_eq!(config.storage_timeout, DEFAULT_STORAGE_TIMEOUT);
        assert_eq!(config.rules, GameRules::default());
    }

    #[test]
    fn values_override_defaults() {
        let config = AppConfig::from_json(
            r#"{
                "session_ttl_secs": 600,
                "storage_timeout_ms": 250,
                "max_team_picking_attempts": 3,
                "protected_role": " Merlin ",
                "mission_team_sizes": { "5": [1, 2, 2, 2, 3] }
            }"#,
        )
        .unwrap();

        assert_eq!(config.session_ttl, Duration::from_secs(600));
        assert_eq!(config.storage_timeout, Duration::from_millis(250));
        assert_eq!(config.rules.max_team_picking_attempts, 3);
        assert_eq!(config.rules.protected_role, "Merlin");
        assert_eq!(config.rules.mission_team_size(5, 1), Some(1));
        assert_eq!(config.rules.mission_team_size(6, 3), Some(4));
    }

    #[test]
    fn invalid_values_are_ignored() {
        let config = AppConfig::from_json(
            r#"{
                "max_team_picking_attempts": 0,
                "protected_role": "  ",
                "mission_team_sizes": { "5": [2, 3, 2, 3, 6] }
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.rules.max_team_picking_attempts,
            DEFAULT_MAX_TEAM_PICKING_ATTEMPTS
        );
        assert_eq!(config.rules.protected_role, "merlin");
        assert_eq!(config.rules.mission_team_size(5, 5), Some(3));
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(AppConfig::from_json("{ not json").is_err());
    }

    #[test]
    fn storage_backend_names() {
        assert_eq!(StorageBackend::parse("Mongo"), Some(StorageBackend::Mongo));
        assert_eq!(StorageBackend::parse(" memory "), Some(StorageBackend::Memory));
        assert_eq!(StorageBackend::parse("redis"), None);
    }
}
