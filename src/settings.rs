//! Runtime settings from the environment, and tracing setup for binaries.

use crate::error::ConfigError;
use crate::exec::DEFAULT_MAX_MAPPING_DEPTH;
use std::path::PathBuf;

/// PostgreSQL schema for document tables.
pub const SCHEMA_ENV: &str = "QUADRA_SCHEMA";
pub const DEFAULT_SCHEMA: &str = "quadra";
/// Bound on nested mapped-model resolution.
pub const MAX_MAPPING_DEPTH_ENV: &str = "QUADRA_MAX_MAPPING_DEPTH";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
/// Model declarations file, or a directory holding `models.json`.
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub database_url: Option<String>,
    pub config_path: Option<PathBuf>,
    pub schema: String,
    pub max_mapping_depth: usize,
}

impl Settings {
    /// Read `.env` if present, then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let schema = get(SCHEMA_ENV).unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
        if !schema.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ConfigError::Validation(format!(
                "{} must be a plain identifier, got '{}'",
                SCHEMA_ENV, schema
            )));
        }
        let max_mapping_depth = match get(MAX_MAPPING_DEPTH_ENV) {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|d| *d > 0)
                .ok_or_else(|| {
                    ConfigError::Validation(format!(
                        "{} must be a positive integer, got '{}'",
                        MAX_MAPPING_DEPTH_ENV, raw
                    ))
                })?,
            None => DEFAULT_MAX_MAPPING_DEPTH,
        };
        Ok(Settings {
            database_url: get(DATABASE_URL_ENV),
            config_path: get(CONFIG_PATH_ENV).map(PathBuf::from),
            schema,
            max_mapping_depth,
        })
    }
}

/// Install a `tracing-subscriber` fmt layer filtered by `RUST_LOG` (default `quadra_sdk=info`).
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("quadra_sdk=info")),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.schema, DEFAULT_SCHEMA);
        assert_eq!(s.max_mapping_depth, DEFAULT_MAX_MAPPING_DEPTH);
        assert!(s.database_url.is_none());
    }

    #[test]
    fn overrides_and_validation() {
        let s = settings(&[(SCHEMA_ENV, "docs_a"), (MAX_MAPPING_DEPTH_ENV, "3"), (CONFIG_PATH_ENV, "conf")]).unwrap();
        assert_eq!(s.schema, "docs_a");
        assert_eq!(s.max_mapping_depth, 3);
        assert_eq!(s.config_path, Some(PathBuf::from("conf")));
        assert!(settings(&[(MAX_MAPPING_DEPTH_ENV, "0")]).is_err());
        assert!(settings(&[(SCHEMA_ENV, "bad;drop")]).is_err());
    }
}
