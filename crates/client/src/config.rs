//! Client configuration from the environment.

use std::path::PathBuf;
use std::time::Duration;

use larder_ai::GeminiConfig;
use larder_ai::gemini::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use thiserror::Error;

pub const DATA_DIR_ENV: &str = "LARDER_DATA_DIR";
pub const AUTH_MODE_ENV: &str = "LARDER_AUTH_MODE";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const MODEL_ENV: &str = "GEMINI_MODEL";
pub const ENDPOINT_ENV: &str = "GEMINI_ENDPOINT";
pub const TIMEOUT_ENV: &str = "LARDER_HTTP_TIMEOUT_SECS";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("could not determine a data directory; set LARDER_DATA_DIR")]
    NoDataDir,
}

/// Where accounts live and which pantry backend signed-in users get.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMode {
    /// Accounts in the key-value store; the pantry always stays local.
    #[default]
    Local,
    /// Hosted identity; signed-in users get cloud collections.
    Cloud,
}

impl AuthMode {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "local" => Some(AuthMode::Local),
            "cloud" | "firebase" => Some(AuthMode::Cloud),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub data_dir: PathBuf,
    pub auth_mode: AuthMode,
    /// `None` when no API key is set; recipe generation is then disabled.
    pub gemini: Option<GeminiConfig>,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let data_dir = match get(DATA_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => larder_infra::kv::sqlite::default_data_dir().map_err(|_| ConfigError::NoDataDir)?,
        };

        let auth_mode = match get(AUTH_MODE_ENV) {
            Some(raw) => AuthMode::parse(&raw).ok_or_else(|| ConfigError::Invalid {
                name: AUTH_MODE_ENV,
                value: raw.clone(),
                reason: "expected `local` or `cloud`".to_string(),
            })?,
            None => AuthMode::default(),
        };

        let timeout_secs = match get(TIMEOUT_ENV) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    name: TIMEOUT_ENV,
                    value: raw.clone(),
                    reason: "expected a positive number of seconds".to_string(),
                })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let gemini = match get(API_KEY_ENV) {
            Some(key) => Some(
                GeminiConfig::new(key.trim())
                    .with_model(get(MODEL_ENV).unwrap_or_else(|| DEFAULT_MODEL.to_string()))
                    .with_endpoint(get(ENDPOINT_ENV).unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()))
                    .with_timeout(Duration::from_secs(timeout_secs)),
            ),
            None => {
                tracing::warn!("{} not set; recipe generation is disabled", API_KEY_ENV);
                None
            }
        };

        Ok(Self {
            data_dir,
            auth_mode,
            gemini,
        })
    }
}
