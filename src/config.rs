use std::env;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::errors::{AppError, AppResult};
use crate::services::violation_detector::ProctorPolicy;

/// Longest grace or away window accepted from the environment.
const MAX_WINDOW_SECS: u64 = 3_600;

fn secs_to_ms(secs: u64) -> i64 {
    i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX)
}

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub api_token: Option<SecretString>,
    pub request_timeout_secs: u64,
    pub snapshot_dir: PathBuf,
    pub max_strikes: u32,
    pub violation_grace_secs: u64,
    pub away_limit_secs: u64,
    pub shuffle_seed: Option<u64>,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            api_base_url: env::var("EXAM_API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000/api".to_string()),
            api_token: env::var("EXAM_API_TOKEN").ok().map(SecretString::from),
            request_timeout_secs: env::var("EXAM_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            snapshot_dir: env::var("SNAPSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".exam-snapshots")),
            max_strikes: env::var("MAX_STRIKES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            violation_grace_secs: env::var("VIOLATION_GRACE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            away_limit_secs: env::var("AWAY_LIMIT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            shuffle_seed: env::var("SHUFFLE_SEED").ok().and_then(|s| s.parse().ok()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// Reads a `.env` file if one exists, then the process environment.
    pub fn load() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_env();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(AppError::ValidationError(
                "EXAM_API_BASE_URL must not be empty".to_string(),
            ));
        }
        if self.max_strikes == 0 {
            return Err(AppError::ValidationError(
                "MAX_STRIKES must be at least 1".to_string(),
            ));
        }
        if self.violation_grace_secs == 0 || self.away_limit_secs == 0 {
            return Err(AppError::ValidationError(
                "VIOLATION_GRACE_SECS and AWAY_LIMIT_SECS must be positive".to_string(),
            ));
        }
        if self.violation_grace_secs > MAX_WINDOW_SECS || self.away_limit_secs > MAX_WINDOW_SECS {
            return Err(AppError::ValidationError(format!(
                "VIOLATION_GRACE_SECS and AWAY_LIMIT_SECS must not exceed {}",
                MAX_WINDOW_SECS
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn proctor_policy(&self) -> ProctorPolicy {
        ProctorPolicy {
            max_strikes: self.max_strikes,
            violation_grace_ms: secs_to_ms(self.violation_grace_secs),
            away_limit_ms: secs_to_ms(self.away_limit_secs),
        }
    }

    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:3000/api".to_string(),
            api_token: None,
            request_timeout_secs: 2,
            snapshot_dir: PathBuf::from("target/test-snapshots"),
            max_strikes: 3,
            violation_grace_secs: 10,
            away_limit_secs: 10,
            shuffle_seed: Some(7),
            log_level: "debug".to_string(),
        }
    }
}
