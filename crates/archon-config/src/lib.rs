// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! The closed, recognized environment-variable surface (§6.4). No ambient
//! configuration outside this set is permitted to alter constitutional
//! behavior (§9) — every env var this process reads funnels through here.

use archon_crypto::{resolve_mode, Mode, ModeResolutionError};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Mode(#[from] ModeResolutionError),
    #[error("environment variable {0} has an invalid value: {1:?}")]
    InvalidValue(&'static str, String),
}

/// Source of env vars, abstracted so tests don't need to mutate the real
/// process environment (which is process-global and not test-safe to
/// mutate concurrently).
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MapEnv(pub HashMap<String, String>);

impl EnvSource for MapEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub mode: Mode,
    pub environment: String,
    pub witness_bootstrap_enabled: bool,
    pub enable_async_validation: bool,
    pub kafka_bootstrap_servers: Option<String>,
    pub schema_registry_url: Option<String>,
    pub vote_validation_max_attempts: u32,
    pub vote_validation_timeout: Duration,
    pub reconciliation_timeout: Duration,
    pub witness_archon_id: Option<String>,
    pub secretary_text_archon_id: Option<String>,
    pub secretary_json_archon_id: Option<String>,
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    match value.as_deref() {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        _ => default,
    }
}

fn parse_u32(key: &'static str, value: Option<String>, default: u32) -> Result<u32, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
    }
}

fn parse_secs(key: &'static str, value: Option<String>, default: Duration) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
    }
}

impl RuntimeConfig {
    /// The only sanctioned entry point. Performs the `DEV_MODE`/
    /// `ENVIRONMENT` cross-check (H1) before anything else — fail-fast, no
    /// partial startup.
    pub fn load(env: &dyn EnvSource) -> Result<Self, ConfigError> {
        let dev_mode = parse_bool(env.get("DEV_MODE"), false);
        let environment = env.get("ENVIRONMENT").unwrap_or_else(|| "development".to_string());
        let mode = resolve_mode(dev_mode, &environment)?;

        Ok(Self {
            mode,
            environment,
            witness_bootstrap_enabled: parse_bool(env.get("WITNESS_BOOTSTRAP_ENABLED"), false),
            enable_async_validation: parse_bool(env.get("ENABLE_ASYNC_VALIDATION"), true),
            kafka_bootstrap_servers: env.get("KAFKA_BOOTSTRAP_SERVERS"),
            schema_registry_url: env.get("SCHEMA_REGISTRY_URL"),
            vote_validation_max_attempts: parse_u32(
                "VOTE_VALIDATION_MAX_ATTEMPTS",
                env.get("VOTE_VALIDATION_MAX_ATTEMPTS"),
                3,
            )?,
            vote_validation_timeout: parse_secs(
                "VOTE_VALIDATION_TIMEOUT",
                env.get("VOTE_VALIDATION_TIMEOUT"),
                Duration::from_secs(30),
            )?,
            reconciliation_timeout: parse_secs(
                "RECONCILIATION_TIMEOUT",
                env.get("RECONCILIATION_TIMEOUT"),
                Duration::from_secs(300),
            )?,
            witness_archon_id: env.get("WITNESS_ARCHON_ID"),
            secretary_text_archon_id: env.get("SECRETARY_TEXT_ARCHON_ID"),
            secretary_json_archon_id: env.get("SECRETARY_JSON_ARCHON_ID"),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(&ProcessEnv)
    }
}

/// Per-stage retry/backoff controls (§6.4 "plus per-stage retry/backoff
/// controls"). Each executive-pipeline stage may override the default via
/// `{STAGE}_RETRY_BASE_MS` / `{STAGE}_RETRY_MAX_MS`; absent overrides fall
/// back to these defaults.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    pub fn for_stage(env: &dyn EnvSource, stage: &str) -> Result<Self, ConfigError> {
        let default = Self::default();
        let base_key = format!("{}_RETRY_BASE_MS", stage.to_uppercase());
        let max_key = format!("{}_RETRY_MAX_MS", stage.to_uppercase());
        let base_ms = env.get(&base_key);
        let max_ms = env.get(&max_key);
        Ok(Self {
            base: match base_ms {
                None => default.base,
                Some(raw) => Duration::from_millis(
                    raw.parse().map_err(|_| ConfigError::InvalidValue("STAGE_RETRY_BASE_MS", raw))?,
                ),
            },
            max: match max_ms {
                None => default.max,
                Some(raw) => Duration::from_millis(
                    raw.parse().map_err(|_| ConfigError::InvalidValue("STAGE_RETRY_MAX_MS", raw))?,
                ),
            },
            ..default
        })
    }

    /// Exponential backoff delay for the given (zero-indexed) attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.base.as_millis().saturating_mul(1u128 << attempt.min(16));
        Duration::from_millis(scaled.min(self.max.as_millis()) as u64)
    }
}
