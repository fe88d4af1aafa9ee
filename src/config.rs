// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! typed configuration assembled from them at startup. Any error here aborts
//! the process before it starts serving.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `APP_ENV` | `production`, `release` or anything else (development) | `development` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `TOKEN_SYMMETRIC_KEY` | 32-byte key for encrypted tokens | Required outside production |
//! | `TOKEN_SIGNING_KEY` | Base64 Ed25519 seed or keypair | Required in production |
//! | `TOKEN_VERIFYING_KEY` | Base64 Ed25519 public key (checked against the signing key) | Optional |
//! | `TOKEN_TTL_SECS` | Token lifetime in seconds | `86400` |
//! | `RATE_LIMIT_MAX_REQUESTS` | Admissions per window per client | `100` |
//! | `RATE_LIMIT_WINDOW_SECS` | Sliding window length | `60` |
//! | `RATE_LIMIT_MAX_CLIENTS` | Maximum tracked client addresses | `1000` |
//! | `RATE_LIMIT_TRUST_PROXY_HEADERS` | Use `X-Forwarded-For` / `X-Real-IP` | `false` |
//! | `CORS_ALLOW_ORIGINS` | Comma separated allowed origins | any origin |

use std::fmt;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono::Duration;
use thiserror::Error;

use crate::auth::token::{KeyConfigError, TokenScheme};
use crate::logging::LogFormat;
use crate::rate_limit::RateLimitConfig;

/// Deployment environment selector.
pub const APP_ENV_ENV: &str = "APP_ENV";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Raw 32-byte key for `v2.local` tokens.
pub const TOKEN_SYMMETRIC_KEY_ENV: &str = "TOKEN_SYMMETRIC_KEY";
/// Base64 Ed25519 seed (32 bytes) or keypair (64 bytes) for `v2.public` tokens.
pub const TOKEN_SIGNING_KEY_ENV: &str = "TOKEN_SIGNING_KEY";
pub const TOKEN_VERIFYING_KEY_ENV: &str = "TOKEN_VERIFYING_KEY";
pub const TOKEN_TTL_SECS_ENV: &str = "TOKEN_TTL_SECS";

pub const RATE_LIMIT_MAX_REQUESTS_ENV: &str = "RATE_LIMIT_MAX_REQUESTS";
pub const RATE_LIMIT_WINDOW_SECS_ENV: &str = "RATE_LIMIT_WINDOW_SECS";
pub const RATE_LIMIT_MAX_CLIENTS_ENV: &str = "RATE_LIMIT_MAX_CLIENTS";
pub const RATE_LIMIT_TRUST_PROXY_HEADERS_ENV: &str = "RATE_LIMIT_TRUST_PROXY_HEADERS";

pub const CORS_ALLOW_ORIGINS_ENV: &str = "CORS_ALLOW_ORIGINS";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
/// 24 hours
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 86_400;

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
    #[error("invalid key configuration: {0}")]
    Key(#[from] KeyConfigError),
}

/// Where the process runs. Decides the token scheme and whether error
/// responses carry diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Signed tokens, no diagnostics
    Production,
    /// Encrypted tokens, no diagnostics
    Release,
    /// Encrypted tokens, diagnostics in error bodies
    #[default]
    Development,
}

impl Environment {
    /// Case-insensitive; unknown values mean development.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" => Environment::Production,
            "release" => Environment::Release,
            _ => Environment::Development,
        }
    }

    pub fn token_scheme(&self) -> TokenScheme {
        match self {
            Environment::Production => TokenScheme::Signed,
            Environment::Release | Environment::Development => TokenScheme::Encrypted,
        }
    }

    /// Whether error bodies may include raw error text and source location.
    pub fn exposes_diagnostics(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Production => write!(f, "production"),
            Environment::Release => write!(f, "release"),
            Environment::Development => write!(f, "development"),
        }
    }
}

/// Token service settings. Only the key matching the environment's scheme
/// is required.
#[derive(Clone)]
pub struct TokenConfig {
    pub symmetric_key: Option<String>,
    pub signing_key: Option<String>,
    pub verifying_key: Option<String>,
    pub ttl: Duration,
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("symmetric_key", &self.symmetric_key.as_ref().map(|_| "<redacted>"))
            .field("signing_key", &self.signing_key.as_ref().map(|_| "<redacted>"))
            .field("verifying_key", &self.verifying_key)
            .field("ttl_secs", &self.ttl.num_seconds())
            .finish()
    }
}

/// Complete application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
    pub token: TokenConfig,
    pub rate_limit: RateLimitConfig,
    pub trust_proxy_headers: bool,
    pub cors_allow_origins: Vec<String>,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let environment = get(APP_ENV_ENV)
            .map(|v| Environment::parse(&v))
            .unwrap_or_default();

        let ttl_secs = parse_or(&get, TOKEN_TTL_SECS_ENV, DEFAULT_TOKEN_TTL_SECS)?;
        if ttl_secs <= 0 {
            return Err(ConfigError::Invalid {
                var: TOKEN_TTL_SECS_ENV,
                reason: "must be greater than zero".to_string(),
            });
        }
        let ttl = Duration::try_seconds(ttl_secs).ok_or_else(|| ConfigError::Invalid {
            var: TOKEN_TTL_SECS_ENV,
            reason: "out of range".to_string(),
        })?;

        let defaults = RateLimitConfig::default();
        let window_secs = parse_or(&get, RATE_LIMIT_WINDOW_SECS_ENV, defaults.window.as_secs())?;
        if window_secs == 0 {
            return Err(ConfigError::Invalid {
                var: RATE_LIMIT_WINDOW_SECS_ENV,
                reason: "must be greater than zero".to_string(),
            });
        }
        let rate_limit = RateLimitConfig {
            max_requests: parse_or(&get, RATE_LIMIT_MAX_REQUESTS_ENV, defaults.max_requests)?,
            window: StdDuration::from_secs(window_secs),
            max_tracked_clients: parse_or(&get, RATE_LIMIT_MAX_CLIENTS_ENV, defaults.max_tracked_clients)?,
        };

        let cors_allow_origins = get(CORS_ALLOW_ORIGINS_ENV)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            environment,
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&get, PORT_ENV, DEFAULT_PORT)?,
            log_format: get(LOG_FORMAT_ENV)
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
            token: TokenConfig {
                symmetric_key: lookup(TOKEN_SYMMETRIC_KEY_ENV).filter(|v| !v.is_empty()),
                signing_key: get(TOKEN_SIGNING_KEY_ENV),
                verifying_key: get(TOKEN_VERIFYING_KEY_ENV),
                ttl,
            },
            rate_limit,
            trust_proxy_headers: parse_or(&get, RATE_LIMIT_TRUST_PROXY_HEADERS_ENV, false)?,
            cors_allow_origins,
        })
    }

    /// Socket address string to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<G, T>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match get(var) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
