// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{Role, RouteGuard, TokenService};
use crate::config::{AppConfig, ConfigError, Environment};
use crate::rate_limit::{RateLimitGuard, RateLimiter};

/// Shared services built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub limiter: Arc<RateLimiter>,
    pub environment: Environment,
    pub trust_proxy_headers: bool,
    pub cors_allow_origins: Arc<[String]>,
}

impl AppState {
    pub fn new(tokens: TokenService, limiter: RateLimiter, environment: Environment) -> Self {
        Self {
            tokens: Arc::new(tokens),
            limiter: Arc::new(limiter),
            environment,
            trust_proxy_headers: false,
            cors_allow_origins: Arc::from(Vec::new()),
        }
    }

    /// Build from configuration. Fails on missing or malformed key material.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let scheme = config.environment.token_scheme();
        let tokens = TokenService::from_config(scheme, &config.token)?;
        let limiter = RateLimiter::new(config.rate_limit.clone());

        Ok(Self {
            trust_proxy_headers: config.trust_proxy_headers,
            cors_allow_origins: Arc::from(config.cors_allow_origins.clone()),
            ..Self::new(tokens, limiter, config.environment)
        })
    }

    /// Guard admitting only the given roles.
    pub fn guard<I, R>(&self, roles: I) -> RouteGuard
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        RouteGuard::new(self.tokens.clone(), roles, self.environment)
    }

    pub fn rate_limit_guard(&self) -> RateLimitGuard {
        RateLimitGuard::new(self.limiter.clone(), self.environment, self.trust_proxy_headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenScheme;
    use crate::config::TOKEN_SYMMETRIC_KEY_ENV;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(move |name| {
            vars.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    #[test]
    fn development_state_uses_encrypted_tokens() {
        let config = config(&[(TOKEN_SYMMETRIC_KEY_ENV, "wubbalubbadubdubwubbalubbadubdub")]);
        let state = AppState::from_config(&config).unwrap();
        assert_eq!(state.tokens.scheme(), TokenScheme::Encrypted);
        assert_eq!(state.environment, Environment::Development);
    }

    #[test]
    fn missing_key_fails_startup() {
        let config = config(&[]);
        assert!(matches!(
            AppState::from_config(&config),
            Err(ConfigError::Missing(TOKEN_SYMMETRIC_KEY_ENV))
        ));
    }

    #[test]
    fn production_requires_signing_key() {
        let config = config(&[
            ("APP_ENV", "production"),
            (TOKEN_SYMMETRIC_KEY_ENV, "wubbalubbadubdubwubbalubbadubdub"),
        ]);
        assert!(AppState::from_config(&config).is_err());
    }
}
