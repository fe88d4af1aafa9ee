// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer-token route guard for Axum.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let admin_routes = Router::new()
//!     .route("/admin/ping", get(ping))
//!     .route_layer(axum::middleware::from_fn_with_state(
//!         state.guard([Role::ADMIN]),
//!         require_roles,
//!     ));
//! ```
//!
//! A rejected request never reaches the inner service. An admitted request
//! carries its [`TokenPayload`] in the request extensions, readable with the
//! [`Auth`](super::Auth) extractor.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use super::{AllowedRoles, AuthError, Role, TokenPayload, TokenService};
use crate::config::Environment;

/// Authorization scheme accepted in the `Authorization` header (compared
/// case-insensitively).
pub const BEARER_SCHEME: &str = "bearer";

/// Name under which the verified payload is attached to a request.
pub const AUTHORIZATION_PAYLOAD_KEY: &str = "authorization_payload";

/// Guard state for one route (or route group).
#[derive(Debug, Clone)]
pub struct RouteGuard {
    tokens: Arc<TokenService>,
    allowed: AllowedRoles,
    environment: Environment,
}

impl RouteGuard {
    pub fn new<I, R>(tokens: Arc<TokenService>, allowed: I, environment: Environment) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        Self {
            tokens,
            allowed: AllowedRoles::new(allowed),
            environment,
        }
    }

    pub fn allowed(&self) -> &AllowedRoles {
        &self.allowed
    }

    /// Authenticate and authorize a request from its headers.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<TokenPayload, AuthError> {
        let header = headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::MalformedAuthHeader)?;

        let token = bearer_token(header)?;
        let payload = self.tokens.verify(token)?;

        if !self.allowed.permits(&payload.role) {
            return Err(AuthError::InsufficientPermissions);
        }
        Ok(payload)
    }
}

/// Split `<scheme> <credential>` on whitespace and check the scheme.
fn bearer_token(header: &str) -> Result<&str, AuthError> {
    let mut fields = header.split_whitespace();
    let (Some(scheme), Some(token)) = (fields.next(), fields.next()) else {
        return Err(AuthError::MalformedAuthHeader);
    };

    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return Err(AuthError::UnsupportedScheme(scheme.to_ascii_lowercase()));
    }
    Ok(token)
}

/// Route guard middleware function.
pub async fn require_roles(
    State(guard): State<RouteGuard>,
    mut request: Request,
    next: Next,
) -> Response {
    match guard.authorize(request.headers()) {
        Ok(payload) => {
            tracing::debug!(
                key = AUTHORIZATION_PAYLOAD_KEY,
                username = %payload.username,
                role = %payload.role,
                "Request authorized"
            );
            request.extensions_mut().insert(payload);
            next.run(request).await
        }
        Err(err) => {
            tracing::debug!(
                path = %request.uri().path(),
                reason = err.error_code(),
                "Request rejected by route guard"
            );
            err.into_rejection(guard.environment)
        }
    }
}
