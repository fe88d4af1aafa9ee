// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for the verified token payload.
//!
//! The payload is attached by [`require_roles`](super::middleware::require_roles);
//! these extractors only read it back:
//!
//! ```rust,ignore
//! async fn whoami(Auth(payload): Auth) -> impl IntoResponse {
//!     // payload is the TokenPayload verified by the route guard
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{AuthError, TokenPayload};

/// Verified payload of the current request.
///
/// Rejects with 401 when used on a route that has no guard in front of it.
#[derive(Debug, Clone)]
pub struct Auth(pub TokenPayload);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TokenPayload>()
            .cloned()
            .map(Auth)
            .ok_or(AuthError::MissingIdentity)
    }
}

/// Optional variant for routes shared between guarded and open routers.
#[derive(Debug, Clone)]
pub struct OptionalAuth(pub Option<TokenPayload>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(parts.extensions.get::<TokenPayload>().cloned()))
    }
}
