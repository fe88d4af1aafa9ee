// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use super::token::TokenError;
use crate::config::Environment;
use crate::error::{ApiResponse, Message};

/// Reasons a request is turned away by a route guard.
///
/// Everything except `InsufficientPermissions` is an authentication failure
/// and maps to 401. Outside development all 401s share one message so the
/// client cannot tell which check failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("authorization header is not provided")]
    MissingAuthHeader,
    #[error("invalid authorization header format")]
    MalformedAuthHeader,
    #[error("unsupported authorization type {0}")]
    UnsupportedScheme(String),
    #[error("token is invalid")]
    InvalidToken,
    #[error("token has expired")]
    TokenExpired,
    #[error("forbidden access: role not permitted")]
    InsufficientPermissions,
    /// A handler asked for the verified payload on a route without a guard.
    #[error("no verified identity attached to request")]
    MissingIdentity,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::MalformedAuthHeader => "malformed_auth_header",
            AuthError::UnsupportedScheme(_) => "unsupported_auth_scheme",
            AuthError::InvalidToken => "invalid_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::InsufficientPermissions => "insufficient_permissions",
            AuthError::MissingIdentity => "missing_identity",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, AuthError::InsufficientPermissions)
    }

    fn message(&self) -> Message {
        if self.is_forbidden() {
            Message::new(
                "Anda tidak memiliki akses ke halaman ini",
                "You do not have access to this resource",
            )
        } else {
            Message::new(
                "Anda belum masuk atau sesi telah berakhir, silahkan masuk kembali",
                "You are not authenticated or your session has expired, please sign in again",
            )
        }
    }

    /// Build the rejection response. Diagnostics (which check failed, source
    /// location) are only included where `environment` allows them.
    #[track_caller]
    pub fn into_rejection(self, environment: Environment) -> Response {
        let body = ApiResponse::error(&self, self.message(), environment);
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::InvalidToken | TokenError::KeyConfig(_) => AuthError::InvalidToken,
        }
    }
}

/// Production-safe rendering, used when no environment is at hand
/// (extractor rejections).
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.into_rejection(Environment::Production)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn missing_auth_returns_401() {
        let response = AuthError::MissingAuthHeader.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_of(response).await;
        assert_eq!(body["status"], false);
        assert!(body.get("real_message").is_none());
    }

    #[tokio::test]
    async fn insufficient_permissions_returns_403() {
        let response = AuthError::InsufficientPermissions.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn development_rejection_names_the_failed_check() {
        let response = AuthError::TokenExpired.into_rejection(Environment::Development);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_of(response).await;
        assert_eq!(body["real_message"], "token has expired");
        assert!(body["location"].as_str().is_some());
    }

    #[tokio::test]
    async fn production_rejections_look_identical_for_all_401s() {
        let expired = body_of(AuthError::TokenExpired.into_rejection(Environment::Production)).await;
        let invalid = body_of(AuthError::InvalidToken.into_rejection(Environment::Production)).await;
        assert_eq!(expired, invalid);
    }

    #[test]
    fn token_errors_map_to_auth_errors() {
        assert_eq!(AuthError::from(TokenError::Expired), AuthError::TokenExpired);
        assert_eq!(AuthError::from(TokenError::InvalidToken), AuthError::InvalidToken);
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(AuthError::MissingAuthHeader.error_code(), "missing_auth_header");
        assert_eq!(
            AuthError::UnsupportedScheme("basic".into()).error_code(),
            "unsupported_auth_scheme"
        );
        assert_eq!(AuthError::InsufficientPermissions.error_code(), "insufficient_permissions");
    }
}
