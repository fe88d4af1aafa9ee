// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! CORS policy for browser clients.

use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::{ConfigError, CORS_ALLOW_ORIGINS_ENV};

/// Preflight cache lifetime (12 hours).
pub const CORS_MAX_AGE: Duration = Duration::from_secs(12 * 60 * 60);

const ALLOWED_HEADERS: [HeaderName; 9] = [
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::ACCEPT_ENCODING,
    HeaderName::from_static("x-csrf-token"),
    header::AUTHORIZATION,
    header::ACCEPT,
    header::ORIGIN,
    header::CACHE_CONTROL,
    HeaderName::from_static("x-requested-with"),
];

const ALLOWED_METHODS: [Method; 5] = [
    Method::POST,
    Method::GET,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// Build the CORS layer.
///
/// With an explicit origin list, credentials are allowed for those origins.
/// Without one, any origin is accepted and credentials are not.
pub fn cors_layer(allow_origins: &[String]) -> Result<CorsLayer, ConfigError> {
    let layer = CorsLayer::new()
        .allow_methods(ALLOWED_METHODS)
        .allow_headers(ALLOWED_HEADERS)
        .max_age(CORS_MAX_AGE);

    if allow_origins.is_empty() {
        return Ok(layer.allow_origin(Any));
    }

    let origins = allow_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|e| ConfigError::Invalid {
                var: CORS_ALLOW_ORIGINS_ENV,
                reason: format!("{origin}: {e}"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    fn app(layer: CorsLayer) -> Router {
        Router::new().route("/", get(|| async { "ok" })).layer(layer)
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn listed_origin_gets_credentials() {
        let layer = cors_layer(&["https://app.example".to_string()]).unwrap();
        let response = app(layer).oneshot(preflight("https://app.example")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.example");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "43200");
    }

    #[tokio::test]
    async fn unlisted_origin_is_not_echoed() {
        let layer = cors_layer(&["https://app.example".to_string()]).unwrap();
        let response = app(layer).oneshot(preflight("https://evil.example")).await.unwrap();
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[tokio::test]
    async fn empty_list_allows_any_origin_without_credentials() {
        let layer = cors_layer(&[]).unwrap();
        let response = app(layer).oneshot(preflight("https://anywhere.example")).await.unwrap();

        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
    }

    #[test]
    fn invalid_origin_is_a_config_error() {
        let err = cors_layer(&["bad\norigin".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: CORS_ALLOW_ORIGINS_ENV, .. }));
    }
}
