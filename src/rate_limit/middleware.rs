// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum layer applying the [`RateLimiter`] to every request.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use super::{RateLimitError, RateLimiter};
use crate::config::Environment;
use crate::error::{ApiResponse, Message};

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Key used when no address can be determined. All such requests share it.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Middleware state.
#[derive(Clone)]
pub struct RateLimitGuard {
    limiter: Arc<RateLimiter>,
    environment: Environment,
    trust_proxy_headers: bool,
}

impl RateLimitGuard {
    pub fn new(limiter: Arc<RateLimiter>, environment: Environment, trust_proxy_headers: bool) -> Self {
        Self {
            limiter,
            environment,
            trust_proxy_headers,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Resolve the client key for a request.
    ///
    /// Forwarding headers are only honoured when the service sits behind a
    /// proxy that overwrites them; otherwise any client could pick its own key.
    pub fn client_address(&self, request: &Request) -> String {
        if self.trust_proxy_headers {
            if let Some(address) = forwarded_address(request.headers()) {
                return address;
            }
        }
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }
}

/// First hop of `X-Forwarded-For`, then `X-Real-IP`.
fn forwarded_address(headers: &HeaderMap) -> Option<String> {
    let forwarded_for = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(address) = forwarded_for {
        return Some(address.to_string());
    }

    headers
        .get(X_REAL_IP)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn too_many_requests(err: RateLimitError, environment: Environment) -> Response {
    let message = Message::new(
        "Permintaannya terlalu banyak, silahkan coba lagi dalam 1 menit!",
        "There are too many requests, please try again in 1 minute!",
    );
    let body = ApiResponse::error(&err, message, environment);

    // Round up so clients never retry before the slot frees.
    let retry_after = err.retry_after();
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(RETRY_AFTER, HeaderValue::from(secs.max(1)));
    response
}

/// Rate limiting middleware function.
pub async fn rate_limit(State(guard): State<RateLimitGuard>, request: Request, next: Next) -> Response {
    let client = guard.client_address(&request);
    match guard.limiter.check(&client) {
        Ok(()) => next.run(request).await,
        Err(err) => {
            tracing::warn!(client = %client, error = %err, "Rate limit exceeded");
            too_many_requests(err, guard.environment)
        }
    }
}
