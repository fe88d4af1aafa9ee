// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{middleware::from_fn_with_state, routing::get, Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::{
    auth::{require_roles, Auth, Role},
    config::ConfigError,
    cors::cors_layer,
    error::{route_not_found, ApiResponse, Message},
    rate_limit::rate_limit,
    state::AppState,
};

pub mod health;

/// Identity echoed back by `/v1/me`.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: String,
    pub username: String,
    pub account_type: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_office_id: Option<String>,
}

pub async fn me(Auth(payload): Auth) -> Json<ApiResponse<MeResponse>> {
    Json(ApiResponse::success(
        Message::new("Berhasil", "Success"),
        MeResponse {
            id: payload.id,
            username: payload.username,
            account_type: payload.role,
            position_id: payload.position_id,
            branch_office_id: payload.branch_office_id,
        },
    ))
}

pub async fn admin_ping(Auth(payload): Auth) -> Json<ApiResponse<String>> {
    Json(ApiResponse::success(
        Message::new("Berhasil", "Success"),
        format!("pong, {}", payload.username),
    ))
}

/// Build the application router.
///
/// Layer order, outermost first: trace, CORS, rate limit, then the per-route
/// role guards.
pub fn router(state: AppState) -> Result<Router, ConfigError> {
    let cors = cors_layer(&state.cors_allow_origins)?;

    let member_routes = Router::new()
        .route("/me", get(me))
        .route_layer(from_fn_with_state(
            state.guard([Role::ADMIN, Role::USER]),
            require_roles,
        ));

    let admin_routes = Router::new()
        .route("/admin/ping", get(admin_ping))
        .route_layer(from_fn_with_state(state.guard([Role::ADMIN]), require_roles));

    let v1_routes = Router::new().merge(member_routes).merge(admin_routes);

    Ok(Router::new()
        .route("/health", get(health::health))
        .nest("/v1", v1_routes)
        .fallback(route_not_found)
        .with_state(state.clone())
        .layer(from_fn_with_state(state.rate_limit_guard(), rate_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{TokenPayload, TokenService};
    use crate::config::Environment;
    use crate::rate_limit::{RateLimitConfig, RateLimiter};
    use axum::{
        body::{to_bytes, Body},
        extract::ConnectInfo,
        http::{header::AUTHORIZATION, Request, StatusCode},
        response::Response,
    };
    use std::net::SocketAddr;
    use std::time::Duration;
    use tower::ServiceExt;

    fn state(max_requests: u32) -> AppState {
        let tokens =
            TokenService::encrypted(b"wubbalubbadubdubwubbalubbadubdub", chrono::Duration::hours(1)).unwrap();
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(60),
            max_tracked_clients: 1000,
        });
        AppState::new(tokens, limiter, Environment::Release)
    }

    async fn send(app: &Router, uri: &str, token: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let mut request = builder.body(Body::empty()).unwrap();
        let addr: SocketAddr = "192.0.2.10:40000".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = router(state(100)).unwrap();
        let response = send(&app, "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn guarded_routes_enforce_roles() {
        let state = state(100);
        let user = state
            .tokens
            .issue(TokenPayload::new("u-1", "bob", Role::USER).with_branch_office_id("jkt-01"))
            .unwrap();
        let admin = state
            .tokens
            .issue(TokenPayload::new("a-1", "alice", Role::ADMIN))
            .unwrap();
        let app = router(state).unwrap();

        assert_eq!(send(&app, "/v1/me", None).await.status(), StatusCode::UNAUTHORIZED);

        let response = send(&app, "/v1/me", Some(&user)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["data"]["username"], "bob");
        assert_eq!(body["data"]["account_type"], "USER");
        assert_eq!(body["data"]["branch_office_id"], "jkt-01");

        assert_eq!(
            send(&app, "/v1/admin/ping", Some(&user)).await.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            send(&app, "/v1/admin/ping", Some(&admin)).await.status(),
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn unknown_route_is_404_envelope() {
        let app = router(state(100)).unwrap();
        let response = send(&app, "/nope", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(response).await["message"]["id"], "Halaman tidak ditemukan");
    }

    #[tokio::test]
    async fn rate_limit_applies_before_auth() {
        let app = router(state(2)).unwrap();
        assert_eq!(send(&app, "/v1/me", None).await.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(send(&app, "/health", None).await.status(), StatusCode::OK);
        assert_eq!(
            send(&app, "/v1/me", None).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
