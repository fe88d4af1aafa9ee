// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub environment: String,
    /// Addresses currently tracked by the rate limiter.
    pub tracked_clients: usize,
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        environment: state.environment.to_string(),
        tracked_clients: state.limiter.tracked_clients(),
    })
}
