// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON response envelope shared by handlers and middleware rejections.
//!
//! Every body carries a `status` flag and a bilingual message (`id` is
//! Indonesian, `en` English). Outside development the raw error text and the
//! source location are dropped.

use std::fmt;
use std::panic::Location;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::config::Environment;

/// Human readable message in both supported languages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub en: String,
}

impl Message {
    pub fn new(id: impl Into<String>, en: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            en: en.into(),
        }
    }
}

/// Response body for both success and failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T = serde_json::Value> {
    pub status: bool,
    pub message: Message,
    /// Raw error text; development only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// `file:line` of the code that produced the error; development only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: Message, data: T) -> Self {
        Self {
            status: true,
            message,
            real_message: None,
            data: Some(data),
            location: None,
        }
    }
}

impl ApiResponse {
    /// Failure body. Records the caller's location when the environment
    /// allows diagnostics.
    #[track_caller]
    pub fn error(err: &dyn fmt::Display, message: Message, environment: Environment) -> Self {
        let location = Location::caller();
        if !environment.exposes_diagnostics() {
            return Self {
                status: false,
                message,
                real_message: None,
                data: None,
                location: None,
            };
        }
        Self {
            status: false,
            message,
            real_message: Some(err.to_string()),
            data: None,
            location: Some(format!("{}:{}", location.file(), location.line())),
        }
    }

    pub fn route_not_found() -> Self {
        Self {
            status: false,
            message: Message::new("Halaman tidak ditemukan", "Page not found"),
            real_message: None,
            data: None,
            location: None,
        }
    }
}

/// An error response: status code plus envelope.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ApiResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, body: ApiResponse) -> Self {
        Self { status, body }
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, ApiResponse::route_not_found())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Router fallback for unknown paths.
pub async fn route_not_found() -> ApiError {
    ApiError::not_found()
}
