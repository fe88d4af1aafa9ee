// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gatekeep - Bearer-Token Authentication for Axum Services
//!
//! Stateless PASETO tokens carrying the caller's identity, role guards in
//! front of protected routes, and an in-memory per-client rate limiter.
//!
//! ## Modules
//!
//! - `api` - Demo HTTP routes wiring the guards together (Axum)
//! - `auth` - Token issuance/verification and role-based route guards
//! - `config` - Environment-driven configuration
//! - `cors` - CORS policy
//! - `error` - Bilingual JSON response envelope
//! - `logging` - Tracing subscriber setup
//! - `rate_limit` - Sliding-window rate limiter and its middleware

pub mod api;
pub mod auth;
pub mod config;
pub mod cors;
pub mod error;
pub mod logging;
pub mod rate_limit;
pub mod state;
