// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Stateless bearer-token authentication and role-based route guards.
//!
//! ## Auth Flow
//!
//! 1. The host application authenticates a user (password, SSO, ...) and
//!    calls [`TokenService::issue`] with a [`TokenPayload`]
//! 2. The client sends `Authorization: Bearer <token>`
//! 3. The route guard:
//!    - Splits the header and checks the `bearer` scheme
//!    - Decrypts (`v2.local`) or verifies (`v2.public`) the PASETO token
//!    - Rejects the token once `now > expired_at`
//!    - Checks the payload role against the route's allow-list
//!    - Attaches the payload to the request for handlers
//!
//! ## Security
//!
//! - Any altered byte invalidates the token (AEAD tag or Ed25519 signature)
//! - Expiry is the only revocation mechanism; keep the TTL short enough
//! - Outside development, all 401 responses look the same

pub mod claims;
pub mod error;
pub mod extractor;
pub mod middleware;
pub mod roles;
pub mod token;

pub use claims::{AccessLevel, TokenPayload};
pub use error::AuthError;
pub use extractor::{Auth, OptionalAuth};
pub use middleware::{require_roles, RouteGuard};
pub use roles::{AllowedRoles, Role};
pub use token::{KeyConfigError, SigningKeys, TokenError, TokenScheme, TokenService};
