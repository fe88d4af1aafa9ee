// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token payload and its serialized projections.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::roles::Role;

/// JSON keys owned by the canonical payload fields. They can never be used
/// as extension keys: the extensions are flattened into the same object.
pub const RESERVED_CLAIMS: [&str; 8] = [
    "id",
    "username",
    "account_type",
    "role",
    "issued_at",
    "expired_at",
    "position_id",
    "branch_office_id",
];

pub fn is_reserved_claim(key: &str) -> bool {
    RESERVED_CLAIMS.contains(&key)
}

/// Claim set embedded in every issued token.
///
/// The JSON field names are the wire contract shared with tokens minted by
/// earlier deployments: `id`, `username`, `account_type` (`role` is accepted
/// on input), `issued_at`, `expired_at` and the optional tenant scoping
/// fields. Anything else found in a token lands in `extensions` and is
/// re-emitted unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPayload {
    /// Subject identifier (user ID). Empty when the token was issued with
    /// the public projection.
    #[serde(default)]
    pub id: String,

    /// Login / display name
    pub username: String,

    /// The single role used for route authorization
    #[serde(rename = "account_type", alias = "role")]
    pub role: Role,

    /// Unix seconds, stamped at issuance
    #[serde(default)]
    pub issued_at: i64,

    /// Unix seconds; the token is valid while `now <= expired_at`
    #[serde(default)]
    pub expired_at: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_office_id: Option<String>,

    /// Additional claims carried through untouched.
    #[serde(flatten)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl TokenPayload {
    /// Start a payload for a login. Timestamps are filled in by the token
    /// service at issuance.
    pub fn new(id: impl Into<String>, username: impl Into<String>, role: impl Into<Role>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            role: role.into(),
            issued_at: 0,
            expired_at: 0,
            position_id: None,
            branch_office_id: None,
            extensions: BTreeMap::new(),
        }
    }

    pub fn with_position_id(mut self, position_id: impl Into<String>) -> Self {
        self.position_id = Some(position_id.into());
        self
    }

    pub fn with_branch_office_id(mut self, branch_office_id: impl Into<String>) -> Self {
        self.branch_office_id = Some(branch_office_id.into());
        self
    }

    /// Attach an extra claim. Keys in [`RESERVED_CLAIMS`] are ignored.
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        let key = key.into();
        if is_reserved_claim(&key) {
            tracing::warn!(key = %key, "Ignoring extension claim with reserved name");
            return self;
        }
        self.extensions.insert(key, value.into());
        self
    }

    /// Drop extensions that would collide with a canonical field.
    pub(crate) fn strip_reserved_extensions(&mut self) {
        self.extensions.retain(|key, _| !is_reserved_claim(key));
    }

    /// Whether the token is still valid at `now` (Unix seconds).
    pub fn is_valid_at(&self, now: i64) -> bool {
        now <= self.expired_at
    }

    /// Serialize the projection selected by `access`.
    pub(crate) fn to_json(&self, access: AccessLevel) -> serde_json::Result<String> {
        match access {
            AccessLevel::Full => serde_json::to_string(self),
            AccessLevel::Public => serde_json::to_string(&PublicProjection::from(self)),
        }
    }
}

/// Which projection of the payload gets protected at issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessLevel {
    /// Everything except the subject identifier
    Public,
    /// The whole payload
    #[default]
    Full,
}

/// Borrowed view of a payload without `id`.
#[derive(Serialize)]
struct PublicProjection<'a> {
    username: &'a str,
    account_type: &'a Role,
    issued_at: i64,
    expired_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    position_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch_office_id: Option<&'a str>,
    #[serde(flatten)]
    extensions: &'a BTreeMap<String, serde_json::Value>,
}

impl<'a> From<&'a TokenPayload> for PublicProjection<'a> {
    fn from(payload: &'a TokenPayload) -> Self {
        Self {
            username: &payload.username,
            account_type: &payload.role,
            issued_at: payload.issued_at,
            expired_at: payload.expired_at,
            position_id: payload.position_id.as_deref(),
            branch_office_id: payload.branch_office_id.as_deref(),
            extensions: &payload.extensions,
        }
    }
}
