// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles for authorization.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A single role tag carried in a token.
///
/// Roles are an application-defined set of strings. Authorization is plain
/// string equality against a route's allow-list; there is no hierarchy, so
/// `ADMIN` does not implicitly pass a `USER`-only route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    /// Full administrative access
    pub const ADMIN: Role = Role(Cow::Borrowed("ADMIN"));
    /// Regular end user
    pub const USER: Role = Role(Cow::Borrowed("USER"));

    /// Build a role from any application-defined tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Role(Cow::Owned(tag.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for Role {
    fn from(tag: &'static str) -> Self {
        Role(Cow::Borrowed(tag))
    }
}

impl From<String> for Role {
    fn from(tag: String) -> Self {
        Role(Cow::Owned(tag))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The roles permitted on one route.
///
/// Cheap to clone; the list is shared behind an `Arc` because every request
/// through the route's guard consults it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedRoles(Arc<[Role]>);

impl AllowedRoles {
    pub fn new<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        AllowedRoles(roles.into_iter().map(Into::into).collect())
    }

    /// Whether `role` appears in the allow-list (exact match).
    pub fn permits(&self, role: &Role) -> bool {
        self.0.iter().any(|allowed| allowed == role)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<R: Into<Role>> FromIterator<R> for AllowedRoles {
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self {
        AllowedRoles::new(iter)
    }
}
