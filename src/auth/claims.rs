// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token claims and the authenticated request identity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::User;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Session ID, fresh for every register/login
    #[serde(default)]
    pub sid: Option<String>,

    /// Issued at timestamp
    pub iat: i64,

    /// Expiration timestamp
    pub exp: i64,
}

/// Identity resolved for a request by the session gate.
///
/// Handlers receive this through the [`Auth`](super::Auth) extractor; it
/// holds the user record as loaded when the request arrived.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,

    /// Session ID from the token (if present)
    pub session_id: Option<String>,

    /// Token expiration (Unix timestamp)
    pub expires_at: i64,
}

impl AuthenticatedUser {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }
}
