// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use crate::auth::TokenService;
use crate::storage::Database;

/// Shared state handed to every handler.
///
/// Both members are cheap to clone and hold no per-request data.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub tokens: TokenService,
}

impl AppState {
    pub fn new(db: Database, tokens: TokenService) -> Self {
        Self { db, tokens }
    }

    /// State backed by an empty in-memory store.
    pub fn in_memory(jwt_secret: &str) -> Self {
        Self::new(Database::in_memory(), TokenService::new(jwt_secret))
    }
}
