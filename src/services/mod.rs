// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Core operations.
//!
//! Each operation takes its dependencies explicitly (a [`Database`]
//! handle, the [`TokenService`] where tokens are issued, the authenticated
//! [`User`] where one is required) and returns a
//! [`ServiceError`](crate::error::ServiceError). HTTP concerns stay in
//! [`crate::api`].
//!
//! [`Database`]: crate::storage::Database
//! [`TokenService`]: crate::auth::TokenService
//! [`User`]: crate::models::User

pub mod accounts;
pub mod ledger;
pub mod profile;
