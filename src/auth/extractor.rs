// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(session): Auth) -> impl IntoResponse {
//!     // session.user is the live User record
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use uuid::Uuid;

use super::{AuthError, AuthenticatedUser};
use crate::state::AppState;
use crate::storage::UserRepository;

/// Extractor for authenticated users.
///
/// Reuses the identity attached by [`require_session`](super::require_session)
/// when the route sits behind it, and resolves the bearer token itself
/// otherwise.
///
/// # Example
///
/// ```rust,ignore
/// async fn get_wallet(
///     Auth(session): Auth,
///     State(state): State<AppState>,
/// ) -> Result<Json<WalletResponse>, ApiError> {
///     // session.user.id is the authenticated user's ID
/// }
/// ```
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // First check if middleware already set the user
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let user = resolve_session(&parts.headers, state).await?;
        Ok(Auth(user))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let mut parts = auth_header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AuthError::InvalidAuthHeader),
    }
}

/// Resolve request headers to a live user.
///
/// Validates the bearer token, parses its subject as a user id and loads
/// the user. Any failure short-circuits with an [`AuthError`].
pub async fn resolve_session(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<AuthenticatedUser, AuthError> {
    let token = bearer_token(headers)?;
    let claims = state.tokens.validate(token)?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidSubject)?;

    let user = UserRepository::new(&state.db)
        .find_by_id(user_id)
        .await
        .map_err(|e| AuthError::LookupFailed(e.to_string()))?
        .ok_or(AuthError::UserNotFound)?;

    Ok(AuthenticatedUser {
        user,
        session_id: claims.sid,
        expires_at: claims.exp,
    })
}
