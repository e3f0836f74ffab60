// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session gate middleware for Axum.
//!
//! Applied to the protected router subtree. On success the resolved
//! [`AuthenticatedUser`](super::AuthenticatedUser) is stored in the request
//! extensions, where the [`Auth`](super::Auth) extractor picks it up; on
//! failure the request never reaches a handler.
//!
//! ```rust,ignore
//! let protected = Router::new()
//!     .route("/wallet", get(donations::get_wallet))
//!     .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_session));
//! ```

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::extractor::resolve_session;
use crate::state::AppState;

/// Authentication middleware function.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match resolve_session(request.headers(), &state).await {
        Ok(user) => {
            debug!(user_id = %user.user_id(), "Session resolved");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}
