// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registration, login and current-user endpoints.

use axum::{extract::State, http::StatusCode, Json};

use super::ApiJson;
use crate::{
    auth::Auth,
    error::ApiError,
    models::{AuthResponse, CurrentUserResponse, LoginRequest, MessageResponse, RegisterRequest},
    services::{accounts, profile},
    state::AppState,
};

/// Create an account and return a session token.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    tag = "Auth",
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Missing field or short password", body = MessageResponse),
        (status = 409, description = "Email or username already in use", body = MessageResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let response = accounts::register(&state.db, &state.tokens, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Exchange credentials for a session token.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    tag = "Auth",
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid email or password", body = MessageResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let response = accounts::login(&state.db, &state.tokens, request).await?;
    Ok(Json(response))
}

/// The authenticated user's private profile.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current user", body = CurrentUserResponse),
        (status = 401, description = "Unauthorized - invalid or missing token", body = MessageResponse),
    )
)]
pub async fn me(Auth(session): Auth) -> Json<CurrentUserResponse> {
    Json(CurrentUserResponse {
        user: profile::current_user(&session.user),
    })
}
