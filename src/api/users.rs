// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Profile endpoints.

use axum::{extract::State, Json};

use super::{ApiJson, ApiPath};
use crate::{
    auth::Auth,
    error::ApiError,
    models::{MessageResponse, PublicProfileResponse, UpdateProfileRequest},
    services::profile,
    state::AppState,
};

const UPDATE_SEGMENT: &str = "update";

#[utoipa::path(
    get,
    path = "/api/users/{username}",
    params(
        ("username" = String, Path, description = "Username, matched case-insensitively")
    ),
    tag = "Users",
    responses(
        (status = 200, description = "Public profile", body = PublicProfileResponse),
        (status = 404, description = "No such user", body = MessageResponse),
    )
)]
pub async fn get_profile(
    ApiPath(username): ApiPath<String>,
    State(state): State<AppState>,
) -> Result<Json<PublicProfileResponse>, ApiError> {
    let user = profile::get_public_profile(&state.db, &username).await?;
    Ok(Json(PublicProfileResponse { user }))
}

/// Public profile of the user named `update`.
///
/// `GET /api/users/update` lands on the static update route rather than
/// the `{username}` route, so the lookup is repeated here.
pub async fn get_profile_named_update(
    State(state): State<AppState>,
) -> Result<Json<PublicProfileResponse>, ApiError> {
    let user = profile::get_public_profile(&state.db, UPDATE_SEGMENT).await?;
    Ok(Json(PublicProfileResponse { user }))
}

/// Update bio and/or profile picture.
///
/// Omitted fields are left unchanged; `null` clears a field.
#[utoipa::path(
    put,
    path = "/api/users/update",
    request_body = UpdateProfileRequest,
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Profile updated", body = MessageResponse),
        (status = 400, description = "No fields to update", body = MessageResponse),
        (status = 401, description = "Unauthorized - invalid or missing token", body = MessageResponse),
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    Auth(session): Auth,
    ApiJson(request): ApiJson<UpdateProfileRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    profile::update_profile(&state.db, &session.user, request).await?;
    Ok(Json(MessageResponse {
        message: "Profile updated successfully".to_string(),
    }))
}
