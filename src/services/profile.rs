// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Profile reads and updates.

use tracing::{info, instrument};

use crate::error::ServiceError;
use crate::models::{PublicUser, SanitizedUser, UpdateProfileRequest, User};
use crate::services::accounts::normalize_identifier;
use crate::storage::{Database, UserRepository};

/// Public projection of the user with `username`.
pub async fn get_public_profile(db: &Database, username: &str) -> Result<PublicUser, ServiceError> {
    let username = normalize_identifier(username);
    UserRepository::new(db)
        .find_by_username(&username)
        .await?
        .map(|user| PublicUser::from(&user))
        .ok_or_else(|| ServiceError::not_found("User not found"))
}

/// Private projection of the user resolved by the session gate.
pub fn current_user(user: &User) -> SanitizedUser {
    SanitizedUser::from(user)
}

/// Apply the fields present in `request` to `user`'s profile.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_profile(
    db: &Database,
    user: &User,
    request: UpdateProfileRequest,
) -> Result<(), ServiceError> {
    if request.bio.is_absent() && request.profile_pic.is_absent() {
        return Err(ServiceError::validation("No profile fields to update"));
    }

    UserRepository::new(db)
        .update_profile(user.id, &request.bio, &request.profile_pic)
        .await?;

    info!(
        bio = !request.bio.is_absent(),
        profile_pic = !request.profile_pic.is_absent(),
        "Profile updated"
    );
    Ok(())
}
