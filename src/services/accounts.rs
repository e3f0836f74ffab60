// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registration and login.

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::password::{hash_password_blocking, verify_password_blocking};
use crate::auth::{PasswordError, TokenService};
use crate::error::{ConflictField, ServiceError};
use crate::models::{AuthResponse, LoginRequest, Money, RegisterRequest, SanitizedUser, User};
use crate::storage::repository::users::{EMAIL, USERNAME};
use crate::storage::{Database, StoreError, UserRepository};

pub const MIN_PASSWORD_CHARS: usize = 6;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Trim and lower-case an email or username.
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Create an account and open a session for it.
///
/// The email and username checks give friendly conflicts; the store's
/// unique indexes catch registrations that race past them.
#[instrument(skip_all, fields(username = %input.username.trim()))]
pub async fn register(
    db: &Database,
    tokens: &TokenService,
    input: RegisterRequest,
) -> Result<AuthResponse, ServiceError> {
    let email = normalize_identifier(&input.email);
    let username = normalize_identifier(&input.username);

    // A whitespace-only name is accepted and stored blank; donations made
    // by such a user report the username as sender name.
    if input.name.is_empty() || email.is_empty() || username.is_empty() {
        return Err(ServiceError::validation(
            "Name, email and username are required",
        ));
    }
    let name = input.name.trim().to_string();
    if input.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ServiceError::validation(format!(
            "Password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }

    let users = UserRepository::new(db);
    if users.find_by_email(&email).await?.is_some() {
        return Err(ServiceError::Conflict(ConflictField::Email));
    }
    if users.find_by_username(&username).await?.is_some() {
        return Err(ServiceError::Conflict(ConflictField::Username));
    }

    let password_hash = hash_password_blocking(input.password).await?;
    let user = User {
        id: Uuid::new_v4(),
        name,
        email,
        username,
        password_hash,
        bio: String::new(),
        profile_pic: String::new(),
        wallet_cents: Money::ZERO,
        created_at: Utc::now(),
    };

    users.create(&user).await.map_err(|e| match e {
        StoreError::Duplicate { field } if field == EMAIL => {
            ServiceError::Conflict(ConflictField::Email)
        }
        StoreError::Duplicate { field } if field == USERNAME => {
            ServiceError::Conflict(ConflictField::Username)
        }
        other => ServiceError::Storage(other),
    })?;

    let token = tokens.issue(user.id)?;
    info!(user_id = %user.id, "User registered");

    Ok(AuthResponse {
        token,
        user: SanitizedUser::from(&user),
    })
}

/// Verify credentials and open a session.
///
/// Unknown email and wrong password fail with the same message.
#[instrument(skip_all)]
pub async fn login(
    db: &Database,
    tokens: &TokenService,
    input: LoginRequest,
) -> Result<AuthResponse, ServiceError> {
    let email = normalize_identifier(&input.email);

    let Some(user) = UserRepository::new(db).find_by_email(&email).await? else {
        warn!("Login failed: unknown email");
        return Err(ServiceError::unauthorized(INVALID_CREDENTIALS));
    };

    match verify_password_blocking(user.password_hash.clone(), input.password).await {
        Ok(()) => {}
        Err(PasswordError::Mismatch) => {
            warn!(user_id = %user.id, "Login failed: wrong password");
            return Err(ServiceError::unauthorized(INVALID_CREDENTIALS));
        }
        Err(other) => return Err(other.into()),
    }

    let token = tokens.issue(user.id)?;
    info!(user_id = %user.id, "User logged in");

    Ok(AuthResponse {
        token,
        user: SanitizedUser::from(&user),
    })
}
