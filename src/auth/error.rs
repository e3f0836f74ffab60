// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use super::tokens::TokenError;
use crate::models::MessageResponse;

/// Why the session gate rejected a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No authorization header present
    MissingAuthHeader,
    /// Invalid authorization header format
    InvalidAuthHeader,
    /// Token is malformed
    MalformedToken,
    /// Token signature is invalid or uses another algorithm
    InvalidSignature,
    /// Token has expired
    TokenExpired,
    /// Token subject is not a user id
    InvalidSubject,
    /// Token subject does not resolve to a user
    UserNotFound,
    /// The user could not be loaded
    LookupFailed(String),
    /// Signing secret missing
    NotConfigured,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidSubject => "invalid_subject",
            AuthError::UserNotFound => "user_not_found",
            AuthError::LookupFailed(_) => "lookup_failed",
            AuthError::NotConfigured => "not_configured",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingAuthHeader => write!(f, "Authorization header is required"),
            AuthError::InvalidAuthHeader => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::MalformedToken => write!(f, "Token is malformed"),
            AuthError::InvalidSignature => write!(f, "Token signature is invalid"),
            AuthError::TokenExpired => write!(f, "Session has expired, please log in again"),
            AuthError::InvalidSubject => write!(f, "Token does not identify a user"),
            AuthError::UserNotFound | AuthError::LookupFailed(_) => write!(f, "User not found"),
            AuthError::NotConfigured => write!(f, "Authentication is not configured"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::InvalidSignature => AuthError::InvalidSignature,
            TokenError::Malformed | TokenError::Encoding(_) => AuthError::MalformedToken,
            TokenError::MissingSecret => AuthError::NotConfigured,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            AuthError::LookupFailed(reason) => {
                error!(error_code = self.error_code(), %reason, "Session user lookup failed")
            }
            AuthError::NotConfigured => error!(error_code = self.error_code(), "Session rejected"),
            _ => warn!(error_code = self.error_code(), "Session rejected"),
        }
        let body = Json(MessageResponse {
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}
