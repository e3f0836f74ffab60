// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HS256 session tokens.
//!
//! Tokens are stateless: validity depends only on the signing secret, the
//! algorithm and the absolute expiry (`iat + 7 days`). Nothing is persisted
//! and there is no revocation.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use uuid::Uuid;

use super::Claims;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Lifetime of an issued token.
pub const TOKEN_TTL_DAYS: i64 = 7;

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is malformed")]
    Malformed,

    #[error("token signing secret is not configured")]
    MissingSecret,

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

#[derive(Clone)]
struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Issues and validates session tokens with a symmetric secret.
#[derive(Clone)]
pub struct TokenService {
    keys: Option<Keys>,
}

impl TokenService {
    /// Service signing with `secret`. A blank secret leaves the service
    /// unconfigured: every call then fails with [`TokenError::MissingSecret`].
    pub fn new(secret: &str) -> Self {
        if secret.trim().is_empty() {
            return Self { keys: None };
        }
        Self {
            keys: Some(Keys {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
            }),
        }
    }

    fn keys(&self) -> Result<&Keys, TokenError> {
        self.keys.as_ref().ok_or(TokenError::MissingSecret)
    }

    /// Issue a token for `subject` with a fresh session id, valid for
    /// [`TOKEN_TTL_DAYS`] from now.
    pub fn issue(&self, subject: Uuid) -> Result<String, TokenError> {
        self.issue_at(subject, Utc::now())
    }

    pub(crate) fn issue_at(
        &self,
        subject: Uuid,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let keys = self.keys()?;
        let claims = Claims {
            sub: subject.to_string(),
            sid: Some(Uuid::new_v4().to_string()),
            iat: issued_at.timestamp(),
            exp: (issued_at + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        };
        encode(&Header::new(ALGORITHM), &claims, &keys.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify signature, algorithm and expiry, and return the claims.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let keys = self.keys()?;

        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<Claims>(token, &keys.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::InvalidSignature
                }
                _ => TokenError::Malformed,
            })
    }
}
