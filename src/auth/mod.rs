// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Password hashing, session tokens and the single authorization gate used
//! by every protected route.
//!
//! ## Auth Flow
//!
//! 1. Register or login verifies credentials and issues an HS256 token
//!    (`sub` = user id, `sid` = fresh session id, `exp` = now + 7 days)
//! 2. Clients send `Authorization: Bearer <token>`
//! 3. The server:
//!    - Verifies signature, algorithm and expiry
//!    - Parses `sub` as a user id and loads the user record
//!    - Hands the record to the handler as [`AuthenticatedUser`]
//!
//! ## Security
//!
//! - Only HS256 is accepted; tokens declaring any other algorithm fail
//! - Passwords are stored as salted Argon2id hashes
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod middleware;
pub mod password;
pub mod tokens;

pub use claims::{AuthenticatedUser, Claims};
pub use error::AuthError;
pub use extractor::{resolve_session, Auth};
pub use middleware::require_session;
pub use password::PasswordError;
pub use tokens::{TokenError, TokenService};
