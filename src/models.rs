// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Domain records, derived views and request/response bodies.
//!
//! Stored records ([`User`], [`Donation`]) use snake_case field names and
//! integer cents. API bodies use camelCase and render money as a decimal
//! number with at most two fraction digits.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// =============================================================================
// Money
// =============================================================================

/// Monetary amount in integer cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Round a decimal amount to the nearest cent.
    ///
    /// Returns `None` for NaN, infinities and values outside the `i64` cent
    /// range.
    pub fn from_decimal(amount: f64) -> Option<Self> {
        if !amount.is_finite() {
            return None;
        }
        let cents = (amount * 100.0).round();
        if cents < i64::MIN as f64 || cents > i64::MAX as f64 {
            return None;
        }
        Some(Money(cents as i64))
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub fn to_decimal(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

// =============================================================================
// Stored Records
// =============================================================================

/// Registered account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Lower-cased, unique.
    pub email: String,
    /// Lower-cased, unique.
    pub username: String,
    /// Argon2 PHC string. Never leaves the server.
    pub password_hash: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub profile_pic: String,
    /// Only ever increased by recorded donations.
    #[serde(default)]
    pub wallet_cents: Money,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Name shown to donation recipients: the trimmed display name, or the
    /// username when the name is blank.
    pub fn display_name(&self) -> &str {
        let name = self.name.trim();
        if name.is_empty() {
            &self.username
        } else {
            name
        }
    }
}

/// Append-only ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donation {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_user_id: Option<Uuid>,
    pub to_user_id: Uuid,
    pub amount_cents: Money,
    /// Stored as microseconds since the epoch so sort stages compare numbers.
    #[serde(with = "chrono::serde::ts_microseconds")]
    pub date: DateTime<Utc>,
    /// Session that created the entry. Internal only.
    #[serde(default)]
    pub session_id: String,
}

// =============================================================================
// Derived Views
// =============================================================================

/// Owner-visible projection of a user: everything except the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub username: String,
    pub bio: String,
    pub profile_pic: String,
    /// Wallet balance with two decimal places.
    pub wallet: f64,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for SanitizedUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            bio: user.bio.clone(),
            profile_pic: user.profile_pic.clone(),
            wallet: user.wallet_cents.to_decimal(),
            created_at: user.created_at,
        }
    }
}

/// Projection of a user visible to anyone: no email, no wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub bio: String,
    pub profile_pic: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            username: user.username.clone(),
            bio: user.bio.clone(),
            profile_pic: user.profile_pic.clone(),
            created_at: user.created_at,
        }
    }
}

/// A donation as shown in the recipient's wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletDonationView {
    pub id: Uuid,
    pub amount: f64,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_user_name: Option<String>,
}

/// Recipient state returned after a donation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecipientSummary {
    pub username: String,
    pub name: String,
    /// Balance after the donation, computed locally.
    pub wallet: f64,
}

// =============================================================================
// Patch
// =============================================================================

/// Tri-state field of a partial update.
///
/// Deserialize with `#[serde(default)]`: a missing key is [`Patch::Absent`],
/// `null` is [`Patch::Clear`], any other value is [`Patch::Set`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    #[default]
    Absent,
    Clear,
    Set(T),
}

impl<T> Patch<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Patch::Absent)
    }
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Patch::Set(value),
            None => Patch::Clear,
        })
    }
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDonationRequest {
    /// Decimal amount; rounded to cents.
    pub amount: f64,
    #[serde(default)]
    pub to_username: String,
}

/// Profile fields to change. Omitted fields are left as they are; `null`
/// clears a field.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub bio: Patch<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub profile_pic: Patch<String>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SelectedDonationsQuery {
    /// Comma-separated donation ids.
    pub ids: Option<String>,
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: SanitizedUser,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CurrentUserResponse {
    pub user: SanitizedUser,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PublicProfileResponse {
    pub user: PublicUser,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    pub wallet: f64,
    pub donations: Vec<WalletDonationView>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateDonationResponse {
    pub donation: WalletDonationView,
    pub recipient: RecipientSummary,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DonationsResponse {
    pub donations: Vec<WalletDonationView>,
}
