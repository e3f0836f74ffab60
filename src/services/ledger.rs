// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Donation ledger and wallet queries.
//!
//! ## Write path
//!
//! A donation is two store writes: the ledger entry insert, then a single
//! `inc` on the recipient's wallet. They are not wrapped in one
//! transaction. If the increment fails the entry stays without a matching
//! balance change; this is logged and reported as a storage failure, and
//! nothing reconciles it automatically.

use std::collections::BTreeSet;

use chrono::Utc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::{
    CreateDonationRequest, CreateDonationResponse, Donation, DonationsResponse, Money,
    RecipientSummary, User, WalletDonationView, WalletResponse,
};
use crate::services::accounts::normalize_identifier;
use crate::storage::{Database, DonationRepository, UserRepository};

/// Number of donations returned by [`get_wallet`].
pub const RECENT_DONATIONS_LIMIT: usize = 20;

/// Record a donation from `donor` and credit the recipient.
#[instrument(skip_all, fields(donor_id = %donor.id))]
pub async fn create_donation(
    db: &Database,
    donor: &User,
    session_id: Option<&str>,
    request: CreateDonationRequest,
) -> Result<CreateDonationResponse, ServiceError> {
    let amount = Money::from_decimal(request.amount)
        .filter(|amount| amount.is_positive())
        .ok_or_else(|| ServiceError::validation("Amount must be greater than zero"))?;

    let target = normalize_identifier(&request.to_username);
    if target.is_empty() {
        return Err(ServiceError::validation("Recipient username is required"));
    }
    if target == donor.username {
        return Err(ServiceError::validation("You cannot donate to yourself"));
    }

    let users = UserRepository::new(db);
    let recipient = users
        .find_by_username(&target)
        .await?
        .ok_or_else(|| ServiceError::not_found("Recipient not found"))?;

    let new_balance = recipient
        .wallet_cents
        .checked_add(amount)
        .ok_or_else(|| ServiceError::validation("Amount is too large"))?;

    let donation = Donation {
        id: Uuid::new_v4(),
        from_user_id: Some(donor.id),
        to_user_id: recipient.id,
        amount_cents: amount,
        date: Utc::now(),
        session_id: session_id.unwrap_or_default().to_string(),
    };
    DonationRepository::new(db).create(&donation).await?;

    if let Err(e) = users.increment_wallet(recipient.id, amount).await {
        error!(
            donation_id = %donation.id,
            recipient_id = %recipient.id,
            amount = %amount,
            error = %e,
            "Donation recorded but wallet increment failed"
        );
        return Err(e.into());
    }

    info!(
        donation_id = %donation.id,
        recipient_id = %recipient.id,
        amount = %amount,
        "Donation recorded"
    );

    Ok(CreateDonationResponse {
        donation: WalletDonationView {
            id: donation.id,
            amount: amount.to_decimal(),
            date: donation.date,
            from_user_name: Some(donor.display_name().to_string()),
        },
        recipient: RecipientSummary {
            username: recipient.username,
            name: recipient.name,
            wallet: new_balance.to_decimal(),
        },
    })
}

/// Current balance and the most recent donations received by `user`.
///
/// The user record is re-read so the balance reflects concurrent donations.
pub async fn get_wallet(db: &Database, user: &User) -> Result<WalletResponse, ServiceError> {
    let fresh = UserRepository::new(db)
        .find_by_id(user.id)
        .await?
        .ok_or_else(|| ServiceError::not_found("User not found"))?;

    let donations = DonationRepository::new(db)
        .recent_for_recipient(fresh.id, RECENT_DONATIONS_LIMIT)
        .await?;

    Ok(WalletResponse {
        wallet: fresh.wallet_cents.to_decimal(),
        donations,
    })
}

/// Parse a list of donation ids.
///
/// Parts are trimmed and blanks skipped; one unparsable id fails the whole
/// list, and a list with no ids left is rejected.
pub fn parse_donation_ids<I, S>(raw: I) -> Result<Vec<Uuid>, ServiceError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut ids = BTreeSet::new();
    for part in raw {
        let part = part.as_ref().trim();
        if part.is_empty() {
            continue;
        }
        let id = Uuid::parse_str(part)
            .map_err(|_| ServiceError::validation(format!("Invalid donation id: {part}")))?;
        ids.insert(id);
    }
    if ids.is_empty() {
        return Err(ServiceError::validation("No donation ids given"));
    }
    Ok(ids.into_iter().collect())
}

/// Donations among `ids` addressed to `user`, newest first.
pub async fn get_selected_donations<I, S>(
    db: &Database,
    user: &User,
    ids: I,
) -> Result<DonationsResponse, ServiceError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let ids = parse_donation_ids(ids)?;
    let donations = DonationRepository::new(db)
        .selected_for_recipient(user.id, &ids)
        .await?;
    Ok(DonationsResponse { donations })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{
        Document, DocumentStore, Filter, MemoryStore, StoreError, StoreResult, Update,
        COLLECTIONS, DONATIONS,
    };
    use std::sync::Arc;
    use std::time::Duration;

    async fn seed(db: &Database, username: &str, name: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{username}@example.com"),
            username: username.to_string(),
            password_hash: "hash".to_string(),
            bio: String::new(),
            profile_pic: String::new(),
            wallet_cents: Money::ZERO,
            created_at: Utc::now(),
        };
        UserRepository::new(db).create(&user).await.unwrap();
        user
    }

    fn give(amount: f64, to: &str) -> CreateDonationRequest {
        CreateDonationRequest {
            amount,
            to_username: to.to_string(),
        }
    }

    #[tokio::test]
    async fn donation_rounds_amount_and_credits_recipient() {
        let db = Database::in_memory();
        let alice = seed(&db, "alice", "Alice").await;
        let bob = seed(&db, "bob", "Bob").await;

        let created = create_donation(&db, &alice, Some("sess-1"), give(10.004, " BOB "))
            .await
            .unwrap();
        assert_eq!(created.donation.amount, 10.0);
        assert_eq!(created.donation.from_user_name.as_deref(), Some("Alice"));
        assert_eq!(created.recipient.username, "bob");
        assert_eq!(created.recipient.wallet, 10.0);

        let wallet = get_wallet(&db, &bob).await.unwrap();
        assert_eq!(wallet.wallet, 10.0);
        assert_eq!(wallet.donations[0].id, created.donation.id);
        assert_eq!(wallet.donations[0].amount, 10.0);
        assert_eq!(wallet.donations[0].from_user_name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn newest_donation_comes_first_and_balance_grows_exactly() {
        let db = Database::in_memory();
        let alice = seed(&db, "alice", "Alice").await;
        let bob = seed(&db, "bob", "Bob").await;

        create_donation(&db, &alice, None, give(2.5, "bob")).await.unwrap();
        let before = get_wallet(&db, &bob).await.unwrap().wallet;
        tokio::time::sleep(Duration::from_millis(2)).await;
        let latest = create_donation(&db, &alice, None, give(10.0, "bob"))
            .await
            .unwrap();

        let wallet = get_wallet(&db, &bob).await.unwrap();
        let grown = Money::from_decimal(wallet.wallet).unwrap().cents()
            - Money::from_decimal(before).unwrap().cents();
        assert_eq!(grown, 1000);
        assert_eq!(wallet.donations.len(), 2);
        assert_eq!(wallet.donations[0].id, latest.donation.id);
    }

    #[tokio::test]
    async fn non_positive_amounts_are_rejected() {
        let db = Database::in_memory();
        let alice = seed(&db, "alice", "Alice").await;
        seed(&db, "bob", "Bob").await;

        for amount in [0.0, -5.0, 0.004, f64::NAN] {
            let err = create_donation(&db, &alice, None, give(amount, "bob"))
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)), "{amount}");
        }
    }

    #[tokio::test]
    async fn self_and_unknown_targets_are_rejected() {
        let db = Database::in_memory();
        let alice = seed(&db, "alice", "Alice").await;

        let err = create_donation(&db, &alice, None, give(10.0, "Alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = create_donation(&db, &alice, None, give(10.0, "  "))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = create_donation(&db, &alice, None, give(10.0, "ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn blank_display_name_falls_back_to_username() {
        let db = Database::in_memory();
        let anon = seed(&db, "anon", "   ").await;
        seed(&db, "bob", "Bob").await;

        let created = create_donation(&db, &anon, None, give(1.0, "bob"))
            .await
            .unwrap();
        assert_eq!(created.donation.from_user_name.as_deref(), Some("anon"));
    }

    #[tokio::test]
    async fn session_id_is_stored_but_not_exposed() {
        let db = Database::in_memory();
        let alice = seed(&db, "alice", "Alice").await;
        seed(&db, "bob", "Bob").await;

        let created = create_donation(&db, &alice, Some("sess-42"), give(1.0, "bob"))
            .await
            .unwrap();
        let stored = db
            .find_one(DONATIONS, Filter::eq("id", created.donation.id.to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["session_id"], "sess-42");

        let json = serde_json::to_string(&created).unwrap();
        assert!(!json.contains("sess-42"));
    }

    #[tokio::test]
    async fn selected_donations_are_limited_to_recipient() {
        let db = Database::in_memory();
        let alice = seed(&db, "alice", "Alice").await;
        let bob = seed(&db, "bob", "Bob").await;
        let carol = seed(&db, "carol", "Carol").await;

        let to_bob = create_donation(&db, &alice, None, give(1.0, "bob"))
            .await
            .unwrap();
        let to_carol = create_donation(&db, &alice, None, give(2.0, "carol"))
            .await
            .unwrap();

        let ids = [to_bob.donation.id.to_string(), to_carol.donation.id.to_string()];
        let for_bob = get_selected_donations(&db, &bob, &ids).await.unwrap();
        assert_eq!(for_bob.donations.len(), 1);
        assert_eq!(for_bob.donations[0].id, to_bob.donation.id);

        let for_carol = get_selected_donations(&db, &carol, &ids).await.unwrap();
        assert_eq!(for_carol.donations.len(), 1);
        assert_eq!(for_carol.donations[0].id, to_carol.donation.id);
    }

    #[test]
    fn id_lists_are_parsed_strictly() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let raw = [a.to_string(), String::new(), format!(" {b} "), a.to_string()];
        let parsed = parse_donation_ids(&raw).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(parsed.contains(&a) && parsed.contains(&b));

        assert!(matches!(
            parse_donation_ids([a.to_string(), "nope".to_string()]),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            parse_donation_ids(["", " "]),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            parse_donation_ids(Vec::<String>::new()),
            Err(ServiceError::Validation(_))
        ));
    }

    /// Store that refuses every update, to exercise the partial-write path.
    struct NoUpdates(MemoryStore);

    impl DocumentStore for NoUpdates {
        fn scan(&self, collection: &str) -> StoreResult<Vec<Document>> {
            self.0.scan(collection)
        }

        fn insert_one(&self, collection: &str, document: Document) -> StoreResult<String> {
            self.0.insert_one(collection, document)
        }

        fn update_by_id(&self, _collection: &str, _id: &str, _update: &Update) -> StoreResult<()> {
            Err(StoreError::InvalidUpdate("updates disabled".to_string()))
        }

        fn ping(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_increment_leaves_entry_and_reports_storage_error() {
        let db = Database::new(
            Arc::new(NoUpdates(MemoryStore::new(COLLECTIONS))),
            Duration::from_secs(5),
        );
        let alice = seed(&db, "alice", "Alice").await;
        let bob = seed(&db, "bob", "Bob").await;

        let err = create_donation(&db, &alice, None, give(5.0, "bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));

        let wallet = get_wallet(&db, &bob).await.unwrap();
        assert_eq!(wallet.wallet, 0.0);
        assert_eq!(wallet.donations.len(), 1);
    }
}
