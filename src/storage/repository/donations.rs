// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Donation repository.
//!
//! Donations are append-only. Reads always go through an aggregation that
//! joins the sender's display name from `users`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::super::{
    Database, Filter, Pipeline, SortOrder, StoreResult, DONATIONS, ID_FIELD, USERS,
};
use super::{from_document, to_document};
use crate::models::{Donation, Money, WalletDonationView};

const TO_USER: &str = "to_user_id";
const FROM_USER: &str = "from_user_id";
const DATE: &str = "date";
const SENDER: &str = "sender";
const SENDER_NAME: &str = "from_user_name";

/// Projected aggregation row.
#[derive(Debug, Deserialize)]
struct DonationRow {
    id: Uuid,
    amount_cents: Money,
    #[serde(with = "chrono::serde::ts_microseconds")]
    date: DateTime<Utc>,
    #[serde(default)]
    from_user_name: Option<String>,
}

impl From<DonationRow> for WalletDonationView {
    fn from(row: DonationRow) -> Self {
        Self {
            id: row.id,
            amount: row.amount_cents.to_decimal(),
            date: row.date,
            from_user_name: row.from_user_name.filter(|name| !name.trim().is_empty()),
        }
    }
}

fn view_projection() -> [(&'static str, String); 4] {
    [
        (ID_FIELD, ID_FIELD.to_string()),
        ("amount_cents", "amount_cents".to_string()),
        (DATE, DATE.to_string()),
        (SENDER_NAME, format!("{SENDER}.name")),
    ]
}

/// Repository for donation records.
pub struct DonationRepository<'a> {
    db: &'a Database,
}

impl<'a> DonationRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, donation: &Donation) -> StoreResult<()> {
        self.db.insert_one(DONATIONS, to_document(donation)?).await?;
        Ok(())
    }

    /// The `limit` newest donations addressed to `recipient`, newest first.
    pub async fn recent_for_recipient(
        &self,
        recipient: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<WalletDonationView>> {
        let pipeline = Pipeline::new()
            .matching(Filter::eq(TO_USER, recipient.to_string()))
            .sort(DATE, SortOrder::Descending)
            .limit(limit)
            .lookup(USERS, FROM_USER, ID_FIELD, SENDER)
            .project(view_projection());
        self.run(pipeline).await
    }

    /// Donations among `ids` that are addressed to `recipient`, newest first.
    /// Ids belonging to other recipients are dropped silently.
    pub async fn selected_for_recipient(
        &self,
        recipient: Uuid,
        ids: &[Uuid],
    ) -> StoreResult<Vec<WalletDonationView>> {
        let pipeline = Pipeline::new()
            .matching(
                Filter::eq(TO_USER, recipient.to_string())
                    .and_in(ID_FIELD, ids.iter().map(Uuid::to_string)),
            )
            .lookup(USERS, FROM_USER, ID_FIELD, SENDER)
            .project(view_projection())
            .sort(DATE, SortOrder::Descending);
        self.run(pipeline).await
    }

    async fn run(&self, pipeline: Pipeline) -> StoreResult<Vec<WalletDonationView>> {
        self.db
            .aggregate(DONATIONS, pipeline)
            .await?
            .into_iter()
            .map(|doc| from_document::<DonationRow>(doc).map(WalletDonationView::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use crate::storage::UserRepository;
    use chrono::Duration;

    async fn seed_user(db: &Database, username: &str, name: &str) -> User {
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

    fn donation(from: Option<Uuid>, to: Uuid, cents: i64, minutes_ago: i64) -> Donation {
        Donation {
            id: Uuid::new_v4(),
            from_user_id: from,
            to_user_id: to,
            amount_cents: Money::from_cents(cents),
            date: Utc::now() - Duration::minutes(minutes_ago),
            session_id: String::new(),
        }
    }

    #[tokio::test]
    async fn recent_is_newest_first_limited_and_joined() {
        let db = Database::in_memory();
        let alice = seed_user(&db, "alice", "Alice").await;
        let bob = seed_user(&db, "bob", "Bob").await;
        let repo = DonationRepository::new(&db);

        for minutes_ago in (0..25).rev() {
            repo.create(&donation(Some(alice.id), bob.id, 100, minutes_ago))
                .await
                .unwrap();
        }
        let anonymous = donation(None, bob.id, 700, 100);
        repo.create(&anonymous).await.unwrap();
        repo.create(&donation(Some(bob.id), alice.id, 5, 0))
            .await
            .unwrap();

        let recent = repo.recent_for_recipient(bob.id, 20).await.unwrap();
        assert_eq!(recent.len(), 20);
        assert!(recent.windows(2).all(|w| w[0].date >= w[1].date));
        assert!(recent
            .iter()
            .all(|d| d.from_user_name.as_deref() == Some("Alice") && d.amount == 1.0));
        assert!(recent.iter().all(|d| d.id != anonymous.id));

        let all = repo.recent_for_recipient(bob.id, 100).await.unwrap();
        assert_eq!(all.len(), 26);
        let last = all.last().unwrap();
        assert_eq!(last.id, anonymous.id);
        assert_eq!(last.from_user_name, None);
    }

    #[tokio::test]
    async fn selected_only_returns_own_donations() {
        let db = Database::in_memory();
        let alice = seed_user(&db, "alice", "Alice").await;
        let bob = seed_user(&db, "bob", "Bob").await;
        let repo = DonationRepository::new(&db);

        let older = donation(Some(alice.id), bob.id, 100, 10);
        let newer = donation(Some(alice.id), bob.id, 200, 1);
        let foreign = donation(Some(bob.id), alice.id, 300, 5);
        for d in [&older, &newer, &foreign] {
            repo.create(d).await.unwrap();
        }

        let picked = repo
            .selected_for_recipient(bob.id, &[older.id, foreign.id, newer.id, Uuid::new_v4()])
            .await
            .unwrap();
        let ids: Vec<Uuid> = picked.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
        assert_eq!(picked[0].amount, 2.0);
    }
}
