// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User repository.
//!
//! Email and username are stored lower-cased; callers normalize before
//! querying.

use uuid::Uuid;

use super::super::{Database, Filter, StoreResult, Update, ID_FIELD, USERS};
use super::{from_document, to_document};
use crate::models::{Money, Patch, User};

pub const EMAIL: &str = "email";
pub const USERNAME: &str = "username";
pub const BIO: &str = "bio";
pub const PROFILE_PIC: &str = "profile_pic";
pub const WALLET: &str = "wallet_cents";

/// Repository for user records.
pub struct UserRepository<'a> {
    db: &'a Database,
}

impl<'a> UserRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    async fn find(&self, filter: Filter) -> StoreResult<Option<User>> {
        self.db
            .find_one(USERS, filter)
            .await?
            .map(from_document)
            .transpose()
    }

    pub async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.find(Filter::eq(ID_FIELD, id.to_string())).await
    }

    pub async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.find(Filter::eq(EMAIL, email)).await
    }

    pub async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.find(Filter::eq(USERNAME, username)).await
    }

    /// Insert a new user.
    ///
    /// Fails with `StoreError::Duplicate` when the email or username is taken.
    pub async fn create(&self, user: &User) -> StoreResult<()> {
        self.db.insert_one(USERS, to_document(user)?).await?;
        Ok(())
    }

    /// Add `amount` to the wallet with a single field increment.
    pub async fn increment_wallet(&self, id: Uuid, amount: Money) -> StoreResult<()> {
        self.db
            .update_by_id(
                USERS,
                id.to_string(),
                Update::new().inc(WALLET, amount.cents()),
            )
            .await
    }

    /// Apply the present profile fields. `Patch::Clear` stores an empty
    /// string; absent fields are untouched.
    pub async fn update_profile(
        &self,
        id: Uuid,
        bio: &Patch<String>,
        profile_pic: &Patch<String>,
    ) -> StoreResult<()> {
        let mut update = Update::new();
        for (name, patch) in [(BIO, bio), (PROFILE_PIC, profile_pic)] {
            match patch {
                Patch::Absent => {}
                Patch::Clear => update = update.set(name, ""),
                Patch::Set(value) => update = update.set(name, value.as_str()),
            }
        }
        if update.is_empty() {
            return Ok(());
        }
        self.db.update_by_id(USERS, id.to_string(), update).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreError;
    use chrono::Utc;

    fn user(username: &str) -> User {
        User {
            id: Uuid::new_v4(),
            name: username.to_uppercase(),
            email: format!("{username}@example.com"),
            username: username.to_string(),
            password_hash: "hash".to_string(),
            bio: "original bio".to_string(),
            profile_pic: "original.png".to_string(),
            wallet_cents: Money::ZERO,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_and_lookup() {
        let db = Database::in_memory();
        let repo = UserRepository::new(&db);
        let alice = user("alice");
        repo.create(&alice).await.unwrap();

        assert_eq!(repo.find_by_id(alice.id).await.unwrap(), Some(alice.clone()));
        assert_eq!(
            repo.find_by_email("alice@example.com").await.unwrap(),
            Some(alice.clone())
        );
        assert_eq!(repo.find_by_username("alice").await.unwrap(), Some(alice));
        assert_eq!(repo.find_by_username("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let db = Database::in_memory();
        let repo = UserRepository::new(&db);
        repo.create(&user("alice")).await.unwrap();

        let mut clash = user("alice");
        clash.email = "other@example.com".to_string();
        let err = repo.create(&clash).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { field: ref name } if name == USERNAME));
    }

    #[tokio::test]
    async fn wallet_increment_and_profile_patch() {
        let db = Database::in_memory();
        let repo = UserRepository::new(&db);
        let bob = user("bob");
        repo.create(&bob).await.unwrap();

        repo.increment_wallet(bob.id, Money::from_cents(1000))
            .await
            .unwrap();
        repo.increment_wallet(bob.id, Money::from_cents(1))
            .await
            .unwrap();
        repo.update_profile(bob.id, &Patch::Set("new bio".to_string()), &Patch::Absent)
            .await
            .unwrap();

        let stored = repo.find_by_id(bob.id).await.unwrap().unwrap();
        assert_eq!(stored.wallet_cents, Money::from_cents(1001));
        assert_eq!(stored.bio, "new bio");
        assert_eq!(stored.profile_pic, "original.png");

        repo.update_profile(bob.id, &Patch::Absent, &Patch::Clear)
            .await
            .unwrap();
        let stored = repo.find_by_id(bob.id).await.unwrap().unwrap();
        assert_eq!(stored.bio, "new bio");
        assert_eq!(stored.profile_pic, "");
    }
}
