// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore backend for `TrackerStore`.
//!
//! Document layout:
//! - `users/{user_id}`
//! - `user_emails/{urlencoded email}` -> `{ user_id }`, created with insert
//!   semantics so the email stays unique under concurrent writers
//! - `daily_entries/{user_id}_{date}`, `day_markers/{user_id}_{date}`
//! - `streaks/{user_id}`
//! - `collectibles/{user_id}_{collectible_id}`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ::firestore::errors::FirestoreError;
use ::firestore::FirestoreWritePrecondition;

use crate::db::{collections, day_doc_id, EntryOp, LedgerCommit, MarkerOp, TrackerStore};
use crate::error::AppError;
use crate::models::{ActivityEntry, Collectible, DayMarker, StreakRecord, User};
use crate::time_utils::DateKey;

/// Email index document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmailIndex {
    user_id: String,
}

/// Partial marker document for the `active` toggle.
#[derive(Debug, Serialize, Deserialize)]
struct ActiveFlag {
    active: bool,
}

fn email_doc_id(email: &str) -> String {
    urlencoding::encode(email).into_owned()
}

fn collectible_doc_id(user_id: &str, collectible_id: u32) -> String {
    format!("{}_{}", user_id, collectible_id)
}

/// Firestore-backed store.
#[derive(Clone)]
pub struct FirestoreStore {
    client: ::firestore::FirestoreDb,
}

impl FirestoreStore {
    /// Connect to Firestore.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = ::firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");
        Ok(Self { client })
    }

    /// Emulator connection with a dummy bearer token.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = ::firestore::FirestoreDbOptions::new(project_id.to_string());
        let client = ::firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore Emulator");
        Ok(Self { client })
    }

    /// Claim `email` for `user_id`. `Ok(false)` if another user holds it.
    async fn claim_email(&self, email: &str, user_id: &str) -> Result<bool, AppError> {
        let index = EmailIndex {
            user_id: user_id.to_string(),
        };
        let result: Result<EmailIndex, FirestoreError> = self
            .client
            .fluent()
            .insert()
            .into(collections::USER_EMAILS)
            .document_id(email_doc_id(email))
            .object(&index)
            .execute()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(FirestoreError::DataConflictError(_)) => Ok(false),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn release_email(&self, email: &str) -> Result<(), AppError> {
        self.client
            .fluent()
            .delete()
            .from(collections::USER_EMAILS)
            .document_id(email_doc_id(email))
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn write_user(&self, user: &User) -> Result<(), AppError> {
        let _: User = self
            .client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.user_id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl TrackerStore for FirestoreStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let index: Option<EmailIndex> = self
            .client
            .fluent()
            .select()
            .by_id_in(collections::USER_EMAILS)
            .obj()
            .one(&email_doc_id(email))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match index {
            Some(index) => self.find_user_by_id(&index.user_id).await,
            None => Ok(None),
        }
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn insert_user(&self, user: &User) -> Result<bool, AppError> {
        if !self.claim_email(&user.email, &user.user_id).await? {
            return Ok(false);
        }

        if let Err(e) = self.write_user(user).await {
            // Free the email so a retry can register it.
            if let Err(release_err) = self.release_email(&user.email).await {
                tracing::error!(
                    user_id = %user.user_id,
                    error = %release_err,
                    "Failed to release email index after user write failure"
                );
            }
            return Err(e);
        }

        tracing::info!(user_id = %user.user_id, provider = %user.provider, "User created");
        Ok(true)
    }

    async fn upsert_federated_user(&self, candidate: &User) -> Result<User, AppError> {
        if self.claim_email(&candidate.email, &candidate.user_id).await? {
            self.write_user(candidate).await?;
            tracing::info!(user_id = %candidate.user_id, "Federated user created");
            return Ok(candidate.clone());
        }

        self.find_user_by_email(&candidate.email)
            .await?
            .ok_or_else(|| {
                AppError::Database("email index points at a missing user".to_string())
            })
    }

    async fn list_entries(&self, user_id: &str) -> Result<Vec<ActivityEntry>, AppError> {
        let owner = user_id.to_string();
        let mut entries: Vec<ActivityEntry> = self
            .client
            .fluent()
            .select()
            .from(collections::ENTRIES)
            .filter(move |q| q.for_all([q.field("user_id").eq(owner.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        entries.sort_by_key(|e| e.date);
        Ok(entries)
    }

    async fn commit_ledger(&self, commit: &LedgerCommit) -> Result<(), AppError> {
        let user_id = &commit.user_id;
        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        match &commit.entry {
            EntryOp::Upsert(entry) => {
                self.client
                    .fluent()
                    .update()
                    .in_col(collections::ENTRIES)
                    .document_id(day_doc_id(user_id, entry.date))
                    .object(entry)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!("Failed to add entry to transaction: {}", e))
                    })?;
            }
            EntryOp::Delete(date) => {
                self.client
                    .fluent()
                    .delete()
                    .from(collections::ENTRIES)
                    .document_id(day_doc_id(user_id, *date))
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add entry deletion to transaction: {}",
                            e
                        ))
                    })?;
            }
        }

        match &commit.marker {
            MarkerOp::Upsert(marker) => {
                self.client
                    .fluent()
                    .update()
                    .in_col(collections::MARKERS)
                    .document_id(day_doc_id(user_id, marker.date))
                    .object(marker)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!("Failed to add marker to transaction: {}", e))
                    })?;
            }
            MarkerOp::Remove(date) => {
                self.client
                    .fluent()
                    .delete()
                    .from(collections::MARKERS)
                    .document_id(day_doc_id(user_id, *date))
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add marker removal to transaction: {}",
                            e
                        ))
                    })?;
            }
        }

        self.client
            .fluent()
            .update()
            .in_col(collections::STREAKS)
            .document_id(user_id)
            .object(&commit.streak)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add streak to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok(())
    }

    async fn list_markers(&self, user_id: &str) -> Result<Vec<DayMarker>, AppError> {
        let owner = user_id.to_string();
        let mut markers: Vec<DayMarker> = self
            .client
            .fluent()
            .select()
            .from(collections::MARKERS)
            .filter(move |q| q.for_all([q.field("user_id").eq(owner.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        markers.sort_by_key(|m| m.date);
        Ok(markers)
    }

    async fn set_marker_active(
        &self,
        user_id: &str,
        date: DateKey,
        active: bool,
    ) -> Result<Option<DayMarker>, AppError> {
        // Field-masked write guarded by an exists precondition: a marker
        // removed by a concurrent ledger commit is never recreated here.
        let patch = ActiveFlag { active };
        let result: Result<DayMarker, FirestoreError> = self
            .client
            .fluent()
            .update()
            .fields(["active"])
            .in_col(collections::MARKERS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(day_doc_id(user_id, date))
            .object(&patch)
            .execute()
            .await;

        match result {
            Ok(marker) => Ok(Some(marker)),
            Err(FirestoreError::DataNotFoundError(_)) => Ok(None),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn get_streak(&self, user_id: &str) -> Result<Option<StreakRecord>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::STREAKS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn insert_collectible_if_absent(
        &self,
        collectible: &Collectible,
    ) -> Result<Collectible, AppError> {
        let doc_id = collectible_doc_id(&collectible.user_id, collectible.collectible_id);
        let result: Result<Collectible, FirestoreError> = self
            .client
            .fluent()
            .insert()
            .into(collections::COLLECTIBLES)
            .document_id(&doc_id)
            .object(collectible)
            .execute()
            .await;

        match result {
            Ok(stored) => Ok(stored),
            Err(FirestoreError::DataConflictError(_)) => self
                .client
                .fluent()
                .select()
                .by_id_in(collections::COLLECTIBLES)
                .obj()
                .one(&doc_id)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?
                .ok_or_else(|| AppError::Database("collectible vanished after conflict".into())),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn list_collectibles(&self, user_id: &str) -> Result<Vec<Collectible>, AppError> {
        let owner = user_id.to_string();
        let mut collectibles: Vec<Collectible> = self
            .client
            .fluent()
            .select()
            .from(collections::COLLECTIBLES)
            .filter(move |q| q.for_all([q.field("user_id").eq(owner.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        collectibles.sort_by_key(|c| c.collectible_id);
        Ok(collectibles)
    }

    async fn shutdown(&self) {
        // The gRPC channel closes when the last clone is dropped.
        tracing::info!("Firestore store shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_doc_id_is_path_safe() {
        assert_eq!(email_doc_id("a/b@x.com"), "a%2Fb%40x.com");
    }

    #[test]
    fn test_collectible_doc_id() {
        assert_eq!(collectible_doc_id("u1", 4), "u1_4");
    }
}
