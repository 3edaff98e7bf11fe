//! The explicit preference write path: direct user edits and learner
//! proposals the caller decided to commit both land here.

use crate::stores::{PreferenceStore, StoreError};
use crate::models::PreferenceProfile;
use crate::utils::run_with_timeout;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("preference store {operation} failed for user {user_id}: {source}")]
    Store {
        operation: &'static str,
        user_id: Uuid,
        #[source]
        source: StoreError,
    },

    #[error("{operation} timed out after {waited_ms}ms for user {user_id}")]
    Timeout {
        operation: &'static str,
        user_id: Uuid,
        waited_ms: u64,
    },
}

pub type Result<T> = std::result::Result<T, ProfileError>;

pub struct PreferenceService {
    store: Arc<dyn PreferenceStore>,
    store_timeout_ms: u64,
}

impl PreferenceService {
    pub fn new(store: Arc<dyn PreferenceStore>, store_timeout_ms: u64) -> Self {
        Self {
            store,
            store_timeout_ms,
        }
    }

    /// Load the user's profile, creating the default one on first access.
    pub async fn get_or_create(&self, user_id: Uuid) -> Result<PreferenceProfile> {
        let existing = run_with_timeout(self.store_timeout_ms, self.store.get(user_id))
            .await
            .map_err(|waited_ms| ProfileError::Timeout {
                operation: "load_profile",
                user_id,
                waited_ms,
            })?
            .map_err(|source| ProfileError::Store {
                operation: "load_profile",
                user_id,
                source,
            })?;

        if let Some(profile) = existing {
            return Ok(profile);
        }

        debug!(user_id = %user_id, "Creating default preference profile");
        run_with_timeout(
            self.store_timeout_ms,
            self.store.create(&PreferenceProfile::default_for(user_id)),
        )
        .await
        .map_err(|waited_ms| ProfileError::Timeout {
            operation: "create_profile",
            user_id,
            waited_ms,
        })?
        .map_err(|source| ProfileError::Store {
            operation: "create_profile",
            user_id,
            source,
        })
    }

    /// Persist a profile, stamping `last_updated`. Last write wins at the
    /// store layer.
    pub async fn save(&self, mut profile: PreferenceProfile) -> Result<PreferenceProfile> {
        profile.last_updated = Utc::now();
        let user_id = profile.user_id;
        let saved = run_with_timeout(
            self.store_timeout_ms,
            self.store.update(user_id, &profile),
        )
        .await
        .map_err(|waited_ms| ProfileError::Timeout {
            operation: "save_profile",
            user_id,
            waited_ms,
        })?
        .map_err(|source| ProfileError::Store {
            operation: "save_profile",
            user_id,
            source,
        })?;

        info!(user_id = %user_id, "Preference profile saved");
        Ok(saved)
    }
}
