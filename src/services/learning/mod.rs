//! Interaction learning: aggregates a user's interaction history into
//! category and source affinities and proposes confidence-gated preference
//! updates. The learner reads the preference store but never writes it.

pub mod affinity;
pub mod learner;

pub use learner::InteractionLearner;

use crate::stores::StoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LearningError {
    #[error("interaction store {operation} failed for user {user_id}: {source}")]
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

pub type Result<T> = std::result::Result<T, LearningError>;
