use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{HuntId, ObjectKey, PhotoHunt, PhotoHuntCompletion, PhotoValidation, UserId};

/// Error enumeration for ledger and catalog failures.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Fields the coordinator hands the ledger when a valid submission commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionDraft {
    pub user_id: UserId,
    pub hunt_id: HuntId,
    pub submitted_image: ObjectKey,
    pub validation_score: f64,
    pub validation_notes: String,
    pub recorded_at: DateTime<Utc>,
}

/// Result of an atomic completion upsert.
///
/// `superseded_image` is the image key the pair previously pointed at, read
/// inside the same critical section as the write so racing resubmissions
/// cannot both miss it. It is `None` on first completion and also when a
/// resubmission re-commits the same key.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOutcome {
    pub completion: PhotoHuntCompletion,
    pub superseded_image: Option<ObjectKey>,
}

/// Durable record store for completions and validation history.
///
/// Implementations enforce the one-completion-per-`(user, hunt)` invariant:
/// `upsert` is a find-or-create-then-update under a single transaction
/// boundary, so concurrent valid resubmissions for the same pair serialize
/// and the last to commit wins.
pub trait CompletionLedger: Send + Sync {
    fn upsert(&self, draft: CompletionDraft) -> Result<UpsertOutcome, LedgerError>;
    fn find(
        &self,
        user_id: &UserId,
        hunt_id: &HuntId,
    ) -> Result<Option<PhotoHuntCompletion>, LedgerError>;
    /// Read-only view of the image key currently held for the pair.
    fn previous_image_key(
        &self,
        user_id: &UserId,
        hunt_id: &HuntId,
    ) -> Result<Option<ObjectKey>, LedgerError>;
    /// Append one validation attempt to the audit history.
    fn record_validation(&self, validation: PhotoValidation) -> Result<(), LedgerError>;
}

/// Read-only lookup into the externally-owned hunt catalog.
pub trait HuntCatalog: Send + Sync {
    fn hunt(&self, id: &HuntId) -> Result<Option<PhotoHunt>, LedgerError>;
}
