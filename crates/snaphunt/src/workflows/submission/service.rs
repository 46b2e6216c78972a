use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::cleanup::{CleanupPolicy, DiscardReason};
use super::domain::{
    HuntId, ImageFormat, PhotoHunt, PhotoHuntCompletion, PhotoValidation, SubmissionOutcome,
    UserId, ValidationId,
};
use super::ledger::{CompletionDraft, CompletionLedger, HuntCatalog, LedgerError};
use super::oracle::{OracleError, ValidationOracle, Verdict, VerdictHints};
use super::storage::{ObjectStore, StorageError};

/// Workflow-level failure taxonomy. `Rejected` is deliberately absent: a
/// confidently negative verdict is a successful outcome, not an error.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("photo hunt not found or inactive")]
    HuntNotFound,
    #[error("submitted payload is not a supported raster image")]
    UnsupportedImage,
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
    #[error("validation unavailable: {0}")]
    ValidationUnavailable(#[source] OracleError),
    #[error("ledger failure: {0}")]
    Ledger(#[from] LedgerError),
}

/// Coordinates one photo submission end-to-end: stage the upload, obtain a
/// verdict from the oracle, commit or discard ledger state, and reconcile
/// storage through the cleanup policy.
pub struct PhotoSubmissionService<C, S, O, L> {
    hunts: Arc<C>,
    store: Arc<S>,
    oracle: Arc<O>,
    ledger: Arc<L>,
    cleanup: Arc<CleanupPolicy<S>>,
    read_url_ttl: Duration,
}

impl<C, S, O, L> PhotoSubmissionService<C, S, O, L>
where
    C: HuntCatalog + 'static,
    S: ObjectStore + 'static,
    O: ValidationOracle + 'static,
    L: CompletionLedger + 'static,
{
    pub fn new(
        hunts: Arc<C>,
        store: Arc<S>,
        oracle: Arc<O>,
        ledger: Arc<L>,
        read_url_ttl: Duration,
    ) -> Self {
        let cleanup = Arc::new(CleanupPolicy::new(store.clone()));
        Self {
            hunts,
            store,
            oracle,
            ledger,
            cleanup,
            read_url_ttl,
        }
    }

    pub fn cleanup(&self) -> &CleanupPolicy<S> {
        &self.cleanup
    }

    /// Run one submission through the full workflow.
    ///
    /// Side effects are strictly ordered: the staging write precedes the
    /// oracle call, ledger mutation precedes cleanup of a superseded object,
    /// and a rejected or failed attempt's own object is discarded before
    /// returning. Resubmission is always allowed; the latest valid
    /// submission wins.
    pub fn submit(
        &self,
        user_id: &UserId,
        hunt_id: &HuntId,
        image_bytes: &[u8],
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let format = ImageFormat::sniff(image_bytes).ok_or(SubmissionError::UnsupportedImage)?;

        let hunt = self
            .hunts
            .hunt(hunt_id)?
            .filter(|hunt| hunt.is_active)
            .ok_or(SubmissionError::HuntNotFound)?;

        // An unservable reference image makes the hunt itself unservable.
        let reference = match self.store.fetch(&hunt.reference_image) {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound(_)) => return Err(SubmissionError::HuntNotFound),
            Err(err) => return Err(SubmissionError::Storage(err)),
        };

        let staged = self.store.put(image_bytes, format)?;

        let hints = VerdictHints {
            description: hunt.description.clone(),
            difficulty: hunt.difficulty,
            hint: hunt.hint.clone(),
        };
        let verdict = match self.oracle.judge(&reference, image_bytes, &hints) {
            Ok(verdict) => verdict,
            Err(err) => {
                self.cleanup.discard(staged, DiscardReason::FailedValidation);
                return Err(SubmissionError::ValidationUnavailable(err));
            }
        };

        if verdict.is_valid {
            self.commit(user_id, hunt_id, &hunt, staged, verdict)
        } else {
            Ok(self.reject(&hunt, staged, verdict))
        }
    }

    /// The caller's current completion for a hunt, if any.
    pub fn completion(
        &self,
        user_id: &UserId,
        hunt_id: &HuntId,
    ) -> Result<Option<PhotoHuntCompletion>, SubmissionError> {
        Ok(self.ledger.find(user_id, hunt_id)?)
    }

    /// API view of a completion, with a time-limited read URL when the
    /// store can issue one.
    pub fn completion_view(&self, completion: &PhotoHuntCompletion) -> CompletionView {
        let image_url = match self.store.read_url(&completion.submitted_image, self.read_url_ttl) {
            Ok(url) => Some(url),
            Err(err) => {
                warn!(
                    key = %completion.submitted_image.0,
                    error = %err,
                    "could not issue read URL for completion view"
                );
                None
            }
        };
        CompletionView::new(completion, image_url)
    }

    fn commit(
        &self,
        user_id: &UserId,
        hunt_id: &HuntId,
        hunt: &PhotoHunt,
        staged: super::domain::ObjectKey,
        verdict: Verdict,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let draft = CompletionDraft {
            user_id: user_id.clone(),
            hunt_id: hunt_id.clone(),
            submitted_image: staged.clone(),
            validation_score: verdict.similarity_score,
            validation_notes: verdict.notes.clone(),
            recorded_at: Utc::now(),
        };

        let outcome = match self.ledger.upsert(draft) {
            Ok(outcome) => outcome,
            Err(err) => {
                // The blob was never committed to a ledger row; do not leave
                // it behind as a half-staged orphan.
                self.cleanup.discard(staged, DiscardReason::FailedValidation);
                return Err(SubmissionError::Ledger(err));
            }
        };

        let validation = self.record_validation(
            hunt,
            &staged,
            &verdict,
            Some(outcome.completion.id.clone()),
        );

        if let Some(previous) = outcome.superseded_image {
            if previous != staged {
                self.cleanup
                    .discard(previous, DiscardReason::SupersededCompletion);
            }
        }

        info!(
            user = %user_id.0,
            hunt = %hunt_id.0,
            score = verdict.similarity_score,
            "submission committed"
        );
        Ok(SubmissionOutcome::Committed {
            completion: outcome.completion,
            validation,
        })
    }

    fn reject(
        &self,
        hunt: &PhotoHunt,
        staged: super::domain::ObjectKey,
        verdict: Verdict,
    ) -> SubmissionOutcome {
        let validation = self.record_validation(hunt, &staged, &verdict, None);
        self.cleanup
            .discard(staged, DiscardReason::RejectedSubmission);

        info!(
            hunt = %hunt.id.0,
            score = verdict.similarity_score,
            "submission rejected"
        );
        SubmissionOutcome::Rejected { validation }
    }

    /// Append the audit row. The workflow outcome is already decided by the
    /// time this runs, so a write failure is logged rather than escalated.
    fn record_validation(
        &self,
        hunt: &PhotoHunt,
        staged: &super::domain::ObjectKey,
        verdict: &Verdict,
        completion_id: Option<super::domain::CompletionId>,
    ) -> PhotoValidation {
        let validation = PhotoValidation {
            id: ValidationId(Uuid::new_v4().to_string()),
            completion_id,
            reference_image: hunt.reference_image.clone(),
            submitted_image: staged.clone(),
            similarity_score: verdict.similarity_score,
            confidence_score: verdict.confidence_score,
            notes: verdict.notes.clone(),
            validation_prompt: verdict.prompt.clone(),
            oracle_response: verdict.raw_response.clone(),
            is_approved: verdict.is_valid,
            created_at: Utc::now(),
        };

        if let Err(err) = self.ledger.record_validation(validation.clone()) {
            warn!(hunt = %hunt.id.0, error = %err, "validation audit row not recorded");
        }
        validation
    }
}

/// Sanitized representation of a completion for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionView {
    pub id: String,
    pub user_id: String,
    pub hunt_id: String,
    pub image_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub validation_score: f64,
    pub is_valid: bool,
    pub validation_notes: String,
    pub created_at: chrono::DateTime<Utc>,
}

impl CompletionView {
    fn new(completion: &PhotoHuntCompletion, image_url: Option<String>) -> Self {
        Self {
            id: completion.id.0.clone(),
            user_id: completion.user_id.0.clone(),
            hunt_id: completion.hunt_id.0.clone(),
            image_key: completion.submitted_image.0.clone(),
            image_url,
            validation_score: completion.validation_score,
            is_valid: completion.is_valid,
            validation_notes: completion.validation_notes.clone(),
            created_at: completion.created_at,
        }
    }
}

/// Audit-facing view of one validation attempt. Carries the full payload,
/// opaque prompt and raw oracle text included, so clients see exactly what
/// the audit row holds.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationView {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_id: Option<String>,
    pub similarity_score: f64,
    pub confidence_score: f64,
    pub is_approved: bool,
    pub notes: String,
    pub validation_prompt: String,
    pub oracle_response: String,
}

impl ValidationView {
    pub fn from_record(validation: &PhotoValidation) -> Self {
        Self {
            id: validation.id.0.clone(),
            completion_id: validation.completion_id.as_ref().map(|id| id.0.clone()),
            similarity_score: validation.similarity_score,
            confidence_score: validation.confidence_score,
            is_approved: validation.is_approved,
            notes: validation.notes.clone(),
            validation_prompt: validation.validation_prompt.clone(),
            oracle_response: validation.oracle_response.clone(),
        }
    }
}
