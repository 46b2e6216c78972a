//! Photo submission and validation workflow.
//!
//! A submitted photo is staged in object storage, judged against the hunt's
//! reference photo by the validation oracle, and the outcome committed to
//! the completion ledger. Orphaned blobs are retired through the cleanup
//! policy. Collaborators sit behind traits so the coordinator can be driven
//! by deterministic stubs in tests.

pub mod cleanup;
pub mod domain;
pub mod ledger;
pub mod oracle;
pub mod router;
pub mod service;
pub mod storage;

#[cfg(test)]
mod tests;

pub use cleanup::{CleanupPolicy, DiscardReason};
pub use domain::{
    CompletionId, HuntId, ImageFormat, ObjectKey, PhotoHunt, PhotoHuntCompletion, PhotoValidation,
    SubmissionOutcome, UserId, ValidationId,
};
pub use ledger::{CompletionDraft, CompletionLedger, HuntCatalog, LedgerError, UpsertOutcome};
pub use oracle::{OracleError, ValidationOracle, Verdict, VerdictHints, VisionChatOracle};
pub use router::{submission_router, USER_ID_HEADER};
pub use service::{CompletionView, PhotoSubmissionService, SubmissionError, ValidationView};
pub use storage::{fresh_submission_key, HttpObjectStore, ObjectStore, StorageError};
