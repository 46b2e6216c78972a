use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::domain::ObjectKey;
use super::storage::ObjectStore;

/// Why an object became eligible for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Staged for a submission the oracle rejected.
    RejectedSubmission,
    /// Staged for a submission whose validation never produced a verdict.
    FailedValidation,
    /// Previous image key of a completion a new valid submission replaced.
    SupersededCompletion,
}

impl DiscardReason {
    pub const fn label(self) -> &'static str {
        match self {
            Self::RejectedSubmission => "rejected_submission",
            Self::FailedValidation => "failed_validation",
            Self::SupersededCompletion => "superseded_completion",
        }
    }
}

/// Owns deletion of blobs no durable record references any more.
///
/// Deletion is best-effort: a failed delete is logged, queued, and retried
/// by a later `sweep`. The workflow outcome already returned to the caller
/// is never affected. An orphan is a lesser fault than a deleted-in-use
/// object or a dangling reference.
pub struct CleanupPolicy<S> {
    store: Arc<S>,
    pending: Mutex<Vec<ObjectKey>>,
}

impl<S> CleanupPolicy<S>
where
    S: ObjectStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Delete an orphaned object, queueing it for a retry sweep on failure.
    pub fn discard(&self, key: ObjectKey, reason: DiscardReason) {
        match self.store.delete(&key) {
            Ok(true) => debug!(key = %key.0, reason = reason.label(), "orphaned object deleted"),
            Ok(false) => debug!(key = %key.0, reason = reason.label(), "orphaned object already gone"),
            Err(err) => {
                warn!(
                    key = %key.0,
                    reason = reason.label(),
                    error = %err,
                    "orphan deletion failed, queued for sweep"
                );
                self.pending
                    .lock()
                    .expect("cleanup queue mutex poisoned")
                    .push(key);
            }
        }
    }

    /// Retry every queued deletion, returning how many objects were removed.
    /// Keys that fail again stay queued.
    pub fn sweep(&self) -> usize {
        let queued = {
            let mut guard = self.pending.lock().expect("cleanup queue mutex poisoned");
            std::mem::take(&mut *guard)
        };

        let mut deleted = 0;
        let mut retained = Vec::new();
        for key in queued {
            match self.store.delete(&key) {
                Ok(_) => deleted += 1,
                Err(err) => {
                    warn!(key = %key.0, error = %err, "sweep deletion failed, retained");
                    retained.push(key);
                }
            }
        }

        if !retained.is_empty() {
            self.pending
                .lock()
                .expect("cleanup queue mutex poisoned")
                .extend(retained);
        }
        deleted
    }

    /// Keys awaiting a retry sweep.
    pub fn pending(&self) -> Vec<ObjectKey> {
        self.pending
            .lock()
            .expect("cleanup queue mutex poisoned")
            .clone()
    }
}
