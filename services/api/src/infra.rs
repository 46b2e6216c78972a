use metrics_exporter_prometheus::PrometheusHandle;
use snaphunt::workflows::submission::{
    fresh_submission_key, CompletionDraft, CompletionId, CompletionLedger, HuntCatalog, HuntId,
    ImageFormat, LedgerError, ObjectKey, ObjectStore, PhotoHunt, PhotoHuntCompletion,
    PhotoValidation, StorageError, UpsertOutcome, UserId,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Hunt definitions live in process memory until the external catalog
/// service lands. Registration happens through the internal endpoint.
#[derive(Default)]
pub(crate) struct InMemoryHuntCatalog {
    hunts: Mutex<HashMap<HuntId, PhotoHunt>>,
}

impl InMemoryHuntCatalog {
    pub(crate) fn insert(&self, hunt: PhotoHunt) {
        self.hunts
            .lock()
            .expect("catalog mutex poisoned")
            .insert(hunt.id.clone(), hunt);
    }
}

impl HuntCatalog for InMemoryHuntCatalog {
    fn hunt(&self, id: &HuntId) -> Result<Option<PhotoHunt>, LedgerError> {
        Ok(self
            .hunts
            .lock()
            .expect("catalog mutex poisoned")
            .get(id)
            .cloned())
    }
}

/// Object store backed by a process-local map, used by the demo command and
/// by tests that should not reach the storage gateway.
#[derive(Default)]
pub(crate) struct InMemoryObjectStore {
    objects: Mutex<HashMap<ObjectKey, Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub(crate) fn seed(&self, key: ObjectKey, bytes: Vec<u8>) {
        self.objects
            .lock()
            .expect("store mutex poisoned")
            .insert(key, bytes);
    }

    pub(crate) fn contains(&self, key: &ObjectKey) -> bool {
        self.objects
            .lock()
            .expect("store mutex poisoned")
            .contains_key(key)
    }

    pub(crate) fn object_count(&self) -> usize {
        self.objects.lock().expect("store mutex poisoned").len()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn put(&self, bytes: &[u8], format: ImageFormat) -> Result<ObjectKey, StorageError> {
        let key = fresh_submission_key(format);
        self.seed(key.clone(), bytes.to_vec());
        Ok(key)
    }

    fn fetch(&self, key: &ObjectKey) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .expect("store mutex poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.0.clone()))
    }

    fn delete(&self, key: &ObjectKey) -> Result<bool, StorageError> {
        Ok(self
            .objects
            .lock()
            .expect("store mutex poisoned")
            .remove(key)
            .is_some())
    }

    fn read_url(&self, key: &ObjectKey, ttl: Duration) -> Result<String, StorageError> {
        Ok(format!("memory://{}?ttl={}", key.0, ttl.as_secs()))
    }
}

/// Completion ledger backed by a process-local map keyed on (user, hunt),
/// which enforces the single-completion rule the same way the database
/// unique constraint does.
#[derive(Default)]
pub(crate) struct InMemoryCompletionLedger {
    completions: Mutex<HashMap<(UserId, HuntId), PhotoHuntCompletion>>,
    validations: Mutex<Vec<PhotoValidation>>,
}

impl InMemoryCompletionLedger {
    pub(crate) fn completions(&self) -> Vec<PhotoHuntCompletion> {
        self.completions
            .lock()
            .expect("ledger mutex poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub(crate) fn validations(&self) -> Vec<PhotoValidation> {
        self.validations
            .lock()
            .expect("ledger mutex poisoned")
            .clone()
    }
}

impl CompletionLedger for InMemoryCompletionLedger {
    fn upsert(&self, draft: CompletionDraft) -> Result<UpsertOutcome, LedgerError> {
        let mut guard = self.completions.lock().expect("ledger mutex poisoned");
        let pair = (draft.user_id.clone(), draft.hunt_id.clone());
        match guard.get_mut(&pair) {
            Some(existing) => {
                let superseded = (existing.submitted_image != draft.submitted_image)
                    .then(|| existing.submitted_image.clone());
                existing.submitted_image = draft.submitted_image;
                existing.validation_score = draft.validation_score;
                existing.validation_notes = draft.validation_notes;
                existing.is_valid = true;
                existing.created_at = draft.recorded_at;
                Ok(UpsertOutcome {
                    completion: existing.clone(),
                    superseded_image: superseded,
                })
            }
            None => {
                let completion = PhotoHuntCompletion {
                    id: CompletionId(Uuid::new_v4().to_string()),
                    user_id: draft.user_id,
                    hunt_id: draft.hunt_id,
                    submitted_image: draft.submitted_image,
                    validation_score: draft.validation_score,
                    is_valid: true,
                    validation_notes: draft.validation_notes,
                    created_at: draft.recorded_at,
                };
                guard.insert(pair, completion.clone());
                Ok(UpsertOutcome {
                    completion,
                    superseded_image: None,
                })
            }
        }
    }

    fn find(
        &self,
        user_id: &UserId,
        hunt_id: &HuntId,
    ) -> Result<Option<PhotoHuntCompletion>, LedgerError> {
        Ok(self
            .completions
            .lock()
            .expect("ledger mutex poisoned")
            .get(&(user_id.clone(), hunt_id.clone()))
            .cloned())
    }

    fn previous_image_key(
        &self,
        user_id: &UserId,
        hunt_id: &HuntId,
    ) -> Result<Option<ObjectKey>, LedgerError> {
        Ok(self
            .find(user_id, hunt_id)?
            .map(|completion| completion.submitted_image))
    }

    fn record_validation(&self, validation: PhotoValidation) -> Result<(), LedgerError> {
        self.validations
            .lock()
            .expect("ledger mutex poisoned")
            .push(validation);
        Ok(())
    }
}
