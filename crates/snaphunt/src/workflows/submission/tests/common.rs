use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;

use crate::workflows::submission::domain::{
    CompletionId, HuntId, ImageFormat, ObjectKey, PhotoHunt, PhotoHuntCompletion, PhotoValidation,
    UserId,
};
use crate::workflows::submission::ledger::{
    CompletionDraft, CompletionLedger, HuntCatalog, LedgerError, UpsertOutcome,
};
use crate::workflows::submission::oracle::{OracleError, ValidationOracle, Verdict, VerdictHints};
use crate::workflows::submission::service::PhotoSubmissionService;
use crate::workflows::submission::storage::{fresh_submission_key, ObjectStore, StorageError};

#[derive(Default)]
pub(super) struct MemoryCatalog {
    hunts: Mutex<HashMap<HuntId, PhotoHunt>>,
}

impl MemoryCatalog {
    pub(super) fn insert(&self, hunt: PhotoHunt) {
        self.hunts
            .lock()
            .expect("catalog mutex poisoned")
            .insert(hunt.id.clone(), hunt);
    }
}

impl HuntCatalog for MemoryCatalog {
    fn hunt(&self, id: &HuntId) -> Result<Option<PhotoHunt>, LedgerError> {
        Ok(self
            .hunts
            .lock()
            .expect("catalog mutex poisoned")
            .get(id)
            .cloned())
    }
}

#[derive(Default)]
pub(super) struct MemoryStore {
    objects: Mutex<HashMap<ObjectKey, Vec<u8>>>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryStore {
    pub(super) fn seed(&self, key: ObjectKey, bytes: Vec<u8>) {
        self.objects
            .lock()
            .expect("store mutex poisoned")
            .insert(key, bytes);
    }

    pub(super) fn contains(&self, key: &ObjectKey) -> bool {
        self.objects
            .lock()
            .expect("store mutex poisoned")
            .contains_key(key)
    }

    pub(super) fn keys(&self) -> Vec<ObjectKey> {
        self.objects
            .lock()
            .expect("store mutex poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub(super) fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub(super) fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

impl ObjectStore for MemoryStore {
    fn put(&self, bytes: &[u8], format: ImageFormat) -> Result<ObjectKey, StorageError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("puts disabled".to_string()));
        }
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
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("deletes disabled".to_string()));
        }
        Ok(self
            .objects
            .lock()
            .expect("store mutex poisoned")
            .remove(key)
            .is_some())
    }

    fn read_url(&self, key: &ObjectKey, ttl: Duration) -> Result<String, StorageError> {
        if !self.contains(key) {
            return Err(StorageError::NotFound(key.0.clone()));
        }
        Ok(format!("https://cdn.test/{}?ttl={}", key.0, ttl.as_secs()))
    }
}

/// Oracle driven by a queue of scripted verdicts, consumed in order.
#[derive(Default)]
pub(super) struct ScriptedOracle {
    script: Mutex<VecDeque<Result<Verdict, OracleError>>>,
}

impl ScriptedOracle {
    pub(super) fn push_valid(&self, similarity: f64) {
        self.push(Ok(verdict(true, similarity)));
    }

    pub(super) fn push_invalid(&self, similarity: f64) {
        self.push(Ok(verdict(false, similarity)));
    }

    pub(super) fn push_error(&self, err: OracleError) {
        self.push(Err(err));
    }

    fn push(&self, entry: Result<Verdict, OracleError>) {
        self.script
            .lock()
            .expect("oracle mutex poisoned")
            .push_back(entry);
    }
}

impl ValidationOracle for ScriptedOracle {
    fn judge(
        &self,
        _reference: &[u8],
        _submission: &[u8],
        _hints: &VerdictHints,
    ) -> Result<Verdict, OracleError> {
        self.script
            .lock()
            .expect("oracle mutex poisoned")
            .pop_front()
            .expect("oracle script exhausted")
    }
}

pub(super) fn verdict(is_valid: bool, similarity: f64) -> Verdict {
    Verdict {
        is_valid,
        similarity_score: similarity,
        confidence_score: 0.9,
        notes: if is_valid {
            "same subject and framing".to_string()
        } else {
            "different subject".to_string()
        },
        prompt: "compare reference and submission".to_string(),
        raw_response: format!(
            "{{\"is_valid\": {is_valid}, \"similarity_score\": {similarity}}}"
        ),
    }
}

#[derive(Default)]
pub(super) struct MemoryLedger {
    completions: Mutex<HashMap<(UserId, HuntId), PhotoHuntCompletion>>,
    validations: Mutex<Vec<PhotoValidation>>,
    unavailable: AtomicBool,
}

impl MemoryLedger {
    pub(super) fn completions(&self) -> Vec<PhotoHuntCompletion> {
        self.completions
            .lock()
            .expect("ledger mutex poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub(super) fn validations(&self) -> Vec<PhotoValidation> {
        self.validations
            .lock()
            .expect("ledger mutex poisoned")
            .clone()
    }

    pub(super) fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(LedgerError::Unavailable("ledger offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl CompletionLedger for MemoryLedger {
    fn upsert(&self, draft: CompletionDraft) -> Result<UpsertOutcome, LedgerError> {
        self.check_available()?;
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
        self.check_available()?;
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
        self.check_available()?;
        self.validations
            .lock()
            .expect("ledger mutex poisoned")
            .push(validation);
        Ok(())
    }
}

pub(super) type TestService =
    PhotoSubmissionService<MemoryCatalog, MemoryStore, ScriptedOracle, MemoryLedger>;

pub(super) struct Harness {
    pub(super) catalog: Arc<MemoryCatalog>,
    pub(super) store: Arc<MemoryStore>,
    pub(super) oracle: Arc<ScriptedOracle>,
    pub(super) ledger: Arc<MemoryLedger>,
    pub(super) service: Arc<TestService>,
}

/// Workflow harness with one active hunt seeded, its reference image stored.
pub(super) fn harness() -> Harness {
    let catalog = Arc::new(MemoryCatalog::default());
    let store = Arc::new(MemoryStore::default());
    let oracle = Arc::new(ScriptedOracle::default());
    let ledger = Arc::new(MemoryLedger::default());

    let hunt = sample_hunt("hunt-1");
    store.seed(hunt.reference_image.clone(), jpeg_bytes(0));
    catalog.insert(hunt);

    let service = Arc::new(PhotoSubmissionService::new(
        catalog.clone(),
        store.clone(),
        oracle.clone(),
        ledger.clone(),
        Duration::from_secs(600),
    ));

    Harness {
        catalog,
        store,
        oracle,
        ledger,
        service,
    }
}

pub(super) fn sample_hunt(id: &str) -> PhotoHunt {
    PhotoHunt {
        id: HuntId(id.to_string()),
        name: "Old Courthouse".to_string(),
        description: "Limestone courthouse with a clock tower".to_string(),
        reference_image: ObjectKey(format!("hunts/{id}/reference.jpg")),
        difficulty: Some(2.5),
        hint: "Face the river".to_string(),
        is_active: true,
    }
}

pub(super) fn user(id: &str) -> UserId {
    UserId(id.to_string())
}

pub(super) fn hunt_id(id: &str) -> HuntId {
    HuntId(id.to_string())
}

/// Minimal JPEG payload; `tag` makes byte streams distinguishable per test.
pub(super) fn jpeg_bytes(tag: u8) -> Vec<u8> {
    vec![0xFF, 0xD8, 0xFF, 0xE0, tag, 0x00, 0xFF, 0xD9]
}
