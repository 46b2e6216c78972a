use crate::infra::{InMemoryCompletionLedger, InMemoryHuntCatalog, InMemoryObjectStore};
use clap::Args;
use snaphunt::error::AppError;
use snaphunt::workflows::submission::{
    HuntId, ObjectKey, OracleError, PhotoHunt, PhotoSubmissionService, SubmissionOutcome, UserId,
    ValidationOracle, Verdict, VerdictHints,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Player identity used for the demo submissions
    #[arg(long, default_value = "demo-player")]
    pub(crate) user: String,
    /// Hunt identifier used for the demo hunt
    #[arg(long, default_value = "demo-hunt")]
    pub(crate) hunt: String,
}

/// Oracle that replays a fixed verdict script so the demo runs without
/// network access or an API key.
#[derive(Default)]
struct CannedOracle {
    script: Mutex<VecDeque<Verdict>>,
}

impl CannedOracle {
    fn push(&self, is_valid: bool, similarity: f64, notes: &str) {
        self.script
            .lock()
            .expect("oracle mutex poisoned")
            .push_back(Verdict {
                is_valid,
                similarity_score: similarity,
                confidence_score: 0.9,
                notes: notes.to_string(),
                prompt: "demo prompt".to_string(),
                raw_response: "{}".to_string(),
            });
    }
}

impl ValidationOracle for CannedOracle {
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
            .ok_or_else(|| OracleError::Malformed("demo verdict script exhausted".to_string()))
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let user = UserId(args.user);
    let hunt_id = HuntId(args.hunt);

    let catalog = Arc::new(InMemoryHuntCatalog::default());
    let store = Arc::new(InMemoryObjectStore::default());
    let oracle = Arc::new(CannedOracle::default());
    let ledger = Arc::new(InMemoryCompletionLedger::default());

    let reference_image = ObjectKey(format!("hunts/{}/reference.jpg", hunt_id.0));
    store.seed(reference_image.clone(), jpeg_sample(0));
    catalog.insert(PhotoHunt {
        id: hunt_id.clone(),
        name: "Old Courthouse".to_string(),
        description: "Limestone courthouse with a clock tower".to_string(),
        reference_image,
        difficulty: Some(2.5),
        hint: "Face the river".to_string(),
        is_active: true,
    });

    oracle.push(true, 0.85, "Clear match on the clock tower");
    oracle.push(false, 0.23, "Submitted photo shows a different building");
    oracle.push(true, 0.91, "Tighter framing, same facade");

    let service = PhotoSubmissionService::new(
        catalog,
        store.clone(),
        oracle,
        ledger.clone(),
        Duration::from_secs(600),
    );

    println!("Photo hunt submission demo for user '{}'", user.0);

    let steps = [
        ("first valid photo", jpeg_sample(1)),
        ("off-target resubmission", jpeg_sample(2)),
        ("improved resubmission", jpeg_sample(3)),
    ];
    for (label, bytes) in steps {
        println!("\n=> submitting {label}");
        match service.submit(&user, &hunt_id, &bytes) {
            Ok(SubmissionOutcome::Committed {
                completion,
                validation,
            }) => {
                println!(
                    "   committed: score {:.2}, completion {}, image {}",
                    completion.validation_score, completion.id.0, completion.submitted_image.0
                );
                println!("   oracle notes: {}", validation.notes);
            }
            Ok(SubmissionOutcome::Rejected { validation }) => {
                println!(
                    "   rejected: score {:.2}, staged photo discarded",
                    validation.similarity_score
                );
                println!("   oracle notes: {}", validation.notes);
            }
            Err(err) => println!("   submission failed: {err}"),
        }
    }

    let completions = ledger.completions();
    println!("\nFinal state");
    println!("   completions recorded: {}", completions.len());
    for completion in &completions {
        println!(
            "   {} / {} -> score {:.2} ({})",
            completion.user_id.0,
            completion.hunt_id.0,
            completion.validation_score,
            completion.submitted_image.0
        );
    }
    println!(
        "   validation audit rows: {}",
        ledger.validations().len()
    );
    println!(
        "   objects in store (reference + winning submission): {}",
        store.object_count()
    );

    Ok(())
}

fn jpeg_sample(tag: u8) -> Vec<u8> {
    vec![0xFF, 0xD8, 0xFF, 0xE0, tag, 0x00, 0xFF, 0xD9]
}
