//! Scoring Orchestrator — partitions the candidate pool into batches and
//! fans them out to concurrent batch scorers.
//!
//! Concurrency is bounded by a semaphore so one task never floods the
//! provider with simultaneous requests. Handles are awaited in batch order,
//! which keeps the merged result grouped by batch index no matter which
//! batch finishes first on the wall clock.

use std::collections::VecDeque;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::models::candidate::{Candidate, ScoringResult};
use crate::provider::CompletionApi;
use crate::scoring::batch::{score_batch, BackoffPolicy, BatchOutcome, ReaskPolicy};
use crate::scoring::prompt::build_scoring_prompt;

const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_MAX_CONCURRENT_BATCHES: usize = 3;
const DEFAULT_PROMPT_CHAR_BUDGET: usize = 20_000;

/// Tunables for one scoring run.
#[derive(Debug, Clone)]
pub struct ScoringOptions {
    pub batch_size: usize,
    pub max_concurrent_batches: usize,
    /// Ceiling on the built prompt length. Oversized batches are split in
    /// half until they fit (or are a single candidate).
    pub prompt_char_budget: usize,
    pub backoff: BackoffPolicy,
    pub reask: ReaskPolicy,
}

impl Default for ScoringOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrent_batches: DEFAULT_MAX_CONCURRENT_BATCHES,
            prompt_char_budget: DEFAULT_PROMPT_CHAR_BUDGET,
            backoff: BackoffPolicy::default(),
            reask: ReaskPolicy::default(),
        }
    }
}

/// Faults that abort the whole run instead of degrading one batch.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("provider configuration fault: {0}")]
    Configuration(String),
}

/// Progress sink invoked as each batch starts. The task manager wires this
/// to the task's message field.
pub type ProgressFn = Arc<dyn Fn(String) + Send + Sync>;

/// Scores the full candidate pool against `job_description`.
///
/// Batch-level failures land as strings in `ScoringResult.errors` and never
/// abort siblings; only a configuration fault escalates to `ScoringError`.
pub async fn score_candidates<P>(
    client: Arc<P>,
    job_description: &str,
    candidates: Vec<Candidate>,
    options: &ScoringOptions,
    progress: ProgressFn,
) -> Result<ScoringResult, ScoringError>
where
    P: CompletionApi + 'static,
{
    if candidates.is_empty() {
        return Ok(ScoringResult::default());
    }

    let batches = partition_batches(candidates, job_description, options);
    let total = batches.len();
    info!(
        "Scoring {} batches (batch_size={}, concurrency={})",
        total, options.batch_size, options.max_concurrent_batches
    );

    let semaphore = Arc::new(Semaphore::new(options.max_concurrent_batches));
    let mut handles = Vec::with_capacity(total);

    for (index, batch) in batches.into_iter().enumerate() {
        let client = client.clone();
        let semaphore = semaphore.clone();
        let progress = progress.clone();
        let job_description = job_description.to_string();
        let backoff = options.backoff.clone();
        let reask = options.reask.clone();

        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("batch semaphore closed");
            progress(format!(
                "Processing batch {} of {} ({} candidates)",
                index + 1,
                total,
                batch.len()
            ));
            score_batch(
                client.as_ref(),
                &job_description,
                &batch,
                index,
                &backoff,
                &reask,
            )
            .await
        }));
    }

    // Merge in batch-submission order, waiting for every batch regardless
    // of completion order.
    let mut result = ScoringResult::default();
    for (index, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(BatchOutcome::Scored(scored)) => result.scored_candidates.extend(scored),
            Ok(BatchOutcome::Failed { detail, fatal }) => {
                if fatal {
                    return Err(ScoringError::Configuration(detail));
                }
                warn!("Batch failure recorded: {detail}");
                result.errors.push(detail);
            }
            Err(e) => {
                // A panicked batch worker degrades like any other batch failure.
                warn!("Batch {} worker aborted: {e}", index + 1);
                result
                    .errors
                    .push(format!("batch {}: worker aborted: {e}", index + 1));
            }
        }
    }

    info!(
        "Scoring run finished: {} scored, {} batch errors",
        result.scored_candidates.len(),
        result.errors.len()
    );
    Ok(result)
}

/// Contiguous fixed-size partition, then a budget pass that halves any batch
/// whose prompt would exceed the character ceiling. Candidate order is
/// preserved end to end; every candidate lands in exactly one batch.
fn partition_batches(
    candidates: Vec<Candidate>,
    job_description: &str,
    options: &ScoringOptions,
) -> Vec<Vec<Candidate>> {
    let size = options.batch_size.max(1);
    let mut queue: VecDeque<Vec<Candidate>> =
        candidates.chunks(size).map(|c| c.to_vec()).collect();

    let mut batches = Vec::with_capacity(queue.len());
    while let Some(batch) = queue.pop_front() {
        let prompt_len = build_scoring_prompt(job_description, &batch).len();
        if prompt_len > options.prompt_char_budget && batch.len() > 1 {
            let mut first = batch;
            let second = first.split_off(first.len() / 2);
            queue.push_front(second);
            queue.push_front(first);
            continue;
        }
        if prompt_len > options.prompt_char_budget {
            warn!(
                "Single-candidate batch still exceeds prompt budget ({prompt_len} chars), sending anyway"
            );
        }
        batches.push(batch);
    }
    batches
}
