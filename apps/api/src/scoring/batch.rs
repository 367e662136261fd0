//! Batch Scorer — drives a single batch through build prompt → call
//! provider → parse, and converts every failure into a result-carrying
//! outcome. Nothing raises past this component.
//!
//! Two retry layers with independent tunables:
//! - provider backoff: rate-limit and transient failures re-send the same
//!   prompt after an exponential delay;
//! - re-ask: parse failures re-run the whole call-and-parse cycle with a
//!   softened prompt, since the model may produce valid output on a re-ask.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::models::candidate::{Candidate, ScoredCandidate};
use crate::provider::{CompletionApi, ProviderError};
use crate::scoring::parser::parse_scored_candidates;
use crate::scoring::prompt::{build_retry_prompt, build_scoring_prompt};
use crate::scoring::prompts::SCORING_SYSTEM;

/// Max characters of raw model output carried into a failure string.
const DIAGNOSTIC_SAMPLE_CHARS: usize = 200;

/// Backoff policy for rate-limited and transient provider failures.
/// Delay doubles per attempt from `base_delay`, capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl BackoffPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1u32 << attempt.min(16));
        exp.min(self.max_delay)
    }
}

/// Re-ask policy for parse failures and empty responses. Kept separate from
/// `BackoffPolicy` — the triggering conditions and sensible attempt counts
/// are independent tunables.
#[derive(Debug, Clone)]
pub struct ReaskPolicy {
    pub max_attempts: u32,
}

impl Default for ReaskPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Terminal state of one batch.
#[derive(Debug)]
pub enum BatchOutcome {
    Scored(Vec<ScoredCandidate>),
    /// `fatal` marks configuration failures the orchestrator must escalate
    /// to the whole task instead of recording as a batch error.
    Failed { detail: String, fatal: bool },
}

/// Scores one batch. `batch_index` is zero-based; failure strings use the
/// one-based number the progress messages show.
pub async fn score_batch<P: CompletionApi>(
    client: &P,
    job_description: &str,
    batch: &[Candidate],
    batch_index: usize,
    backoff: &BackoffPolicy,
    reask: &ReaskPolicy,
) -> BatchOutcome {
    let label = batch_label(batch_index, batch);
    let valid_ids: HashSet<String> = batch.iter().map(|c| c.id.clone()).collect();
    let mut last_sample = String::new();

    for ask in 0..reask.max_attempts {
        let prompt = if ask == 0 {
            build_scoring_prompt(job_description, batch)
        } else {
            build_retry_prompt(job_description, batch)
        };

        let raw = match call_with_backoff(client, &prompt, backoff).await {
            Ok(raw) => raw,
            Err(ProviderError::EmptyResponse) => {
                warn!("{label}: provider returned empty content (ask {})", ask + 1);
                continue;
            }
            Err(e @ ProviderError::Configuration(_)) => {
                return BatchOutcome::Failed {
                    detail: format!("{label}: {e}"),
                    fatal: true,
                };
            }
            Err(e) => {
                return BatchOutcome::Failed {
                    detail: format!(
                        "{label}: giving up after {} provider attempts: {e}",
                        backoff.max_attempts
                    ),
                    fatal: false,
                };
            }
        };

        match parse_scored_candidates(&raw, &valid_ids) {
            Ok(scored) => {
                info!("{label}: scored {} candidates (ask {})", scored.len(), ask + 1);
                return BatchOutcome::Scored(scored);
            }
            Err(e) => {
                warn!("{label}: {e} (ask {} of {})", ask + 1, reask.max_attempts);
                last_sample = truncate_sample(&raw);
            }
        }
    }

    let sample = if last_sample.is_empty() {
        "(empty response)".to_string()
    } else {
        last_sample
    };
    BatchOutcome::Failed {
        detail: format!(
            "{label}: malformed output after {} attempts; last output: {sample}",
            reask.max_attempts
        ),
        fatal: false,
    }
}

/// Sends one prompt, retrying retryable provider failures with backoff.
/// Configuration and empty-response errors return immediately.
async fn call_with_backoff<P: CompletionApi>(
    client: &P,
    prompt: &str,
    policy: &BackoffPolicy,
) -> Result<String, ProviderError> {
    let mut attempt = 0u32;
    loop {
        match client.send(SCORING_SYSTEM, prompt).await {
            Ok(raw) => return Ok(raw),
            Err(e) if e.is_backoff_retryable() => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    return Err(e);
                }
                let delay = policy.delay_for(attempt - 1);
                warn!(
                    "Provider call failed ({e}), retrying after {}ms",
                    delay.as_millis()
                );
                sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// "batch 2 (ids c10..c19)" — one-based index plus the id range, so a
/// failure string alone identifies which candidates went unscored.
fn batch_label(batch_index: usize, batch: &[Candidate]) -> String {
    match (batch.first(), batch.last()) {
        (Some(first), Some(last)) if batch.len() > 1 => {
            format!("batch {} (ids {}..{})", batch_index + 1, first.id, last.id)
        }
        (Some(only), _) => format!("batch {} (id {})", batch_index + 1, only.id),
        _ => format!("batch {} (empty)", batch_index + 1),
    }
}

fn truncate_sample(raw: &str) -> String {
    let mut sample: String = raw.chars().take(DIAGNOSTIC_SAMPLE_CHARS).collect();
    if raw.chars().count() > DIAGNOSTIC_SAMPLE_CHARS {
        sample.push_str("...");
    }
    sample
}
