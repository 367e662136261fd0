//! Task Manager — wraps a scoring run in an asynchronous unit of work.
//!
//! Flow: create() stores a Pending task and spawns the background run →
//! the run builds the provider client (a missing credential fails the task
//! without retry) → marks Processing → drives the orchestrator → stores the
//! result. Deleting a task mid-run does not cancel dispatched provider
//! calls; the run discovers the deletion at its next store write and
//! discards its output.

pub mod store;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::candidate::Candidate;
use crate::provider::{CompletionApi, ModelProvider, ProviderClient, ProviderCredentials};
use crate::scoring::orchestrator::{score_candidates, ProgressFn, ScoringError, ScoringOptions};
use crate::tasks::store::{Task, TaskStore};

/// One accepted scoring request, ready to run.
#[derive(Debug, Clone)]
pub struct ScoringJob {
    pub job_description: String,
    pub candidates: Vec<Candidate>,
    pub provider: ModelProvider,
}

#[derive(Clone)]
pub struct TaskManager {
    store: TaskStore,
    credentials: ProviderCredentials,
    options: ScoringOptions,
}

impl TaskManager {
    pub fn new(credentials: ProviderCredentials, options: ScoringOptions) -> Self {
        Self {
            store: TaskStore::new(),
            credentials,
            options,
        }
    }

    /// Accepts a scoring request: stores a Pending task, schedules the
    /// background unit of work, returns the task id immediately.
    pub fn create(&self, job: ScoringJob) -> Uuid {
        let id = Uuid::new_v4();
        self.store.insert(Task::new(id));
        info!(
            "Task {id} created: {} candidates via {}",
            job.candidates.len(),
            job.provider.as_str()
        );

        let store = self.store.clone();
        let credentials = self.credentials.clone();
        let options = self.options.clone();
        tokio::spawn(async move {
            match ProviderClient::from_credentials(job.provider, &credentials) {
                Ok(client) => execute(store, id, job, Arc::new(client), options).await,
                Err(e) => {
                    error!("Task {id}: cannot construct provider client: {e}");
                    store.fail(id, e.to_string());
                }
            }
        });

        id
    }

    /// Current snapshot of a task.
    pub fn get(&self, id: Uuid) -> Result<Task, AppError> {
        self.store
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("Task {id} not found")))
    }

    /// Removes a task. Deleting an unknown (or already deleted) id fails
    /// with NotFound every time. In-flight provider calls are not
    /// interrupted; their results are discarded at the next store write.
    pub fn delete(&self, id: Uuid) -> Result<(), AppError> {
        if self.store.remove(id) {
            info!("Task {id} deleted");
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Task {id} not found")))
        }
    }

    /// Spawns the retention loop: terminal tasks older than `ttl` are
    /// removed every `interval`.
    pub fn spawn_retention_sweeper(&self, ttl: Duration, interval: Duration) {
        let store = self.store.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let swept = store.sweep_expired(ttl);
                if swept > 0 {
                    debug!("Retention sweep removed {swept} expired tasks");
                }
            }
        });
    }
}

/// The background unit of work for one task. Generic over the provider so
/// tests drive it with mocks.
async fn execute<P: CompletionApi + 'static>(
    store: TaskStore,
    id: Uuid,
    job: ScoringJob,
    client: Arc<P>,
    options: ScoringOptions,
) {
    if !store.mark_processing(id) {
        debug!("Task {id} deleted before processing started, discarding");
        return;
    }

    let progress_store = store.clone();
    let progress: ProgressFn = Arc::new(move |message: String| {
        progress_store.set_message(id, message);
    });

    match score_candidates(
        client,
        &job.job_description,
        job.candidates,
        &options,
        progress,
    )
    .await
    {
        Ok(result) => {
            // Nothing scored and every batch errored: there is nothing to
            // present, so the task fails instead of completing empty.
            if result.scored_candidates.is_empty() && !result.errors.is_empty() {
                let detail = format!("all batches failed: {}", result.errors.join("; "));
                error!("Task {id}: {detail}");
                store.fail(id, detail);
            } else if !store.complete(id, result) {
                debug!("Task {id} deleted mid-run, discarding result");
            }
        }
        Err(ScoringError::Configuration(detail)) => {
            error!("Task {id}: {detail}");
            store.fail(id, detail);
        }
    }
}
