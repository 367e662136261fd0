//! Task store — the in-process table of scoring tasks.
//!
//! Created once at service start and shared by clone; entries are added and
//! removed only through `TaskManager` operations. No persistence across
//! restarts. The narrow interface here is the seam for a future persistent
//! backing store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::candidate::ScoringResult;

/// Lifecycle of a scoring task. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Snapshot of one scoring task as returned to status queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub status: TaskStatus,
    /// Latest progress line while processing, summary once done.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Present iff status is `Completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ScoringResult>,
    /// Present iff status is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: TaskStatus::Pending,
            message: None,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Narrow interface over the task table. Cheap to clone; clones share the
/// table. Reads return snapshots, writes are serialized per table.
///
/// Every mutator returns `false` when the id is absent — that is the
/// cancellation contract: callbacks landing after a delete discard their
/// work instead of erroring.
#[derive(Clone, Default)]
pub struct TaskStore {
    inner: Arc<RwLock<HashMap<Uuid, Task>>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, task: Task) {
        let mut table = self.inner.write().expect("task store lock poisoned");
        table.insert(task.id, task);
    }

    pub fn get(&self, id: Uuid) -> Option<Task> {
        let table = self.inner.read().expect("task store lock poisoned");
        table.get(&id).cloned()
    }

    pub fn remove(&self, id: Uuid) -> bool {
        let mut table = self.inner.write().expect("task store lock poisoned");
        table.remove(&id).is_some()
    }

    pub fn mark_processing(&self, id: Uuid) -> bool {
        self.update(id, |task| task.status = TaskStatus::Processing)
    }

    pub fn set_message(&self, id: Uuid, message: String) -> bool {
        self.update(id, |task| task.message = Some(message))
    }

    pub fn complete(&self, id: Uuid, result: ScoringResult) -> bool {
        self.update(id, |task| {
            task.status = TaskStatus::Completed;
            task.message = Some(format!(
                "Scored {} candidates ({} batch errors)",
                result.scored_candidates.len(),
                result.errors.len()
            ));
            task.result = Some(result);
        })
    }

    pub fn fail(&self, id: Uuid, detail: String) -> bool {
        self.update(id, |task| {
            task.status = TaskStatus::Failed;
            task.error = Some(detail);
        })
    }

    /// Removes terminal tasks whose last update is older than `ttl`.
    /// In-flight tasks are never swept. Returns how many were removed.
    pub fn sweep_expired(&self, ttl: Duration) -> usize {
        let now = Utc::now();
        let mut table = self.inner.write().expect("task store lock poisoned");
        let before = table.len();
        table.retain(|_, task| {
            if !task.status.is_terminal() {
                return true;
            }
            let age = (now - task.updated_at).to_std().unwrap_or(Duration::ZERO);
            age < ttl
        });
        before - table.len()
    }

    fn update<F: FnOnce(&mut Task)>(&self, id: Uuid, f: F) -> bool {
        let mut table = self.inner.write().expect("task store lock poisoned");
        match table.get_mut(&id) {
            Some(task) => {
                f(task);
                task.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_pending_with_no_payload() {
        let task = Task::new(Uuid::new_v4());
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.message.is_none());
        assert!(task.result.is_none());
        assert!(task.error.is_none());
    }

    #[test]
    fn test_task_status_serde_is_snake_case() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Processing).unwrap(),
            r#""processing""#
        );
        assert_eq!(
            serde_json::from_str::<TaskStatus>(r#""completed""#).unwrap(),
            TaskStatus::Completed
        );
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn test_insert_get_remove_round_trip() {
        let store = TaskStore::new();
        let id = Uuid::new_v4();
        store.insert(Task::new(id));
        assert!(store.get(id).is_some());
        assert!(store.remove(id));
        assert!(store.get(id).is_none());
        // Second remove reports absence.
        assert!(!store.remove(id));
    }

    #[test]
    fn test_mutators_on_absent_id_are_noops() {
        let store = TaskStore::new();
        let id = Uuid::new_v4();
        assert!(!store.mark_processing(id));
        assert!(!store.set_message(id, "late".to_string()));
        assert!(!store.complete(id, ScoringResult::default()));
        assert!(!store.fail(id, "late failure".to_string()));
        assert!(store.get(id).is_none());
    }

    #[test]
    fn test_complete_sets_result_and_summary_message() {
        let store = TaskStore::new();
        let id = Uuid::new_v4();
        store.insert(Task::new(id));
        store.mark_processing(id);
        assert!(store.complete(id, ScoringResult::default()));

        let task = store.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.result.is_some());
        assert!(task.error.is_none());
        assert_eq!(
            task.message.as_deref(),
            Some("Scored 0 candidates (0 batch errors)")
        );
    }

    #[test]
    fn test_fail_sets_error_detail() {
        let store = TaskStore::new();
        let id = Uuid::new_v4();
        store.insert(Task::new(id));
        assert!(store.fail(id, "OPENAI_API_KEY is not set".to_string()));

        let task = store.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.unwrap().contains("OPENAI_API_KEY"));
        assert!(task.result.is_none());
    }

    #[test]
    fn test_sweep_removes_only_old_terminal_tasks() {
        let store = TaskStore::new();
        let done = Uuid::new_v4();
        let running = Uuid::new_v4();
        store.insert(Task::new(done));
        store.insert(Task::new(running));
        store.complete(done, ScoringResult::default());
        store.mark_processing(running);

        // Zero TTL: every terminal task is already expired.
        assert_eq!(store.sweep_expired(Duration::ZERO), 1);
        assert!(store.get(done).is_none());
        assert!(store.get(running).is_some());

        // Generous TTL: nothing else to sweep.
        store.complete(running, ScoringResult::default());
        assert_eq!(store.sweep_expired(Duration::from_secs(3600)), 0);
        assert!(store.get(running).is_some());
    }

    #[test]
    fn test_completed_task_serializes_without_null_fields() {
        let store = TaskStore::new();
        let id = Uuid::new_v4();
        store.insert(Task::new(id));
        store.complete(id, ScoringResult::default());

        let json = serde_json::to_string(&store.get(id).unwrap()).unwrap();
        assert!(json.contains(r#""status":"completed""#));
        assert!(!json.contains(r#""error""#));
    }
}
