use crate::tasks::TaskManager;

/// Shared application state injected into all route handlers via Axum
/// extractors. The task manager owns the in-process task table; the rest of
/// the configuration is consumed at startup.
#[derive(Clone)]
pub struct AppState {
    pub tasks: TaskManager,
}
