pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::scoring::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Scoring API
        .route("/api/v1/score", post(handlers::handle_create_scoring_task))
        .route(
            "/api/v1/score/:task_id",
            get(handlers::handle_get_task).delete(handlers::handle_delete_task),
        )
        .with_state(state)
}
