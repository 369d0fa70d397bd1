//! `api` crate: HTTP surface for forms, submissions and workflow runs.
//!
//! Routes:
//!   POST   /api/forms
//!   GET    /api/forms
//!   GET    /api/forms/{id}
//!   POST   /api/forms/{id}/submit
//!   GET    /api/forms/{id}/submissions
//!   POST   /api/workflow/test
//!   POST   /api/workflow/validate
//!   GET    /api/workflow/status/{submissionId}

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod client;
pub mod handlers;
pub mod orchestrator;
pub mod store;

pub use client::{ClientError, WorkflowClient};
pub use orchestrator::{ServiceConfig, SubmissionOrchestrator, SubmitRequest, SubmitResponse};
pub use store::{MemoryStore, PgStore, SubmissionStore, WorkflowRun};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: SubmissionOrchestrator,
}

impl AppState {
    pub fn new(orchestrator: SubmissionOrchestrator) -> Self {
        Self { orchestrator }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/forms", post(handlers::forms::create).get(handlers::forms::list))
        .route("/api/forms/:id", get(handlers::forms::get))
        .route("/api/forms/:id/submit", post(handlers::submissions::submit))
        .route("/api/forms/:id/submissions", get(handlers::submissions::list))
        .route("/api/workflow/test", post(handlers::workflows::test))
        .route("/api/workflow/validate", post(handlers::workflows::validate))
        .route("/api/workflow/status/:submission_id", get(handlers::workflows::status))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn serve(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}
