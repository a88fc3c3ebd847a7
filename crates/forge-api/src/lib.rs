//! Forge API
//!
//! HTTP front end for the URL shortener forge. A single form submission
//! becomes a branded copy of the shortener template: downloaded as a zip,
//! or deployed to Azure App Service for the managed-cloud target.
//!
//! ## Endpoints
//!
//! - `GET /` - Customization form
//! - `POST /generate` - Generate (and optionally deploy) a package
//! - `GET /health` - Health check

pub mod config;
pub mod handlers;
pub mod pipeline;
pub mod state;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use config::Config;
pub use pipeline::{Pipeline, PipelineOutcome};
pub use state::ProcessState;

/// Application state shared across handlers
pub struct AppState {
    pub pipeline: Pipeline,
    pub process: Arc<ProcessState>,
    /// Largest accepted request body
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Create new application state
    pub fn new(pipeline: Pipeline, process: Arc<ProcessState>, max_upload_bytes: usize) -> Self {
        Self {
            pipeline,
            process,
            max_upload_bytes,
        }
    }
}

async fn begin_startup(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    state.process.begin_startup();
    next.run(request).await
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;
    let state = Arc::new(state);

    Router::new()
        .route("/", get(handlers::index_handler))
        .route("/health", get(handlers::health_handler))
        .route("/generate", post(handlers::generate_handler))
        .layer(middleware::from_fn_with_state(state.clone(), begin_startup))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
