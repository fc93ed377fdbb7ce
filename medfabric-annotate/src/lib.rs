//! medfabric-annotate library - annotation consensus engine
//!
//! Collects independent evaluations from several reviewers, hands out work
//! fairly, flags disagreement and reconciles numeric opinions into a
//! consensus label.

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod engine;
pub mod error;
pub mod services;

pub use engine::AnnotationEngine;
pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: AnnotationEngine,
}

impl AppState {
    pub fn new(engine: AnnotationEngine) -> Self {
        Self { engine }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{delete, get, post};

    let api = Router::new()
        .route("/api/buildinfo", get(api::get_build_info))
        // Reviewers and sessions
        .route("/api/doctors", post(api::doctors::register))
        .route("/api/doctors/:id/evaluated-sets", get(api::doctors::evaluated_sets))
        .route("/api/login", post(api::doctors::login))
        .route("/api/logout", post(api::doctors::logout))
        // Evaluations
        .route("/api/evaluations/image", post(api::evaluations::submit_image))
        .route("/api/evaluations/image/:id", delete(api::evaluations::retract_image))
        .route("/api/evaluations/image-set", post(api::evaluations::submit_image_set))
        // Scheduling
        .route("/api/assignments", post(api::assignments::next_assignment))
        // Conflicts and consensus
        .route("/api/conflicts/scan", post(api::conflicts::run_scan))
        .route("/api/image-sets/:id/conflicts", get(api::conflicts::unresolved_conflicts))
        .route("/api/image-sets/:id/conflicted", get(api::conflicts::conflicted_flag))
        .route("/api/image-sets/:id/consensus", get(api::conflicts::consensus))
        .route("/api/reconcile", post(api::reconcile::reconcile))
        // SSE event stream
        .route("/events", get(api::event_stream));

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
