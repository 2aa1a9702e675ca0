//! Router setup and configuration.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{admission, competition, health, results, upload};
use crate::api::state::AppState;

/// Room for multipart framing on top of the image itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    // Health and metrics routes
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/metrics", get(health::metrics));

    let competition_routes = Router::new()
        .route(
            "/",
            get(competition::list_applications).post(competition::create_application),
        )
        .route(
            "/{id}",
            get(competition::get_application).delete(competition::delete_application),
        )
        .route("/{id}/payment", patch(competition::update_payment))
        .route("/roll/{roll_number}", get(competition::get_by_roll_number));

    let admission_routes = Router::new()
        .route(
            "/",
            get(admission::list_admissions).post(admission::create_admission),
        )
        .route(
            "/{id}",
            get(admission::get_admission).patch(admission::update_admission_status),
        );

    let result_routes = Router::new()
        .route("/search/{roll_number}", get(results::search_result))
        .route("/all", get(results::list_published))
        .route("/subject/{subject}", get(results::list_by_subject))
        .route("/top", get(results::top_results))
        .route("/top/{limit}", get(results::top_results_limited))
        .route("/top3", get(results::top3))
        .route("/top3/{subject}", get(results::top3_by_subject))
        .route("/create", post(results::create_result))
        .route("/bulk-create", post(results::bulk_create_results))
        .route("/publish", patch(results::publish_results))
        .route("/stats", get(results::result_stats))
        .route("/recalculate-ranks", post(results::recalculate_ranks))
        .route("/{roll_number}", delete(results::delete_result));

    let upload_routes = Router::new()
        .route("/upload-image", post(upload::upload_image))
        .layer(DefaultBodyLimit::max(
            state.image_service.max_bytes() + MULTIPART_OVERHEAD,
        ));

    // Combine all routes
    Router::new()
        .merge(health_routes)
        .nest("/api/competition-applications", competition_routes)
        .nest("/api/admissions", admission_routes)
        .nest("/api/results", result_routes)
        .nest("/api/upload", upload_routes)
        .route("/api/images/{id}", get(upload::get_image))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
