use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all MaterialSuite endpoints.
///
/// Uploads are spooled to disk as they arrive, so the default request body
/// limit is lifted.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handler::list_suites))
        .route("/add", post(handler::add_suite))
        .route("/health", get(handler::health))
        .route("/:id", get(handler::get_suite))
        .route("/:id/content", get(handler::get_content))
        .route(
            "/:id/premis",
            get(handler::get_premis).put(handler::put_premis),
        )
        .route("/:id/premis/json", get(handler::get_premis_json))
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
