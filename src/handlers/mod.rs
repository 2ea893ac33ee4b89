pub mod api;
pub mod redirect;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Assemble the full router.
///
/// Management and health routes are mounted before the wildcard redirect
/// route so they keep priority over golink names. Names can contain `/`,
/// which is why the API carries them in query strings and JSON bodies
/// rather than path segments.
pub fn app(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/golinks", get(api::list_golinks).post(api::create_golink))
        .route("/golinks/popular", get(api::popular_golinks))
        .route(
            "/golink",
            get(api::get_golink)
                .put(api::update_golink)
                .delete(api::delete_golink),
        )
        .route("/golink/rename", post(api::rename_golink))
        .route("/golink/owners/add", post(api::add_owner))
        .route("/golink/owners/remove", post(api::remove_owner));

    Router::new()
        .route("/", get(redirect::root))
        // Deploy health probe — no store access, no auth
        .route("/healthz", get(|| async { StatusCode::OK }))
        .nest("/api", api_router)
        // Golink resolution — must come LAST so the routes above take priority
        .route("/*path", get(redirect::redirect))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
