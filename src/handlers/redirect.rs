use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};

use crate::{counter, resolve, AppState};

/// GET /
///
/// The bare host is nobody's golink; send the browser to the console.
pub async fn root(State(state): State<Arc<AppState>>) -> Response {
    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, state.config.console_url.clone())],
    )
        .into_response()
}

/// GET /*path
///
/// 1. Split the request path into segments and try progressively shorter
///    name prefixes against the store, longest first.
/// 2. Expand the matched target with the leftover segments.
/// 3. Spawn a detached task to record the redirect, so the response is
///    never blocked by the counter write.
/// 4. 307 to the target; names that don't exist 307 to the console's
///    create flow instead.
pub async fn redirect(State(state): State<Arc<AppState>>, Path(path): Path<String>) -> Response {
    let segments: Vec<String> = path
        .trim_start_matches('/')
        .split('/')
        .map(str::to_owned)
        .collect();

    // split("") yields [""]. The root route handles "/", but a path of
    // bare slashes can still land here.
    if segments[0].is_empty() {
        return root(State(state)).await;
    }

    let resolution = match resolve::resolve(state.store.as_ref(), &segments).await {
        Ok(Some(resolution)) => resolution,
        Ok(None) => {
            // Nothing matched at any prefix length — invite creation.
            let target = format!("{}{}", state.config.console_url, segments[0]);
            return Redirect::temporary(&target).into_response();
        }
        Err(err) => {
            tracing::error!("lookup for '{}' failed: {}", path, err);
            return (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response();
        }
    };

    let remaining = &segments[resolution.matched_segments..];
    let target = match resolve::expand_target(&resolution.golink.url, remaining) {
        Ok(target) => target,
        Err(err) => {
            tracing::error!("target of '{}' is unusable: {}", resolution.golink.name, err);
            return (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response();
        }
    };

    // Count in the background. The task owns its data and outlives this
    // request; a client that disconnects mid-redirect cannot cancel it.
    tokio::spawn(counter::record_redirect(
        state.store.clone(),
        resolution.golink.name.clone(),
    ));

    Redirect::temporary(&target).into_response()
}
