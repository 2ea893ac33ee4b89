use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use url::Url;

use crate::error::{Error, Result};
use crate::models::{
    CreateGolinkRequest, Golink, ListQuery, NameQuery, OwnerChangeRequest, PopularQuery,
    PopularWindow, RenameRequest, UpdateGolinkRequest,
};
use crate::store::update_with_retry;
use crate::AppState;

// ── Golink CRUD ────────────────────────────────────────────────────────────

/// POST /api/golinks
pub async fn create_golink(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateGolinkRequest>,
) -> Result<impl IntoResponse> {
    validate_name(&req.name)?;
    validate_target(&req.url)?;
    let owners = dedup_owners(req.owners);
    if owners.is_empty() {
        return Err(Error::Validation("at least one owner is required".into()));
    }

    let golink = Golink::new(req.name, req.url, owners);
    state.store.create(&golink).await?;

    Ok((StatusCode::CREATED, Json(golink)))
}

/// GET /api/golinks — all golinks, or filtered by `?owner=` / `?url=`.
pub async fn list_golinks(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<Golink>>> {
    let golinks = if let Some(owner) = &params.owner {
        state.store.list_by_owner(owner).await?
    } else if let Some(url) = &params.url {
        state.store.list_by_url(url).await?
    } else {
        state.store.list_all().await?
    };

    Ok(Json(golinks))
}

/// GET /api/golinks/popular?window=7|28&limit=N
pub async fn popular_golinks(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PopularQuery>,
) -> Result<Json<Vec<Golink>>> {
    let window = match params.window {
        7 => PopularWindow::Week,
        28 => PopularWindow::FourWeeks,
        other => {
            return Err(Error::Validation(format!(
                "window must be 7 or 28, got {other}"
            )))
        }
    };
    let limit = params.limit.unwrap_or(20).min(100);

    Ok(Json(state.store.list_popular(window, limit).await?))
}

/// GET /api/golink?name=
pub async fn get_golink(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NameQuery>,
) -> Result<Json<Golink>> {
    let golink = state
        .store
        .get(&query.name)
        .await?
        .ok_or(Error::NotFound(query.name))?;

    Ok(Json(golink))
}

/// PUT /api/golink — change a golink's target URL.
pub async fn update_golink(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateGolinkRequest>,
) -> Result<Json<Golink>> {
    validate_target(&req.url)?;

    let updated = update_with_retry(state.store.as_ref(), &req.name, |golink| {
        golink.url = req.url.clone();
    })
    .await?;

    Ok(Json(updated))
}

/// DELETE /api/golink?name=
pub async fn delete_golink(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NameQuery>,
) -> Result<StatusCode> {
    if state.store.delete(&query.name).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound(query.name))
    }
}

// ── Rename ─────────────────────────────────────────────────────────────────

/// POST /api/golink/rename
///
/// Logically delete + create under one store transaction: the store
/// guarantees the old and new records never coexist and never both vanish.
pub async fn rename_golink(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<Golink>> {
    validate_name(&req.new_name)?;

    Ok(Json(
        state.store.rename(&req.old_name, &req.new_name).await?,
    ))
}

// ── Ownership ──────────────────────────────────────────────────────────────

/// POST /api/golink/owners/add — set union, so adding a present owner is a
/// no-op success.
pub async fn add_owner(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OwnerChangeRequest>,
) -> Result<Json<Golink>> {
    let updated = update_with_retry(state.store.as_ref(), &req.name, |golink| {
        if !golink.owners.iter().any(|owner| owner == &req.owner) {
            golink.owners.push(req.owner.clone());
        }
    })
    .await?;

    Ok(Json(updated))
}

/// POST /api/golink/owners/remove — set removal, so removing an absent
/// owner is a no-op success.
pub async fn remove_owner(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OwnerChangeRequest>,
) -> Result<Json<Golink>> {
    let updated = update_with_retry(state.store.as_ref(), &req.name, |golink| {
        golink.owners.retain(|owner| owner != &req.owner);
    })
    .await?;

    Ok(Json(updated))
}

// ── Validation helpers ─────────────────────────────────────────────────────

/// A name is one or more non-empty `/`-separated segments of unreserved
/// characters. Keeping `%` out preserves the injectivity of the
/// name→storage-key escaping.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Validation("name must not be empty".into()));
    }
    if name.split('/').any(str::is_empty) {
        return Err(Error::Validation(
            "name must not have empty segments or leading/trailing slashes".into(),
        ));
    }
    let valid = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~' | '/'));
    if !valid {
        return Err(Error::Validation(
            "name may only contain letters, digits, '-', '_', '.', '~', and '/'".into(),
        ));
    }

    Ok(())
}

fn validate_target(url: &str) -> Result<()> {
    let parsed = Url::parse(url)
        .map_err(|err| Error::Validation(format!("target URL does not parse: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::Validation(
            "target URL must use http or https".into(),
        ));
    }

    Ok(())
}

fn dedup_owners(owners: Vec<String>) -> Vec<String> {
    let mut deduped: Vec<String> = Vec::with_capacity(owners.len());
    for owner in owners {
        if !owner.is_empty() && !deduped.contains(&owner) {
            deduped.push(owner);
        }
    }
    deduped
}
