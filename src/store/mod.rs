use async_trait::async_trait;
use chrono::Utc;

use crate::error::{Error, Result};
use crate::models::{Golink, PopularWindow};

pub mod memory;
pub mod sqlite;

/// Optimistic-concurrency stamp. Every committed write moves it, and
/// conditional writes only land when the version they read is still
/// current.
pub type Version = i64;

/// How many times an optimistic read-modify-write is retried after losing a
/// version race before the update is abandoned.
pub const MAX_UPDATE_RETRIES: u32 = 5;

/// Storage backend for golink records.
///
/// Absence is `Ok(None)` on reads, never an error — only an actual backend
/// failure (unreachable store, corrupt row) surfaces as `Err`.
#[async_trait]
pub trait GolinkStore: Send + Sync {
    /// Point read by name.
    async fn get(&self, name: &str) -> Result<Option<Golink>>;

    /// Point read returning the record's current version stamp for a
    /// subsequent [`compare_and_update`](GolinkStore::compare_and_update).
    async fn get_versioned(&self, name: &str) -> Result<Option<(Golink, Version)>>;

    /// Insert a new record. Fails with `NameConflict` if the name is taken.
    async fn create(&self, golink: &Golink) -> Result<()>;

    /// Write back a record that was read at `expected`. Returns `false`
    /// when the stored version has moved on, in which case the caller
    /// re-reads and recomputes. Never overwrites blindly.
    async fn compare_and_update(&self, expected: Version, golink: &Golink) -> Result<bool>;

    /// Delete by name. Returns whether a record was removed.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Atomically re-key a record: the new name is created and the old one
    /// deleted in a single transaction, so no observer ever sees both or
    /// neither. Fails with `NotFound` / `NameConflict` respectively.
    async fn rename(&self, old_name: &str, new_name: &str) -> Result<Golink>;

    /// Every golink, ordered by name ascending.
    async fn list_all(&self) -> Result<Vec<Golink>>;

    /// Golinks whose owner set contains `owner`.
    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Golink>>;

    /// Golinks whose target URL equals `url` exactly.
    async fn list_by_url(&self, url: &str) -> Result<Vec<Golink>>;

    /// The most-redirected golinks over the given rolling window,
    /// descending.
    async fn list_popular(&self, window: PopularWindow, limit: u32) -> Result<Vec<Golink>>;
}

/// Optimistic read-modify-write: read the current record with its version,
/// apply `mutate` to a copy, stamp `updated_at`, and commit only if the
/// version is unchanged. A lost race re-reads and recomputes rather than
/// overwriting, so concurrent updates to the same name serialize instead of
/// clobbering each other's counter arithmetic.
pub async fn update_with_retry<F>(
    store: &dyn GolinkStore,
    name: &str,
    mut mutate: F,
) -> Result<Golink>
where
    F: FnMut(&mut Golink) + Send,
{
    for _ in 0..MAX_UPDATE_RETRIES {
        let (mut golink, version) = store
            .get_versioned(name)
            .await?
            .ok_or_else(|| Error::NotFound(name.to_owned()))?;

        mutate(&mut golink);
        golink.updated_at = Utc::now();

        if store.compare_and_update(version, &golink).await? {
            return Ok(golink);
        }
    }

    Err(Error::Store(format!(
        "update of '{name}' kept losing version races after {MAX_UPDATE_RETRIES} attempts"
    )))
}
