use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{GolinkStore, Version};
use crate::error::{Error, Result};
use crate::models::{Golink, PopularWindow};
use crate::resolve::name_to_id;

/// In-memory store: a lock-guarded map with per-record version counters.
///
/// Conditional writes observe the same conflict semantics as the SQLite
/// backend, so the optimistic retry paths are exercised for real by the
/// test suite. Also usable as an ephemeral backend.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, (Version, Golink)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GolinkStore for MemoryStore {
    async fn get(&self, name: &str) -> Result<Option<Golink>> {
        let records = self.records.read().await;
        Ok(records.get(&name_to_id(name)).map(|(_, g)| g.clone()))
    }

    async fn get_versioned(&self, name: &str) -> Result<Option<(Golink, Version)>> {
        let records = self.records.read().await;
        Ok(records
            .get(&name_to_id(name))
            .map(|(version, g)| (g.clone(), *version)))
    }

    async fn create(&self, golink: &Golink) -> Result<()> {
        let mut records = self.records.write().await;
        let id = name_to_id(&golink.name);
        if records.contains_key(&id) {
            return Err(Error::NameConflict(golink.name.clone()));
        }
        records.insert(id, (1, golink.clone()));
        Ok(())
    }

    async fn compare_and_update(&self, expected: Version, golink: &Golink) -> Result<bool> {
        let mut records = self.records.write().await;
        match records.get_mut(&name_to_id(&golink.name)) {
            Some((version, record)) if *version == expected => {
                *version += 1;
                *record = golink.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Ok(false),
        }
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let mut records = self.records.write().await;
        Ok(records.remove(&name_to_id(name)).is_some())
    }

    async fn rename(&self, old_name: &str, new_name: &str) -> Result<Golink> {
        // A single write lock spans the whole read-check-write, so no
        // observer ever sees both records or neither.
        let mut records = self.records.write().await;

        let old_id = name_to_id(old_name);
        let new_id = name_to_id(new_name);

        let (_, mut golink) = records
            .get(&old_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(old_name.to_owned()))?;
        if records.contains_key(&new_id) {
            return Err(Error::NameConflict(new_name.to_owned()));
        }

        golink.name = new_name.to_owned();
        golink.updated_at = Utc::now();

        records.insert(new_id, (1, golink.clone()));
        records.remove(&old_id);

        Ok(golink)
    }

    async fn list_all(&self) -> Result<Vec<Golink>> {
        let records = self.records.read().await;
        let mut golinks: Vec<Golink> = records.values().map(|(_, g)| g.clone()).collect();
        golinks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(golinks)
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Golink>> {
        let mut golinks: Vec<Golink> = {
            let records = self.records.read().await;
            records
                .values()
                .filter(|(_, g)| g.owners.iter().any(|o| o == owner))
                .map(|(_, g)| g.clone())
                .collect()
        };
        golinks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(golinks)
    }

    async fn list_by_url(&self, url: &str) -> Result<Vec<Golink>> {
        let mut golinks: Vec<Golink> = {
            let records = self.records.read().await;
            records
                .values()
                .filter(|(_, g)| g.url == url)
                .map(|(_, g)| g.clone())
                .collect()
        };
        golinks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(golinks)
    }

    async fn list_popular(&self, window: PopularWindow, limit: u32) -> Result<Vec<Golink>> {
        let mut golinks = self.list_all().await?;
        // Stable sort on top of the name ordering keeps ties deterministic.
        golinks.sort_by(|a, b| match window {
            PopularWindow::Week => b.redirect_count_7days.cmp(&a.redirect_count_7days),
            PopularWindow::FourWeeks => b.redirect_count_28days.cmp(&a.redirect_count_28days),
        });
        golinks.truncate(limit as usize);
        Ok(golinks)
    }
}
