use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

use super::{GolinkStore, Version};
use crate::error::{Error, Result};
use crate::models::{Golink, PopularWindow, WINDOW_DAYS};
use crate::resolve::name_to_id;

/// SQLite-backed store.
///
/// Rows are keyed by the percent-escaped name and carry a `version` column;
/// conditional writes commit with `UPDATE … WHERE version = ?` so a record
/// changed since it was read is never overwritten. Owners and the daily
/// ring are stored as JSON text columns.
pub struct SqliteStore {
    pool: SqlitePool,
}

const COLUMNS: &str = "name, url, owners, redirect_count_7days, redirect_count_28days, \
                       daily_redirect_counts, redirect_count_calculated_date, created_at, \
                       updated_at, version";

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ── Row mapping ────────────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct GolinkRow {
    name: String,
    url: String,
    owners: String,
    redirect_count_7days: i64,
    redirect_count_28days: i64,
    daily_redirect_counts: String,
    redirect_count_calculated_date: NaiveDate,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl GolinkRow {
    fn decode(self) -> Result<(Golink, Version)> {
        let owners: Vec<String> = serde_json::from_str(&self.owners)?;
        let counts: Vec<i64> = serde_json::from_str(&self.daily_redirect_counts)?;
        let daily_redirect_counts: [i64; WINDOW_DAYS] = counts.try_into().map_err(|_| {
            Error::Store(format!(
                "daily_redirect_counts for '{}' does not have {WINDOW_DAYS} entries",
                self.name
            ))
        })?;

        let golink = Golink {
            name: self.name,
            url: self.url,
            owners,
            redirect_count_7days: self.redirect_count_7days,
            redirect_count_28days: self.redirect_count_28days,
            daily_redirect_counts,
            redirect_count_calculated_date: self.redirect_count_calculated_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };

        Ok((golink, self.version))
    }
}

fn decode_rows(rows: Vec<GolinkRow>) -> Result<Vec<Golink>> {
    rows.into_iter()
        .map(|row| row.decode().map(|(golink, _)| golink))
        .collect()
}

/// INSERT with a fresh version stamp. `owners` and `counts` are the
/// JSON-serialized columns.
fn insert_golink<'q>(
    golink: &'q Golink,
    owners: &'q str,
    counts: &'q str,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    sqlx::query(
        "INSERT INTO golinks \
             (id, name, url, owners, redirect_count_7days, redirect_count_28days, \
              daily_redirect_counts, redirect_count_calculated_date, created_at, \
              updated_at, version) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1)",
    )
    .bind(name_to_id(&golink.name))
    .bind(golink.name.as_str())
    .bind(golink.url.as_str())
    .bind(owners)
    .bind(golink.redirect_count_7days)
    .bind(golink.redirect_count_28days)
    .bind(counts)
    .bind(golink.redirect_count_calculated_date)
    .bind(golink.created_at)
    .bind(golink.updated_at)
}

// ── Store implementation ───────────────────────────────────────────────────

#[async_trait]
impl GolinkStore for SqliteStore {
    async fn get(&self, name: &str) -> Result<Option<Golink>> {
        Ok(self.get_versioned(name).await?.map(|(golink, _)| golink))
    }

    async fn get_versioned(&self, name: &str) -> Result<Option<(Golink, Version)>> {
        let sql = format!("SELECT {COLUMNS} FROM golinks WHERE id = ?1");
        let row: Option<GolinkRow> = sqlx::query_as(&sql)
            .bind(name_to_id(name))
            .fetch_optional(&self.pool)
            .await?;

        row.map(GolinkRow::decode).transpose()
    }

    async fn create(&self, golink: &Golink) -> Result<()> {
        let owners = serde_json::to_string(&golink.owners)?;
        let counts = serde_json::to_string(&golink.daily_redirect_counts)?;

        match insert_golink(golink, &owners, &counts)
            .execute(&self.pool)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("UNIQUE") => {
                Err(Error::NameConflict(golink.name.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn compare_and_update(&self, expected: Version, golink: &Golink) -> Result<bool> {
        let owners = serde_json::to_string(&golink.owners)?;
        let counts = serde_json::to_string(&golink.daily_redirect_counts)?;

        let affected = sqlx::query(
            "UPDATE golinks \
             SET url = ?1, owners = ?2, redirect_count_7days = ?3, \
                 redirect_count_28days = ?4, daily_redirect_counts = ?5, \
                 redirect_count_calculated_date = ?6, updated_at = ?7, \
                 version = version + 1 \
             WHERE id = ?8 AND version = ?9",
        )
        .bind(golink.url.as_str())
        .bind(&owners)
        .bind(golink.redirect_count_7days)
        .bind(golink.redirect_count_28days)
        .bind(&counts)
        .bind(golink.redirect_count_calculated_date)
        .bind(golink.updated_at)
        .bind(name_to_id(&golink.name))
        .bind(expected)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM golinks WHERE id = ?1")
            .bind(name_to_id(name))
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(affected > 0)
    }

    async fn rename(&self, old_name: &str, new_name: &str) -> Result<Golink> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {COLUMNS} FROM golinks WHERE id = ?1");
        let row: Option<GolinkRow> = sqlx::query_as(&sql)
            .bind(name_to_id(old_name))
            .fetch_optional(&mut *tx)
            .await?;
        let (mut golink, _) = match row {
            Some(row) => row.decode()?,
            None => return Err(Error::NotFound(old_name.to_owned())),
        };

        let taken: Option<i64> = sqlx::query_scalar("SELECT 1 FROM golinks WHERE id = ?1")
            .bind(name_to_id(new_name))
            .fetch_optional(&mut *tx)
            .await?;
        if taken.is_some() {
            // Dropping the transaction rolls it back; the old record stays.
            return Err(Error::NameConflict(new_name.to_owned()));
        }

        golink.name = new_name.to_owned();
        golink.updated_at = Utc::now();

        let owners = serde_json::to_string(&golink.owners)?;
        let counts = serde_json::to_string(&golink.daily_redirect_counts)?;
        insert_golink(&golink, &owners, &counts)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM golinks WHERE id = ?1")
            .bind(name_to_id(old_name))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(golink)
    }

    async fn list_all(&self) -> Result<Vec<Golink>> {
        let sql = format!("SELECT {COLUMNS} FROM golinks ORDER BY name ASC");
        let rows: Vec<GolinkRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        decode_rows(rows)
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Golink>> {
        // json_each expands the owners JSON array into one row per owner.
        let sql = format!(
            "SELECT {COLUMNS} FROM golinks, json_each(golinks.owners) \
             WHERE json_each.value = ?1 ORDER BY name ASC"
        );
        let rows: Vec<GolinkRow> = sqlx::query_as(&sql)
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;
        decode_rows(rows)
    }

    async fn list_by_url(&self, url: &str) -> Result<Vec<Golink>> {
        let sql = format!("SELECT {COLUMNS} FROM golinks WHERE url = ?1 ORDER BY name ASC");
        let rows: Vec<GolinkRow> = sqlx::query_as(&sql)
            .bind(url)
            .fetch_all(&self.pool)
            .await?;
        decode_rows(rows)
    }

    async fn list_popular(&self, window: PopularWindow, limit: u32) -> Result<Vec<Golink>> {
        let field = match window {
            PopularWindow::Week => "redirect_count_7days",
            PopularWindow::FourWeeks => "redirect_count_28days",
        };
        let sql = format!(
            "SELECT {COLUMNS} FROM golinks ORDER BY {field} DESC, name ASC LIMIT ?1"
        );
        let rows: Vec<GolinkRow> = sqlx::query_as(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        decode_rows(rows)
    }
}
