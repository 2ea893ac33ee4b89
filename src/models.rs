use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Length of the daily ring — the longest rolling window tracked.
pub const WINDOW_DAYS: usize = 28;

/// The short rolling window derived from the same ring.
pub const SHORT_WINDOW_DAYS: usize = 7;

/// A golink record: one short name mapped to a target URL template, plus
/// its rolling usage counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Golink {
    /// Unique short name. May contain `/`, so `requests/org` is one name.
    pub name: String,

    /// Target URL, optionally containing positional placeholders `{{1}}`,
    /// `{{2}}`, … that refer to trailing path segments not consumed by the
    /// name match.
    pub url: String,

    /// Users permitted to manage this golink. Set semantics — insertion
    /// order carries no meaning.
    pub owners: Vec<String>,

    pub redirect_count_7days: i64,
    pub redirect_count_28days: i64,

    /// Most-recent-first daily ring: index 0 is the day the counters were
    /// last calculated for, index 27 is 27 days before that. Always exactly
    /// `WINDOW_DAYS` entries; the rolling sums above are always the sums of
    /// the first 7 and 28 entries respectively.
    pub daily_redirect_counts: [i64; WINDOW_DAYS],

    /// UTC day the counters above are valid for.
    pub redirect_count_calculated_date: NaiveDate,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Golink {
    /// A fresh record: counters zeroed, window anchored to the creation day.
    pub fn new(name: String, url: String, owners: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            name,
            url,
            owners,
            redirect_count_7days: 0,
            redirect_count_28days: 0,
            daily_redirect_counts: [0; WINDOW_DAYS],
            redirect_count_calculated_date: now.date_naive(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// The two rolling windows the popularity ranking can order by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopularWindow {
    Week,
    FourWeeks,
}

// ── API request / query types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateGolinkRequest {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub owners: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGolinkRequest {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub old_name: String,
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
pub struct OwnerChangeRequest {
    pub name: String,
    pub owner: String,
}

/// Query carrying a golink name. Names can contain `/`, so they travel as
/// query parameters rather than path segments.
#[derive(Debug, Deserialize)]
pub struct NameQuery {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub owner: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PopularQuery {
    /// Rolling window in days; only 7 and 28 exist.
    pub window: u32,
    pub limit: Option<u32>,
}
