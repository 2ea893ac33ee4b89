use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::error::Error;
use crate::models::{Golink, SHORT_WINDOW_DAYS, WINDOW_DAYS};
use crate::store::{self, GolinkStore};

/// Advance the daily ring to `today` and count one redirect.
///
/// Slot 0 holds the day the counters were last calculated for. Catching up
/// by `d` days slides every entry up by `d`; before each single-day slide
/// the entry about to leave the 28-day window is subtracted from the
/// 28-day sum and the entry about to leave the 7-day window from the 7-day
/// sum, which keeps both sums equal to their window slices at every step.
///
/// A gap of 28 days or more leaves nothing in the ring inside any window,
/// so it resets outright. At exactly 28 this is deliberate — the count is
/// treated as stale from day 28, and a 28-step slide from the zeroed state
/// would produce the same numbers anyway.
///
/// A calculated date in the future (clock skew between writers) behaves
/// like a zero-day gap: no slide, the redirect still lands in slot 0.
pub fn advance_redirect_counts(golink: &mut Golink, today: NaiveDate) {
    let days_delayed = (today - golink.redirect_count_calculated_date).num_days();

    if days_delayed >= WINDOW_DAYS as i64 {
        golink.daily_redirect_counts = [0; WINDOW_DAYS];
        golink.daily_redirect_counts[0] = 1;
        golink.redirect_count_7days = 1;
        golink.redirect_count_28days = 1;
        golink.redirect_count_calculated_date = today;
        return;
    }

    if days_delayed > 0 {
        let counts = &mut golink.daily_redirect_counts;
        for _ in 0..days_delayed {
            golink.redirect_count_28days -= counts[WINDOW_DAYS - 1];
            golink.redirect_count_7days -= counts[SHORT_WINDOW_DAYS - 1];
            counts.rotate_right(1);
            counts[0] = 0;
        }
    }

    golink.daily_redirect_counts[0] += 1;
    golink.redirect_count_7days += 1;
    golink.redirect_count_28days += 1;
    golink.redirect_count_calculated_date = today;
}

/// Record one redirect against `name`, detached from the request that
/// triggered it.
///
/// Runs the optimistic read-modify-write loop against the store; counting
/// is best-effort, so every failure — record deleted mid-flight, retries
/// exhausted, backend fault — ends here in the log and nowhere else.
pub async fn record_redirect(store: Arc<dyn GolinkStore>, name: String) {
    let today = Utc::now().date_naive();

    let result = store::update_with_retry(store.as_ref(), &name, |golink| {
        advance_redirect_counts(golink, today)
    })
    .await;

    if let Err(err) = result {
        let err = Error::CounterUpdate(name, err.to_string());
        tracing::error!("{err}");
    }
}
