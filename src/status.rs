use std::collections::BTreeSet;

use jiff::{ToSpan, civil::Date};
use tracing::{info, warn};

use crate::{error::AppResult, models::MovieStatus, store::Store};

/// How far ahead (in days) a first showing still counts as "incoming".
const INCOMING_WINDOW_DAYS: i32 = 7;

/// Status over a movie's complete schedule history.
pub fn derive_status(dates: &BTreeSet<Date>, today: Date) -> MovieStatus {
    let (Some(&earliest), Some(&latest)) = (dates.first(), dates.last()) else {
        return MovieStatus::Unplanned;
    };
    if latest < today {
        return MovieStatus::Unplanned;
    }
    if earliest <= today {
        return MovieStatus::Showing;
    }
    if earliest <= window_end(today) { MovieStatus::Incoming } else { MovieStatus::Future }
}

/// Status over the dates seen in a single scrape pass. Older schedules are
/// invisible here, so it can only tell `showing` from `incoming`; a first
/// showing beyond the incoming window stays `showing`. `None` when the pass
/// saw no dates.
pub fn derive_incremental_status(dates: &BTreeSet<Date>, today: Date) -> Option<MovieStatus> {
    let &earliest = dates.first()?;
    if earliest <= today {
        return Some(MovieStatus::Showing);
    }
    if earliest <= window_end(today) {
        Some(MovieStatus::Incoming)
    } else {
        Some(MovieStatus::Showing)
    }
}

fn window_end(today: Date) -> Date {
    today.saturating_add(INCOMING_WINDOW_DAYS.days())
}

/// Full-batch pass: recomputes every movie's status from all persisted
/// schedules. Returns how many movies changed.
pub async fn recompute_all(store: &Store, today: Date) -> AppResult<usize> {
    let movies = store.all_movies().await?;
    let mut updated = 0;

    for movie in movies {
        let dates = match store.schedule_dates_for_movie(movie.id).await {
            Ok(dates) => dates,
            Err(err) => {
                warn!(title = %movie.title_jp, error = %err, "failed to load schedules");
                continue;
            },
        };

        let status = derive_status(&dates, today);
        if movie.status == status.as_str() {
            continue;
        }

        if let Err(err) = store.update_movie_status(movie.id, status).await {
            warn!(title = %movie.title_jp, error = %err, "failed to update status");
            continue;
        }
        updated += 1;

        match (dates.first(), dates.last()) {
            (None, _) | (_, None) => info!(
                title = %movie.title_jp,
                from = %movie.status,
                to = %status,
                "status changed, no schedules"
            ),
            (_, Some(latest)) if *latest < today => info!(
                title = %movie.title_jp,
                from = %movie.status,
                to = %status,
                latest = %latest,
                "status changed, all schedules lapsed"
            ),
            (Some(earliest), _) => info!(
                title = %movie.title_jp,
                from = %movie.status,
                to = %status,
                earliest = %earliest,
                "status changed"
            ),
        }
    }

    info!(updated, "status recompute finished");
    Ok(updated)
}
