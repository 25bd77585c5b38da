use std::{collections::BTreeSet, time::Duration};

use anyhow::Context;
use jiff::civil::Date;
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    douban::DoubanClient,
    enrich::Enricher,
    error::AppResult,
    geocode::{Geocoder, clean_address_for_geo},
    scraper::{self, MovieSection, SchedulePage},
    status::derive_incremental_status,
    store::{NewCinema, Store},
};

/// Counters for one schedule ingestion pass.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct IngestStats {
    pub pages: usize,
    pub skipped_pages: usize,
    pub movies: usize,
    pub new_movies: usize,
    pub schedules_inserted: usize,
    pub status_changes: usize,
}

impl IngestStats {
    fn absorb(&mut self, other: IngestStats) {
        self.pages += other.pages;
        self.skipped_pages += other.skipped_pages;
        self.movies += other.movies;
        self.new_movies += other.new_movies;
        self.schedules_inserted += other.schedules_inserted;
        self.status_changes += other.status_changes;
    }
}

async fn region_links(client: &reqwest::Client, config: &Config) -> AppResult<Vec<String>> {
    let listing_url = config.region_listing_url();
    let page_url = Url::parse(&listing_url).context("region listing url")?;
    let html = scraper::fetch_page(client, &listing_url).await?;
    let links = scraper::parse_theater_links(&html, &page_url, &config.eiga_region_path);
    info!(url = %listing_url, count = links.len(), "found cinema pages");
    Ok(links)
}

/// Cinema sync: visits every detail page of the region, geocodes the address
/// and upserts the cinema by name. Returns how many cinemas were written.
pub async fn sync_cinemas(
    client: &reqwest::Client,
    store: &Store,
    geocoder: &Geocoder,
    config: &Config,
) -> AppResult<usize> {
    let links = region_links(client, config).await?;
    let delay = Duration::from_millis(config.cinema_sync_delay_ms);
    let mut written = 0;

    for link in links {
        match sync_cinema_page(client, store, geocoder, &link).await {
            Ok(true) => written += 1,
            Ok(false) => {},
            Err(err) => warn!(url = %link, error = %err, "cinema page failed"),
        }
        tokio::time::sleep(delay).await;
    }

    info!(written, "cinema sync finished");
    Ok(written)
}

async fn sync_cinema_page(
    client: &reqwest::Client,
    store: &Store,
    geocoder: &Geocoder,
    link: &str,
) -> AppResult<bool> {
    let page_url = Url::parse(link).context("cinema page url")?;
    let html = scraper::fetch_page(client, link).await?;
    let Some(page) = scraper::parse_cinema_page(&html, &page_url) else {
        debug!(url = %link, "no cinema title, skipping");
        return Ok(false);
    };

    let geo_address = clean_address_for_geo(&page.address);
    let (latitude, longitude) = geocoder.locate(&geo_address, &page.name_jp).await;

    store
        .upsert_cinema(NewCinema {
            name_jp: page.name_jp.clone(),
            address: page.address,
            latitude,
            longitude,
            building_photo: page.building_photo,
            website: page.website,
        })
        .await?;

    info!(cinema = %page.name_jp, latitude, longitude, "cinema saved");
    Ok(true)
}

/// Schedule pass over every cinema page of the region. A failing page is
/// logged and the walk moves on.
pub async fn sync_schedules(
    client: &reqwest::Client,
    store: &Store,
    enricher: &Enricher,
    config: &Config,
    today: Date,
) -> AppResult<IngestStats> {
    let links = region_links(client, config).await?;
    let mut stats = IngestStats::default();

    for link in links {
        let html = match scraper::fetch_page(client, &link).await {
            Ok(html) => html,
            Err(err) => {
                warn!(url = %link, error = %err, "failed to fetch schedule page");
                stats.skipped_pages += 1;
                continue;
            },
        };
        let Some(page) = scraper::parse_schedule_page(&html) else {
            debug!(url = %link, "no cinema title, skipping");
            stats.skipped_pages += 1;
            continue;
        };
        match ingest_schedule_page(store, enricher, &page, today).await {
            Ok(page_stats) => stats.absorb(page_stats),
            Err(err) => {
                warn!(
                    url = %link,
                    cinema = %page.cinema_name,
                    error = %err,
                    "schedule page failed"
                );
                stats.skipped_pages += 1;
            },
        }
    }

    let total_movies = store.count_movies().await?;
    let total_schedules = store.count_schedules().await?;
    info!(
        pages = stats.pages,
        skipped = stats.skipped_pages,
        movies = stats.movies,
        new_movies = stats.new_movies,
        schedules = stats.schedules_inserted,
        status_changes = stats.status_changes,
        total_movies,
        total_schedules,
        "schedule sync finished"
    );
    Ok(stats)
}

/// Persists one parsed cinema page. Cinemas are never created here: a page
/// whose cinema is unknown is skipped.
pub async fn ingest_schedule_page(
    store: &Store,
    enricher: &Enricher,
    page: &SchedulePage,
    today: Date,
) -> AppResult<IngestStats> {
    let mut stats = IngestStats::default();

    let Some(cinema) = store.find_cinema_by_name(&page.cinema_name).await? else {
        warn!(cinema = %page.cinema_name, "cinema not in store, run crawl-cinemas first");
        stats.skipped_pages += 1;
        return Ok(stats);
    };
    stats.pages += 1;

    for section in &page.movies {
        if let Err(err) =
            ingest_section(store, enricher, cinema.id, section, today, &mut stats).await
        {
            warn!(
                cinema = %cinema.name_jp,
                title = %section.title_jp,
                error = %err,
                "failed to ingest movie"
            );
        }
    }

    debug!(
        cinema = %cinema.name_jp,
        movies = stats.movies,
        schedules = stats.schedules_inserted,
        "cinema page ingested"
    );
    Ok(stats)
}

async fn ingest_section(
    store: &Store,
    enricher: &Enricher,
    cinema_id: i32,
    section: &MovieSection,
    today: Date,
    stats: &mut IngestStats,
) -> AppResult<()> {
    let (movie, created) = store.find_or_create_movie(&section.title_jp).await?;
    stats.movies += 1;
    if created {
        stats.new_movies += 1;
        info!(title = %movie.title_jp, "new movie");
    }
    let movie = enricher.enrich(movie).await;

    let mut seen_dates = BTreeSet::new();
    for day in &section.days {
        seen_dates.insert(day.date);
        for start_time in &day.start_times {
            match store.insert_schedule(movie.id, cinema_id, day.date, start_time).await {
                Ok(true) => stats.schedules_inserted += 1,
                Ok(false) => {},
                Err(err) => warn!(
                    title = %movie.title_jp,
                    date = %day.date,
                    start_time = %start_time,
                    error = %err,
                    "failed to save showing"
                ),
            }
        }
    }

    let Some(status) = derive_incremental_status(&seen_dates, today) else {
        return Ok(());
    };
    if movie.status != status.as_str() {
        store.update_movie_status(movie.id, status).await?;
        stats.status_changes += 1;
        if let Some(earliest) = seen_dates.first() {
            info!(
                title = %movie.title_jp,
                from = %movie.status,
                to = %status,
                earliest = %earliest,
                "status changed"
            );
        }
    }
    Ok(())
}

/// Looks up Douban scores for movies that have an English title and a year
/// but no score yet. Runs regardless of whether inline Douban lookups are on.
pub async fn backfill_douban(store: &Store, douban: &DoubanClient) -> AppResult<usize> {
    let movies = store.movies_missing_douban().await?;
    let total = movies.len();
    info!(total, "douban backfill starting");
    let mut filled = 0;

    for (i, mut movie) in movies.into_iter().enumerate() {
        let progress = format!("[{}/{}]", i + 1, total);
        match douban.rating(&movie.title_en, &movie.year).await {
            Ok(rating) if rating > 0.0 => {
                movie.douban_rating = rating;
                match store.save_movie(&movie).await {
                    Ok(_) => {
                        filled += 1;
                        info!(%progress, title = %movie.title_en, rating, "douban score saved");
                    },
                    Err(err) => warn!(
                        %progress,
                        title = %movie.title_en,
                        error = %err,
                        "failed to save douban score"
                    ),
                }
            },
            Ok(_) => debug!(%progress, title = %movie.title_en, "no douban score"),
            Err(err) => {
                warn!(%progress, title = %movie.title_en, error = %err, "douban lookup failed")
            },
        }
    }

    info!(filled, total, "douban backfill finished");
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use jiff::ToSpan;

    use super::*;
    use crate::{
        config::Config,
        enrich::tests::offline_enricher,
        scraper::{ScheduleDay, parse_schedule_page, tests::SCHEDULE_HTML},
        store::tests::{cinema_named, memory_store},
    };

    fn today() -> Date {
        Date::new(2026, 1, 23).unwrap()
    }

    fn day(offset: i32, times: &[&str]) -> ScheduleDay {
        ScheduleDay {
            date: today().saturating_add(offset.days()),
            start_times: times.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn page(cinema: &str, movies: Vec<(&str, Vec<ScheduleDay>)>) -> SchedulePage {
        SchedulePage {
            cinema_name: cinema.to_string(),
            movies: movies
                .into_iter()
                .map(|(title, days)| MovieSection { title_jp: title.to_string(), days })
                .collect(),
        }
    }

    async fn status_of(store: &Store, title: &str) -> String {
        let (movie, _) = store.find_or_create_movie(title).await.unwrap();
        movie.status
    }

    #[tokio::test]
    async fn ingestion_is_idempotent() {
        let store = memory_store().await;
        store.upsert_cinema(cinema_named("新宿シネマカリテ")).await.unwrap();
        let enricher = offline_enricher(store.clone());
        let parsed = parse_schedule_page(SCHEDULE_HTML).unwrap();

        let first = ingest_schedule_page(&store, &enricher, &parsed, today()).await.unwrap();
        assert_eq!(first.pages, 1);
        assert_eq!(first.new_movies, 2);
        assert_eq!(first.schedules_inserted, 4);

        let second = ingest_schedule_page(&store, &enricher, &parsed, today()).await.unwrap();
        assert_eq!(second.new_movies, 0);
        assert_eq!(second.schedules_inserted, 0);
        assert_eq!(second.status_changes, 0);

        assert_eq!(store.count_movies().await.unwrap(), 2);
        assert_eq!(store.count_schedules().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn incremental_status_scenarios() {
        let store = memory_store().await;
        store.upsert_cinema(cinema_named("ユーロスペース")).await.unwrap();
        let enricher = offline_enricher(store.clone());

        let parsed = page(
            "ユーロスペース",
            vec![
                ("M", vec![day(-1, &["10:00"]), day(3, &["10:00"])]),
                ("N", vec![day(2, &["12:00"]), day(5, &["12:00"])]),
                ("O", vec![day(10, &["18:30"])]),
                ("empty", vec![]),
            ],
        );
        let stats = ingest_schedule_page(&store, &enricher, &parsed, today()).await.unwrap();
        assert_eq!(stats.status_changes, 1);

        assert_eq!(status_of(&store, "M").await, "showing");
        assert_eq!(status_of(&store, "N").await, "incoming");
        assert_eq!(status_of(&store, "O").await, "showing");
        assert_eq!(status_of(&store, "empty").await, "showing");
    }

    #[tokio::test]
    async fn date_without_valid_times_still_counts() {
        let store = memory_store().await;
        store.upsert_cinema(cinema_named("K's cinema")).await.unwrap();
        let enricher = offline_enricher(store.clone());

        let parsed = page("K's cinema", vec![("夜明けのすべて", vec![day(3, &[])])]);
        let stats = ingest_schedule_page(&store, &enricher, &parsed, today()).await.unwrap();
        assert_eq!(stats.schedules_inserted, 0);
        assert_eq!(stats.status_changes, 1);

        let (movie, _) = store.find_or_create_movie("夜明けのすべて").await.unwrap();
        assert_eq!(movie.status, "incoming");
    }

    #[tokio::test]
    async fn unknown_cinema_is_skipped() {
        let store = memory_store().await;
        let enricher = offline_enricher(store.clone());

        let parsed = page("存在しない映画館", vec![("M", vec![day(0, &["10:00"])])]);
        let stats = ingest_schedule_page(&store, &enricher, &parsed, today()).await.unwrap();
        assert_eq!(stats.skipped_pages, 1);
        assert_eq!(stats.pages, 0);
        assert_eq!(store.count_movies().await.unwrap(), 0);
        assert_eq!(store.count_schedules().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_showing_does_not_stop_the_section() {
        let store = memory_store().await;
        let enricher = offline_enricher(store.clone());
        let section = MovieSection {
            title_jp: "M".to_string(),
            days: vec![day(2, &["10:00", "13:00"]), day(4, &["10:00"])],
        };

        // No such cinema row, so every insert breaks the foreign key.
        let mut stats = IngestStats::default();
        ingest_section(&store, &enricher, 4242, &section, today(), &mut stats).await.unwrap();
        assert_eq!(stats.schedules_inserted, 0);
        assert_eq!(stats.status_changes, 1);
        assert_eq!(status_of(&store, "M").await, "incoming");
    }

    #[tokio::test]
    async fn unreachable_cinema_page_is_skipped() {
        let mut server = mockito::Server::new_async().await;
        let _listing = server
            .mock("GET", "/theater/13/")
            .with_body(
                r#"<ul class="theater-area-list">
                     <li><a href="/theater/13/130101/3001/">閉館</a></li>
                     <li><a href="/theater/13/130201/3002/">新宿シネマカリテ</a></li>
                     <li><a href="/theater/14/140101/4001/">横浜</a></li>
                   </ul>"#,
            )
            .create_async()
            .await;
        let _broken =
            server.mock("GET", "/theater/13/130101/3001/").with_status(503).create_async().await;
        let _schedule = server
            .mock("GET", "/theater/13/130201/3002/")
            .with_body(SCHEDULE_HTML)
            .create_async()
            .await;

        let mut config = Config::from_env().unwrap();
        config.eiga_base_url = server.url();
        config.eiga_region_path = "/theater/13/".to_string();

        let store = memory_store().await;
        store.upsert_cinema(cinema_named("新宿シネマカリテ")).await.unwrap();
        let enricher = offline_enricher(store.clone());

        let stats = sync_schedules(&reqwest::Client::new(), &store, &enricher, &config, today())
            .await
            .unwrap();
        assert_eq!(stats.skipped_pages, 1);
        assert_eq!(stats.pages, 1);
        assert_eq!(stats.schedules_inserted, 4);
        assert_eq!(store.count_movies().await.unwrap(), 2);
    }
}
