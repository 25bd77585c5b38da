mod config;
mod db;
mod douban;
mod enrich;
mod entities;
mod error;
mod geocode;
mod ingest;
mod models;
mod omdb;
mod routes;
mod scraper;
mod status;
mod store;
mod tmdb;
mod views;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::{
    config::Config, douban::DoubanClient, enrich::Enricher, geocode::Geocoder, omdb::OmdbClient,
    store::Store, tmdb::TmdbClient,
};

const HTTP_UA: &str = "TokyoCinePath/1.1";

#[derive(Parser, Debug)]
#[command(name = "tokyo-cinepath")]
#[command(about = "Arthouse cinema showtimes for Tokyo: crawler and JSON API")]
struct Cli {
    /// Batch job to run; serves the API when omitted
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape cinema pages, geocode addresses and upsert cinemas
    CrawlCinemas,
    /// Scrape weekly schedules, enrich new movies and update statuses
    CrawlSchedules,
    /// Look up Douban scores for movies that lack one
    FillDouban,
    /// Recompute every movie's status from all stored schedules
    UpdateStatus,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Store,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,tokyo_cinepath=debug,sqlx=warn".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let config = Arc::new(Config::from_env()?);

    let http = reqwest::Client::builder()
        .user_agent(HTTP_UA)
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()?;

    let db = db::connect_and_migrate(&config.database_url)
        .await
        .context("failed to open and migrate the database")?;
    let store = Store::new(db);

    match cli.command {
        Some(Command::CrawlCinemas) => {
            let geocoder = Geocoder::new(http.clone(), config.nominatim_base_url.clone());
            ingest::sync_cinemas(&http, &store, &geocoder, &config)
                .await
                .context("crawl-cinemas failed")?;
        },
        Some(Command::CrawlSchedules) => {
            let today = config.today()?;
            let enricher = build_enricher(&config, &http, store.clone());
            ingest::sync_schedules(&http, &store, &enricher, &config, today)
                .await
                .context("crawl-schedules failed")?;
        },
        Some(Command::FillDouban) => {
            let douban = DoubanClient::new(
                http.clone(),
                config.douban_base_url.clone(),
                config.douban_delay_ms,
            );
            ingest::backfill_douban(&store, &douban).await.context("fill-douban failed")?;
        },
        Some(Command::UpdateStatus) => {
            let today = config.today()?;
            status::recompute_all(&store, today).await.context("update-status failed")?;
        },
        None => serve(config, store).await?,
    }

    Ok(())
}

fn build_enricher(config: &Config, http: &reqwest::Client, store: Store) -> Enricher {
    let tmdb = TmdbClient::new(
        http.clone(),
        config.tmdb_api_key.clone(),
        config.tmdb_base_url.clone(),
        config.tmdb_rps,
    );
    let omdb =
        OmdbClient::new(http.clone(), config.omdb_api_key.clone(), config.omdb_base_url.clone());
    let douban = config.douban_enabled.then(|| {
        DoubanClient::new(http.clone(), config.douban_base_url.clone(), config.douban_delay_ms)
    });
    Enricher::new(store, tmdb, omdb, douban)
}

async fn serve(config: Arc<Config>, store: Store) -> anyhow::Result<()> {
    let addr = config.addr;
    let state = Arc::new(AppState { config, store });
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
