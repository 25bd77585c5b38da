use std::net::SocketAddr;

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub tmdb_api_key: String,
    pub tmdb_base_url: String,
    pub tmdb_rps: u32,
    pub omdb_api_key: String,
    pub omdb_base_url: String,
    pub douban_enabled: bool,
    pub douban_base_url: String,
    pub douban_delay_ms: u64,
    pub eiga_base_url: String,
    pub eiga_region_path: String,
    pub nominatim_base_url: String,
    pub cinema_sync_delay_ms: u64,
    pub http_timeout_secs: u64,
    pub timezone: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "8080".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://tokyo_cinepath.db?mode=rwc".to_string());

        let tmdb_api_key = std::env::var("TMDB_API_KEY").unwrap_or_default();
        let tmdb_base_url = std::env::var("TMDB_BASE_URL")
            .unwrap_or_else(|_| "https://api.themoviedb.org/3".to_string());
        let tmdb_rps: u32 =
            std::env::var("TMDB_RPS").ok().and_then(|s| s.parse().ok()).unwrap_or(4);

        let omdb_api_key = std::env::var("OMDB_API_KEY").unwrap_or_default();
        let omdb_base_url = std::env::var("OMDB_BASE_URL")
            .unwrap_or_else(|_| "http://www.omdbapi.com".to_string());

        // Off unless explicitly enabled.
        let douban_enabled = std::env::var("DOUBAN_ENABLED")
            .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let douban_base_url = std::env::var("DOUBAN_BASE_URL")
            .unwrap_or_else(|_| "https://www.douban.com".to_string());
        let douban_delay_ms: u64 =
            std::env::var("DOUBAN_DELAY_MS").ok().and_then(|s| s.parse().ok()).unwrap_or(3000);

        let eiga_base_url =
            std::env::var("EIGA_BASE_URL").unwrap_or_else(|_| "https://eiga.com".to_string());
        let eiga_region_path =
            std::env::var("EIGA_REGION_PATH").unwrap_or_else(|_| "/theater/13/".to_string());

        let nominatim_base_url = std::env::var("NOMINATIM_BASE_URL")
            .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string());

        let cinema_sync_delay_ms: u64 = std::env::var("CINEMA_SYNC_DELAY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2000);

        let http_timeout_secs: u64 =
            std::env::var("HTTP_TIMEOUT_SECS").ok().and_then(|s| s.parse().ok()).unwrap_or(10);

        let timezone = std::env::var("TIMEZONE").unwrap_or_else(|_| "Asia/Tokyo".to_string());

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            tmdb_api_key,
            tmdb_base_url,
            tmdb_rps,
            omdb_api_key,
            omdb_base_url,
            douban_enabled,
            douban_base_url,
            douban_delay_ms,
            eiga_base_url,
            eiga_region_path,
            nominatim_base_url,
            cinema_sync_delay_ms,
            http_timeout_secs,
            timezone,
        })
    }

    /// Listing page that links to every cinema detail page of the region.
    pub fn region_listing_url(&self) -> String {
        format!("{}{}", self.eiga_base_url.trim_end_matches('/'), self.eiga_region_path)
    }

    /// Current civil date in the configured zone.
    pub fn today(&self) -> anyhow::Result<jiff::civil::Date> {
        let now = jiff::Timestamp::now().in_tz(&self.timezone).context("TIMEZONE")?;
        Ok(now.date())
    }
}
