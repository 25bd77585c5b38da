use std::{num::NonZeroU32, sync::Arc};

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde::Deserialize;

use crate::{error::AppResult, models::Locale};

pub const POSTER_BASE: &str = "https://image.tmdb.org/t/p/w500";
pub const BACKDROP_BASE: &str = "https://image.tmdb.org/t/p/original";
pub const PROFILE_BASE: &str = "https://image.tmdb.org/t/p/w185";

pub struct TmdbClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl TmdbClient {
    pub fn new(client: reqwest::Client, api_key: String, base_url: String, rps: u32) -> Self {
        if api_key.trim().is_empty() {
            tracing::warn!("TMDB_API_KEY not set, metadata enrichment disabled");
        }

        let quota = Quota::per_second(NonZeroU32::new(rps.max(1)).unwrap_or(NonZeroU32::MIN));
        let limiter = Arc::new(RateLimiter::direct(quota));
        Self { client, api_key, base_url, limiter }
    }

    pub fn is_enabled(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// First search hit for a Japanese title.
    pub async fn search_movie(&self, title: &str) -> AppResult<Option<i32>> {
        if !self.is_enabled() {
            return Ok(None);
        }

        self.limiter.until_ready().await;

        let url = format!("{}/search/movie", self.base_url.trim_end_matches('/'));
        let resp: SearchResponse = self
            .client
            .get(url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("query", title),
                ("language", Locale::Japanese.as_tmdb_code()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp.results.into_iter().next().map(|m| m.id))
    }

    pub async fn movie_details(&self, tmdb_id: i32, locale: Locale) -> AppResult<MovieDetails> {
        self.limiter.until_ready().await;

        let url = format!("{}/movie/{}", self.base_url.trim_end_matches('/'), tmdb_id);
        let details = self
            .client
            .get(url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("language", locale.as_tmdb_code()),
                ("append_to_response", "credits"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(details)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchMovie>,
}

#[derive(Debug, Deserialize)]
struct SearchMovie {
    id: i32,
}

/// One locale's view of a movie. TMDB sends `null` for most of these when a
/// translation is missing, hence the defaults.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MovieDetails {
    #[serde(default)]
    pub imdb_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub runtime: Option<i32>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub credits: Credits,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Genre {
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Credits {
    #[serde(default)]
    pub cast: Vec<CastCredit>,
    #[serde(default)]
    pub crew: Vec<CrewCredit>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CastCredit {
    pub name: String,
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default)]
    pub profile_path: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CrewCredit {
    pub name: String,
    #[serde(default)]
    pub job: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_details_with_nulls() {
        let body = r#"{
            "id": 976893,
            "imdb_id": "tt27503384",
            "title": "PERFECT DAYS",
            "overview": "",
            "poster_path": null,
            "backdrop_path": "/b.jpg",
            "release_date": "2023-12-22",
            "runtime": 124,
            "vote_average": 7.8,
            "genres": [{"id": 18, "name": "ドラマ"}],
            "credits": {
                "cast": [{"name": "役所広司", "character": "平山", "profile_path": null}],
                "crew": [{"name": "Wim Wenders", "job": "Director"}]
            }
        }"#;
        let details: MovieDetails = serde_json::from_str(body).unwrap();
        assert_eq!(details.imdb_id.as_deref(), Some("tt27503384"));
        assert_eq!(details.poster_path, None);
        assert_eq!(details.runtime, Some(124));
        assert_eq!(details.credits.cast[0].character.as_deref(), Some("平山"));
        assert_eq!(details.credits.crew[0].job.as_deref(), Some("Director"));
    }

    #[test]
    fn decodes_details_without_credits() {
        let details: MovieDetails = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        assert!(details.credits.cast.is_empty());
        assert!(details.genres.is_empty());
    }

    #[tokio::test]
    async fn search_without_key_makes_no_request() {
        let client = TmdbClient::new(
            reqwest::Client::new(),
            String::new(),
            "http://127.0.0.1:9".to_string(),
            4,
        );
        assert_eq!(client.search_movie("PERFECT DAYS").await.unwrap(), None);
    }
}
