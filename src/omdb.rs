use serde::Deserialize;

use crate::error::AppResult;

/// IMDb ratings, looked up through OMDb by IMDb id.
pub struct OmdbClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

/// A rating plus the raw response body, kept for diagnosing zero scores.
#[derive(Clone, Debug)]
pub struct OmdbRating {
    pub rating: f64,
    pub raw: String,
}

impl OmdbClient {
    pub fn new(client: reqwest::Client, api_key: String, base_url: String) -> Self {
        if api_key.trim().is_empty() {
            tracing::warn!("OMDB_API_KEY not set, IMDb ratings disabled");
        }
        Self { client, api_key, base_url }
    }

    pub fn is_enabled(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub async fn imdb_rating(&self, imdb_id: &str) -> AppResult<OmdbRating> {
        if imdb_id.is_empty() || !self.is_enabled() {
            return Ok(OmdbRating { rating: 0.0, raw: String::new() });
        }

        let url = format!("{}/", self.base_url.trim_end_matches('/'));
        let raw = self
            .client
            .get(url)
            .query(&[("i", imdb_id), ("apikey", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let rating = parse_rating(&raw)?;
        Ok(OmdbRating { rating, raw })
    }
}

#[derive(Debug, Deserialize)]
struct OmdbResponse {
    #[serde(rename = "imdbRating", default)]
    imdb_rating: Option<String>,
}

/// OMDb reports the score as a string, `"N/A"` when unknown.
fn parse_rating(raw: &str) -> AppResult<f64> {
    let resp: OmdbResponse = serde_json::from_str(raw)?;
    Ok(resp.imdb_rating.and_then(|s| s.trim().parse::<f64>().ok()).unwrap_or(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_rating() {
        let raw = r#"{"Title":"Perfect Days","imdbRating":"7.9","Response":"True"}"#;
        assert_eq!(parse_rating(raw).unwrap(), 7.9);
    }

    #[test]
    fn not_available_is_zero() {
        assert_eq!(parse_rating(r#"{"imdbRating":"N/A"}"#).unwrap(), 0.0);
        let missing = r#"{"Response":"False","Error":"Incorrect IMDb ID."}"#;
        assert_eq!(parse_rating(missing).unwrap(), 0.0);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(parse_rating("<html>").is_err());
    }
}
