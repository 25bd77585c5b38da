use std::sync::LazyLock;

use regex::Regex;
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

const NOMINATIM_UA: &str = "TokyoCinePath/1.1 (geocoding)";

/// Fallback point near Shinjuku used when every query misses.
const FALLBACK_LAT: f64 = 35.6895;
const FALLBACK_LNG: f64 = 139.6917;

/// Shortest prefix ending in a house number: `3丁目15-15`, `3-15-15`, `15-15`.
static HOUSE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(.*?\d+丁目\d+-\d+)|(.*?\d+-\d+-\d+)|(.*?\d+-\d+)").expect("valid regex")
});

/// Trims building and floor suffixes so the geocoder sees a street address.
/// `東京都新宿区新宿3-15-15 新宿ピカデリー内` becomes `東京都新宿区新宿3-15-15`.
pub fn clean_address_for_geo(address: &str) -> String {
    match HOUSE_NUMBER.find(address) {
        Some(m) => m.as_str().to_string(),
        None => address.to_string(),
    }
}

/// Everything up to and including the first `区`, or empty.
fn ward_prefix(address: &str) -> &str {
    match address.find('区') {
        Some(idx) => &address[..idx + '区'.len_utf8()],
        None => "",
    }
}

/// The ward name alone: text after the last prefecture marker up to the first `区`.
/// `東京都新宿区新宿3-15-15` becomes `新宿区`.
pub fn extract_district(address: &str) -> String {
    let Some(ward_end) = address.find('区') else {
        return String::new();
    };
    let mut start = 0;
    for (i, c) in address.char_indices() {
        if matches!(c, '都' | '道' | '府' | '県') {
            start = i + c.len_utf8();
        }
    }
    if start >= ward_end {
        start = 0;
    }
    address[start..ward_end + '区'.len_utf8()].trim().to_string()
}

pub struct Geocoder {
    client: reqwest::Client,
    base_url: String,
}

impl Geocoder {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Cleaned address first, then `<ward> <cinema name>`, then a jittered
    /// point near the fallback so markers do not stack.
    pub async fn locate(&self, clean_address: &str, cinema_name: &str) -> (f64, f64) {
        match self.search(clean_address).await {
            Ok(coords) => return coords,
            Err(err) => debug!(query = %clean_address, error = %err, "address lookup missed"),
        }

        let query = format!("{} {}", ward_prefix(clean_address), cinema_name);
        match self.search(&query).await {
            Ok(coords) => return coords,
            Err(err) => warn!(query = %query, error = %err, "ward lookup missed, using fallback"),
        }

        fallback_coords(jiff::Timestamp::now().subsec_nanosecond())
    }

    async fn search(&self, query: &str) -> AppResult<(f64, f64)> {
        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        let results: Vec<Place> = self
            .client
            .get(url)
            .header(USER_AGENT, NOMINATIM_UA)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let place = results
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("place for {query:?}")))?;
        let lat = place.lat.parse().unwrap_or(0.0);
        let lng = place.lon.parse().unwrap_or(0.0);
        Ok((lat, lng))
    }
}

#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

fn fallback_coords(nanos: i32) -> (f64, f64) {
    let offset = f64::from(nanos.rem_euclid(1000)) / 100_000.0;
    (FALLBACK_LAT + offset, FALLBACK_LNG + offset)
}
