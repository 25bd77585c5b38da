use std::fmt;

use serde::{Deserialize, Serialize};

/// Display lifecycle of a movie, derived from its schedule dates.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovieStatus {
    Showing,
    Incoming,
    Future,
    Unplanned,
}

impl MovieStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MovieStatus::Showing => "showing",
            MovieStatus::Incoming => "incoming",
            MovieStatus::Future => "future",
            MovieStatus::Unplanned => "unplanned",
        }
    }
}

impl fmt::Display for MovieStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TMDB detail locales, in fetch order. The order decides which language's
/// synopsis is kept.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Locale {
    Chinese,
    Japanese,
    English,
}

impl Locale {
    pub const FETCH_ORDER: [Locale; 3] = [Locale::Chinese, Locale::Japanese, Locale::English];

    pub fn as_tmdb_code(self) -> &'static str {
        match self {
            Locale::Chinese => "zh-CN",
            Locale::Japanese => "ja-JP",
            Locale::English => "en-US",
        }
    }

    /// Cast lists and IMDb ids are only taken from the translated and
    /// alternate locales.
    pub fn supplies_credits(self) -> bool {
        matches!(self, Locale::Chinese | Locale::English)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CastMember {
    pub name: String,
    pub role: String,
    pub img: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct CinemaItem {
    pub id: i32,
    pub name: String,
    #[serde(rename = "en")]
    pub name_en: String,
    pub district: String,
    pub lat: f64,
    pub lng: f64,
    pub tags: Vec<String>,
    pub website: String,
    pub desc: String,
    pub building_photo: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DailyMovie {
    pub id: i32,
    pub title: String,
    pub times: Vec<String>,
    pub rating: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct CinemaDetail {
    #[serde(flatten)]
    pub cinema: CinemaItem,
    pub daily_movies: Vec<DailyMovie>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MovieItem {
    pub id: i32,
    pub title_cn: String,
    pub title_en: String,
    pub director: String,
    pub year: String,
    pub tmdb_rating: f64,
    pub imdb_rating: f64,
    pub douban_rating: f64,
    pub status: String,
    pub release_date: String,
    pub earliest_schedule_date: String,
    pub cinema_count: usize,
    pub primary_cinema_name: String,
    pub genre: String,
    pub runtime: i32,
    pub poster: String,
    pub curator_note: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DaySchedule {
    pub date: String,
    pub times: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MovieCinemaSchedule {
    pub id: i32,
    pub name: String,
    pub schedule: Vec<DaySchedule>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MovieDetail {
    #[serde(flatten)]
    pub movie: MovieItem,
    pub synopsis: String,
    pub cast: Vec<CastMember>,
    pub cinemas: Vec<MovieCinemaSchedule>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct MovieListQuery {
    pub status: Option<String>,
    pub sort: Option<String>,
    pub q: Option<String>,
    pub date: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CinemaQuery {
    pub date: Option<String>,
}
