use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{
    entities::{cinema, movie, schedule},
    geocode::extract_district,
    models::{CastMember, CinemaItem, DailyMovie, DaySchedule, MovieCinemaSchedule, MovieItem},
};

/// Translated title, then alternate, then native, then a placeholder.
pub fn display_title(movie: &movie::Model) -> String {
    [&movie.title_cn, &movie.title_en, &movie.title_jp]
        .into_iter()
        .map(|t| t.trim())
        .find(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Movie #{}", movie.id))
}

/// Douban, then IMDb, then TMDB; the first non-zero score wins.
pub fn display_rating(movie: &movie::Model) -> String {
    let rating = [movie.douban_rating, movie.imdb_rating, movie.tmdb_rating]
        .into_iter()
        .find(|r| *r != 0.0)
        .unwrap_or(0.0);
    format!("{rating:.1}")
}

pub fn cinema_item(cinema: &cinema::Model) -> CinemaItem {
    CinemaItem {
        id: cinema.id,
        name: cinema.name_jp.clone(),
        name_en: String::new(),
        district: extract_district(&cinema.address),
        lat: cinema.latitude,
        lng: cinema.longitude,
        tags: Vec::new(),
        website: cinema.website.clone(),
        desc: String::new(),
        building_photo: cinema.building_photo.clone(),
    }
}

/// Schedule-derived fields are left blank; see [`summarize_schedules`].
pub fn movie_item(movie: &movie::Model) -> MovieItem {
    let title_cn = [&movie.title_cn, &movie.title_en, &movie.title_jp]
        .into_iter()
        .find(|t| !t.is_empty())
        .cloned()
        .unwrap_or_default();
    let title_en = if movie.title_en.is_empty() {
        movie.title_jp.clone()
    } else {
        movie.title_en.clone()
    };

    MovieItem {
        id: movie.id,
        title_cn,
        title_en,
        director: movie.director.clone(),
        year: movie.year.clone(),
        tmdb_rating: movie.tmdb_rating,
        imdb_rating: movie.imdb_rating,
        douban_rating: movie.douban_rating,
        status: movie.status.clone(),
        release_date: movie.release_date.clone(),
        earliest_schedule_date: String::new(),
        cinema_count: 0,
        primary_cinema_name: String::new(),
        genre: movie.genre.clone(),
        runtime: movie.runtime,
        poster: movie.poster.clone(),
        curator_note: movie.curator_note.clone(),
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScheduleSummary {
    pub earliest: String,
    pub cinema_ids: BTreeSet<i32>,
}

pub fn summarize_schedules(schedules: &[schedule::Model]) -> ScheduleSummary {
    ScheduleSummary {
        earliest: schedules
            .iter()
            .map(|s| s.play_date.as_str())
            .min()
            .unwrap_or_default()
            .to_string(),
        cinema_ids: schedules.iter().map(|s| s.cinema_id).collect(),
    }
}

/// A cinema's showings on one day, grouped per movie. Movies are ordered by
/// their first start time.
pub fn build_daily_movies(
    schedules: &[schedule::Model],
    movies: &[movie::Model],
) -> Vec<DailyMovie> {
    let by_id: HashMap<i32, &movie::Model> = movies.iter().map(|m| (m.id, m)).collect();
    let mut grouped: BTreeMap<i32, Vec<String>> = BTreeMap::new();
    for s in schedules {
        if by_id.contains_key(&s.movie_id) {
            grouped.entry(s.movie_id).or_default().push(s.start_time.clone());
        }
    }

    let mut out: Vec<DailyMovie> = grouped
        .into_iter()
        .filter_map(|(id, mut times)| {
            let movie = by_id.get(&id)?;
            times.sort();
            Some(DailyMovie {
                id,
                title: display_title(movie),
                times,
                rating: display_rating(movie),
            })
        })
        .collect();
    out.sort_by(|a, b| a.times.first().cmp(&b.times.first()).then(a.id.cmp(&b.id)));
    out
}

/// A movie's showings grouped per cinema, then per day (`M/D`).
pub fn build_cinema_schedules(
    schedules: &[schedule::Model],
    cinemas: &[cinema::Model],
) -> Vec<MovieCinemaSchedule> {
    let names: HashMap<i32, &str> = cinemas.iter().map(|c| (c.id, c.name_jp.as_str())).collect();
    let mut grouped: BTreeMap<i32, BTreeMap<&str, Vec<String>>> = BTreeMap::new();
    for s in schedules {
        grouped
            .entry(s.cinema_id)
            .or_default()
            .entry(s.play_date.as_str())
            .or_default()
            .push(s.start_time.clone());
    }

    grouped
        .into_iter()
        .filter_map(|(cinema_id, days)| {
            let name = names.get(&cinema_id)?;
            let schedule = days
                .into_iter()
                .map(|(date, mut times)| {
                    times.sort();
                    DaySchedule { date: short_date(date), times }
                })
                .collect();
            Some(MovieCinemaSchedule { id: cinema_id, name: name.to_string(), schedule })
        })
        .collect()
}

/// `2026-01-23` becomes `1/23`; anything unparseable is passed through.
pub fn short_date(play_date: &str) -> String {
    match play_date.parse::<jiff::civil::Date>() {
        Ok(d) => format!("{}/{}", d.month(), d.day()),
        Err(_) => play_date.to_string(),
    }
}

pub fn decode_cast(cast_json: &str) -> Vec<CastMember> {
    if cast_json.is_empty() {
        return Vec::new();
    }
    serde_json::from_str(cast_json).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(id: i32, cn: &str, en: &str, jp: &str) -> movie::Model {
        movie::Model {
            id,
            tmdb_id: 0,
            imdb_id: String::new(),
            title_cn: cn.into(),
            title_jp: jp.into(),
            title_en: en.into(),
            director: String::new(),
            year: String::new(),
            synopsis: String::new(),
            poster: String::new(),
            backdrop: String::new(),
            runtime: 0,
            genre: String::new(),
            cast_json: String::new(),
            tmdb_rating: 0.0,
            imdb_rating: 0.0,
            douban_rating: 0.0,
            status: "showing".into(),
            release_date: String::new(),
            curator_note: String::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    fn show(id: i32, movie_id: i32, cinema_id: i32, date: &str, time: &str) -> schedule::Model {
        schedule::Model {
            id,
            movie_id,
            cinema_id,
            play_date: date.into(),
            start_time: time.into(),
            created_at: 0,
        }
    }

    fn cinema(id: i32, name: &str) -> cinema::Model {
        cinema::Model {
            id,
            name_jp: name.into(),
            address: "東京都渋谷区円山町1-5 KINOHAUS 3F".into(),
            latitude: 35.65,
            longitude: 139.69,
            building_photo: String::new(),
            website: String::new(),
            updated_at: 0,
        }
    }

    #[test]
    fn title_falls_back_in_order() {
        assert_eq!(display_title(&movie(1, "完美的日子", "Perfect Days", "PERFECT DAYS")), "完美的日子");
        assert_eq!(display_title(&movie(1, " ", "Perfect Days", "PERFECT DAYS")), "Perfect Days");
        assert_eq!(display_title(&movie(1, "", "", "PERFECT DAYS")), "PERFECT DAYS");
        assert_eq!(display_title(&movie(7, "", "", "")), "Movie #7");
    }

    #[test]
    fn rating_precedence() {
        let mut m = movie(1, "", "", "x");
        assert_eq!(display_rating(&m), "0.0");
        m.tmdb_rating = 7.83;
        assert_eq!(display_rating(&m), "7.8");
        m.imdb_rating = 7.9;
        assert_eq!(display_rating(&m), "7.9");
        m.douban_rating = 8.4;
        assert_eq!(display_rating(&m), "8.4");
    }

    #[test]
    fn movie_item_titles() {
        let item = movie_item(&movie(1, "", "", "夜明けのすべて"));
        assert_eq!(item.title_cn, "夜明けのすべて");
        assert_eq!(item.title_en, "夜明けのすべて");

        let item = movie_item(&movie(1, "", "All the Long Nights", "夜明けのすべて"));
        assert_eq!(item.title_cn, "All the Long Nights");
        assert_eq!(item.title_en, "All the Long Nights");
    }

    #[test]
    fn daily_movies_group_and_sort_times() {
        let movies = vec![movie(1, "完美的日子", "", ""), movie(2, "", "", "夜明けのすべて")];
        let schedules = vec![
            show(1, 1, 9, "2026-01-23", "18:05"),
            show(2, 2, 9, "2026-01-23", "09:30"),
            show(3, 1, 9, "2026-01-23", "10:40"),
            show(4, 3, 9, "2026-01-23", "12:00"),
        ];
        let daily = build_daily_movies(&schedules, &movies);
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].id, 2);
        assert_eq!(daily[1].title, "完美的日子");
        assert_eq!(daily[1].times, vec!["10:40", "18:05"]);
    }

    #[test]
    fn cinema_schedules_use_short_dates() {
        let cinemas = vec![cinema(3, "ユーロスペース"), cinema(5, "K's cinema")];
        let schedules = vec![
            show(1, 1, 5, "2026-01-24", "20:00"),
            show(2, 1, 3, "2026-01-23", "18:05"),
            show(3, 1, 3, "2026-01-23", "10:40"),
            show(4, 1, 3, "2026-02-01", "10:40"),
        ];
        let out = build_cinema_schedules(&schedules, &cinemas);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, "ユーロスペース");
        assert_eq!(
            out[0].schedule,
            vec![
                DaySchedule { date: "1/23".into(), times: vec!["10:40".into(), "18:05".into()] },
                DaySchedule { date: "2/1".into(), times: vec!["10:40".into()] },
            ]
        );
        assert_eq!(out[1].schedule[0].date, "1/24");
    }

    #[test]
    fn summary_counts_distinct_cinemas() {
        let schedules = vec![
            show(1, 1, 5, "2026-01-24", "20:00"),
            show(2, 1, 5, "2026-01-22", "18:05"),
        ];
        let summary = summarize_schedules(&schedules);
        assert_eq!(summary.earliest, "2026-01-22");
        assert_eq!(summary.cinema_ids.len(), 1);
        assert_eq!(summarize_schedules(&[]), ScheduleSummary::default());
    }

    #[test]
    fn cinema_item_derives_district() {
        let item = cinema_item(&cinema(3, "ユーロスペース"));
        assert_eq!(item.district, "渋谷区");
        assert!(item.tags.is_empty());
    }

    #[test]
    fn bad_cast_json_is_empty() {
        assert!(decode_cast("").is_empty());
        assert!(decode_cast("{not json").is_empty());
        assert_eq!(decode_cast(r#"[{"name":"役所広司","role":"平山","img":""}]"#).len(), 1);
    }
}
