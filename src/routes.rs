use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use jiff::civil::Date;
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    AppState,
    entities::movie,
    error::AppResult,
    models::{CinemaDetail, CinemaItem, CinemaQuery, MovieDetail, MovieItem, MovieListQuery},
    store::{MovieFilter, MovieSort, Store},
    views,
};

#[derive(Debug, Serialize)]
pub struct Items<T> {
    items: Vec<T>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/cinemas", get(list_cinemas))
        .route("/api/cinemas/{id}", get(get_cinema))
        .route("/api/movies", get(list_movies))
        .route("/api/movies/{id}", get(get_movie))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

pub async fn list_cinemas(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Items<CinemaItem>>> {
    let cinemas = state.store.list_cinemas().await?;
    let items = cinemas.iter().map(views::cinema_item).collect();
    Ok(Json(Items { items }))
}

pub async fn get_cinema(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Query(q): Query<CinemaQuery>,
) -> AppResult<Json<CinemaDetail>> {
    let cinema = state.store.cinema_by_id(id).await?;

    let date = match q.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(raw) => raw.parse::<Date>().ok(),
        None => Some(state.config.today()?),
    };

    // An unparseable date has no showings.
    let daily_movies = match date {
        Some(date) => {
            let schedules = state.store.schedules_for_cinema_on(cinema.id, date).await?;
            let mut movie_ids: Vec<i32> = schedules.iter().map(|s| s.movie_id).collect();
            movie_ids.sort_unstable();
            movie_ids.dedup();
            let movies = state.store.movies_by_ids(&movie_ids).await?;
            views::build_daily_movies(&schedules, &movies)
        },
        None => Vec::new(),
    };

    Ok(Json(CinemaDetail { cinema: views::cinema_item(&cinema), daily_movies }))
}

pub async fn list_movies(
    State(state): State<Arc<AppState>>,
    Query(q): Query<MovieListQuery>,
) -> AppResult<Json<Items<MovieItem>>> {
    let status = q.status.filter(|s| !s.is_empty());
    let date = q.date.as_deref().map(str::trim).filter(|d| !d.is_empty());

    // The calendar view narrows a status list to one day's showings. A day
    // that does not parse still limits the list to scheduled movies.
    let ids = match (&status, date) {
        (Some(_), Some(raw)) => match raw.parse::<Date>() {
            Ok(date) => Some(state.store.movie_ids_playing_on(date).await?),
            Err(_) => Some(state.store.scheduled_movie_ids().await?),
        },
        _ => None,
    };

    let filter = MovieFilter {
        status,
        ids,
        query: q.q.filter(|s| !s.is_empty()),
        sort: q.sort.as_deref().and_then(MovieSort::from_query),
    };
    let movies = state.store.list_movies(&filter).await?;

    let mut items = Vec::with_capacity(movies.len());
    for movie in &movies {
        items.push(summarized_item(&state.store, movie).await?);
    }
    Ok(Json(Items { items }))
}

pub async fn get_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> AppResult<Json<MovieDetail>> {
    let movie = state.store.movie_by_id(id).await?;
    let item = summarized_item(&state.store, &movie).await?;

    let schedules = state.store.schedules_for_movie(movie.id).await?;
    let cinema_ids: Vec<i32> =
        views::summarize_schedules(&schedules).cinema_ids.into_iter().collect();
    let cinemas = state.store.cinemas_by_ids(&cinema_ids).await?;

    Ok(Json(MovieDetail {
        movie: item,
        synopsis: movie.synopsis.clone(),
        cast: views::decode_cast(&movie.cast_json),
        cinemas: views::build_cinema_schedules(&schedules, &cinemas),
    }))
}

/// List item plus earliest showing, cinema count and, for single-cinema
/// runs, that cinema's name.
async fn summarized_item(store: &Store, movie: &movie::Model) -> AppResult<MovieItem> {
    let mut item = views::movie_item(movie);
    let schedules = store.schedules_for_movie(movie.id).await?;
    let summary = views::summarize_schedules(&schedules);

    item.earliest_schedule_date = summary.earliest;
    item.cinema_count = summary.cinema_ids.len();
    if let (1, Some(&cinema_id)) = (summary.cinema_ids.len(), summary.cinema_ids.first()) {
        if let Ok(cinema) = store.cinema_by_id(cinema_id).await {
            item.primary_cinema_name = cinema.name_jp;
        }
    }
    Ok(item)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::Config,
        models::MovieStatus,
        store::tests::{cinema_named, memory_store},
    };

    async fn seeded_app() -> (Router, Store) {
        let store = memory_store().await;
        store.upsert_cinema(cinema_named("ユーロスペース")).await.unwrap();
        store.upsert_cinema(cinema_named("K's cinema")).await.unwrap();
        let euro = store.find_cinema_by_name("ユーロスペース").await.unwrap().unwrap();
        let ks = store.find_cinema_by_name("K's cinema").await.unwrap().unwrap();

        let (mut perfect, _) = store.find_or_create_movie("PERFECT DAYS").await.unwrap();
        perfect.title_en = "Perfect Days".into();
        perfect.imdb_rating = 7.9;
        perfect.cast_json = r#"[{"name":"役所広司","role":"平山","img":""}]"#.into();
        store.save_movie(&perfect).await.unwrap();

        let (dawn, _) = store.find_or_create_movie("夜明けのすべて").await.unwrap();
        store.update_movie_status(dawn.id, MovieStatus::Incoming).await.unwrap();

        let jan23 = Date::new(2026, 1, 23).unwrap();
        let jan25 = Date::new(2026, 1, 25).unwrap();
        store.insert_schedule(perfect.id, euro.id, jan23, "18:05").await.unwrap();
        store.insert_schedule(perfect.id, euro.id, jan23, "10:40").await.unwrap();
        store.insert_schedule(perfect.id, ks.id, jan25, "20:00").await.unwrap();
        store.insert_schedule(dawn.id, euro.id, jan25, "12:00").await.unwrap();

        let config = Arc::new(Config::from_env().unwrap());
        let state = Arc::new(AppState { config, store: store.clone() });
        (router(state), store)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn lists_cinemas_with_district() {
        let (app, _) = seeded_app().await;
        let (status, body) = get_json(app, "/api/cinemas").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 2);
        assert_eq!(body["items"][0]["name"], "ユーロスペース");
        assert_eq!(body["items"][0]["district"], "新宿区");
        assert_eq!(body["items"][0]["en"], "");
    }

    #[tokio::test]
    async fn cinema_detail_for_a_date() {
        let (app, store) = seeded_app().await;
        let euro = store.find_cinema_by_name("ユーロスペース").await.unwrap().unwrap();
        let uri = format!("/api/cinemas/{}?date=2026-01-23", euro.id);
        let (status, body) = get_json(app, &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "ユーロスペース");
        let daily = body["daily_movies"].as_array().unwrap();
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0]["title"], "Perfect Days");
        assert_eq!(daily[0]["rating"], "7.9");
        assert_eq!(daily[0]["times"], serde_json::json!(["10:40", "18:05"]));
    }

    #[tokio::test]
    async fn unknown_ids_are_404() {
        let (app, _) = seeded_app().await;
        let (status, body) = get_json(app.clone(), "/api/cinemas/999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not found"));

        let (status, _) = get_json(app, "/api/movies/999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn movie_list_filters_by_status_and_date() {
        let (app, _) = seeded_app().await;

        let (_, body) = get_json(app.clone(), "/api/movies?status=showing").await;
        let items = body["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["title_cn"], "Perfect Days");
        assert_eq!(items[0]["cinema_count"], 2);
        assert_eq!(items[0]["primary_cinema_name"], "");
        assert_eq!(items[0]["earliest_schedule_date"], "2026-01-23");

        let (_, body) = get_json(app.clone(), "/api/movies?status=incoming&date=2026-01-25").await;
        let items = body["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["title_cn"], "夜明けのすべて");
        assert_eq!(items[0]["primary_cinema_name"], "ユーロスペース");

        let (_, body) = get_json(app.clone(), "/api/movies?status=incoming&date=2026-01-23").await;
        assert!(body["items"].as_array().unwrap().is_empty());

        let (_, body) = get_json(app, "/api/movies?q=Perfect&sort=imdb_rating").await;
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unparseable_day_still_requires_a_showing() {
        let (app, store) = seeded_app().await;
        store.find_or_create_movie("枯れ葉").await.unwrap();

        let (_, body) = get_json(app.clone(), "/api/movies?status=showing").await;
        assert_eq!(body["items"].as_array().unwrap().len(), 2);

        let (status, body) = get_json(app, "/api/movies?status=showing&date=soon").await;
        assert_eq!(status, StatusCode::OK);
        let items = body["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["title_cn"], "Perfect Days");
    }

    #[tokio::test]
    async fn movie_detail_groups_schedules_per_cinema() {
        let (app, store) = seeded_app().await;
        let (perfect, _) = store.find_or_create_movie("PERFECT DAYS").await.unwrap();
        let (status, body) = get_json(app, &format!("/api/movies/{}", perfect.id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title_en"], "Perfect Days");
        assert_eq!(body["cast"][0]["role"], "平山");

        let cinemas = body["cinemas"].as_array().unwrap();
        assert_eq!(cinemas.len(), 2);
        assert_eq!(cinemas[0]["name"], "ユーロスペース");
        assert_eq!(cinemas[0]["schedule"][0]["date"], "1/23");
        assert_eq!(cinemas[0]["schedule"][0]["times"], serde_json::json!(["10:40", "18:05"]));
        assert_eq!(cinemas[1]["schedule"][0]["date"], "1/25");
    }
}
