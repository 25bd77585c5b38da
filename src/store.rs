use std::collections::BTreeSet;

use jiff::civil::Date;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TryInsertResult,
    sea_query::{Expr, OnConflict},
};

use crate::{
    entities::{cinema, movie, schedule},
    error::{AppError, AppResult},
    models::MovieStatus,
};

/// Cinema fields gathered by the cinema sync pass.
#[derive(Clone, Debug)]
pub struct NewCinema {
    pub name_jp: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub building_photo: String,
    pub website: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MovieSort {
    ImdbRating,
    DoubanRating,
}

impl MovieSort {
    pub fn from_query(s: &str) -> Option<Self> {
        match s {
            "imdb_rating" => Some(MovieSort::ImdbRating),
            "douban_rating" => Some(MovieSort::DoubanRating),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MovieFilter {
    pub status: Option<String>,
    /// Restrict to these ids; `Some(vec![])` matches nothing.
    pub ids: Option<Vec<i32>>,
    pub query: Option<String>,
    pub sort: Option<MovieSort>,
}

/// Handle over the relational store. Cheap to clone; every component gets
/// its own copy instead of reaching for a global.
#[derive(Clone)]
pub struct Store {
    db: DatabaseConnection,
}

impl Store {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn upsert_cinema(&self, cinema: NewCinema) -> AppResult<()> {
        let model = cinema::ActiveModel {
            id: Default::default(),
            name_jp: Set(cinema.name_jp),
            address: Set(cinema.address),
            latitude: Set(cinema.latitude),
            longitude: Set(cinema.longitude),
            building_photo: Set(cinema.building_photo),
            website: Set(cinema.website),
            updated_at: Set(now_sec()),
        };

        cinema::Entity::insert(model)
            .on_conflict(
                OnConflict::column(cinema::Column::NameJp)
                    .update_columns([
                        cinema::Column::Address,
                        cinema::Column::Latitude,
                        cinema::Column::Longitude,
                        cinema::Column::BuildingPhoto,
                        cinema::Column::Website,
                        cinema::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;

        Ok(())
    }

    pub async fn find_cinema_by_name(&self, name_jp: &str) -> AppResult<Option<cinema::Model>> {
        let cinema = cinema::Entity::find()
            .filter(cinema::Column::NameJp.eq(name_jp))
            .one(&self.db)
            .await?;
        Ok(cinema)
    }

    pub async fn list_cinemas(&self) -> AppResult<Vec<cinema::Model>> {
        let cinemas =
            cinema::Entity::find().order_by_asc(cinema::Column::Id).all(&self.db).await?;
        Ok(cinemas)
    }

    pub async fn cinema_by_id(&self, id: i32) -> AppResult<cinema::Model> {
        cinema::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("cinema {id}")))
    }

    pub async fn cinemas_by_ids(&self, ids: &[i32]) -> AppResult<Vec<cinema::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let cinemas = cinema::Entity::find()
            .filter(cinema::Column::Id.is_in(ids.iter().copied()))
            .all(&self.db)
            .await?;
        Ok(cinemas)
    }

    /// Looks a movie up by native title, creating it with status `showing`
    /// when absent. The flag is `true` when a row was created.
    pub async fn find_or_create_movie(&self, title_jp: &str) -> AppResult<(movie::Model, bool)> {
        if let Some(existing) = movie::Entity::find()
            .filter(movie::Column::TitleJp.eq(title_jp))
            .one(&self.db)
            .await?
        {
            return Ok((existing, false));
        }

        let now = now_sec();
        let model = movie::ActiveModel {
            id: Default::default(),
            tmdb_id: Set(0),
            imdb_id: Set(String::new()),
            title_cn: Set(String::new()),
            title_jp: Set(title_jp.to_string()),
            title_en: Set(String::new()),
            director: Set(String::new()),
            year: Set(String::new()),
            synopsis: Set(String::new()),
            poster: Set(String::new()),
            backdrop: Set(String::new()),
            runtime: Set(0),
            genre: Set(String::new()),
            cast_json: Set(String::new()),
            tmdb_rating: Set(0.0),
            imdb_rating: Set(0.0),
            douban_rating: Set(0.0),
            status: Set(MovieStatus::Showing.as_str().to_string()),
            release_date: Set(String::new()),
            curator_note: Set(String::new()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&self.db).await?;
        Ok((created, true))
    }

    pub async fn movie_by_id(&self, id: i32) -> AppResult<movie::Model> {
        movie::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("movie {id}")))
    }

    pub async fn movies_by_ids(&self, ids: &[i32]) -> AppResult<Vec<movie::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let movies = movie::Entity::find()
            .filter(movie::Column::Id.is_in(ids.iter().copied()))
            .all(&self.db)
            .await?;
        Ok(movies)
    }

    pub async fn all_movies(&self) -> AppResult<Vec<movie::Model>> {
        let movies = movie::Entity::find().order_by_asc(movie::Column::Id).all(&self.db).await?;
        Ok(movies)
    }

    pub async fn list_movies(&self, filter: &MovieFilter) -> AppResult<Vec<movie::Model>> {
        let mut query = movie::Entity::find();

        if let Some(ids) = &filter.ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            query = query.filter(movie::Column::Id.is_in(ids.iter().copied()));
        }

        match filter.status.as_deref() {
            None | Some("") => {},
            // Rows written before statuses existed have an empty status and count as showing.
            Some("showing") => {
                query = query.filter(
                    Condition::any()
                        .add(movie::Column::Status.eq(MovieStatus::Showing.as_str()))
                        .add(movie::Column::Status.eq("")),
                );
            },
            Some(status) => {
                query = query.filter(movie::Column::Status.eq(status));
            },
        }

        if let Some(q) = filter.query.as_deref().filter(|q| !q.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(movie::Column::TitleCn.contains(q))
                    .add(movie::Column::TitleEn.contains(q)),
            );
        }

        query = match filter.sort {
            Some(MovieSort::ImdbRating) => query.order_by_desc(movie::Column::ImdbRating),
            Some(MovieSort::DoubanRating) => query.order_by_desc(movie::Column::DoubanRating),
            None => query,
        };

        let movies = query.order_by_asc(movie::Column::Id).all(&self.db).await?;
        Ok(movies)
    }

    /// Movies still lacking a Douban score that have enough metadata to search for one.
    pub async fn movies_missing_douban(&self) -> AppResult<Vec<movie::Model>> {
        let movies = movie::Entity::find()
            .filter(movie::Column::DoubanRating.eq(0.0))
            .filter(movie::Column::TitleEn.ne(""))
            .filter(movie::Column::Year.ne(""))
            .order_by_asc(movie::Column::Id)
            .all(&self.db)
            .await?;
        Ok(movies)
    }

    /// Writes every column of `movie` back, bumping `updated_at`.
    pub async fn save_movie(&self, movie: &movie::Model) -> AppResult<movie::Model> {
        let mut active = movie::ActiveModel::from(movie.clone()).reset_all();
        active.updated_at = Set(now_sec());
        let saved = active.update(&self.db).await?;
        Ok(saved)
    }

    pub async fn update_movie_status(&self, movie_id: i32, status: MovieStatus) -> AppResult<()> {
        movie::Entity::update_many()
            .col_expr(movie::Column::Status, Expr::value(status.as_str()))
            .col_expr(movie::Column::UpdatedAt, Expr::value(now_sec()))
            .filter(movie::Column::Id.eq(movie_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Inserts a showing unless the (movie, cinema, date, time) key already
    /// exists. Returns whether a row was written.
    pub async fn insert_schedule(
        &self,
        movie_id: i32,
        cinema_id: i32,
        play_date: Date,
        start_time: &str,
    ) -> AppResult<bool> {
        let model = schedule::ActiveModel {
            id: Default::default(),
            movie_id: Set(movie_id),
            cinema_id: Set(cinema_id),
            play_date: Set(play_date.to_string()),
            start_time: Set(start_time.to_string()),
            created_at: Set(now_sec()),
        };

        let result = schedule::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    schedule::Column::MovieId,
                    schedule::Column::CinemaId,
                    schedule::Column::PlayDate,
                    schedule::Column::StartTime,
                ])
                .do_nothing()
                .to_owned(),
            )
            .do_nothing()
            .exec(&self.db)
            .await?;

        Ok(matches!(result, TryInsertResult::Inserted(_)))
    }

    pub async fn schedules_for_movie(&self, movie_id: i32) -> AppResult<Vec<schedule::Model>> {
        let rows = schedule::Entity::find()
            .filter(schedule::Column::MovieId.eq(movie_id))
            .order_by_asc(schedule::Column::PlayDate)
            .order_by_asc(schedule::Column::StartTime)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    /// Every persisted play date of a movie, including lapsed ones.
    pub async fn schedule_dates_for_movie(&self, movie_id: i32) -> AppResult<BTreeSet<Date>> {
        let rows = self.schedules_for_movie(movie_id).await?;
        Ok(rows.iter().filter_map(|s| s.play_date.parse::<Date>().ok()).collect())
    }

    pub async fn schedules_for_cinema_on(
        &self,
        cinema_id: i32,
        date: Date,
    ) -> AppResult<Vec<schedule::Model>> {
        let rows = schedule::Entity::find()
            .filter(schedule::Column::CinemaId.eq(cinema_id))
            .filter(schedule::Column::PlayDate.eq(date.to_string()))
            .order_by_asc(schedule::Column::StartTime)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    /// Distinct movie ids with at least one showing on `date`.
    pub async fn movie_ids_playing_on(&self, date: Date) -> AppResult<Vec<i32>> {
        let rows = schedule::Entity::find()
            .filter(schedule::Column::PlayDate.eq(date.to_string()))
            .all(&self.db)
            .await?;
        let ids: BTreeSet<i32> = rows.into_iter().map(|s| s.movie_id).collect();
        Ok(ids.into_iter().collect())
    }

    /// Movies with at least one stored showing, on any date.
    pub async fn scheduled_movie_ids(&self) -> AppResult<Vec<i32>> {
        let rows = schedule::Entity::find().all(&self.db).await?;
        let ids: BTreeSet<i32> = rows.into_iter().map(|s| s.movie_id).collect();
        Ok(ids.into_iter().collect())
    }

    pub async fn count_schedules(&self) -> AppResult<u64> {
        Ok(schedule::Entity::find().count(&self.db).await?)
    }

    pub async fn count_movies(&self) -> AppResult<u64> {
        Ok(movie::Entity::find().count(&self.db).await?)
    }
}

fn now_sec() -> i64 {
    jiff::Timestamp::now().as_second()
}
