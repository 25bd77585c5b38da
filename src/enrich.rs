use jiff::civil::Date;
use tracing::{debug, info, warn};

use crate::{
    douban::DoubanClient,
    entities::movie,
    models::{CastMember, Locale},
    omdb::OmdbClient,
    store::Store,
    tmdb::{BACKDROP_BASE, MovieDetails, POSTER_BASE, PROFILE_BASE, TmdbClient},
};

const MAX_CAST: usize = 8;

/// Fills movie metadata from TMDB, OMDb and, when configured, Douban.
/// Fields are first-writer-wins: a value already present is never
/// overwritten, whichever source or locale supplied it. The translated and
/// alternate titles are the exception and always follow their locale.
pub struct Enricher {
    store: Store,
    tmdb: TmdbClient,
    omdb: OmdbClient,
    douban: Option<DoubanClient>,
}

impl Enricher {
    pub fn new(
        store: Store,
        tmdb: TmdbClient,
        omdb: OmdbClient,
        douban: Option<DoubanClient>,
    ) -> Self {
        Self { store, tmdb, omdb, douban }
    }

    /// Best effort. External failures are logged and leave the movie as it
    /// was; the returned record is whatever ended up persisted.
    pub async fn enrich(&self, mut movie: movie::Model) -> movie::Model {
        if is_complete(&movie) {
            debug!(title = %movie.title_jp, "metadata complete, skipping");
            return movie;
        }
        if movie.title_jp.is_empty() {
            return movie;
        }

        let tmdb_id = match self.tmdb.search_movie(&movie.title_jp).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                warn!(title = %movie.title_jp, "no TMDB match");
                return movie;
            },
            Err(err) => {
                warn!(title = %movie.title_jp, error = %err, "TMDB search failed");
                return movie;
            },
        };
        if movie.tmdb_id == 0 {
            movie.tmdb_id = tmdb_id;
        }

        let mut imdb_id = None;
        for locale in Locale::FETCH_ORDER {
            match self.tmdb.movie_details(tmdb_id, locale).await {
                Ok(details) => apply_details(&mut movie, locale, &details, &mut imdb_id),
                Err(err) => {
                    warn!(
                        title = %movie.title_jp,
                        tmdb_id,
                        locale = locale.as_tmdb_code(),
                        error = %err,
                        "TMDB details failed"
                    );
                },
            }
        }

        if let Some(imdb_id) = imdb_id {
            self.apply_omdb(&mut movie, imdb_id).await;
        }

        fill_release_date_from_year(&mut movie);

        if let Some(douban) = &self.douban {
            if !movie.title_cn.is_empty() && !movie.year.is_empty() && movie.douban_rating == 0.0 {
                match douban.rating(&movie.title_cn, &movie.year).await {
                    Ok(rating) if rating > 0.0 => movie.douban_rating = rating,
                    Ok(_) => {},
                    Err(err) => {
                        warn!(title = %movie.title_cn, error = %err, "douban lookup failed")
                    },
                }
            }
        }

        if movie.release_date.is_empty() {
            warn!(title = %movie.title_jp, "release date still unknown");
        }

        match self.store.save_movie(&movie).await {
            Ok(saved) => {
                info!(
                    title = %saved.title_jp,
                    title_cn = %saved.title_cn,
                    title_en = %saved.title_en,
                    tmdb = saved.tmdb_rating,
                    imdb = saved.imdb_rating,
                    douban = saved.douban_rating,
                    "movie enriched"
                );
                saved
            },
            Err(err) => {
                warn!(title = %movie.title_jp, error = %err, "failed to save enriched movie");
                movie
            },
        }
    }

    async fn apply_omdb(&self, movie: &mut movie::Model, imdb_id: String) {
        match self.omdb.imdb_rating(&imdb_id).await {
            Ok(result) => {
                if movie.imdb_rating == 0.0 && result.rating > 0.0 {
                    movie.imdb_rating = result.rating;
                }
                if self.omdb.is_enabled() && movie.tmdb_rating > 0.0 && result.rating == 0.0 {
                    warn!(
                        title = %movie.title_jp,
                        imdb_id = %imdb_id,
                        raw = %result.raw,
                        "OMDb returned no rating for a rated movie"
                    );
                }
            },
            Err(err) => warn!(
                title = %movie.title_jp,
                imdb_id = %imdb_id,
                error = %err,
                "OMDb lookup failed"
            ),
        }
        if movie.imdb_id.is_empty() {
            movie.imdb_id = imdb_id;
        }
    }
}

/// Nothing left to look up: both titles, a score and a release date.
pub fn is_complete(movie: &movie::Model) -> bool {
    !movie.title_cn.is_empty()
        && !movie.title_en.is_empty()
        && movie.tmdb_rating > 0.0
        && !movie.release_date.is_empty()
}

/// Merges one locale's response into `movie`, filling only empty fields
/// apart from the locale's own title. The IMDb id is collected into
/// `imdb_id` rather than written directly.
pub fn apply_details(
    movie: &mut movie::Model,
    locale: Locale,
    details: &MovieDetails,
    imdb_id: &mut Option<String>,
) {
    if movie.tmdb_rating == 0.0 {
        if let Some(vote) = details.vote_average.filter(|v| *v > 0.0) {
            movie.tmdb_rating = vote;
        }
    }

    if movie.synopsis.is_empty() {
        if let Some(overview) = non_blank(&details.overview) {
            movie.synopsis = overview.to_string();
        }
    }

    if movie.poster.is_empty() {
        if let Some(path) = non_blank(&details.poster_path) {
            movie.poster = format!("{POSTER_BASE}{path}");
        }
    }
    if movie.backdrop.is_empty() {
        if let Some(path) = non_blank(&details.backdrop_path) {
            movie.backdrop = format!("{BACKDROP_BASE}{path}");
        }
    }

    if let Some(release) = non_blank(&details.release_date) {
        if movie.year.is_empty() && release.len() >= 4 {
            movie.year = release.chars().take(4).collect();
        }
        if movie.release_date.is_empty() && release.parse::<Date>().is_ok() {
            movie.release_date = release.to_string();
        }
    }

    if movie.runtime == 0 {
        if let Some(runtime) = details.runtime.filter(|r| *r > 0) {
            movie.runtime = runtime;
        }
    }

    if movie.genre.is_empty() {
        let genres: Vec<&str> = details
            .genres
            .iter()
            .map(|g| g.name.trim())
            .filter(|name| !name.is_empty())
            .collect();
        movie.genre = genres.join(", ");
    }

    if movie.director.is_empty() {
        if let Some(director) =
            details.credits.crew.iter().find(|c| c.job.as_deref() == Some("Director"))
        {
            movie.director = director.name.clone();
        }
    }

    if locale.supplies_credits() {
        if movie.cast_json.is_empty() && !details.credits.cast.is_empty() {
            let cast: Vec<CastMember> = details
                .credits
                .cast
                .iter()
                .take(MAX_CAST)
                .map(|c| CastMember {
                    name: c.name.clone(),
                    role: c.character.clone().unwrap_or_default(),
                    img: non_blank(&c.profile_path)
                        .map(|p| format!("{PROFILE_BASE}{p}"))
                        .unwrap_or_default(),
                })
                .collect();
            match serde_json::to_string(&cast) {
                Ok(json) => movie.cast_json = json,
                Err(err) => warn!(title = %movie.title_jp, error = %err, "failed to encode cast"),
            }
        }

        if imdb_id.is_none() {
            if let Some(id) = non_blank(&details.imdb_id) {
                *imdb_id = Some(id.to_string());
            }
        }
    }

    if let Some(title) = non_blank(&details.title) {
        match locale {
            Locale::Chinese => movie.title_cn = title.to_string(),
            Locale::English => movie.title_en = title.to_string(),
            Locale::Japanese if movie.title_jp.is_empty() => movie.title_jp = title.to_string(),
            _ => {},
        }
    }
}

/// A year without a day falls back to January 1st.
pub fn fill_release_date_from_year(movie: &mut movie::Model) {
    if movie.release_date.is_empty() && !movie.year.is_empty() {
        movie.release_date = format!("{}-01-01", movie.year);
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
