//! TMDB movie metadata client
//!
//! Every outbound request waits for a slot from a shared [`Throttle`], which
//! hands out slots at a fixed rate. Callers queue concurrently and proceed as
//! soon as their slot arrives, so a burst of N lookups finishes after roughly
//! `N / rate` seconds instead of N sequential round-trips.

use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::{sync::Mutex, time::Instant};

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
};

const DETAILS_CACHE_TTL: u64 = 86_400; // 1 day

/// Metadata used to enrich a movie recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieDetails {
    pub tmdb_id: i64,
    pub title: String,
    pub overview: Option<String>,
    pub release_year: Option<i32>,
    pub runtime: Option<i32>,
    pub genres: Vec<String>,
    pub director: Option<String>,
    pub poster_path: Option<String>,
    pub vote_average: Option<f64>,
}

impl MovieDetails {
    /// Free-form bag stored on the recommendation record
    pub fn to_metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "tmdbId": self.tmdb_id,
            "overview": self.overview,
            "releaseYear": self.release_year,
            "runtime": self.runtime,
            "genres": self.genres,
            "director": self.director,
            "posterPath": self.poster_path,
            "voteAverage": self.vote_average,
        })
    }
}

/// Movie metadata lookup
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MovieMetadata: Send + Sync {
    async fn movie_details(&self, tmdb_id: i64) -> AppResult<MovieDetails>;
}

/// Spaces calls to a fixed maximum rate
pub struct Throttle {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl Throttle {
    pub fn per_second(rate: u32) -> Self {
        let rate = rate.max(1);
        Self {
            interval: Duration::from_secs(1) / rate,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Waits until this caller's slot
    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let slot = (*next).max(Instant::now());
            *next = slot + self.interval;
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

#[derive(Debug, Deserialize)]
struct TmdbMovie {
    id: i64,
    title: String,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    runtime: Option<i32>,
    #[serde(default)]
    genres: Vec<TmdbGenre>,
    #[serde(default)]
    poster_path: Option<String>,
    #[serde(default)]
    vote_average: Option<f64>,
    #[serde(default)]
    credits: Option<TmdbCredits>,
}

#[derive(Debug, Deserialize)]
struct TmdbGenre {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TmdbCredits {
    #[serde(default)]
    crew: Vec<TmdbCrewMember>,
}

#[derive(Debug, Deserialize)]
struct TmdbCrewMember {
    name: String,
    job: String,
}

impl From<TmdbMovie> for MovieDetails {
    fn from(movie: TmdbMovie) -> Self {
        let release_year = movie
            .release_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse().ok());
        let director = movie.credits.and_then(|c| {
            c.crew
                .into_iter()
                .find(|member| member.job == "Director")
                .map(|member| member.name)
        });

        MovieDetails {
            tmdb_id: movie.id,
            title: movie.title,
            overview: movie.overview.filter(|o| !o.is_empty()),
            release_year,
            runtime: movie.runtime,
            genres: movie.genres.into_iter().map(|g| g.name).collect(),
            director,
            poster_path: movie.poster_path,
            vote_average: movie.vote_average,
        }
    }
}

/// TMDB-backed [`MovieMetadata`]
pub struct TmdbClient {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    throttle: Throttle,
    cache: Option<Cache>,
}

impl TmdbClient {
    pub fn new(api_key: String, api_url: String, rate_per_second: u32, cache: Option<Cache>) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url,
            throttle: Throttle::per_second(rate_per_second),
            cache,
        }
    }

    async fn fetch_details(&self, tmdb_id: i64) -> AppResult<MovieDetails> {
        self.throttle.acquire().await;

        let url = format!("{}/movie/{}", self.api_url, tmdb_id);
        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("append_to_response", "credits"),
            ])
            .timeout(Duration::from_secs(10))
            .send()
            .await
            // The query string carries the API key
            .map_err(|e| AppError::HttpClient(e.without_url()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "TMDB returned status {}: {}",
                status, body
            )));
        }

        let movie: TmdbMovie = response
            .json()
            .await
            .map_err(|e| AppError::HttpClient(e.without_url()))?;
        tracing::info!(tmdb_id, title = %movie.title, "Fetched TMDB details");

        Ok(movie.into())
    }
}

#[async_trait::async_trait]
impl MovieMetadata for TmdbClient {
    async fn movie_details(&self, tmdb_id: i64) -> AppResult<MovieDetails> {
        match &self.cache {
            Some(cache) => cached!(
                cache,
                CacheKey::MovieDetails(tmdb_id),
                DETAILS_CACHE_TTL,
                self.fetch_details(tmdb_id)
            ),
            None => self.fetch_details(tmdb_id).await,
        }
    }
}
