use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Mutex;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::models::{available, parse_year, Movie};

const NOT_FOUND: &str = "Movie not found!";
const TOO_MANY: &str = "Too many results.";
const INVALID_KEY: &str = "Invalid API key";
const LIMIT_REACHED: &str = "Request limit reached";
const SECS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plot {
    Short,
    Full,
}

impl Plot {
    fn as_param(self) -> &'static str {
        match self {
            Plot::Short => "short",
            Plot::Full => "full",
        }
    }
}

#[async_trait]
pub trait OmdbApi: Send + Sync {
    /// Title search restricted to movies. "No match" is an empty list.
    async fn search(&self, query: &str) -> Result<Vec<Movie>>;
    /// Lookup by catalog id. `Ok(None)` when OMDb has no such title.
    async fn fetch_movie(&self, id: &str, plot: Plot) -> Result<Option<Movie>>;
}

/// Requests spent in the current UTC day.
#[derive(Debug)]
struct DailyBudget {
    day: i64,
    used: u32,
    limit: u32,
}

impl DailyBudget {
    fn try_spend(&mut self, now_secs: i64) -> bool {
        let day = now_secs.div_euclid(SECS_PER_DAY);
        if self.day != day {
            self.day = day;
            self.used = 0;
        }
        if self.used >= self.limit {
            return false;
        }
        self.used += 1;
        true
    }
}

#[derive(Debug)]
pub struct OmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
    budget: Mutex<DailyBudget>,
}

impl OmdbClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, daily_limit: u32) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            budget: Mutex::new(DailyBudget {
                day: 0,
                used: 0,
                limit: daily_limit,
            }),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.omdb_base_url.clone(),
            config.omdb_api_key.clone(),
            config.omdb_daily_limit,
        )
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}?apikey={}&s={}&type=movie",
            self.base_url,
            self.api_key,
            urlencoding::encode(query)
        )
    }

    fn lookup_url(&self, id: &str, plot: Plot) -> String {
        format!(
            "{}?apikey={}&i={}&plot={}",
            self.base_url,
            self.api_key,
            urlencoding::encode(id),
            plot.as_param()
        )
    }

    fn spend_budget(&self) -> Result<()> {
        let mut budget = self
            .budget
            .lock()
            .map_err(|_| anyhow!("OMDb budget lock poisoned"))?;
        if !budget.try_spend(Utc::now().timestamp()) {
            warn!("OMDb daily request budget of {} spent", budget.limit);
            return Err(anyhow!("OMDb daily request budget exhausted"));
        }
        Ok(())
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        self.spend_budget()?;
        let res = self
            .client
            .get(url)
            .send()
            .await
            .context("request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading body failed")?;
        if !status.is_success() {
            // OMDb answers a bad key with 401 and its usual error body.
            return serde_json::from_str(&text)
                .map_err(|_| anyhow!("OMDb returned HTTP {}: {}", status, text));
        }
        let parsed: T = serde_json::from_str(&text).context("JSON parse failed")?;
        Ok(parsed)
    }
}

#[async_trait]
impl OmdbApi for OmdbClient {
    async fn search(&self, query: &str) -> Result<Vec<Movie>> {
        let data: SearchResponse = self.get_json(&self.search_url(query)).await?;
        search_results(data, query)
    }

    async fn fetch_movie(&self, id: &str, plot: Plot) -> Result<Option<Movie>> {
        let data: DetailResponse = self.get_json(&self.lookup_url(id, plot)).await?;
        if !data.response.eq_ignore_ascii_case("True") {
            let msg = data.error.as_deref().unwrap_or("unknown error");
            if let Some(err) = account_error(msg) {
                return Err(err);
            }
            debug!("OMDb has no title {}: {}", id, msg);
            return Ok(None);
        }
        Ok(Some(data.into_movie()))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Error")]
    error: Option<String>,
    #[serde(rename = "Search", default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "imdbID")]
    imdb_id: String,
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Year")]
    year: Option<String>,
    #[serde(rename = "Poster")]
    poster: Option<String>,
    #[serde(rename = "Type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Error")]
    error: Option<String>,
    #[serde(rename = "imdbID", default)]
    imdb_id: String,
    #[serde(rename = "Title", default)]
    title: String,
    #[serde(rename = "Year")]
    year: Option<String>,
    #[serde(rename = "Poster")]
    poster: Option<String>,
    #[serde(rename = "Type")]
    kind: Option<String>,
    #[serde(rename = "Plot")]
    plot: Option<String>,
    #[serde(rename = "imdbRating")]
    rating: Option<String>,
    #[serde(rename = "Runtime")]
    runtime: Option<String>,
    #[serde(rename = "Genre")]
    genre: Option<String>,
    #[serde(rename = "Director")]
    director: Option<String>,
    #[serde(rename = "Actors")]
    actors: Option<String>,
    #[serde(rename = "Rated")]
    rated: Option<String>,
}

impl SearchHit {
    fn into_movie(self) -> Movie {
        Movie {
            id: self.imdb_id,
            title: self.title,
            poster_url: available(self.poster),
            year: self.year.as_deref().and_then(parse_year),
            title_type: available(self.kind),
            ..Movie::default()
        }
    }
}

impl DetailResponse {
    fn into_movie(self) -> Movie {
        Movie {
            id: self.imdb_id,
            title: self.title,
            poster_url: available(self.poster),
            year: self.year.as_deref().and_then(parse_year),
            title_type: available(self.kind),
            plot: available(self.plot),
            rating: available(self.rating),
            runtime: available(self.runtime),
            genre: available(self.genre),
            director: available(self.director),
            actors: available(self.actors),
            rated: available(self.rated),
        }
    }
}

fn search_results(data: SearchResponse, query: &str) -> Result<Vec<Movie>> {
    if data.response.eq_ignore_ascii_case("True") {
        return Ok(data.search.into_iter().map(SearchHit::into_movie).collect());
    }
    let msg = data.error.as_deref().unwrap_or("unknown error");
    if msg == NOT_FOUND || msg == TOO_MANY {
        return Ok(Vec::new());
    }
    if let Some(err) = account_error(msg) {
        return Err(err);
    }
    error!("OMDb search for '{}' failed: {}", query, msg);
    Err(anyhow!("OMDb error: {}", msg))
}

/// Errors about the API key itself rather than the request; these fail every
/// call until the key or the day changes.
fn account_error(msg: &str) -> Option<anyhow::Error> {
    if msg.contains(INVALID_KEY) {
        error!("Invalid OMDb API key. Please check OMDB_API_KEY");
        Some(anyhow!("OMDb rejected the API key"))
    } else if msg.contains(LIMIT_REACHED) {
        warn!("OMDb daily request limit reached for this key");
        Some(anyhow!("OMDb request limit reached"))
    } else {
        None
    }
}
