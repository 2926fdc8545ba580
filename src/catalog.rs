//! Category carousels, the featured pick and list-type lookups, all built
//! from OMDb title searches.

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::models::{ListedMovie, Movie};
use crate::omdb::{OmdbApi, Plot};

pub const MAX_PER_CATEGORY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Trending,
    Action,
    Scifi,
    Classics,
    Comedy,
    Horror,
    Drama,
}

impl Category {
    /// Display order.
    pub const ALL: [Category; 7] = [
        Category::Trending,
        Category::Action,
        Category::Scifi,
        Category::Classics,
        Category::Comedy,
        Category::Horror,
        Category::Drama,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            Category::Trending => "trending",
            Category::Action => "action",
            Category::Scifi => "scifi",
            Category::Classics => "classics",
            Category::Comedy => "comedy",
            Category::Horror => "horror",
            Category::Drama => "drama",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Category::Trending => "Trending Now",
            Category::Action => "Action & Adventure",
            Category::Scifi => "Sci-Fi & Fantasy",
            Category::Classics => "Classic Movies",
            Category::Comedy => "Comedy",
            Category::Horror => "Horror",
            Category::Drama => "Drama",
        }
    }

    pub fn search_terms(self) -> &'static [&'static str] {
        match self {
            Category::Trending => &["avengers", "batman", "spider-man", "star wars", "frozen"],
            Category::Action => &[
                "mission impossible",
                "fast furious",
                "john wick",
                "die hard",
                "terminator",
            ],
            Category::Scifi => &["matrix", "inception", "interstellar", "blade runner", "alien"],
            Category::Classics => &[
                "godfather",
                "shawshank",
                "forrest gump",
                "pulp fiction",
                "goodfellas",
            ],
            Category::Comedy => &["hangover", "superbad", "bridesmaids", "anchorman", "ace ventura"],
            Category::Horror => &["conjuring", "insidious", "halloween", "scream", "nightmare elm"],
            Category::Drama => &["titanic", "schindler", "green mile", "beautiful mind", "rain man"],
        }
    }

    pub fn from_slug(slug: &str) -> Option<Category> {
        let slug = slug.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.slug().eq_ignore_ascii_case(slug))
    }

    /// Unknown slugs fall back to trending.
    pub fn from_slug_or_default(slug: &str) -> Category {
        Category::from_slug(slug).unwrap_or(Category::Trending)
    }
}

/// Runs every search term of the category in order. Failed terms are logged
/// and skipped; the merged list is unique by id and capped.
pub async fn fetch_category(api: &dyn OmdbApi, category: Category) -> Vec<Movie> {
    let mut results = Vec::new();
    for term in category.search_terms() {
        match api.search(term).await {
            Ok(hits) => results.extend(hits),
            Err(e) => error!("Error fetching {} ('{}'): {:#}", category.slug(), term, e),
        }
    }
    let mut movies = dedupe_by_id(results);
    movies.truncate(MAX_PER_CATEGORY);
    debug!("Category {} has {} movies", category.slug(), movies.len());
    movies
}

/// All categories fetched concurrently, returned in display order.
pub async fn fetch_all_categories(api: &dyn OmdbApi) -> Vec<(Category, Vec<Movie>)> {
    let fetches = Category::ALL.into_iter().map(|c| async move {
        let movies = fetch_category(api, c).await;
        (c, movies)
    });
    join_all(fetches).await
}

/// Keeps the first occurrence of each id, preserving order.
pub fn dedupe_by_id(movies: Vec<Movie>) -> Vec<Movie> {
    let mut seen = HashSet::new();
    movies
        .into_iter()
        .filter(|m| seen.insert(m.id.clone()))
        .collect()
}

pub fn pick_featured(categories: &[(Category, Vec<Movie>)], seed: u64) -> Option<&Movie> {
    let all: Vec<&Movie> = categories.iter().flat_map(|(_, m)| m.iter()).collect();
    if all.is_empty() {
        return None;
    }
    let idx = (seed % all.len() as u64) as usize;
    Some(all[idx])
}

/// Picks a movie from the carousels and loads its full details.
pub async fn fetch_featured(
    api: &dyn OmdbApi,
    categories: &[(Category, Vec<Movie>)],
) -> Option<Movie> {
    let seed = Utc::now().timestamp_subsec_nanos() as u64;
    let candidate = pick_featured(categories, seed)?;
    match api.fetch_movie(&candidate.id, Plot::Full).await {
        Ok(details) => details,
        Err(e) => {
            warn!("Failed to load featured movie {}: {:#}", candidate.id, e);
            None
        }
    }
}

/// Resolves backend entries whose first list tag is `list_type`. Lookups run
/// concurrently; failures and misses are dropped.
pub async fn movies_by_list_type(
    api: &dyn OmdbApi,
    entries: &[ListedMovie],
    list_type: &str,
) -> Vec<Movie> {
    let ids: Vec<&str> = entries
        .iter()
        .filter(|e| e.list.first().map(String::as_str) == Some(list_type))
        .map(|e| e.movie_id.as_str())
        .collect();
    if ids.is_empty() {
        return Vec::new();
    }

    let lookups = ids.iter().map(|id| async move {
        match api.fetch_movie(id, Plot::Short).await {
            Ok(movie) => movie,
            Err(e) => {
                error!("Error fetching movie {}: {:#}", id, e);
                None
            }
        }
    });
    join_all(lookups).await.into_iter().flatten().collect()
}

/// Category results kept for a fixed time to spare the upstream budget.
/// Each category has its own slot, held across the fetch, so concurrent
/// callers on a cold slot share one round of searches.
pub struct CatalogCache {
    api: Arc<dyn OmdbApi>,
    ttl: Duration,
    slots: HashMap<Category, Mutex<Option<(Instant, Vec<Movie>)>>>,
}

impl CatalogCache {
    pub fn new(api: Arc<dyn OmdbApi>, ttl: Duration) -> Self {
        let slots = Category::ALL
            .into_iter()
            .map(|c| (c, Mutex::new(None)))
            .collect();
        Self { api, ttl, slots }
    }

    pub fn api(&self) -> &dyn OmdbApi {
        self.api.as_ref()
    }

    pub async fn category(&self, category: Category) -> Vec<Movie> {
        let Some(slot) = self.slots.get(&category) else {
            return fetch_category(self.api.as_ref(), category).await;
        };
        let mut slot = slot.lock().await;
        if let Some((at, movies)) = slot.as_ref() {
            if at.elapsed() < self.ttl {
                return movies.clone();
            }
        }

        let movies = fetch_category(self.api.as_ref(), category).await;
        // Empty results usually mean the upstream failed; retry next time.
        if movies.is_empty() {
            *slot = None;
        } else {
            *slot = Some((Instant::now(), movies.clone()));
        }
        movies
    }

    pub async fn all(&self) -> Vec<(Category, Vec<Movie>)> {
        let fetches = Category::ALL.into_iter().map(|c| async move {
            let movies = self.category(c).await;
            (c, movies)
        });
        join_all(fetches).await
    }
}

pub async fn fetch_featured_cached(cache: &CatalogCache) -> Option<Movie> {
    let categories = cache.all().await;
    fetch_featured(cache.api(), &categories).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn movie(id: &str) -> Movie {
        Movie {
            id: id.to_string(),
            title: format!("Title {}", id),
            ..Movie::default()
        }
    }

    /// Every term returns the same three hits, except "batman" which fails.
    struct FakeOmdb {
        searches: AtomicUsize,
        lookups: AtomicUsize,
    }

    impl FakeOmdb {
        fn new() -> Self {
            Self {
                searches: AtomicUsize::new(0),
                lookups: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl OmdbApi for FakeOmdb {
        async fn search(&self, query: &str) -> Result<Vec<Movie>> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            if query == "batman" {
                anyhow::bail!("network down");
            }
            let n = self.searches.load(Ordering::SeqCst);
            Ok(vec![movie("tt1"), movie(&format!("tt{}a", n)), movie(&format!("tt{}b", n))])
        }

        async fn fetch_movie(&self, id: &str, _plot: Plot) -> Result<Option<Movie>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            match id {
                "tt-missing" => Ok(None),
                "tt-broken" => anyhow::bail!("HTTP 500"),
                _ => Ok(Some(movie(id))),
            }
        }
    }

    #[test]
    fn unknown_slug_falls_back_to_trending() {
        assert_eq!(Category::from_slug_or_default("scifi"), Category::Scifi);
        assert_eq!(Category::from_slug_or_default("DRAMA"), Category::Drama);
        assert_eq!(Category::from_slug_or_default("westerns"), Category::Trending);
    }

    #[test]
    fn every_category_has_five_terms() {
        for c in Category::ALL {
            assert_eq!(c.search_terms().len(), 5, "{}", c.slug());
        }
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let mut second = movie("tt1");
        second.title = "dup".into();
        let out = dedupe_by_id(vec![movie("tt1"), movie("tt2"), second, movie("tt3")]);
        let ids: Vec<_> = out.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["tt1", "tt2", "tt3"]);
        assert_eq!(out[0].title, "Title tt1");
    }

    #[tokio::test]
    async fn failed_terms_are_skipped_and_results_unique() {
        let api = FakeOmdb::new();
        let movies = fetch_category(&api, Category::Trending).await;
        assert_eq!(api.searches.load(Ordering::SeqCst), 5);
        // four successful terms: shared tt1 plus two unique ids each
        assert_eq!(movies.len(), 9);
        assert_eq!(movies.iter().filter(|m| m.id == "tt1").count(), 1);
    }

    #[tokio::test]
    async fn all_categories_in_display_order() {
        let api = FakeOmdb::new();
        let all = fetch_all_categories(&api).await;
        let order: Vec<_> = all.iter().map(|(c, _)| *c).collect();
        assert_eq!(order, Category::ALL.to_vec());
        assert!(all.iter().all(|(_, m)| m.len() <= MAX_PER_CATEGORY));
    }

    #[test]
    fn featured_pick_wraps_seed() {
        let cats = vec![
            (Category::Trending, vec![movie("tt1"), movie("tt2")]),
            (Category::Action, vec![movie("tt3")]),
        ];
        assert_eq!(pick_featured(&cats, 2).map(|m| m.id.as_str()), Some("tt3"));
        assert_eq!(pick_featured(&cats, 4).map(|m| m.id.as_str()), Some("tt2"));
        assert!(pick_featured(&[], 7).is_none());
    }

    #[tokio::test]
    async fn list_type_filters_on_first_tag() {
        let api = FakeOmdb::new();
        let entries = vec![
            ListedMovie { movie_id: "tt10".into(), list: vec!["watched".into()] },
            ListedMovie { movie_id: "tt11".into(), list: vec!["later".into(), "watched".into()] },
            ListedMovie { movie_id: "tt-missing".into(), list: vec!["watched".into()] },
            ListedMovie { movie_id: "tt-broken".into(), list: vec!["watched".into()] },
            ListedMovie { movie_id: "tt12".into(), list: vec![] },
        ];
        let movies = movies_by_list_type(&api, &entries, "watched").await;
        let ids: Vec<_> = movies.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["tt10"]);
        assert_eq!(api.lookups.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn list_type_without_matches_makes_no_requests() {
        let api = FakeOmdb::new();
        let entries = vec![ListedMovie { movie_id: "tt10".into(), list: vec!["later".into()] }];
        assert!(movies_by_list_type(&api, &entries, "watched").await.is_empty());
        assert_eq!(api.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cache_serves_until_ttl() {
        let api = Arc::new(FakeOmdb::new());
        let cache = CatalogCache::new(api.clone(), Duration::from_secs(60));

        let first = cache.category(Category::Scifi).await;
        let again = cache.category(Category::Scifi).await;
        assert_eq!(first, again);
        assert_eq!(api.searches.load(Ordering::SeqCst), 5);

        tokio::time::advance(Duration::from_secs(61)).await;
        cache.category(Category::Scifi).await;
        assert_eq!(api.searches.load(Ordering::SeqCst), 10);
    }

    /// Every search takes a while and returns one hit per term.
    struct SlowOmdb {
        searches: AtomicUsize,
    }

    #[async_trait]
    impl OmdbApi for SlowOmdb {
        async fn search(&self, query: &str) -> Result<Vec<Movie>> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(vec![movie(query)])
        }

        async fn fetch_movie(&self, _id: &str, _plot: Plot) -> Result<Option<Movie>> {
            Ok(None)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_cold_loads_share_one_fetch() {
        let api = Arc::new(SlowOmdb {
            searches: AtomicUsize::new(0),
        });
        let cache = CatalogCache::new(api.clone(), Duration::from_secs(600));

        let (a, b, c) = tokio::join!(cache.all(), cache.all(), cache.all());
        assert_eq!(api.searches.load(Ordering::SeqCst), 35);
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert!(a.iter().all(|(_, movies)| movies.len() == 5));
    }
}
