use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::models::Movie;
use crate::omdb::OmdbApi;

pub const MIN_QUERY_LEN: usize = 2;
pub const DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchAction {
    SetSearchQuery(String),
}

/// The query is replaced verbatim; trimming happens at search time.
pub fn reduce(_state: &str, action: SearchAction) -> String {
    match action {
        SearchAction::SetSearchQuery(query) => query,
    }
}

pub fn is_searching(query: &str) -> bool {
    query.trim().chars().count() >= MIN_QUERY_LEN
}

/// Short queries never reach OMDb. Errors are logged and read as no results.
pub async fn search_movies(api: &dyn OmdbApi, query: &str) -> Vec<Movie> {
    if !is_searching(query) {
        return Vec::new();
    }
    match api.search(query.trim()).await {
        Ok(movies) => movies,
        Err(e) => {
            error!("Error searching movies for '{}': {:#}", query, e);
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub searching: bool,
    pub results: Vec<Movie>,
}

impl SearchResults {
    pub async fn run(api: &dyn OmdbApi, query: &str) -> Self {
        Self {
            query: query.to_string(),
            searching: is_searching(query),
            results: search_movies(api, query).await,
        }
    }
}

/// Runs a search only once the query has been stable for the delay. A new
/// query cancels the pending one.
pub struct SearchDebouncer {
    queries: mpsc::UnboundedSender<String>,
    results: watch::Receiver<SearchResults>,
    task: JoinHandle<()>,
}

impl SearchDebouncer {
    pub fn spawn(api: Arc<dyn OmdbApi>, delay: Duration) -> Self {
        let (queries, rx) = mpsc::unbounded_channel();
        let (tx, results) = watch::channel(SearchResults::default());
        let task = tokio::spawn(debounce_loop(api, delay, rx, tx));
        Self {
            queries,
            results,
            task,
        }
    }

    pub fn set_query(&self, query: impl Into<String>) {
        if self.queries.send(query.into()).is_err() {
            debug!("Search debouncer already stopped");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchResults> {
        self.results.clone()
    }
}

impl Drop for SearchDebouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn debounce_loop(
    api: Arc<dyn OmdbApi>,
    delay: Duration,
    mut rx: mpsc::UnboundedReceiver<String>,
    tx: watch::Sender<SearchResults>,
) {
    let mut pending: Option<String> = None;
    loop {
        let Some(query) = pending.take() else {
            match rx.recv().await {
                Some(q) => pending = Some(q),
                None => return,
            }
            continue;
        };

        tokio::select! {
            next = rx.recv() => match next {
                Some(q) => pending = Some(q),
                None => return,
            },
            _ = tokio::time::sleep(delay) => {
                let results = SearchResults::run(api.as_ref(), &query).await;
                if tx.send(results).is_err() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::omdb::Plot;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingOmdb {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl OmdbApi for RecordingOmdb {
        async fn search(&self, query: &str) -> Result<Vec<Movie>> {
            self.queries.lock().unwrap().push(query.to_string());
            if query == "offline" {
                anyhow::bail!("network error");
            }
            Ok(vec![Movie {
                id: "tt0372784".into(),
                title: "Batman Begins".into(),
                ..Movie::default()
            }])
        }

        async fn fetch_movie(&self, _id: &str, _plot: Plot) -> Result<Option<Movie>> {
            Ok(None)
        }
    }

    #[test]
    fn reducer_replaces_query() {
        assert_eq!(reduce("", SearchAction::SetSearchQuery("batman".into())), "batman");
        assert_eq!(reduce("previous", SearchAction::SetSearchQuery(String::new())), "");
        let state = reduce("", SearchAction::SetSearchQuery("batman".into()));
        assert_eq!(reduce(&state, SearchAction::SetSearchQuery("spider".into())), "spider");
        assert_eq!(
            reduce("", SearchAction::SetSearchQuery("batman & robin".into())),
            "batman & robin"
        );
    }

    #[test]
    fn searching_needs_two_characters() {
        assert!(!is_searching(""));
        assert!(!is_searching("   "));
        assert!(!is_searching(" b "));
        assert!(is_searching("ba"));
    }

    #[tokio::test]
    async fn short_queries_skip_the_request() {
        let api = RecordingOmdb::default();
        assert!(search_movies(&api, "").await.is_empty());
        assert!(search_movies(&api, "   ").await.is_empty());
        assert!(api.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn errors_read_as_empty() {
        let api = RecordingOmdb::default();
        assert!(search_movies(&api, "offline").await.is_empty());
        assert_eq!(search_movies(&api, " batman ").await.len(), 1);
        assert_eq!(*api.queries.lock().unwrap(), ["offline", "batman"]);
    }

    #[tokio::test(start_paused = true)]
    async fn debouncer_only_runs_latest_query() {
        let api = Arc::new(RecordingOmdb::default());
        let debouncer = SearchDebouncer::spawn(api.clone(), DEBOUNCE);
        let mut results = debouncer.subscribe();

        debouncer.set_query("ba");
        debouncer.set_query("bat");
        debouncer.set_query("batman");

        results.changed().await.unwrap();
        let latest = results.borrow().clone();
        assert_eq!(latest.query, "batman");
        assert!(latest.searching);
        assert_eq!(latest.results.len(), 1);
        assert_eq!(*api.queries.lock().unwrap(), ["batman"]);
    }

    #[tokio::test(start_paused = true)]
    async fn debouncer_publishes_cleared_query() {
        let api = Arc::new(RecordingOmdb::default());
        let debouncer = SearchDebouncer::spawn(api.clone(), DEBOUNCE);
        let mut results = debouncer.subscribe();

        debouncer.set_query("b");
        results.changed().await.unwrap();
        let latest = results.borrow().clone();
        assert!(!latest.searching);
        assert!(latest.results.is_empty());
        assert!(api.queries.lock().unwrap().is_empty());
    }
}
