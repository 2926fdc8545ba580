use crate::catalog::{self, CatalogCache, Category};
use crate::config::Config;
use crate::models::{Movie, MyListEntry};
use crate::my_list::{JsonFileStorage, ListStorage};
use crate::omdb::{OmdbApi, OmdbClient, Plot};
use crate::rate_limit::{client_key, RateLimiter};
use crate::search::SearchResults;
use crate::server_api::{CollectionApi, ServerApi};
use crate::store::{Action, RootState};
use anyhow::Result;
use axum::{
    extract::{ConnectInfo, Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub omdb: Arc<dyn OmdbApi>,
    pub catalog: Arc<CatalogCache>,
    pub collection: Arc<dyn CollectionApi>,
    pub root: Arc<Mutex<RootState>>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(
        omdb: Arc<dyn OmdbApi>,
        collection: Arc<dyn CollectionApi>,
        storage: Box<dyn ListStorage>,
        catalog_ttl: Duration,
    ) -> Self {
        Self {
            catalog: Arc::new(CatalogCache::new(omdb.clone(), catalog_ttl)),
            omdb,
            collection,
            root: Arc::new(Mutex::new(RootState::new(storage))),
            rate_limiter: Arc::new(RateLimiter::new()),
        }
    }
}

pub async fn run_server(config: Config) -> Result<()> {
    let omdb: Arc<dyn OmdbApi> = Arc::new(OmdbClient::from_config(&config));
    let collection: Arc<dyn CollectionApi> = Arc::new(ServerApi::from_config(&config));
    let storage = JsonFileStorage::in_dir(&config.data_dir);
    info!("My List stored at {}", storage.path().display());
    info!(
        "OMDb base {} (daily budget {})",
        config.omdb_base_url, config.omdb_daily_limit
    );

    let state = AppState::new(
        omdb,
        collection,
        Box::new(storage),
        Duration::from_secs(config.catalog_ttl_secs),
    );
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/home", get(home))
        .route("/categories", get(list_categories))
        .route("/categories/:slug", get(category))
        .route("/featured", get(featured))
        .route("/movies/:id", get(movie_details))
        .route("/search", get(search))
        .route("/my-list", get(my_list).post(add_to_my_list).delete(clear_my_list))
        .route("/my-list/toggle", post(toggle_my_list))
        .route("/my-list/:id", delete(remove_from_my_list))
        .route("/lists/:list_type", get(list_by_type))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Serialize)]
pub struct CategoryRow {
    pub slug: &'static str,
    pub name: &'static str,
    pub movies: Vec<Movie>,
}

impl CategoryRow {
    fn new(category: Category, movies: Vec<Movie>) -> Self {
        Self {
            slug: category.slug(),
            name: category.display_name(),
            movies,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomePage {
    pub featured: Option<Movie>,
    pub my_list: Vec<MyListEntry>,
    pub categories: Vec<CategoryRow>,
}

async fn home(State(state): State<AppState>) -> Json<HomePage> {
    let categories = state.catalog.all().await;
    let featured = catalog::fetch_featured(state.omdb.as_ref(), &categories).await;
    let my_list = state.root.lock().await.my_list.entries().to_vec();

    Json(HomePage {
        featured,
        my_list,
        categories: categories
            .into_iter()
            .map(|(c, movies)| CategoryRow::new(c, movies))
            .collect(),
    })
}

async fn list_categories(State(state): State<AppState>) -> Json<Vec<CategoryRow>> {
    let rows = state
        .catalog
        .all()
        .await
        .into_iter()
        .map(|(c, movies)| CategoryRow::new(c, movies))
        .collect();
    Json(rows)
}

async fn category(State(state): State<AppState>, Path(slug): Path<String>) -> Json<CategoryRow> {
    let category = Category::from_slug_or_default(&slug);
    if category.slug() != slug {
        debug!("Unknown category '{}', serving {}", slug, category.slug());
    }
    let movies = state.catalog.category(category).await;
    Json(CategoryRow::new(category, movies))
}

async fn featured(State(state): State<AppState>) -> Response {
    match catalog::fetch_featured_cached(&state.catalog).await {
        Some(movie) => Json(movie).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "No featured movie available"),
    }
}

async fn movie_details(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.omdb.fetch_movie(&id, Plot::Full).await {
        Ok(Some(movie)) => Json(movie).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Movie not found"),
        Err(e) => {
            error!("Error fetching movie details for {}: {:#}", id, e);
            error_response(StatusCode::BAD_GATEWAY, "Catalog unavailable")
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<SearchResults> {
    state
        .root
        .lock()
        .await
        .dispatch(Action::SetSearchQuery(params.q.clone()));
    Json(SearchResults::run(state.omdb.as_ref(), &params.q).await)
}

async fn my_list(State(state): State<AppState>) -> Json<Vec<MyListEntry>> {
    Json(state.root.lock().await.my_list.entries().to_vec())
}

async fn add_to_my_list(State(state): State<AppState>, Json(movie): Json<Movie>) -> Response {
    if movie.id.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Movie id is required");
    }
    let mut root = state.root.lock().await;
    let added = !root.my_list.contains(&movie.id);
    let id = movie.id.clone();
    root.dispatch(Action::AddToMyList(movie));
    let status = if added {
        info!("Added {} to My List", id);
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (status, Json(root.my_list.entries().to_vec())).into_response()
}

async fn toggle_my_list(State(state): State<AppState>, Json(movie): Json<Movie>) -> Response {
    if movie.id.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Movie id is required");
    }
    let in_list = state.root.lock().await.my_list.toggle(movie);
    Json(json!({ "inMyList": in_list })).into_response()
}

async fn remove_from_my_list(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<Vec<MyListEntry>> {
    let mut root = state.root.lock().await;
    root.dispatch(Action::RemoveFromMyList(id));
    Json(root.my_list.entries().to_vec())
}

async fn clear_my_list(State(state): State<AppState>) -> StatusCode {
    state.root.lock().await.dispatch(Action::ClearMyList);
    StatusCode::NO_CONTENT
}

async fn list_by_type(State(state): State<AppState>, Path(list_type): Path<String>) -> Response {
    let entries = match state.collection.list_entries().await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Collection backend failed ({}): {}", e.status(), e);
            return error_response(StatusCode::BAD_GATEWAY, "Collection backend unavailable");
        }
    };
    let movies = catalog::movies_by_list_type(state.omdb.as_ref(), &entries, &list_type).await;
    Json(json!({ "results": movies })).into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "status": "error", "message": message }))).into_response()
}

async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_key(req.headers(), peer);
    if !state
        .rate_limiter
        .allow(&client, Utc::now().timestamp())
        .await
    {
        warn!("Rate limit exceeded for {}", client);
        return error_response(StatusCode::TOO_MANY_REQUESTS, "Too many requests");
    }
    next.run(req).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
