//! MovieFlix: a movie browsing service backed by OMDb.
//!
//! The `movieflix_server` binary serves [`app::build_router`]. The modules are
//! also usable on their own:
//!
//! - [`omdb`]: the [`omdb::OmdbApi`] trait and its HTTP client.
//! - [`catalog`]: category rows, the featured pick and [`catalog::CatalogCache`].
//! - [`search`]: query rules, [`search::SearchResults`] and
//!   [`search::SearchDebouncer`], which waits for typing to settle before
//!   searching. The HTTP routes take one query per request and do not debounce;
//!   the debouncer is for interactive front ends that drive search per keystroke.
//! - [`my_list`] and [`store`]: the persisted personal list and the state it lives in.
//! - [`server_api`]: client for the per-owner collection backend.

pub mod app;
pub mod catalog;
pub mod config;
pub mod models;
pub mod my_list;
pub mod omdb;
pub mod rate_limit;
pub mod search;
pub mod server_api;
pub mod store;
