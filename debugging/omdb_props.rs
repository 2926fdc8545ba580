//! Query OMDb directly and print the raw JSON next to the mapped record.
//! Usage:
//!   cargo run --bin omdb_props -- id <imdb_id> [short|full]
//!   cargo run --bin omdb_props -- search <query>
//! Requires OMDB_API_KEY in the environment (.env supported).

use anyhow::{Context, Result};
use dotenvy::dotenv;
use movieflix::config::DEFAULT_OMDB_BASE;
use movieflix::omdb::{OmdbApi, OmdbClient, Plot};
use reqwest::Client;
use serde_json::Value;
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let api_key = env::var("OMDB_API_KEY").context("Missing OMDB_API_KEY in environment")?;
    let base = env::var("OMDB_BASE_URL").unwrap_or_else(|_| DEFAULT_OMDB_BASE.to_string());

    let mut args = env::args().skip(1);
    let mode = args.next().context("expected 'id' or 'search'")?;
    let target = args.next().context("expected an id or a query")?;

    let raw_url = match mode.as_str() {
        "id" => {
            let plot = args.next().unwrap_or_else(|| "short".to_string());
            format!("{base}?apikey={api_key}&i={}&plot={plot}", urlencoding::encode(&target))
        }
        "search" => format!(
            "{base}?apikey={api_key}&s={}&type=movie",
            urlencoding::encode(&target)
        ),
        other => anyhow::bail!("unknown mode '{}', expected 'id' or 'search'", other),
    };

    let raw: Value = Client::new()
        .get(&raw_url)
        .send()
        .await
        .context("Failed to call OMDb")?
        .error_for_status()
        .context("OMDb returned an error status")?
        .json()
        .await
        .context("Failed to parse OMDb response")?;
    println!("raw:\n{}", serde_json::to_string_pretty(&raw)?);

    let client = OmdbClient::new(base, api_key, 10);
    let mapped = if mode == "id" {
        let plot = if raw_url.ends_with("plot=full") {
            Plot::Full
        } else {
            Plot::Short
        };
        serde_json::to_value(client.fetch_movie(&target, plot).await?)?
    } else {
        serde_json::to_value(client.search(&target).await?)?
    };
    println!("mapped:\n{}", serde_json::to_string_pretty(&mapped)?);

    Ok(())
}
