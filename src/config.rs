use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_OMDB_BASE: &str = "https://www.omdbapi.com/";
pub const PLACEHOLDER_API_KEY: &str = "demo_key_replace_me";
pub const DEFAULT_DAILY_LIMIT: u32 = 1000;
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3500";
pub const DEFAULT_OWNER: &str = "petar";
pub const DEFAULT_PORT: u16 = 3501;
pub const DEFAULT_CATALOG_TTL_SECS: u64 = 600;

#[derive(Debug, Clone)]
pub struct Config {
    pub omdb_api_key: String,
    pub omdb_base_url: String,
    pub omdb_daily_limit: u32,
    pub data_dir: PathBuf,
    pub server_url: String,
    pub owner: String,
    pub port: u16,
    pub catalog_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let omdb_api_key = env::var("OMDB_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("Missing required environment variable: OMDB_API_KEY"))?;
        if omdb_api_key == PLACEHOLDER_API_KEY {
            anyhow::bail!("OMDB_API_KEY is still the placeholder value; get a key at https://www.omdbapi.com/apikey.aspx");
        }

        Ok(Self {
            omdb_api_key,
            omdb_base_url: var_or("OMDB_BASE_URL", DEFAULT_OMDB_BASE),
            omdb_daily_limit: parse_var("OMDB_DAILY_LIMIT", DEFAULT_DAILY_LIMIT)?,
            data_dir: PathBuf::from(var_or("MOVIEFLIX_DATA_DIR", "data")),
            server_url: var_or("MOVIEFLIX_SERVER_URL", DEFAULT_SERVER_URL),
            owner: var_or("MOVIEFLIX_OWNER", DEFAULT_OWNER),
            port: parse_var("MOVIEFLIX_PORT", DEFAULT_PORT)?,
            catalog_ttl_secs: parse_var("CATALOG_TTL_SECS", DEFAULT_CATALOG_TTL_SECS)?,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, v)),
        _ => Ok(default),
    }
}
