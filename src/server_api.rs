//! Client for the optional collection backend that keeps per-owner movie
//! entries.

use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde_json::Value;
use thiserror::Error;
use tracing::error;

use crate::config::Config;
use crate::models::ListedMovie;

#[derive(Debug, Error)]
pub enum ServerApiError {
    #[error("{message}")]
    Status {
        status: u16,
        message: String,
        data: Value,
    },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("entry has no _id to patch")]
    MissingId,
}

impl ServerApiError {
    /// HTTP status of the failure; 0 when the backend was never reached.
    pub fn status(&self) -> u16 {
        match self {
            ServerApiError::Status { status, .. } => *status,
            ServerApiError::Network(_) => 0,
            ServerApiError::MissingId => 400,
        }
    }
}

#[async_trait]
pub trait CollectionApi: Send + Sync {
    async fn list_entries(&self) -> Result<Vec<ListedMovie>, ServerApiError>;
}

#[derive(Debug, Clone)]
pub struct ServerApi {
    client: Client,
    host: String,
    owner: String,
}

impl ServerApi {
    pub fn new(host: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            host: host.into().trim_end_matches('/').to_string(),
            owner: owner.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.server_url.clone(), config.owner.clone())
    }

    pub async fn get_movies(&self) -> Result<Response, ServerApiError> {
        let url = format!("{}/movies?owner={}", self.host, urlencoding::encode(&self.owner));
        self.request(Method::GET, url, None).await
    }

    pub async fn post_movie(&self, data: &Value) -> Result<Response, ServerApiError> {
        let url = format!("{}/movies", self.host);
        self.request(Method::POST, url, Some(data)).await
    }

    pub async fn patch_movie(&self, data: &Value) -> Result<Response, ServerApiError> {
        let id = data
            .get("_id")
            .and_then(Value::as_str)
            .ok_or(ServerApiError::MissingId)?;
        let url = format!("{}/movies/{}", self.host, urlencoding::encode(id));
        self.request(Method::PATCH, url, Some(data)).await
    }

    pub async fn delete_movie(&self, id: &str) -> Result<Response, ServerApiError> {
        let url = format!("{}/movies/{}", self.host, urlencoding::encode(id));
        self.request(Method::DELETE, url, None).await
    }

    async fn request(
        &self,
        method: Method,
        url: String,
        body: Option<&Value>,
    ) -> Result<Response, ServerApiError> {
        let mut req = self.client.request(method.clone(), &url);
        if let Some(body) = body {
            req = req.json(body);
        }

        let res = req.send().await.map_err(|e| {
            error!("API request failed: {} {}: {}", method, url, e);
            ServerApiError::Network(e)
        })?;

        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let data: Value = res.json().await.unwrap_or_else(|_| Value::Object(Default::default()));
        Err(status_error(status.as_u16(), data))
    }
}

#[async_trait]
impl CollectionApi for ServerApi {
    async fn list_entries(&self) -> Result<Vec<ListedMovie>, ServerApiError> {
        let res = self.get_movies().await?;
        Ok(res.json().await?)
    }
}

fn status_error(status: u16, data: Value) -> ServerApiError {
    let message = data
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Server error: {}", status));
    ServerApiError::Status {
        status,
        message,
        data,
    }
}
