use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use super::{Collection, SourceApi};
use crate::error::{Error, Result};
use crate::http::{read_json, required_env};

const SERVICE: &str = "Hevy";
const DEFAULT_BASE_URL: &str = "https://api.hevyapp.com/v1/";

/// Thin client for the Hevy public API, authenticated with a static key.
#[derive(Debug, Clone)]
pub struct HevyClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl HevyClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::Config("Hevy API key is empty".into()));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: Url::parse(DEFAULT_BASE_URL).map_err(|e| Error::Config(e.to_string()))?,
            api_key,
        })
    }

    /// Build a client from `HEVY_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Self::new(required_env("HEVY_API_KEY")?)
    }

    /// Point the client at a different API root (used against mock servers).
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        self.base_url = Url::parse(&normalized).map_err(|e| Error::Config(e.to_string()))?;
        Ok(self)
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| Error::Config(e.to_string()))?;
        log::debug!("GET {url} {query:?}");
        let resp = self
            .http
            .get(url)
            .header("api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await?;
        read_json(SERVICE, resp).await
    }
}

#[async_trait]
impl SourceApi for HevyClient {
    async fn fetch_collection(&self, kind: Collection, page: u32, page_size: u32) -> Result<Value> {
        self.get(
            kind.path(),
            &[("page", page.to_string()), ("pageSize", page_size.to_string())],
        )
        .await
    }

    async fn fetch_events(&self, since: &str, page: u32, page_size: u32) -> Result<Value> {
        self.get(
            "workouts/events",
            &[
                ("page", page.to_string()),
                ("pageSize", page_size.to_string()),
                ("since", since.to_string()),
            ],
        )
        .await
    }
}
