use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use url::Url;

use super::properties::KEY_PROPERTY;
use super::MirrorApi;
use crate::error::{Error, Result};
use crate::http::{read_json, required_env};

const SERVICE: &str = "Notion";
const DEFAULT_BASE_URL: &str = "https://api.notion.com/v1/";
const NOTION_VERSION: &str = "2022-06-28";

/// Notion REST client authenticated with an integration token.
#[derive(Debug, Clone)]
pub struct NotionClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl NotionClient {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::Config("Notion token is empty".into()));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: Url::parse(DEFAULT_BASE_URL).map_err(|e| Error::Config(e.to_string()))?,
            token,
        })
    }

    /// Build a client from `NOTION_TOKEN`.
    pub fn from_env() -> Result<Self> {
        Self::new(required_env("NOTION_TOKEN")?)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        self.base_url = Url::parse(&normalized).map_err(|e| Error::Config(e.to_string()))?;
        Ok(self)
    }

    async fn send(&self, method: Method, path: &str, body: Value) -> Result<Value> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| Error::Config(e.to_string()))?;
        log::debug!("{method} {url}");
        let resp = self
            .http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&body)
            .send()
            .await?;
        read_json(SERVICE, resp).await
    }
}

fn id_of(body: &Value, what: &str) -> Result<String> {
    body.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::Other(format!("{SERVICE} {what} response has no id")))
}

#[async_trait]
impl MirrorApi for NotionClient {
    async fn find_page_by_key(&self, database_id: &str, key: &str) -> Result<Option<String>> {
        let body = self
            .send(
                Method::POST,
                &format!("databases/{database_id}/query"),
                json!({
                    "filter": { "property": KEY_PROPERTY, "rich_text": { "equals": key } },
                    "page_size": 1
                }),
            )
            .await?;
        Ok(body
            .get("results")
            .and_then(|r| r.get(0))
            .and_then(|p| p.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn create_page(&self, database_id: &str, properties: Value) -> Result<String> {
        let body = self
            .send(
                Method::POST,
                "pages",
                json!({
                    "parent": { "database_id": database_id },
                    "properties": properties
                }),
            )
            .await?;
        id_of(&body, "page")
    }

    async fn update_page(&self, page_id: &str, properties: Value) -> Result<()> {
        self.send(
            Method::PATCH,
            &format!("pages/{page_id}"),
            json!({ "properties": properties }),
        )
        .await?;
        Ok(())
    }

    async fn archive_page(&self, page_id: &str) -> Result<()> {
        self.send(
            Method::PATCH,
            &format!("pages/{page_id}"),
            json!({ "archived": true }),
        )
        .await?;
        Ok(())
    }

    async fn create_database(
        &self,
        parent_page_id: &str,
        title: &str,
        properties: Value,
    ) -> Result<String> {
        let body = self
            .send(
                Method::POST,
                "databases",
                json!({
                    "parent": { "type": "page_id", "page_id": parent_page_id },
                    "title": [{ "type": "text", "text": { "content": title } }],
                    "properties": properties
                }),
            )
            .await?;
        id_of(&body, "database")
    }
}
