use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::model::{Block, Database, ListResponse, Page, PropertyValue, properties_to_json};
use crate::{NotionError, WorkspaceApi};

const DEFAULT_BASE_URL: &str = "https://api.notion.com/v1";

/// Thin REST client for the Notion public API.
#[derive(Debug, Clone)]
pub struct NotionClient {
    client: Client,
    base_url: String,
    token: String,
    api_version: String,
}

impl NotionClient {
    pub fn new(
        token: impl Into<String>,
        api_version: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotionError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            api_version: api_version.into(),
        })
    }

    /// Point the client at another host (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.api_version)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, NotionError> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(NotionError::NotFound(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotionError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let raw = response.text().await?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[async_trait]
impl WorkspaceApi for NotionClient {
    async fn retrieve_database(&self, database_id: &str) -> Result<Database, NotionError> {
        let url = format!("{}/databases/{database_id}", self.base_url);
        debug!(database_id, "retrieving database");
        self.send(self.client.get(url)).await
    }

    async fn query_recently_edited(
        &self,
        database_id: &str,
        page_size: usize,
    ) -> Result<Vec<Page>, NotionError> {
        let url = format!("{}/databases/{database_id}/query", self.base_url);
        let body = json!({
            "sorts": [{ "timestamp": "last_edited_time", "direction": "descending" }],
            "page_size": page_size,
        });
        debug!(database_id, page_size, "querying recently edited pages");
        let list: ListResponse<Page> = self.send(self.client.post(url).json(&body)).await?;
        Ok(list.results)
    }

    async fn block_children(
        &self,
        block_id: &str,
        page_size: usize,
    ) -> Result<Vec<Block>, NotionError> {
        let url = format!("{}/blocks/{block_id}/children", self.base_url);
        let request = self
            .client
            .get(url)
            .query(&[("page_size", page_size.to_string())]);
        let list: ListResponse<Block> = self.send(request).await?;
        Ok(list.results)
    }

    async fn create_page(
        &self,
        database_id: &str,
        properties: &BTreeMap<String, PropertyValue>,
    ) -> Result<Page, NotionError> {
        let url = format!("{}/pages", self.base_url);
        let body = json!({
            "parent": { "database_id": database_id },
            "properties": properties_to_json(properties),
        });
        debug!(database_id, fields = properties.len(), "creating page");
        self.send(self.client.post(url).json(&body)).await
    }
}
