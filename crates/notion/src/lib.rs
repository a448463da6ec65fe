//! Notion workspace transport: REST client, wire models and the
//! [`WorkspaceApi`] seam the bridge runtime talks to.

mod client;
pub mod model;

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

pub use client::NotionClient;
pub use model::{
    Block, Database, DatabaseProperty, Page, PageProperty, PropertyValue, RichText, SelectConfig,
    SelectOption, TextBlock, plain_text,
};

#[derive(Debug, Error)]
pub enum NotionError {
    #[error("notion request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("notion returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("notion object not found: {0}")]
    NotFound(String),
    #[error("malformed notion response: {0}")]
    Json(#[from] serde_json::Error),
}

/// Operations the bridge needs from the structured workspace database.
#[async_trait]
pub trait WorkspaceApi: Send + Sync {
    /// Schema and title of a database.
    async fn retrieve_database(&self, database_id: &str) -> Result<Database, NotionError>;

    /// The `page_size` most recently edited pages, newest first.
    async fn query_recently_edited(
        &self,
        database_id: &str,
        page_size: usize,
    ) -> Result<Vec<Page>, NotionError>;

    /// First `page_size` child blocks of a page.
    async fn block_children(&self, block_id: &str, page_size: usize)
    -> Result<Vec<Block>, NotionError>;

    async fn create_page(
        &self,
        database_id: &str,
        properties: &BTreeMap<String, PropertyValue>,
    ) -> Result<Page, NotionError>;
}
