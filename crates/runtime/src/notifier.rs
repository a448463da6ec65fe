//! Change announcements: one embed per new or edited record.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use reportbridge_notion::{Block, Page, WorkspaceApi};
use tracing::{info, warn};

use crate::chat::{ChatApi, Embed};
use crate::error::NotifyError;

pub const EXCERPT_LIMIT: usize = 500;
pub const EXCERPT_BLOCKS: usize = 5;
pub const UNKNOWN_DATABASE: &str = "Unknown Database";

const EDIT_COLOR: u32 = 0xFFFF00;
const NEW_COLOR: u32 = 0x00FF00;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordAnnouncement {
    pub title: String,
    pub url: String,
    pub collection_name: String,
    pub is_edit: bool,
    pub edited_at: DateTime<Utc>,
    pub excerpt: String,
}

impl RecordAnnouncement {
    pub fn to_embed(&self, now: DateTime<Utc>) -> Embed {
        let embed = Embed {
            title: self.title.clone(),
            url: Some(self.url.clone()),
            color: if self.is_edit { EDIT_COLOR } else { NEW_COLOR },
            timestamp: now,
            fields: Vec::new(),
        }
        .field("Database", &self.collection_name, false)
        .field(
            "Type",
            if self.is_edit { "Page Edit" } else { "New Page" },
            true,
        )
        .field(
            "Last Edited",
            self.edited_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            true,
        );
        if self.excerpt.is_empty() {
            embed
        } else {
            embed.field("Content", &self.excerpt, false)
        }
    }
}

/// Title of a record: first span of its title property, "Untitled" when that
/// property is empty, "New Page" when there is none.
pub fn extract_title(page: &Page) -> String {
    match page.properties.values().find(|property| property.kind == "title") {
        Some(property) => property
            .title
            .first()
            .map(|span| span.plain_text.clone())
            .unwrap_or_else(|| "Untitled".to_string()),
        None => "New Page".to_string(),
    }
}

/// Paragraph text of the first blocks followed by every non-empty rich-text
/// property as `**Name**:\ntext`, trimmed and capped at [`EXCERPT_LIMIT`]
/// characters.
pub fn build_excerpt(page: &Page, blocks: &[Block]) -> String {
    let mut content = String::new();
    for text in blocks.iter().take(EXCERPT_BLOCKS).filter_map(Block::paragraph_text) {
        content.push_str(&text);
    }
    for (name, property) in &page.properties {
        if property.kind != "rich_text" {
            continue;
        }
        let text = property
            .rich_text
            .iter()
            .map(|span| span.plain_text.as_str())
            .filter(|span| !span.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        if !text.is_empty() {
            content.push_str(&format!("**{name}**:\n{text}\n\n"));
        }
    }

    let content = content.trim();
    if content.chars().count() > EXCERPT_LIMIT {
        let cut: String = content.chars().take(EXCERPT_LIMIT).collect();
        format!("{cut}...")
    } else {
        content.to_string()
    }
}

#[derive(Clone)]
pub struct Notifier {
    chat: Arc<dyn ChatApi>,
    workspace: Arc<dyn WorkspaceApi>,
    channel_id: Option<String>,
}

impl Notifier {
    pub fn new(
        chat: Arc<dyn ChatApi>,
        workspace: Arc<dyn WorkspaceApi>,
        channel_id: Option<String>,
    ) -> Self {
        Self {
            chat,
            workspace,
            channel_id,
        }
    }

    /// Gather title, collection name and excerpt for `page`.  Lookup failures
    /// degrade to fallbacks instead of failing the announcement.
    pub async fn describe(&self, page: &Page, collection_id: &str) -> RecordAnnouncement {
        let collection_name = match self.workspace.retrieve_database(collection_id).await {
            Ok(database) => database
                .display_name()
                .unwrap_or(UNKNOWN_DATABASE)
                .to_string(),
            Err(err) => {
                warn!(?err, collection = %collection_id, "could not resolve database name");
                UNKNOWN_DATABASE.to_string()
            }
        };
        let blocks = match self.workspace.block_children(&page.id, EXCERPT_BLOCKS).await {
            Ok(blocks) => blocks,
            Err(err) => {
                warn!(?err, record = %page.id, "could not read page content");
                Vec::new()
            }
        };

        RecordAnnouncement {
            title: extract_title(page),
            url: page.public_url(),
            collection_name,
            is_edit: page.is_edit(),
            edited_at: page.last_edited_time,
            excerpt: build_excerpt(page, &blocks),
        }
    }

    pub async fn announce(
        &self,
        page: &Page,
        collection_id: &str,
    ) -> Result<RecordAnnouncement, NotifyError> {
        let Some(channel_id) = self.channel_id.as_deref() else {
            return Err(NotifyError::ChannelMissing);
        };
        let announcement = self.describe(page, collection_id).await;
        self.chat
            .send_embed(channel_id, &announcement.to_embed(Utc::now()))
            .await?;
        info!(
            collection = %collection_id,
            record = %page.id,
            kind = if announcement.is_edit { "edited" } else { "new" },
            title = %announcement.title,
            "announced record change"
        );
        Ok(announcement)
    }
}
