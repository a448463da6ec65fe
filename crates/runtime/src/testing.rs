//! In-memory fakes of the chat and workspace transports for unit tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reportbridge_notion::{
    Block, Database, DatabaseProperty, NotionError, Page, PageProperty, PropertyValue, RichText,
    SelectConfig, SelectOption, TextBlock, WorkspaceApi,
};

use crate::chat::{ActionRow, ChatApi, ChatError, Embed, InteractionReply};
use crate::events::{ChatUser, Interaction, MessageRef};

// ── Builders ─────────────────────────────────────────────────────────────────

pub fn property(name: &str, kind: &str) -> DatabaseProperty {
    DatabaseProperty {
        id: name.to_lowercase(),
        name: name.to_string(),
        kind: kind.to_string(),
        select: None,
    }
}

pub fn select_property(name: &str, options: &[&str]) -> DatabaseProperty {
    DatabaseProperty {
        select: Some(SelectConfig {
            options: options
                .iter()
                .enumerate()
                .map(|(idx, option)| SelectOption {
                    id: Some(format!("opt-{idx}")),
                    name: option.to_string(),
                    color: None,
                })
                .collect(),
        }),
        ..property(name, "select")
    }
}

pub fn database(id: &str, properties: Vec<DatabaseProperty>) -> Database {
    Database {
        id: id.to_string(),
        title: vec![RichText {
            plain_text: format!("{id} title"),
        }],
        properties: properties
            .into_iter()
            .map(|property| (property.name.clone(), property))
            .collect(),
    }
}

/// Minutes after a fixed epoch, so tests read as relative times.
pub fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
}

pub fn page(id: &str, created: DateTime<Utc>, edited: DateTime<Utc>) -> Page {
    Page {
        id: id.to_string(),
        created_time: created,
        last_edited_time: edited,
        url: None,
        properties: BTreeMap::new(),
    }
}

pub fn text_property(kind: &str, text: &str) -> PageProperty {
    let spans = vec![RichText {
        plain_text: text.to_string(),
    }];
    match kind {
        "title" => PageProperty {
            kind: kind.to_string(),
            title: spans,
            ..PageProperty::default()
        },
        _ => PageProperty {
            kind: kind.to_string(),
            rich_text: spans,
            ..PageProperty::default()
        },
    }
}

pub fn paragraph(text: &str) -> Block {
    Block {
        id: String::new(),
        kind: "paragraph".to_string(),
        paragraph: Some(TextBlock {
            rich_text: vec![RichText {
                plain_text: text.to_string(),
            }],
        }),
    }
}

pub fn interaction(user: &str) -> Interaction {
    Interaction {
        id: format!("ix-{user}"),
        token: format!("token-{user}"),
        user: ChatUser {
            id: user.to_string(),
            tag: format!("{user}#0001"),
        },
        message: None,
    }
}

// ── Workspace ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeWorkspace {
    databases: Mutex<HashMap<String, Database>>,
    pages: Mutex<HashMap<String, Vec<Page>>>,
    blocks: Mutex<HashMap<String, Vec<Block>>>,
    failing_queries: Mutex<HashSet<String>>,
    created: Mutex<Vec<(String, BTreeMap<String, PropertyValue>)>>,
    fail_create: Mutex<bool>,
    query_calls: Mutex<Vec<String>>,
}

impl FakeWorkspace {
    pub fn put_database(&self, database: Database) {
        self.databases
            .lock()
            .unwrap()
            .insert(database.id.clone(), database);
    }

    pub fn set_pages(&self, database_id: &str, pages: Vec<Page>) {
        self.pages
            .lock()
            .unwrap()
            .insert(database_id.to_string(), pages);
    }

    pub fn put_blocks(&self, page_id: &str, blocks: Vec<Block>) {
        self.blocks
            .lock()
            .unwrap()
            .insert(page_id.to_string(), blocks);
    }

    pub fn fail_queries(&self, database_id: &str, fail: bool) {
        let mut failing = self.failing_queries.lock().unwrap();
        if fail {
            failing.insert(database_id.to_string());
        } else {
            failing.remove(database_id);
        }
    }

    pub fn fail_create(&self, fail: bool) {
        *self.fail_create.lock().unwrap() = fail;
    }

    pub fn created(&self) -> Vec<(String, BTreeMap<String, PropertyValue>)> {
        self.created.lock().unwrap().clone()
    }

    pub fn query_calls(&self) -> Vec<String> {
        self.query_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkspaceApi for FakeWorkspace {
    async fn retrieve_database(&self, database_id: &str) -> Result<Database, NotionError> {
        self.databases
            .lock()
            .unwrap()
            .get(database_id)
            .cloned()
            .ok_or_else(|| NotionError::NotFound(database_id.to_string()))
    }

    async fn query_recently_edited(
        &self,
        database_id: &str,
        page_size: usize,
    ) -> Result<Vec<Page>, NotionError> {
        self.query_calls
            .lock()
            .unwrap()
            .push(database_id.to_string());
        if self.failing_queries.lock().unwrap().contains(database_id) {
            return Err(NotionError::Api {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        let mut pages = self
            .pages
            .lock()
            .unwrap()
            .get(database_id)
            .cloned()
            .unwrap_or_default();
        pages.sort_by(|a, b| b.last_edited_time.cmp(&a.last_edited_time));
        pages.truncate(page_size);
        Ok(pages)
    }

    async fn block_children(
        &self,
        block_id: &str,
        page_size: usize,
    ) -> Result<Vec<Block>, NotionError> {
        let mut blocks = self
            .blocks
            .lock()
            .unwrap()
            .get(block_id)
            .cloned()
            .unwrap_or_default();
        blocks.truncate(page_size);
        Ok(blocks)
    }

    async fn create_page(
        &self,
        database_id: &str,
        properties: &BTreeMap<String, PropertyValue>,
    ) -> Result<Page, NotionError> {
        if *self.fail_create.lock().unwrap() {
            return Err(NotionError::Api {
                status: 500,
                body: "internal".to_string(),
            });
        }
        let mut created = self.created.lock().unwrap();
        created.push((database_id.to_string(), properties.clone()));
        let id = format!("page-{}", created.len());
        Ok(page(&id, at(0), at(0)))
    }
}

// ── Chat ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeChat {
    messages: Mutex<HashMap<(String, String), MessageRef>>,
    sent: Mutex<Vec<(String, String, Vec<ActionRow>)>>,
    edits: Mutex<Vec<(String, String, Vec<ActionRow>)>>,
    embeds: Mutex<Vec<(String, Embed)>>,
    replies: Mutex<Vec<(String, InteractionReply)>>,
    follow_ups: Mutex<Vec<(String, String)>>,
    fail_fetch: Mutex<bool>,
    fail_replies: Mutex<bool>,
}

impl FakeChat {
    pub fn put_message(&self, message: MessageRef) {
        self.messages.lock().unwrap().insert(
            (message.channel_id.clone(), message.message_id.clone()),
            message,
        );
    }

    pub fn fail_fetch(&self, fail: bool) {
        *self.fail_fetch.lock().unwrap() = fail;
    }

    pub fn fail_replies(&self, fail: bool) {
        *self.fail_replies.lock().unwrap() = fail;
    }

    pub fn sent(&self) -> Vec<(String, String, Vec<ActionRow>)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn edits(&self) -> Vec<(String, String, Vec<ActionRow>)> {
        self.edits.lock().unwrap().clone()
    }

    pub fn embeds(&self) -> Vec<(String, Embed)> {
        self.embeds.lock().unwrap().clone()
    }

    pub fn replies(&self) -> Vec<(String, InteractionReply)> {
        self.replies.lock().unwrap().clone()
    }

    pub fn follow_ups(&self) -> Vec<(String, String)> {
        self.follow_ups.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatApi for FakeChat {
    async fn send_components(
        &self,
        channel_id: &str,
        content: &str,
        rows: &[ActionRow],
    ) -> Result<String, ChatError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((channel_id.to_string(), content.to_string(), rows.to_vec()));
        let message_id = format!("msg-{}", sent.len());
        self.messages.lock().unwrap().insert(
            (channel_id.to_string(), message_id.clone()),
            MessageRef {
                channel_id: channel_id.to_string(),
                message_id: message_id.clone(),
                rows: rows.to_vec(),
            },
        );
        Ok(message_id)
    }

    async fn fetch_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<Option<MessageRef>, ChatError> {
        if *self.fail_fetch.lock().unwrap() {
            return Err(ChatError::Transport("connection reset".to_string()));
        }
        Ok(self
            .messages
            .lock()
            .unwrap()
            .get(&(channel_id.to_string(), message_id.to_string()))
            .cloned())
    }

    async fn edit_components(
        &self,
        channel_id: &str,
        message_id: &str,
        rows: &[ActionRow],
    ) -> Result<(), ChatError> {
        self.edits.lock().unwrap().push((
            channel_id.to_string(),
            message_id.to_string(),
            rows.to_vec(),
        ));
        if let Some(message) = self
            .messages
            .lock()
            .unwrap()
            .get_mut(&(channel_id.to_string(), message_id.to_string()))
        {
            message.rows = rows.to_vec();
        }
        Ok(())
    }

    async fn send_embed(&self, channel_id: &str, embed: &Embed) -> Result<(), ChatError> {
        self.embeds
            .lock()
            .unwrap()
            .push((channel_id.to_string(), embed.clone()));
        Ok(())
    }

    async fn respond(
        &self,
        interaction: &Interaction,
        reply: InteractionReply,
    ) -> Result<(), ChatError> {
        if *self.fail_replies.lock().unwrap() {
            return Err(ChatError::Api {
                status: 400,
                body: "interaction has already been acknowledged".to_string(),
            });
        }
        self.replies
            .lock()
            .unwrap()
            .push((interaction.user.id.clone(), reply));
        Ok(())
    }

    async fn follow_up_private(
        &self,
        interaction: &Interaction,
        text: &str,
    ) -> Result<(), ChatError> {
        self.follow_ups
            .lock()
            .unwrap()
            .push((interaction.user.id.clone(), text.to_string()));
        Ok(())
    }
}
