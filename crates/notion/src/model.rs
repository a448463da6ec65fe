//! Wire types for the subset of the Notion API the bridge touches.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A span of rich text; only the rendered plain text is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub plain_text: String,
}

pub fn plain_text(spans: &[RichText]) -> String {
    spans.iter().map(|span| span.plain_text.as_str()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectConfig {
    #[serde(default)]
    pub options: Vec<SelectOption>,
}

/// One column of a database schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseProperty {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Remote type tag (`rich_text`, `checkbox`, `select`, `title`, `number`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<SelectConfig>,
}

impl DatabaseProperty {
    pub fn options(&self) -> &[SelectOption] {
        self.select
            .as_ref()
            .map(|select| select.options.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Database {
    pub id: String,
    #[serde(default)]
    pub title: Vec<RichText>,
    /// Keyed by property name; decoded into a sorted map so iteration order
    /// is stable between schema refreshes.
    #[serde(default)]
    pub properties: BTreeMap<String, DatabaseProperty>,
}

impl Database {
    /// First title span, the way the Notion UI shows the database name.
    pub fn display_name(&self) -> Option<&str> {
        self.title
            .first()
            .map(|span| span.plain_text.as_str())
            .filter(|name| !name.is_empty())
    }
}

/// The value side of a page property.  Only text-bearing types are decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageProperty {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: Vec<RichText>,
    #[serde(default)]
    pub rich_text: Vec<RichText>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub created_time: DateTime<Utc>,
    pub last_edited_time: DateTime<Utc>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, PageProperty>,
}

impl Page {
    /// Public link to the page, derived from its id.
    pub fn public_url(&self) -> String {
        format!("https://notion.so/{}", self.id.replace('-', ""))
    }

    /// A page counts as edited when it was touched after creation.
    pub fn is_edit(&self) -> bool {
        self.last_edited_time > self.created_time
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlock {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub paragraph: Option<TextBlock>,
}

impl Block {
    /// Plain text of a paragraph block; `None` for every other block type.
    pub fn paragraph_text(&self) -> Option<String> {
        self.paragraph
            .as_ref()
            .map(|paragraph| plain_text(&paragraph.rich_text))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// Property value written when creating a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Title(String),
    RichText(String),
    Checkbox(bool),
    Select(SelectOption),
}

impl PropertyValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Title(text) => json!({ "title": [text_span(text)] }),
            Self::RichText(text) => json!({ "rich_text": [text_span(text)] }),
            Self::Checkbox(flag) => json!({ "checkbox": flag }),
            Self::Select(option) => match &option.id {
                Some(id) => json!({ "select": { "id": id, "name": option.name } }),
                None => json!({ "select": { "name": option.name } }),
            },
        }
    }
}

fn text_span(text: &str) -> Value {
    json!({ "type": "text", "text": { "content": text } })
}

pub fn properties_to_json(properties: &BTreeMap<String, PropertyValue>) -> Value {
    Value::Object(
        properties
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect(),
    )
}
