//! Chat-side vocabulary: interactive components, embeds, interaction replies
//! and the [`ChatApi`] seam implemented by the chat transport.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::events::{Interaction, MessageRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Success,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub custom_id: String,
    pub label: String,
    pub style: ButtonStyle,
    pub emoji: Option<String>,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectChoice {
    pub label: String,
    pub value: String,
    /// Rendered as the pre-selected option.
    pub default: bool,
}

impl SelectChoice {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            default: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectMenu {
    pub custom_id: String,
    pub placeholder: Option<String>,
    pub options: Vec<SelectChoice>,
    pub disabled: bool,
}

impl SelectMenu {
    /// Mark `value` as the selected option and clear every other default.
    pub fn with_selected(mut self, value: &str) -> Self {
        for option in &mut self.options {
            option.default = option.value == value;
        }
        self
    }

    pub fn selected(&self) -> Option<&str> {
        self.options
            .iter()
            .find(|option| option.default)
            .map(|option| option.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextInput {
    pub custom_id: String,
    pub label: String,
    pub placeholder: Option<String>,
    pub min_length: u16,
    pub max_length: u16,
    pub multiline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Button(Button),
    Select(SelectMenu),
    TextInput(TextInput),
}

impl Component {
    pub fn custom_id(&self) -> &str {
        match self {
            Self::Button(button) => &button.custom_id,
            Self::Select(menu) => &menu.custom_id,
            Self::TextInput(input) => &input.custom_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRow {
    pub components: Vec<Component>,
}

impl ActionRow {
    pub fn of(components: Vec<Component>) -> Self {
        Self { components }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modal {
    pub custom_id: String,
    pub title: String,
    pub rows: Vec<ActionRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub title: String,
    pub url: Option<String>,
    pub color: u32,
    pub timestamp: DateTime<Utc>,
    pub fields: Vec<EmbedField>,
}

impl Embed {
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }
}

/// The first answer to an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionReply {
    OpenModal(Modal),
    /// Acknowledge a component interaction without changing the message.
    DeferUpdate,
    /// A message only the interacting user can see.
    Private(String),
    /// "Thinking..." placeholder, completed later by a private follow-up.
    DeferPrivate,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat request failed: {0}")]
    Transport(String),
    #[error("chat api returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("malformed chat payload: {0}")]
    Payload(String),
    #[error("interaction {0} was already acknowledged")]
    AlreadyAcknowledged(String),
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

/// Commands the bridge issues to the chat platform.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Post a message with interactive components; returns the new message id.
    async fn send_components(
        &self,
        channel_id: &str,
        content: &str,
        rows: &[ActionRow],
    ) -> Result<String, ChatError>;

    /// `Ok(None)` when the message (or its channel) no longer exists.
    async fn fetch_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<Option<MessageRef>, ChatError>;

    async fn edit_components(
        &self,
        channel_id: &str,
        message_id: &str,
        rows: &[ActionRow],
    ) -> Result<(), ChatError>;

    async fn send_embed(&self, channel_id: &str, embed: &Embed) -> Result<(), ChatError>;

    async fn respond(
        &self,
        interaction: &Interaction,
        reply: InteractionReply,
    ) -> Result<(), ChatError>;

    /// Complete a [`InteractionReply::DeferPrivate`] with text.
    async fn follow_up_private(&self, interaction: &Interaction, text: &str)
    -> Result<(), ChatError>;
}
