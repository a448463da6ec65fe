//! Discord JSON shapes: outgoing components, modals, embeds and interaction
//! callbacks, and the inbound interaction and message payloads.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use reportbridge_runtime::{
    ActionRow, Button, ButtonStyle, ChatEvent, ChatUser, Component, Embed, Interaction,
    InteractionReply, MessageRef, Modal, SelectChoice, SelectMenu, TextInput,
};

// Component type ids.
const ACTION_ROW: u8 = 1;
const BUTTON: u8 = 2;
const STRING_SELECT: u8 = 3;
const TEXT_INPUT: u8 = 4;

// Interaction type ids.
pub const PING: u8 = 1;
pub const MESSAGE_COMPONENT: u8 = 3;
pub const MODAL_SUBMIT: u8 = 5;

/// Only the invoking user sees the message.
const EPHEMERAL: u64 = 1 << 6;

// ── Outgoing ─────────────────────────────────────────────────────────────────

fn button_style(style: ButtonStyle) -> u8 {
    match style {
        ButtonStyle::Primary => 1,
        ButtonStyle::Secondary => 2,
        ButtonStyle::Success => 3,
        ButtonStyle::Danger => 4,
    }
}

fn style_from_id(id: u8) -> ButtonStyle {
    match id {
        2 => ButtonStyle::Secondary,
        3 => ButtonStyle::Success,
        4 => ButtonStyle::Danger,
        _ => ButtonStyle::Primary,
    }
}

pub fn component_json(component: &Component) -> Value {
    match component {
        Component::Button(button) => {
            let mut value = json!({
                "type": BUTTON,
                "style": button_style(button.style),
                "label": button.label,
                "custom_id": button.custom_id,
                "disabled": button.disabled,
            });
            if let Some(emoji) = &button.emoji {
                value["emoji"] = json!({ "name": emoji });
            }
            value
        }
        Component::Select(menu) => {
            let mut value = json!({
                "type": STRING_SELECT,
                "custom_id": menu.custom_id,
                "disabled": menu.disabled,
                "options": menu.options.iter().map(|option| json!({
                    "label": option.label,
                    "value": option.value,
                    "default": option.default,
                })).collect::<Vec<_>>(),
            });
            if let Some(placeholder) = &menu.placeholder {
                value["placeholder"] = json!(placeholder);
            }
            value
        }
        Component::TextInput(input) => {
            let mut value = json!({
                "type": TEXT_INPUT,
                "custom_id": input.custom_id,
                "label": input.label,
                "style": if input.multiline { 2 } else { 1 },
                "min_length": input.min_length,
                "max_length": input.max_length,
            });
            if let Some(placeholder) = &input.placeholder {
                value["placeholder"] = json!(placeholder);
            }
            value
        }
    }
}

pub fn rows_json(rows: &[ActionRow]) -> Value {
    Value::Array(
        rows.iter()
            .map(|row| {
                json!({
                    "type": ACTION_ROW,
                    "components": row.components.iter().map(component_json).collect::<Vec<_>>(),
                })
            })
            .collect(),
    )
}

pub fn modal_json(modal: &Modal) -> Value {
    json!({
        "custom_id": modal.custom_id,
        "title": modal.title,
        "components": rows_json(&modal.rows),
    })
}

pub fn embed_json(embed: &Embed) -> Value {
    let mut value = json!({
        "title": embed.title,
        "color": embed.color,
        "timestamp": embed.timestamp.to_rfc3339(),
        "fields": embed.fields.iter().map(|field| json!({
            "name": field.name,
            "value": field.value,
            "inline": field.inline,
        })).collect::<Vec<_>>(),
    });
    if let Some(url) = &embed.url {
        value["url"] = json!(url);
    }
    value
}

/// Body of an interaction callback.
pub fn reply_json(reply: &InteractionReply) -> Value {
    match reply {
        InteractionReply::OpenModal(modal) => json!({ "type": 9, "data": modal_json(modal) }),
        InteractionReply::DeferUpdate => json!({ "type": 6 }),
        InteractionReply::Private(text) => json!({
            "type": 4,
            "data": { "content": text, "flags": EPHEMERAL },
        }),
        InteractionReply::DeferPrivate => json!({ "type": 5, "data": { "flags": EPHEMERAL } }),
    }
}

/// Body of a follow-up message only the invoking user sees.
pub fn follow_up_json(text: &str) -> Value {
    json!({ "content": text, "flags": EPHEMERAL })
}

// ── Inbound ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawEmoji {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOption {
    label: String,
    value: String,
    #[serde(default)]
    default: bool,
}

#[derive(Debug, Deserialize)]
struct RawComponent {
    #[serde(rename = "type")]
    kind: u8,
    custom_id: Option<String>,
    label: Option<String>,
    style: Option<u8>,
    emoji: Option<RawEmoji>,
    #[serde(default)]
    disabled: bool,
    placeholder: Option<String>,
    #[serde(default)]
    options: Vec<RawOption>,
    min_length: Option<u16>,
    max_length: Option<u16>,
    value: Option<String>,
    #[serde(default)]
    components: Vec<RawComponent>,
}

impl RawComponent {
    fn into_component(self) -> Option<Component> {
        let Some(custom_id) = self.custom_id else {
            debug!(kind = self.kind, "skipping component without custom id");
            return None;
        };
        match self.kind {
            BUTTON => Some(Component::Button(Button {
                custom_id,
                label: self.label.unwrap_or_default(),
                style: style_from_id(self.style.unwrap_or(1)),
                emoji: self.emoji.and_then(|emoji| emoji.name),
                disabled: self.disabled,
            })),
            STRING_SELECT => Some(Component::Select(SelectMenu {
                custom_id,
                placeholder: self.placeholder,
                options: self
                    .options
                    .into_iter()
                    .map(|option| SelectChoice {
                        label: option.label,
                        value: option.value,
                        default: option.default,
                    })
                    .collect(),
                disabled: self.disabled,
            })),
            TEXT_INPUT => Some(Component::TextInput(TextInput {
                custom_id,
                label: self.label.unwrap_or_default(),
                placeholder: self.placeholder,
                min_length: self.min_length.unwrap_or(0),
                max_length: self.max_length.unwrap_or(4000),
                multiline: self.style == Some(2),
            })),
            other => {
                debug!(kind = other, "skipping unsupported component");
                None
            }
        }
    }
}

fn decode_rows(rows: Vec<RawComponent>) -> Vec<ActionRow> {
    rows.into_iter()
        .filter(|row| row.kind == ACTION_ROW)
        .map(|row| {
            ActionRow::of(
                row.components
                    .into_iter()
                    .filter_map(RawComponent::into_component)
                    .collect(),
            )
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct RawMessage {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    components: Vec<RawComponent>,
}

impl RawMessage {
    pub fn into_message_ref(self) -> MessageRef {
        MessageRef {
            channel_id: self.channel_id,
            message_id: self.id,
            rows: decode_rows(self.components),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: String,
    username: String,
    discriminator: Option<String>,
}

impl RawUser {
    /// `name#1234` for legacy accounts, the bare username otherwise.
    fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some(discriminator) if !discriminator.is_empty() && discriminator != "0" => {
                format!("{}#{discriminator}", self.username)
            }
            _ => self.username.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawMember {
    user: RawUser,
}

#[derive(Debug, Default, Deserialize)]
struct RawData {
    custom_id: Option<String>,
    component_type: Option<u8>,
    #[serde(default)]
    values: Vec<String>,
    #[serde(default)]
    components: Vec<RawComponent>,
}

#[derive(Debug, Deserialize)]
pub struct RawInteraction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    token: String,
    data: Option<RawData>,
    member: Option<RawMember>,
    user: Option<RawUser>,
    message: Option<RawMessage>,
}

/// Why an interaction payload could not become a [`ChatEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeSkip {
    UnsupportedType(u8),
    MissingField(&'static str),
}

impl RawInteraction {
    pub fn into_event(self) -> Result<ChatEvent, DecodeSkip> {
        let user = self
            .member
            .map(|member| member.user)
            .or(self.user)
            .ok_or(DecodeSkip::MissingField("user"))?;
        let data = self.data.unwrap_or_default();
        let custom_id = data.custom_id.ok_or(DecodeSkip::MissingField("custom_id"))?;
        let interaction = Interaction {
            id: self.id,
            token: self.token,
            user: ChatUser {
                tag: user.tag(),
                id: user.id,
            },
            message: self.message.map(RawMessage::into_message_ref),
        };

        match (self.kind, data.component_type) {
            (MESSAGE_COMPONENT, Some(BUTTON)) => Ok(ChatEvent::ButtonPressed {
                interaction,
                custom_id,
            }),
            (MESSAGE_COMPONENT, Some(STRING_SELECT)) => Ok(ChatEvent::OptionSelected {
                interaction,
                custom_id,
                values: data.values,
            }),
            (MODAL_SUBMIT, _) => {
                let values: HashMap<String, String> = data
                    .components
                    .into_iter()
                    .flat_map(|row| row.components)
                    .filter_map(|input| Some((input.custom_id?, input.value.unwrap_or_default())))
                    .collect();
                Ok(ChatEvent::ModalSubmitted {
                    interaction,
                    custom_id,
                    values,
                })
            }
            (kind, _) => Err(DecodeSkip::UnsupportedType(kind)),
        }
    }
}
