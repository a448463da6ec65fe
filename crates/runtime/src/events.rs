//! Inbound chat events and the interaction handles needed to answer them.

use std::collections::HashMap;

use crate::chat::ActionRow;

/// Who triggered an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUser {
    pub id: String,
    /// Human-readable handle written into submitted records.
    pub tag: String,
}

/// The message an interaction originated from, with its components as they
/// were rendered when the user clicked.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRef {
    pub channel_id: String,
    pub message_id: String,
    pub rows: Vec<ActionRow>,
}

/// Handle needed to answer an interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    pub id: String,
    pub token: String,
    pub user: ChatUser,
    pub message: Option<MessageRef>,
}

/// Inbound events delivered by the chat transport.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    ButtonPressed {
        interaction: Interaction,
        custom_id: String,
    },
    OptionSelected {
        interaction: Interaction,
        custom_id: String,
        values: Vec<String>,
    },
    /// A modal dialog was submitted.  `values` maps text-input ids to the
    /// entered text.
    ModalSubmitted {
        interaction: Interaction,
        custom_id: String,
        values: HashMap<String, String>,
    },
}

impl ChatEvent {
    pub fn interaction(&self) -> &Interaction {
        match self {
            Self::ButtonPressed { interaction, .. }
            | Self::OptionSelected { interaction, .. }
            | Self::ModalSubmitted { interaction, .. } => interaction,
        }
    }

    /// Short label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ButtonPressed { .. } => "button",
            Self::OptionSelected { .. } => "select",
            Self::ModalSubmitted { .. } => "modal",
        }
    }
}
