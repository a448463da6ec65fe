use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, warn};

use reportbridge_runtime::{
    ActionRow, ChatApi, ChatError, Embed, Interaction, InteractionReply, MessageRef,
};

use crate::interactions::PendingResponses;
use crate::wire::{self, RawMessage};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// REST side of the Discord transport.
#[derive(Clone)]
pub struct DiscordClient {
    client: Client,
    base_url: String,
    token: String,
    /// Needed only for interaction follow-ups.
    application_id: Option<String>,
    pending: PendingResponses,
}

fn transport(err: reqwest::Error) -> ChatError {
    ChatError::Transport(err.to_string())
}

impl DiscordClient {
    pub fn new(token: impl Into<String>, timeout: Duration) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("reportbridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            base_url: DEFAULT_API_BASE.to_string(),
            token: token.into(),
            application_id: None,
            pending: PendingResponses::default(),
        })
    }

    pub fn with_application_id(mut self, application_id: impl Into<String>) -> Self {
        self.application_id = Some(application_id.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Interactions still waiting for their first response.  Shared with the
    /// interactions endpoint.
    pub fn pending(&self) -> PendingResponses {
        self.pending.clone()
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("Authorization", format!("Bot {}", self.token))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Option<Value>, ChatError> {
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let text = response.text().await.map_err(transport)?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|err| ChatError::Payload(err.to_string()))
    }

    async fn callback(&self, interaction: &Interaction, body: Value) -> Result<(), ChatError> {
        let url = format!(
            "{}/interactions/{}/{}/callback",
            self.base_url, interaction.id, interaction.token
        );
        self.send(self.client.post(url).json(&body)).await?;
        Ok(())
    }

    fn webhook_url(&self, interaction: &Interaction) -> Result<String, ChatError> {
        let application_id = self
            .application_id
            .as_deref()
            .ok_or(ChatError::NotConfigured("discord application id"))?;
        Ok(format!(
            "{}/webhooks/{application_id}/{}",
            self.base_url, interaction.token
        ))
    }

    async fn private_follow_up(&self, interaction: &Interaction, text: &str) -> Result<(), ChatError> {
        let url = self.webhook_url(interaction)?;
        self.send(self.client.post(url).json(&wire::follow_up_json(text)))
            .await?;
        Ok(())
    }

    /// A reply for an interaction the endpoint already acknowledged with a
    /// deferred update.
    async fn late_reply(
        &self,
        interaction: &Interaction,
        reply: InteractionReply,
    ) -> Result<(), ChatError> {
        match reply {
            InteractionReply::DeferUpdate | InteractionReply::DeferPrivate => {
                debug!(interaction = %interaction.id, "already acknowledged; nothing to send");
                Ok(())
            }
            InteractionReply::Private(text) => self.private_follow_up(interaction, &text).await,
            InteractionReply::OpenModal(_) => {
                warn!(interaction = %interaction.id, "too late to open a modal");
                Err(ChatError::AlreadyAcknowledged(interaction.id.clone()))
            }
        }
    }
}

fn decode_message(value: Option<Value>) -> Result<RawMessage, ChatError> {
    let value = value.ok_or_else(|| ChatError::Payload("empty message response".to_string()))?;
    serde_json::from_value(value).map_err(|err| ChatError::Payload(err.to_string()))
}

#[async_trait]
impl ChatApi for DiscordClient {
    async fn send_components(
        &self,
        channel_id: &str,
        content: &str,
        rows: &[ActionRow],
    ) -> Result<String, ChatError> {
        let url = format!("{}/channels/{channel_id}/messages", self.base_url);
        let body = json!({ "content": content, "components": wire::rows_json(rows) });
        let response = self
            .send(self.authed(self.client.post(url)).json(&body))
            .await?;
        Ok(decode_message(response)?.id)
    }

    async fn fetch_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<Option<MessageRef>, ChatError> {
        let url = format!("{}/channels/{channel_id}/messages/{message_id}", self.base_url);
        match self.send(self.authed(self.client.get(url))).await {
            Ok(response) => Ok(Some(decode_message(response)?.into_message_ref())),
            Err(ChatError::Api { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn edit_components(
        &self,
        channel_id: &str,
        message_id: &str,
        rows: &[ActionRow],
    ) -> Result<(), ChatError> {
        let url = format!("{}/channels/{channel_id}/messages/{message_id}", self.base_url);
        let body = json!({ "components": wire::rows_json(rows) });
        self.send(self.authed(self.client.patch(url)).json(&body))
            .await?;
        Ok(())
    }

    async fn send_embed(&self, channel_id: &str, embed: &Embed) -> Result<(), ChatError> {
        let url = format!("{}/channels/{channel_id}/messages", self.base_url);
        let body = json!({ "embeds": [wire::embed_json(embed)] });
        self.send(self.authed(self.client.post(url)).json(&body))
            .await?;
        Ok(())
    }

    async fn respond(
        &self,
        interaction: &Interaction,
        reply: InteractionReply,
    ) -> Result<(), ChatError> {
        let body = wire::reply_json(&reply);
        if let Some(waiting) = self.pending.take(&interaction.id).await {
            if waiting.send(body).is_ok() {
                debug!(interaction = %interaction.id, "answered through pending request");
                return Ok(());
            }
            // The endpoint timed out and answered on its own.
            return self.late_reply(interaction, reply).await;
        }
        if self.pending.is_acknowledged(&interaction.id).await {
            return self.late_reply(interaction, reply).await;
        }
        self.callback(interaction, body).await
    }

    async fn follow_up_private(
        &self,
        interaction: &Interaction,
        text: &str,
    ) -> Result<(), ChatError> {
        // After a deferred update the original response is the form message
        // itself, so the text goes out as a new ephemeral message instead.
        if self.pending.is_acknowledged(&interaction.id).await {
            return self.private_follow_up(interaction, text).await;
        }
        let url = format!("{}/messages/@original", self.webhook_url(interaction)?);
        self.send(self.client.patch(url).json(&json!({ "content": text })))
            .await?;
        Ok(())
    }
}
