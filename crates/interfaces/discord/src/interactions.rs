//! HTTP interactions endpoint.
//!
//! Discord POSTs every interaction here.  Requests are signature-checked,
//! PINGs are answered inline and component or modal interactions are turned
//! into [`ChatEvent`]s.  The HTTP request stays open until the runtime's first
//! reply arrives through [`PendingResponses`], or falls back to a deferred
//! update when none arrives in time.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use ring::signature::{ED25519, UnparsedPublicKey};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, info, warn};

use reportbridge_runtime::ChatEvent;

use crate::wire::{self, RawInteraction};

pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

/// Discord closes the interaction after three seconds.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(2500);

/// Interaction tokens stay valid for follow-ups this long.
const TOKEN_LIFETIME: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Error)]
pub enum PublicKeyError {
    #[error("public key is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("public key must be 32 bytes, got {0}")]
    Length(usize),
}

/// Verifies request signatures against the application's public key.
#[derive(Clone)]
pub struct SignatureVerifier {
    key: UnparsedPublicKey<Vec<u8>>,
}

impl SignatureVerifier {
    pub fn from_hex(public_key: &str) -> Result<Self, PublicKeyError> {
        let bytes = hex::decode(public_key.trim())?;
        if bytes.len() != 32 {
            return Err(PublicKeyError::Length(bytes.len()));
        }
        Ok(Self {
            key: UnparsedPublicKey::new(&ED25519, bytes),
        })
    }

    /// The signed message is the timestamp header followed by the raw body.
    pub fn verify(&self, timestamp: &str, body: &[u8], signature_hex: &str) -> bool {
        let Ok(signature) = hex::decode(signature_hex) else {
            return false;
        };
        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);
        self.key.verify(&message, &signature).is_ok()
    }
}

/// Interaction ids whose HTTP request is still open, keyed to the channel
/// that completes it, plus the interactions the endpoint had to acknowledge
/// on its own because no reply came in time.
#[derive(Clone, Default)]
pub struct PendingResponses {
    inner: Arc<Mutex<HashMap<String, oneshot::Sender<Value>>>>,
    acknowledged: Arc<Mutex<HashMap<String, Instant>>>,
}

impl PendingResponses {
    pub async fn register(&self, interaction_id: &str) -> oneshot::Receiver<Value> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .lock()
            .await
            .insert(interaction_id.to_string(), tx);
        rx
    }

    pub async fn take(&self, interaction_id: &str) -> Option<oneshot::Sender<Value>> {
        self.inner.lock().await.remove(interaction_id)
    }

    /// Record that the endpoint answered `interaction_id` with a deferred
    /// update.  Entries older than the token lifetime are pruned here.
    pub async fn mark_acknowledged(&self, interaction_id: &str) {
        let now = Instant::now();
        let mut acknowledged = self.acknowledged.lock().await;
        acknowledged.retain(|_, at| now.duration_since(*at) < TOKEN_LIFETIME);
        acknowledged.insert(interaction_id.to_string(), now);
    }

    pub async fn is_acknowledged(&self, interaction_id: &str) -> bool {
        self.acknowledged.lock().await.contains_key(interaction_id)
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

pub struct InteractionState {
    verifier: SignatureVerifier,
    events: mpsc::Sender<ChatEvent>,
    pending: PendingResponses,
    ack_timeout: Duration,
}

impl InteractionState {
    pub fn new(
        verifier: SignatureVerifier,
        events: mpsc::Sender<ChatEvent>,
        pending: PendingResponses,
    ) -> Self {
        Self {
            verifier,
            events,
            pending,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }

    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }
}

pub fn router(state: InteractionState) -> Router {
    Router::new()
        .route("/interactions", post(handle_interaction))
        .with_state(Arc::new(state))
}

/// Serve the interactions endpoint until `shutdown` resolves.
pub async fn serve(
    bind: &str,
    state: InteractionState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(bind = %bind, "interactions endpoint listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("interactions endpoint stopped");
    Ok(())
}

async fn handle_interaction(
    State(state): State<Arc<InteractionState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match process(&state, &headers, &body).await {
        Ok(reply) => Json(reply).into_response(),
        Err(status) => status.into_response(),
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Verify, decode and dispatch one interaction; returns the HTTP reply body.
pub async fn process(
    state: &InteractionState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Value, StatusCode> {
    let (Some(signature), Some(timestamp)) = (
        header(headers, SIGNATURE_HEADER),
        header(headers, TIMESTAMP_HEADER),
    ) else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    if !state.verifier.verify(timestamp, body, signature) {
        debug!("rejected interaction with bad signature");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let raw: RawInteraction = serde_json::from_slice(body).map_err(|err| {
        warn!(?err, "malformed interaction payload");
        StatusCode::BAD_REQUEST
    })?;
    if raw.kind == wire::PING {
        return Ok(json!({ "type": 1 }));
    }

    let interaction_id = raw.id.clone();
    let event = raw.into_event().map_err(|skip| {
        debug!(?skip, interaction = %interaction_id, "ignoring interaction");
        StatusCode::BAD_REQUEST
    })?;

    let reply = state.pending.register(&interaction_id).await;
    if state.events.send(event).await.is_err() {
        state.pending.take(&interaction_id).await;
        warn!("event receiver closed; interaction dropped");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    match tokio::time::timeout(state.ack_timeout, reply).await {
        Ok(Ok(reply)) => Ok(reply),
        _ => {
            // Marked before the sender is dropped so a reply racing the
            // timeout is routed as a late reply.
            state.pending.mark_acknowledged(&interaction_id).await;
            state.pending.take(&interaction_id).await;
            debug!(interaction = %interaction_id, "no reply in time; deferring");
            Ok(json!({ "type": 6 }))
        }
    }
}
