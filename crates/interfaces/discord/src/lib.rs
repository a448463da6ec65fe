//! Discord transport: REST client implementing [`ChatApi`] and the signed
//! HTTP interactions endpoint that feeds [`ChatEvent`]s to the runtime.
//!
//! [`ChatApi`]: reportbridge_runtime::ChatApi
//! [`ChatEvent`]: reportbridge_runtime::ChatEvent

mod client;
pub mod interactions;
pub mod wire;

pub use client::{DEFAULT_API_BASE, DiscordClient};
pub use interactions::{
    InteractionState, PendingResponses, PublicKeyError, SignatureVerifier, router, serve,
};
