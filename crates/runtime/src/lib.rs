mod bridge;
pub mod chat;
pub mod error;
pub mod events;
pub mod form;
pub mod notifier;
pub mod poller;
pub mod schema;
pub mod session;
pub mod submitter;

#[cfg(test)]
mod testing;

pub use bridge::{Bridge, DEFAULT_SHUTDOWN_GRACE, StartReport};
pub use chat::{
    ActionRow, Button, ButtonStyle, ChatApi, ChatError, Component, Embed, EmbedField,
    InteractionReply, Modal, SelectChoice, SelectMenu, TextInput,
};
pub use error::{AnswerError, NotifyError, PollFetchError, SchemaFetchError, SubmitError};
pub use events::{ChatEvent, ChatUser, Interaction, MessageRef};
pub use form::{FormController, FormLayout, FormMessage, FormState};
pub use notifier::{Notifier, RecordAnnouncement};
pub use poller::{ChangePoller, PollReport, WatermarkTable};
pub use schema::{FieldDescriptor, FieldKind, SchemaLoader, SchemaSnapshot, classify};
pub use session::{DrainOutcome, FormSession, SessionStore};
pub use submitter::{RecordSubmitter, Submission};
