use reportbridge_notion::NotionError;
use thiserror::Error;

use crate::chat::ChatError;

#[derive(Debug, Error)]
pub enum SchemaFetchError {
    #[error("collection {collection} is unreachable: {source}")]
    Unreachable {
        collection: String,
        #[source]
        source: NotionError,
    },
    #[error("collection {collection} returned a malformed schema: {source}")]
    Malformed {
        collection: String,
        #[source]
        source: NotionError,
    },
}

impl SchemaFetchError {
    pub(crate) fn from_notion(collection: &str, source: NotionError) -> Self {
        let collection = collection.to_string();
        match source {
            NotionError::Json(_) => Self::Malformed { collection, source },
            source => Self::Unreachable { collection, source },
        }
    }
}

/// Submission failures.  The field-level variants never abort a submission;
/// they are reported next to the created record.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("could not load the live schema: {0}")]
    Schema(#[from] SchemaFetchError),
    #[error("record creation failed: {0}")]
    Create(#[source] NotionError),
    #[error("field `{field}` does not exist in the database")]
    UnknownField { field: String },
    #[error("field `{field}` has unsupported type `{remote}`")]
    UnsupportedField { field: String, remote: String },
    #[error("field `{field}` expects yes/no, got `{token}`")]
    InvalidBoolean { field: String, token: String },
    #[error("`{value}` is no longer a valid option for `{field}`")]
    UnknownChoice { field: String, value: String },
}

impl SubmitError {
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::UnknownField { field }
            | Self::UnsupportedField { field, .. }
            | Self::InvalidBoolean { field, .. }
            | Self::UnknownChoice { field, .. } => Some(field),
            Self::Schema(_) | Self::Create(_) => None,
        }
    }
}

#[derive(Debug, Error)]
#[error("polling collection {collection} failed: {source}")]
pub struct PollFetchError {
    pub collection: String,
    #[source]
    pub source: NotionError,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("no notification channel is configured")]
    ChannelMissing,
    #[error("sending the announcement failed: {0}")]
    Send(#[from] ChatError),
}

/// Answer rejected by the session store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnswerError {
    #[error("field `{0}` is not part of the form")]
    NotRequired(String),
}

