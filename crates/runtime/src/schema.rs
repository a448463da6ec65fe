//! Schema loading: turns a remote database schema into form field descriptors.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use reportbridge_notion::{Database, DatabaseProperty, SelectOption, WorkspaceApi};
use tracing::{debug, info, warn};

use crate::error::SchemaFetchError;

/// Title property name used when a schema has no title column.
pub const DEFAULT_TITLE_FIELD: &str = "Name";

/// Local, chat-presentable classification of a remote property type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Free text, entered through a modal dialog.
    ShortText,
    /// Yes/no, rendered as a two-option select.
    Boolean,
    SingleChoice,
    /// The record title; filled automatically with the submitter's name.
    Title,
    /// Any remote type the chat UI cannot present.
    Skip,
}

impl FieldKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::ShortText => "short-text",
            Self::Boolean => "boolean",
            Self::SingleChoice => "single-choice",
            Self::Title => "title",
            Self::Skip => "skip",
        }
    }

    /// Kinds the user answers through form components.
    pub fn is_interactive(self) -> bool {
        matches!(self, Self::ShortText | Self::Boolean | Self::SingleChoice)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Map a remote property type tag to a local kind.  Unknown tags never fail.
pub fn classify(remote: &str) -> FieldKind {
    match remote {
        "rich_text" => FieldKind::ShortText,
        "checkbox" => FieldKind::Boolean,
        "select" => FieldKind::SingleChoice,
        "title" => FieldKind::Title,
        _ => FieldKind::Skip,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub id: String,
    pub kind: FieldKind,
    /// Option names; only populated for [`FieldKind::SingleChoice`].
    pub choices: Vec<String>,
}

/// One loaded schema: the presentable descriptors plus the raw properties the
/// submitter resolves values against.
#[derive(Debug, Clone)]
pub struct SchemaSnapshot {
    pub collection_id: String,
    pub fields: Vec<FieldDescriptor>,
    properties: BTreeMap<String, DatabaseProperty>,
}

impl SchemaSnapshot {
    pub fn from_database(collection_id: &str, database: &Database) -> Self {
        let mut fields = Vec::new();
        for (name, property) in &database.properties {
            let kind = classify(&property.kind);
            match kind {
                FieldKind::Skip => {
                    debug!(field = %name, remote = %property.kind, "skipping unsupported field");
                }
                FieldKind::SingleChoice => {
                    let choices: Vec<String> = property
                        .options()
                        .iter()
                        .map(|option| option.name.clone())
                        .collect();
                    if choices.is_empty() {
                        warn!(
                            field = %name,
                            "select field has no options; add some in the database to show it"
                        );
                        continue;
                    }
                    fields.push(FieldDescriptor {
                        id: name.clone(),
                        kind,
                        choices,
                    });
                }
                _ => fields.push(FieldDescriptor {
                    id: name.clone(),
                    kind,
                    choices: Vec::new(),
                }),
            }
        }

        Self {
            collection_id: collection_id.to_string(),
            fields,
            properties: database.properties.clone(),
        }
    }

    /// Kind of any property in the schema, including skipped ones.
    pub fn kind_of(&self, field: &str) -> Option<FieldKind> {
        self.properties.get(field).map(|property| classify(&property.kind))
    }

    pub fn remote_type(&self, field: &str) -> Option<&str> {
        self.properties.get(field).map(|property| property.kind.as_str())
    }

    /// The live option called `value` on a select field.
    pub fn option(&self, field: &str, value: &str) -> Option<&SelectOption> {
        self.properties
            .get(field)?
            .options()
            .iter()
            .find(|option| option.name == value)
    }

    /// Name of the title column, falling back to [`DEFAULT_TITLE_FIELD`].
    pub fn title_field(&self) -> &str {
        self.fields
            .iter()
            .find(|field| field.kind == FieldKind::Title)
            .map(|field| field.id.as_str())
            .unwrap_or(DEFAULT_TITLE_FIELD)
    }

    pub fn interactive_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|field| field.kind.is_interactive())
    }
}

/// Fetches schemas through the workspace transport.
#[derive(Clone)]
pub struct SchemaLoader {
    workspace: Arc<dyn WorkspaceApi>,
}

impl SchemaLoader {
    pub fn new(workspace: Arc<dyn WorkspaceApi>) -> Self {
        Self { workspace }
    }

    pub async fn load(&self, collection_id: &str) -> Result<SchemaSnapshot, SchemaFetchError> {
        let database = self
            .workspace
            .retrieve_database(collection_id)
            .await
            .map_err(|err| SchemaFetchError::from_notion(collection_id, err))?;
        let snapshot = SchemaSnapshot::from_database(collection_id, &database);
        info!(
            collection = %collection_id,
            fields = snapshot.fields.len(),
            "loaded database schema"
        );
        Ok(snapshot)
    }
}
