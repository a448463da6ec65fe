//! Record submission: encodes a completed form against the live schema and
//! creates one record.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use reportbridge_notion::{PropertyValue, SelectOption, WorkspaceApi};
use tracing::{info, warn};

use crate::error::SubmitError;
use crate::schema::{FieldKind, SchemaLoader, SchemaSnapshot};

/// A created record plus the fields that could not be encoded.
#[derive(Debug)]
pub struct Submission {
    pub record_id: String,
    pub dropped: Vec<SubmitError>,
}

impl Submission {
    pub fn dropped_fields(&self) -> Vec<&str> {
        self.dropped.iter().filter_map(SubmitError::field).collect()
    }
}

/// Parse a yes/no answer.
pub fn parse_boolean(token: &str) -> Option<bool> {
    match token.trim() {
        t if t.eq_ignore_ascii_case("yes") => Some(true),
        t if t.eq_ignore_ascii_case("no") => Some(false),
        _ => None,
    }
}

/// Encode answers by the kind each field has in `schema`.  Fields that cannot
/// be encoded are returned as errors instead of aborting the whole record.
pub fn encode(
    schema: &SchemaSnapshot,
    answers: &HashMap<String, String>,
) -> (BTreeMap<String, PropertyValue>, Vec<SubmitError>) {
    let mut properties = BTreeMap::new();
    let mut dropped = Vec::new();

    for (field, value) in answers {
        let Some(kind) = schema.kind_of(field) else {
            dropped.push(SubmitError::UnknownField {
                field: field.clone(),
            });
            continue;
        };
        let encoded = match kind {
            FieldKind::ShortText => Ok(PropertyValue::RichText(value.clone())),
            FieldKind::Title => Ok(PropertyValue::Title(value.clone())),
            FieldKind::Boolean => parse_boolean(value)
                .map(PropertyValue::Checkbox)
                .ok_or_else(|| SubmitError::InvalidBoolean {
                    field: field.clone(),
                    token: value.clone(),
                }),
            FieldKind::SingleChoice => schema
                .option(field, value)
                .map(|option| {
                    PropertyValue::Select(SelectOption {
                        id: option.id.clone(),
                        name: option.name.clone(),
                        color: None,
                    })
                })
                .ok_or_else(|| SubmitError::UnknownChoice {
                    field: field.clone(),
                    value: value.clone(),
                }),
            FieldKind::Skip => Err(SubmitError::UnsupportedField {
                field: field.clone(),
                remote: schema.remote_type(field).unwrap_or_default().to_string(),
            }),
        };
        match encoded {
            Ok(property) => {
                properties.insert(field.clone(), property);
            }
            Err(err) => dropped.push(err),
        }
    }

    // Stable order for log output.
    dropped.sort_by(|a, b| a.field().cmp(&b.field()));
    (properties, dropped)
}

/// Creates records in the reporting collection.
#[derive(Clone)]
pub struct RecordSubmitter {
    workspace: Arc<dyn WorkspaceApi>,
    loader: SchemaLoader,
    database_id: String,
}

impl RecordSubmitter {
    pub fn new(workspace: Arc<dyn WorkspaceApi>, database_id: impl Into<String>) -> Self {
        Self {
            loader: SchemaLoader::new(workspace.clone()),
            workspace,
            database_id: database_id.into(),
        }
    }

    /// Encode against a freshly loaded schema and issue one create call.
    /// Not retried.
    pub async fn submit(
        &self,
        answers: &HashMap<String, String>,
    ) -> Result<Submission, SubmitError> {
        let schema = self.loader.load(&self.database_id).await?;
        let (properties, dropped) = encode(&schema, answers);
        for err in &dropped {
            warn!(%err, collection = %self.database_id, "dropping field from submission");
        }

        let page = self
            .workspace
            .create_page(&self.database_id, &properties)
            .await
            .map_err(SubmitError::Create)?;

        info!(
            collection = %self.database_id,
            record = %page.id,
            fields = properties.len(),
            dropped = dropped.len(),
            "record created"
        );
        Ok(Submission {
            record_id: page.id,
            dropped,
        })
    }
}
