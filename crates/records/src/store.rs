use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::DomainTerm;

/// One record as returned by `search_read`: field name → JSON value.
/// Many2one values render as `[id, "display name"]`, x2many as id arrays,
/// unset values as `false`.
pub type Record = serde_json::Map<String, Value>;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("model '{0}' does not exist")]
    UnknownModel(String),

    #[error("Invalid field '{field}' on model '{model}'")]
    UnknownField { model: String, field: String },

    #[error("wrong value for {model}.{field}: {message}")]
    TypeMismatch {
        model: String,
        field: String,
        message: String,
    },

    #[error("{0}")]
    Constraint(String),

    #[error("no {0} record matches the search domain")]
    NoMatch(String),

    #[error("invalid search domain: {0}")]
    InvalidDomain(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Classification used to pick the corrective prompt.
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            StoreError::UnknownModel(_) => ToolErrorKind::ModelNotFound,
            StoreError::UnknownField { .. } => ToolErrorKind::FieldNotFound,
            StoreError::TypeMismatch { .. } => ToolErrorKind::TypeMismatch,
            _ => ToolErrorKind::Other,
        }
    }
}

impl From<StoreError> for rb_domain::error::Error {
    fn from(e: StoreError) -> Self {
        rb_domain::error::Error::Store(e.to_string())
    }
}

/// Failure classes a tool round can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    ModelNotFound,
    FieldNotFound,
    TypeMismatch,
    Other,
}

impl ToolErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolErrorKind::ModelNotFound => "model_not_found",
            ToolErrorKind::FieldNotFound => "field_not_found",
            ToolErrorKind::TypeMismatch => "type_mismatch",
            ToolErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Field metadata
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Char,
    Text,
    Html,
    Integer,
    Float,
    Monetary,
    Boolean,
    Date,
    Datetime,
    Selection,
    Many2one,
    One2many,
    Many2many,
    #[serde(other)]
    Other,
}

impl FieldType {
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            FieldType::Many2one | FieldType::One2many | FieldType::Many2many
        )
    }

    pub fn is_x2many(&self) -> bool {
        matches!(self, FieldType::One2many | FieldType::Many2many)
    }
}

/// Description of one field, as reported by `describe_fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Human label ("Customer", "Order Date").
    pub string: String,
    /// Target model of a relational field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    /// `(technical value, display label)` pairs of a selection field.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selection: Vec<(String, String)>,
    #[serde(default)]
    pub required: bool,
}

impl FieldMeta {
    pub fn new(field_type: FieldType, string: impl Into<String>) -> Self {
        Self {
            field_type,
            string: string.into(),
            relation: None,
            selection: Vec::new(),
            required: false,
        }
    }

    pub fn relation(mut self, model: impl Into<String>) -> Self {
        self.relation = Some(model.into());
        self
    }

    /// Display label of a selection value, if it is one of the options.
    pub fn selection_label(&self, value: &str) -> Option<&str> {
        self.selection
            .iter()
            .find(|(tech, _)| tech == value)
            .map(|(_, label)| label.as_str())
    }
}

/// A model known to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Technical name, e.g. `sale.order`.
    pub model: String,
    /// Human description, e.g. `Sales Order`.
    pub label: String,
}

/// Handle of a transaction checkpoint opened with [`RecordStore::savepoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Savepoint(pub u64);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Generic record store the record tools run against.
///
/// Implementations are expected to validate model and field names and
/// report problems through the typed [`StoreError`] variants, since the
/// variant decides which corrective prompt the assistant sends back.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Search `model` with a parsed domain and return the requested fields
    /// of every match (the `id` is always included).
    async fn search_read(
        &self,
        model: &str,
        fields: &[String],
        domain: &[DomainTerm],
        limit: Option<usize>,
        order: Option<&str>,
    ) -> StoreResult<Vec<Record>>;

    /// Create one record and return its id.
    async fn create(&self, model: &str, values: &Record) -> StoreResult<i64>;

    /// Write `values` onto an existing record.
    async fn write(&self, model: &str, id: i64, values: &Record) -> StoreResult<()>;

    /// Field metadata of `model`, keyed by technical field name.
    async fn describe_fields(&self, model: &str) -> StoreResult<BTreeMap<String, FieldMeta>>;

    /// Every model the store knows about.
    async fn list_models(&self) -> StoreResult<Vec<ModelInfo>>;

    async fn savepoint(&self) -> StoreResult<Savepoint>;

    /// Undo every change made since `sp` was opened and close it.
    async fn rollback_to(&self, sp: Savepoint) -> StoreResult<()>;

    /// Keep the changes made since `sp` was opened and close it.
    async fn release(&self, sp: Savepoint) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds() {
        assert_eq!(
            StoreError::UnknownModel("x.y".into()).kind(),
            ToolErrorKind::ModelNotFound
        );
        assert_eq!(
            StoreError::UnknownField {
                model: "res.partner".into(),
                field: "nope".into()
            }
            .kind(),
            ToolErrorKind::FieldNotFound
        );
        assert_eq!(
            StoreError::Constraint("not-null".into()).kind(),
            ToolErrorKind::Other
        );
        assert_eq!(
            StoreError::InvalidDomain("bad".into()).kind(),
            ToolErrorKind::Other
        );
    }

    #[test]
    fn field_meta_deserializes_selection_pairs() {
        let meta: FieldMeta = serde_json::from_value(serde_json::json!({
            "type": "selection",
            "string": "Status",
            "selection": [["draft", "Quotation"], ["sale", "Sales Order"]]
        }))
        .unwrap();
        assert_eq!(meta.field_type, FieldType::Selection);
        assert_eq!(meta.selection_label("sale"), Some("Sales Order"));
        assert_eq!(meta.selection_label("cancel"), None);
    }

    #[test]
    fn unrecognised_field_type_is_other() {
        let meta: FieldMeta =
            serde_json::from_value(serde_json::json!({"type": "binary", "string": "Image"}))
                .unwrap();
        assert_eq!(meta.field_type, FieldType::Other);
    }
}
