//! Record tool adapter: runs parsed tool calls against a [`RecordStore`]
//! inside a savepoint and reports typed failures.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use rb_domain::tool::ToolCall;
use rb_domain::trace::TraceEvent;

use crate::domain::{normalize_domain, parse_domain};
use crate::store::{Record, RecordStore, StoreError, StoreResult, ToolErrorKind};
use crate::tools::{ArgumentError, CreateArgs, ReadArgs, ToolInvocation, UpdateArgs};

/// Outcome of a failed tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolFailure {
    pub kind: ToolErrorKind,
    /// The `model` argument, when it could be read.
    pub model: Option<String>,
    /// Text returned to the model as the function result.
    pub message: String,
}

impl ToolFailure {
    fn from_store(err: StoreError, model: &str) -> Self {
        Self {
            kind: err.kind(),
            model: Some(model.to_owned()),
            message: err.to_string(),
        }
    }

    fn from_arguments(err: ArgumentError, model: Option<String>) -> Self {
        Self {
            kind: ToolErrorKind::Other,
            model,
            message: err.to_string(),
        }
    }
}

/// Executes `read_record`, `create_record` and `update_record`.
#[derive(Clone)]
pub struct RecordTools {
    store: Arc<dyn RecordStore>,
}

impl RecordTools {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Run one tool call. On success returns the stringified result that
    /// goes back to the model as the function result.
    pub async fn invoke(&self, call: &ToolCall) -> Result<String, ToolFailure> {
        let start = Instant::now();
        let result = match ToolInvocation::parse(call) {
            Ok(inv) => self.run_in_savepoint(&inv).await,
            Err((err, model)) => Err(ToolFailure::from_arguments(err, model)),
        };

        let (model, error_kind) = match &result {
            Ok(_) => (None, None),
            Err(f) => (f.model.clone(), Some(f.kind.to_string())),
        };
        TraceEvent::ToolInvoked {
            tool: call.tool_name.clone(),
            model,
            ok: result.is_ok(),
            error_kind,
            duration_ms: start.elapsed().as_millis() as u64,
        }
        .emit();

        match &result {
            Ok(_) => tracing::info!(tool = %call.tool_name, "record tool succeeded"),
            Err(f) => tracing::warn!(
                tool = %call.tool_name,
                kind = %f.kind,
                error = %f.message,
                "record tool failed"
            ),
        }
        result
    }

    async fn run_in_savepoint(&self, inv: &ToolInvocation) -> Result<String, ToolFailure> {
        let model = inv.model();
        let sp = self
            .store
            .savepoint()
            .await
            .map_err(|e| ToolFailure::from_store(e, model))?;

        let outcome = match inv {
            ToolInvocation::Read(args) => self.read_record(args).await.and_then(|rows| {
                serde_json::to_string(&rows).map_err(|e| StoreError::Other(e.to_string()))
            }),
            ToolInvocation::Create(args) => self
                .create_record(args)
                .await
                .map(|ids| Value::from(ids).to_string()),
            ToolInvocation::Update(args) => self.update_record(args).await.map(|()| "true".into()),
        };

        match outcome {
            Ok(text) => {
                self.store
                    .release(sp)
                    .await
                    .map_err(|e| ToolFailure::from_store(e, model))?;
                Ok(text)
            }
            Err(err) => {
                if let Err(rb) = self.store.rollback_to(sp).await {
                    tracing::error!(error = %rb, "savepoint rollback failed");
                }
                Err(ToolFailure::from_store(err, model))
            }
        }
    }

    // ── Operations ─────────────────────────────────────────────────

    /// Search and read. `name` (or `display_name` when the model has no
    /// `name` field) is always added to the requested fields.
    pub async fn read_record(&self, args: &ReadArgs) -> StoreResult<Vec<Record>> {
        let available = self.store.describe_fields(&args.model).await?;
        let mut fields = args.field.clone();
        if !fields.iter().any(|f| f == "name") {
            let label = if available.contains_key("name") {
                "name"
            } else {
                "display_name"
            };
            if !fields.iter().any(|f| f == label) {
                fields.push(label.to_owned());
            }
        }

        let domain = parse_domain(&normalize_domain(&args.search_domains))?;
        let limit = args.limit.filter(|&n| n > 0);
        self.store
            .search_read(&args.model, &fields, &domain, limit, args.order.as_deref())
            .await
    }

    /// Create one record per mapping and return the new ids in order.
    pub async fn create_record(&self, args: &CreateArgs) -> StoreResult<Vec<i64>> {
        let batch = match &args.values {
            Value::Array(items) => items.iter().map(as_mapping).collect::<StoreResult<Vec<_>>>()?,
            other => vec![as_mapping(other)?],
        };
        if batch.is_empty() {
            return Err(StoreError::InvalidArguments(
                "values must contain at least one mapping".into(),
            ));
        }

        let mut ids = Vec::with_capacity(batch.len());
        for values in &batch {
            ids.push(self.store.create(&args.model, values).await?);
        }
        Ok(ids)
    }

    /// Locate the record with a read and write the new values onto the
    /// first match. Further matches are left untouched.
    pub async fn update_record(&self, args: &UpdateArgs) -> StoreResult<()> {
        let values = match &args.field_to_update {
            Value::Array(items) => match items.first() {
                Some(first) => as_mapping(first)?,
                None => {
                    return Err(StoreError::InvalidArguments(
                        "field_to_update must contain a mapping".into(),
                    ))
                }
            },
            other => as_mapping(other)?,
        };

        let rows = self
            .read_record(&ReadArgs {
                model: args.model.clone(),
                field: args.field.clone(),
                search_domains: args.search_domains.clone(),
                limit: args.limit,
                order: None,
            })
            .await?;

        let id = rows
            .first()
            .and_then(|r| r.get("id"))
            .and_then(Value::as_i64)
            .ok_or_else(|| StoreError::NoMatch(args.model.clone()))?;

        if rows.len() > 1 {
            tracing::debug!(
                model = %args.model,
                matches = rows.len(),
                id,
                "update matched several records, writing the first"
            );
        }
        self.store.write(&args.model, id, &values).await
    }
}

/// Accept a JSON object, or a string holding one.
fn as_mapping(value: &Value) -> StoreResult<Record> {
    match value {
        Value::Object(map) => Ok(map.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(StoreError::InvalidArguments(format!(
                "expected a mapping of field names to values, got \"{s}\""
            ))),
        },
        other => Err(StoreError::InvalidArguments(format!(
            "expected a mapping of field names to values, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mapping_from_object_or_string() {
        assert_eq!(as_mapping(&json!({"name": "A"})).unwrap()["name"], "A");
        assert_eq!(as_mapping(&json!("{\"name\": \"B\"}")).unwrap()["name"], "B");
        assert!(matches!(
            as_mapping(&json!(42)),
            Err(StoreError::InvalidArguments(_))
        ));
    }

    #[test]
    fn argument_failures_are_other() {
        let f = ToolFailure::from_arguments(ArgumentError::Json("eof".into()), None);
        assert_eq!(f.kind, ToolErrorKind::Other);
        assert_eq!(f.message, "JSON Error: eof");
    }

    #[test]
    fn store_failures_keep_kind_and_model() {
        let f = ToolFailure::from_store(StoreError::UnknownModel("sale.ordr".into()), "sale.ordr");
        assert_eq!(f.kind, ToolErrorKind::ModelNotFound);
        assert_eq!(f.model.as_deref(), Some("sale.ordr"));
    }
}
