//! Tool schema exposed to the model and the typed form of its calls.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::{json, Value};

use rb_domain::tool::{ToolCall, ToolDefinition};

use crate::store::{StoreError, StoreResult};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool kinds
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Read,
    Create,
    Update,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [ToolKind::Read, ToolKind::Create, ToolKind::Update];

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::Read => "read_record",
            ToolKind::Create => "create_record",
            ToolKind::Update => "update_record",
        }
    }
}

impl FromStr for ToolKind {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        ToolKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| StoreError::InvalidArguments(format!("unknown tool '{s}'")))
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Arguments
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Deserialize)]
pub struct ReadArgs {
    pub model: String,
    #[serde(default)]
    pub field: Vec<String>,
    /// Raw domain; normalized before parsing.
    #[serde(default)]
    pub search_domains: Value,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub order: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateArgs {
    pub model: String,
    /// One mapping or a list of mappings.
    pub values: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateArgs {
    pub model: String,
    #[serde(default)]
    pub field: Vec<String>,
    /// A list whose first item is the mapping to write, or the mapping itself.
    pub field_to_update: Value,
    #[serde(default)]
    pub search_domains: Value,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// A parsed tool call.
#[derive(Debug, Clone)]
pub enum ToolInvocation {
    Read(ReadArgs),
    Create(CreateArgs),
    Update(UpdateArgs),
}

/// Why a tool call could not be turned into a [`ToolInvocation`].
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentError {
    /// The argument text is not valid JSON or does not fit the schema.
    Json(String),
    /// Unknown tool name.
    UnknownTool(String),
}

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentError::Json(msg) => write!(f, "JSON Error: {msg}"),
            ArgumentError::UnknownTool(name) => write!(f, "unknown tool '{name}'"),
        }
    }
}

impl ToolInvocation {
    /// Parse a raw provider tool call. Also returns the `model` argument
    /// when it could be read, for use in corrective prompts.
    pub fn parse(call: &ToolCall) -> Result<Self, (ArgumentError, Option<String>)> {
        let args: Value = serde_json::from_str(&call.arguments)
            .map_err(|e| (ArgumentError::Json(e.to_string()), None))?;
        let model = args.get("model").and_then(Value::as_str).map(str::to_owned);

        let kind: ToolKind = call
            .tool_name
            .parse()
            .map_err(|_| (ArgumentError::UnknownTool(call.tool_name.clone()), model.clone()))?;

        let json_err = |e: serde_json::Error| (ArgumentError::Json(e.to_string()), model.clone());
        let inv = match kind {
            ToolKind::Read => ToolInvocation::Read(serde_json::from_value(args).map_err(json_err)?),
            ToolKind::Create => {
                ToolInvocation::Create(serde_json::from_value(args).map_err(json_err)?)
            }
            ToolKind::Update => {
                ToolInvocation::Update(serde_json::from_value(args).map_err(json_err)?)
            }
        };
        Ok(inv)
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            ToolInvocation::Read(_) => ToolKind::Read,
            ToolInvocation::Create(_) => ToolKind::Create,
            ToolInvocation::Update(_) => ToolKind::Update,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ToolInvocation::Read(a) => &a.model,
            ToolInvocation::Create(a) => &a.model,
            ToolInvocation::Update(a) => &a.model,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Schema
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn domain_schema(description: &str) -> Value {
    json!({
        "type": "array",
        "items": {
            "type": ["array", "string"],
            "items": { "type": ["string", "number", "boolean", "array"] }
        },
        "description": description,
        "default": []
    })
}

/// Definitions of the three record tools, sent with every loop request.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: ToolKind::Read.name().into(),
            description: "Read one or more records of a model, filtered by search domains.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "model": { "type": "string", "description": "Technical name of the model, e.g. sale.order" },
                    "field": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Field names to read"
                    },
                    "search_domains": domain_schema(
                        "Search domain in prefix notation. Each condition is a list [field, operator, value], \
                         e.g. [[\"name\", \"=\", \"Mark Cheng\"], [\"phone\", \"=\", \"123\"]]. \
                         Conditions may be combined with '&', '|' and '!'."
                    ),
                    "limit": { "type": "integer", "description": "Maximum number of records to return" },
                    "order": { "type": "string", "description": "Sort specification, e.g. date_order desc" }
                },
                "required": ["model", "field"]
            }),
        },
        ToolDefinition {
            name: ToolKind::Create.name().into(),
            description: "Create new records of a model with the given field values.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "model": { "type": "string", "description": "Technical name of the model" },
                    "values": {
                        "type": "array",
                        "items": { "type": "object" },
                        "description": "One mapping of field name to value per record to create, \
                                        e.g. [{\"name\": \"Mark Cheng\", \"phone\": \"9993336666\"}]"
                    }
                },
                "required": ["model", "values"]
            }),
        },
        ToolDefinition {
            name: ToolKind::Update.name().into(),
            description: "Update an existing record. The record is located with the search domain; \
                          the first match is updated."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "model": { "type": "string", "description": "Technical name of the model" },
                    "field": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Field names used to locate the record"
                    },
                    "field_to_update": {
                        "type": "array",
                        "items": { "type": "object" },
                        "description": "A single mapping of the fields to change, e.g. [{\"phone\": \"9993336666\"}]"
                    },
                    "search_domains": domain_schema(
                        "Search domain in prefix notation locating the record to update"
                    ),
                    "limit": { "type": "integer", "description": "Maximum number of candidate records" }
                },
                "required": ["model", "field", "field_to_update"]
            }),
        },
    ]
}
