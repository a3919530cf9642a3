//! In-memory record store loaded from a JSON fixture.
//!
//! Fixture layout:
//!
//! ```json
//! { "models": { "res.partner": {
//!     "label": "Contact",
//!     "fields": { "name": { "type": "char", "string": "Name", "required": true } },
//!     "records": [ { "id": 1, "name": "Azure Interior" } ]
//! } } }
//! ```
//!
//! Many2one values are stored as bare ids and rendered as `[id, name]` on
//! read; x2many values are stored as id lists.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use rb_domain::error::{Error, Result};

use crate::domain::{build_expr, Condition, DomainExpr, DomainTerm, Operator};
use crate::store::{
    FieldMeta, FieldType, ModelInfo, Record, RecordStore, Savepoint, StoreError, StoreResult,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fixture
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub models: BTreeMap<String, ModelData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelData {
    pub label: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldMeta>,
    #[serde(default)]
    pub records: Vec<Record>,
}

impl Fixture {
    fn model(&self, name: &str) -> StoreResult<&ModelData> {
        self.models
            .get(name)
            .ok_or_else(|| StoreError::UnknownModel(name.to_owned()))
    }

    fn find(&self, model: &str, id: i64) -> Option<&Record> {
        self.models
            .get(model)?
            .records
            .iter()
            .find(|r| record_id(r) == Some(id))
    }

    fn display_name(&self, model: &str, rec: &Record) -> String {
        rec.get("name")
            .and_then(Value::as_str)
            .or_else(|| rec.get("display_name").and_then(Value::as_str))
            .map(str::to_owned)
            .unwrap_or_else(|| format!("{model},{}", record_id(rec).unwrap_or_default()))
    }

    fn display_of(&self, model: &str, id: i64) -> String {
        match self.find(model, id) {
            Some(rec) => self.display_name(model, rec),
            None => format!("{model},{id}"),
        }
    }
}

fn record_id(rec: &Record) -> Option<i64> {
    rec.get("id").and_then(Value::as_i64)
}

fn is_unset(v: &Value) -> bool {
    matches!(v, Value::Null | Value::Bool(false))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct MemoryRecordStore {
    data: RwLock<Fixture>,
    savepoints: Mutex<Vec<(u64, Fixture)>>,
    next_savepoint: AtomicU64,
    path: Option<PathBuf>,
}

impl MemoryRecordStore {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            data: RwLock::new(fixture),
            savepoints: Mutex::new(Vec::new()),
            next_savepoint: AtomicU64::new(1),
            path: None,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(raw)?))
    }

    /// Load the fixture at `path`. [`save`](Self::save) writes back to it.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Store(format!("cannot read records file {}: {e}", path.display()))
        })?;
        let mut store = Self::from_json(&raw)?;
        store.path = Some(path.to_path_buf());
        tracing::debug!(
            path = %path.display(),
            models = store.data.read().models.len(),
            "record fixture loaded"
        );
        Ok(store)
    }

    /// Write the current state back to the file it was loaded from.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&*self.data.read())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn fixture(&self) -> Fixture {
        self.data.read().clone()
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryRecordStore {
    async fn search_read(
        &self,
        model: &str,
        fields: &[String],
        domain: &[DomainTerm],
        limit: Option<usize>,
        order: Option<&str>,
    ) -> StoreResult<Vec<Record>> {
        let data = self.data.read();
        let md = data.model(model)?;
        for f in fields {
            check_field(model, md, f)?;
        }
        let expr = build_expr(domain)?;
        let order = parse_order(model, md, order)?;

        let mut hits = Vec::new();
        for rec in &md.records {
            let keep = match &expr {
                Some(e) => eval(&data, model, md, rec, e)?,
                None => true,
            };
            if keep {
                hits.push(rec);
            }
        }

        hits.sort_by(|a, b| {
            for (field, desc) in &order {
                let va = render(&data, model, md, a, field);
                let vb = render(&data, model, md, b, field);
                let ord = sort_cmp(&va, &vb);
                let ord = if *desc { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            record_id(a).cmp(&record_id(b))
        });

        let take = limit.unwrap_or(usize::MAX);
        Ok(hits
            .into_iter()
            .take(take)
            .map(|rec| {
                let mut out = Record::new();
                out.insert("id".into(), Value::from(record_id(rec).unwrap_or_default()));
                for f in fields {
                    out.insert(f.clone(), render(&data, model, md, rec, f));
                }
                out
            })
            .collect())
    }

    async fn create(&self, model: &str, values: &Record) -> StoreResult<i64> {
        let mut data = self.data.write();
        let md = data.model(model)?;

        let mut rec = Record::new();
        for (field, value) in values {
            let stored = coerce(&data, model, md, field, value, None)?;
            rec.insert(field.clone(), stored);
        }
        check_required(model, md, &rec)?;

        let id = md.records.iter().filter_map(record_id).max().unwrap_or(0) + 1;
        rec.insert("id".into(), Value::from(id));

        if let Some(md) = data.models.get_mut(model) {
            md.records.push(rec);
        }
        tracing::debug!(model, id, "record created");
        Ok(id)
    }

    async fn write(&self, model: &str, id: i64, values: &Record) -> StoreResult<()> {
        let mut data = self.data.write();
        let md = data.model(model)?;
        let current = data
            .find(model, id)
            .ok_or_else(|| {
                StoreError::Other(format!(
                    "Record does not exist or has been deleted. (Record: {model}({id},))"
                ))
            })?
            .clone();

        let mut updated = current.clone();
        for (field, value) in values {
            let stored = coerce(&data, model, md, field, value, current.get(field))?;
            updated.insert(field.clone(), stored);
        }
        check_required(model, md, &updated)?;

        if let Some(slot) = data
            .models
            .get_mut(model)
            .and_then(|md| md.records.iter_mut().find(|r| record_id(r) == Some(id)))
        {
            *slot = updated;
        }
        tracing::debug!(model, id, fields = values.len(), "record written");
        Ok(())
    }

    async fn describe_fields(&self, model: &str) -> StoreResult<BTreeMap<String, FieldMeta>> {
        Ok(self.data.read().model(model)?.fields.clone())
    }

    async fn list_models(&self) -> StoreResult<Vec<ModelInfo>> {
        Ok(self
            .data
            .read()
            .models
            .iter()
            .map(|(model, md)| ModelInfo {
                model: model.clone(),
                label: md.label.clone(),
            })
            .collect())
    }

    async fn savepoint(&self) -> StoreResult<Savepoint> {
        let id = self.next_savepoint.fetch_add(1, AtomicOrdering::Relaxed);
        let snapshot = self.data.read().clone();
        self.savepoints.lock().push((id, snapshot));
        Ok(Savepoint(id))
    }

    async fn rollback_to(&self, sp: Savepoint) -> StoreResult<()> {
        let mut stack = self.savepoints.lock();
        let pos = stack
            .iter()
            .position(|(id, _)| *id == sp.0)
            .ok_or_else(|| StoreError::Other(format!("unknown savepoint {}", sp.0)))?;
        let (_, snapshot) = stack.swap_remove(pos);
        stack.truncate(pos);
        *self.data.write() = snapshot;
        Ok(())
    }

    async fn release(&self, sp: Savepoint) -> StoreResult<()> {
        let mut stack = self.savepoints.lock();
        let pos = stack
            .iter()
            .position(|(id, _)| *id == sp.0)
            .ok_or_else(|| StoreError::Other(format!("unknown savepoint {}", sp.0)))?;
        stack.truncate(pos);
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Field access
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn check_field<'a>(model: &str, md: &'a ModelData, field: &str) -> StoreResult<Option<&'a FieldMeta>> {
    match field {
        "id" | "display_name" => Ok(None),
        _ => md
            .fields
            .get(field)
            .map(Some)
            .ok_or_else(|| StoreError::UnknownField {
                model: model.to_owned(),
                field: field.to_owned(),
            }),
    }
}

/// Read-side value of `field`: many2one → `[id, name]`, unset → `false`.
fn render(data: &Fixture, model: &str, md: &ModelData, rec: &Record, field: &str) -> Value {
    match field {
        "id" => return Value::from(record_id(rec).unwrap_or_default()),
        "display_name" => return Value::from(data.display_name(model, rec)),
        _ => {}
    }
    let raw = rec.get(field).cloned().unwrap_or(Value::Null);
    let Some(meta) = md.fields.get(field) else {
        return raw;
    };
    match meta.field_type {
        FieldType::Many2one => match (raw.as_i64(), &meta.relation) {
            (Some(id), Some(rel)) => Value::Array(vec![id.into(), data.display_of(rel, id).into()]),
            _ => Value::Bool(false),
        },
        FieldType::One2many | FieldType::Many2many => match raw {
            Value::Array(_) => raw,
            _ => Value::Array(Vec::new()),
        },
        _ if raw.is_null() => Value::Bool(false),
        _ => raw,
    }
}

fn check_required(model: &str, md: &ModelData, rec: &Record) -> StoreResult<()> {
    for (field, meta) in &md.fields {
        if !meta.required || meta.field_type == FieldType::Boolean {
            continue;
        }
        let missing = match rec.get(field) {
            None => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(v) => is_unset(v),
        };
        if missing {
            return Err(StoreError::Constraint(format!(
                "null value in column \"{field}\" of relation \"{}\" violates not-null constraint",
                model.replace('.', "_")
            )));
        }
    }
    Ok(())
}

/// Validate an incoming value and convert it to its stored form.
fn coerce(
    data: &Fixture,
    model: &str,
    md: &ModelData,
    field: &str,
    value: &Value,
    current: Option<&Value>,
) -> StoreResult<Value> {
    if field == "id" || field == "display_name" {
        return Err(StoreError::Constraint(format!(
            "field '{field}' of {model} is read-only"
        )));
    }
    let meta = check_field(model, md, field)?.ok_or_else(|| StoreError::UnknownField {
        model: model.to_owned(),
        field: field.to_owned(),
    })?;
    let mismatch = |message: String| StoreError::TypeMismatch {
        model: model.to_owned(),
        field: field.to_owned(),
        message,
    };

    if meta.field_type == FieldType::Boolean {
        return match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::Null => Ok(Value::Bool(false)),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            other => Err(mismatch(format!("expected a boolean, got {other}"))),
        };
    }
    if is_unset(value) {
        return Ok(match meta.field_type {
            t if t.is_x2many() => Value::Array(Vec::new()),
            _ => Value::Null,
        });
    }

    match meta.field_type {
        FieldType::Char | FieldType::Text | FieldType::Html | FieldType::Date | FieldType::Datetime => {
            match value {
                Value::String(_) => Ok(value.clone()),
                other => Err(mismatch(format!("expected a string, got {other}"))),
            }
        }
        FieldType::Selection => {
            let s = value
                .as_str()
                .ok_or_else(|| mismatch(format!("expected a selection key, got {value}")))?;
            if meta.selection.iter().any(|(k, _)| k == s) {
                Ok(value.clone())
            } else {
                let keys: Vec<&str> = meta.selection.iter().map(|(k, _)| k.as_str()).collect();
                Err(mismatch(format!("'{s}' is not one of {keys:?}")))
            }
        }
        FieldType::Integer => as_int(value)
            .map(Value::from)
            .ok_or_else(|| mismatch(format!("expected an integer, got {value}"))),
        FieldType::Float | FieldType::Monetary => as_float(value)
            .map(Value::from)
            .ok_or_else(|| mismatch(format!("expected a number, got {value}"))),
        FieldType::Many2one => {
            let id = match value {
                Value::Array(items) => items.first().and_then(as_int),
                other => as_int(other),
            }
            .ok_or_else(|| mismatch(format!("expected a record id, got {value}")))?;
            ensure_exists(data, meta, id)?;
            Ok(Value::from(id))
        }
        FieldType::One2many | FieldType::Many2many => {
            let ids = apply_x2many(value, current).map_err(mismatch)?;
            for id in &ids {
                ensure_exists(data, meta, *id)?;
            }
            Ok(Value::from(ids))
        }
        FieldType::Boolean | FieldType::Other => Ok(value.clone()),
    }
}

fn ensure_exists(data: &Fixture, meta: &FieldMeta, id: i64) -> StoreResult<()> {
    let Some(rel) = &meta.relation else {
        return Ok(());
    };
    if data.models.contains_key(rel) && data.find(rel, id).is_none() {
        return Err(StoreError::Constraint(format!(
            "Record does not exist or has been deleted. (Record: {rel}({id},))"
        )));
    }
    Ok(())
}

fn as_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_float(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Plain id lists replace the value. Command lists are applied to the
/// current ids: `[6, 0, ids]` replace, `[4, id]` link, `[3, id]` unlink,
/// `[5]` clear.
fn apply_x2many(value: &Value, current: Option<&Value>) -> std::result::Result<Vec<i64>, String> {
    let items = match value {
        Value::Array(items) => items,
        other => return as_int(other).map(|id| vec![id]).ok_or_else(|| format!("expected a list of ids, got {other}")),
    };
    if items.iter().all(|v| as_int(v).is_some()) {
        return Ok(items.iter().filter_map(as_int).collect());
    }

    let mut ids: Vec<i64> = current
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(as_int).collect())
        .unwrap_or_default();
    for cmd in items {
        let parts = cmd
            .as_array()
            .ok_or_else(|| format!("expected an id or command, got {cmd}"))?;
        match parts.first().and_then(as_int) {
            Some(6) => {
                ids = parts
                    .get(2)
                    .and_then(Value::as_array)
                    .map(|a| a.iter().filter_map(as_int).collect())
                    .unwrap_or_default();
            }
            Some(4) => {
                if let Some(id) = parts.get(1).and_then(as_int) {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
            Some(3) => {
                if let Some(id) = parts.get(1).and_then(as_int) {
                    ids.retain(|x| *x != id);
                }
            }
            Some(5) => ids.clear(),
            _ => return Err(format!("unsupported relation command {cmd}")),
        }
    }
    Ok(ids)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Domain evaluation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn eval(data: &Fixture, model: &str, md: &ModelData, rec: &Record, expr: &DomainExpr) -> StoreResult<bool> {
    Ok(match expr {
        DomainExpr::And(a, b) => eval(data, model, md, rec, a)? && eval(data, model, md, rec, b)?,
        DomainExpr::Or(a, b) => eval(data, model, md, rec, a)? || eval(data, model, md, rec, b)?,
        DomainExpr::Not(a) => !eval(data, model, md, rec, a)?,
        DomainExpr::Leaf(cond) => eval_leaf(data, model, md, rec, cond)?,
    })
}

fn eval_leaf(data: &Fixture, model: &str, md: &ModelData, rec: &Record, cond: &Condition) -> StoreResult<bool> {
    let candidates = resolve_path(data, model, md, rec, &cond.field)?;
    let (op, negate) = match cond.operator {
        Operator::Ne => (Operator::Eq, true),
        Operator::NotIn => (Operator::In, true),
        Operator::NotLike => (Operator::Like, true),
        Operator::NotILike => (Operator::ILike, true),
        other => (other, false),
    };
    let hit = candidates.iter().any(|lhs| compare(op, lhs, &cond.value));
    Ok(hit != negate)
}

/// Values of a (possibly dotted) field path. Relational hops fan out, so
/// the result is every value reachable along the path.
fn resolve_path(data: &Fixture, model: &str, md: &ModelData, rec: &Record, path: &str) -> StoreResult<Vec<Value>> {
    let (head, rest) = match path.split_once('.') {
        Some((h, r)) => (h, Some(r)),
        None => (path, None),
    };
    let meta = check_field(model, md, head)?;
    let value = render(data, model, md, rec, head);

    let Some(rest) = rest else {
        return Ok(match (meta.map(|m| m.field_type), value) {
            (Some(t), Value::Array(ids)) if t.is_x2many() => {
                if ids.is_empty() {
                    vec![Value::Bool(false)]
                } else {
                    ids
                }
            }
            (_, v) => vec![v],
        });
    };

    let Some(rel) = meta.filter(|m| m.field_type.is_relational()).and_then(|m| m.relation.as_deref()) else {
        return Err(StoreError::InvalidDomain(format!(
            "'{head}' on {model} is not a relational field"
        )));
    };
    let ids: Vec<i64> = match &value {
        Value::Array(items) if meta.is_some_and(|m| m.field_type == FieldType::Many2one) => {
            items.first().and_then(Value::as_i64).into_iter().collect()
        }
        Value::Array(items) => items.iter().filter_map(Value::as_i64).collect(),
        _ => Vec::new(),
    };
    let rel_md = data.model(rel)?;
    let mut out = Vec::new();
    for id in ids {
        if let Some(sub) = data.find(rel, id) {
            out.extend(resolve_path(data, rel, rel_md, sub, rest)?);
        }
    }
    if out.is_empty() {
        out.push(Value::Bool(false));
    }
    Ok(out)
}

fn compare(op: Operator, lhs: &Value, rhs: &Value) -> bool {
    match op {
        Operator::Eq => values_eq(lhs, rhs),
        Operator::In => match rhs {
            Value::Array(items) => items.iter().any(|r| values_eq(lhs, r)),
            other => values_eq(lhs, other),
        },
        Operator::Lt => value_cmp(lhs, rhs) == Some(Ordering::Less),
        Operator::Gt => value_cmp(lhs, rhs) == Some(Ordering::Greater),
        Operator::Le => matches!(value_cmp(lhs, rhs), Some(Ordering::Less | Ordering::Equal)),
        Operator::Ge => matches!(value_cmp(lhs, rhs), Some(Ordering::Greater | Ordering::Equal)),
        Operator::Like | Operator::ILike | Operator::EqLike | Operator::EqILike => {
            let (Some(text), Some(pattern)) = (text_of(lhs), text_of(rhs)) else {
                return false;
            };
            let pattern = match op {
                Operator::Like | Operator::ILike => format!("%{pattern}%"),
                _ => pattern,
            };
            like_match(&text, &pattern, matches!(op, Operator::ILike | Operator::EqILike))
        }
        // Negated operators are rewritten by the caller.
        Operator::Ne | Operator::NotIn | Operator::NotLike | Operator::NotILike => false,
    }
}

/// Many2one values are `[id, name]`: numbers compare against the id and
/// strings against the name.
fn m2o_parts(v: &Value) -> Option<(i64, &str)> {
    match v.as_array()?.as_slice() {
        [Value::Number(id), Value::String(name)] => Some((id.as_i64()?, name.as_str())),
        _ => None,
    }
}

fn values_eq(lhs: &Value, rhs: &Value) -> bool {
    if is_unset(rhs) {
        return is_unset(lhs);
    }
    if let Some((id, name)) = m2o_parts(lhs) {
        return match rhs {
            Value::String(s) => name == s,
            other => as_int(other) == Some(id),
        };
    }
    match (lhs, rhs) {
        (Value::Number(_), _) | (_, Value::Number(_)) => match (as_float(lhs), as_float(rhs)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        _ => lhs == rhs,
    }
}

fn value_cmp(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    if is_unset(lhs) || is_unset(rhs) {
        return None;
    }
    if let Some((id, name)) = m2o_parts(lhs) {
        return match rhs {
            Value::String(s) => Some(name.cmp(s.as_str())),
            other => as_int(other).map(|r| id.cmp(&r)),
        };
    }
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => as_float(lhs)?.partial_cmp(&as_float(rhs)?),
    }
}

fn text_of(v: &Value) -> Option<String> {
    if let Some((_, name)) = m2o_parts(v) {
        return Some(name.to_owned());
    }
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// SQL `LIKE` matching: `%` any run, `_` any single character.
fn like_match(text: &str, pattern: &str, case_insensitive: bool) -> bool {
    let mut re = String::from(if case_insensitive { "(?is)^" } else { "(?s)^" });
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    regex::Regex::new(&re).is_ok_and(|r| r.is_match(text))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ordering
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_order(model: &str, md: &ModelData, order: Option<&str>) -> StoreResult<Vec<(String, bool)>> {
    let mut keys = Vec::new();
    for part in order.unwrap_or_default().split(',') {
        let mut words = part.split_whitespace();
        let Some(field) = words.next() else {
            continue;
        };
        let desc = match words.next().map(str::to_lowercase).as_deref() {
            None | Some("asc") => false,
            Some("desc") => true,
            Some(other) => {
                return Err(StoreError::InvalidArguments(format!(
                    "invalid order direction '{other}'"
                )))
            }
        };
        check_field(model, md, field)?;
        keys.push((field.to_owned(), desc));
    }
    Ok(keys)
}

/// Total order for sorting: unset < booleans < numbers < text.
fn sort_cmp(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null | Value::Bool(false) => 0,
            Value::Bool(true) => 1,
            Value::Number(_) => 2,
            _ => 3,
        }
    }
    let (a, b) = (
        m2o_parts(a).map(|(_, n)| Value::from(n)).unwrap_or_else(|| a.clone()),
        m2o_parts(b).map(|(_, n)| Value::from(n)).unwrap_or_else(|| b.clone()),
    );
    match (&a, &b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(&a).cmp(&rank(&b)),
    }
}
