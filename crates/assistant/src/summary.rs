//! Field summarizer: renders one record as the text block the summary
//! prompt wraps, for messages posted in a record's chatter.

use rb_domain::config::ModelTier;
use rb_domain::tool::Message;
use rb_providers::ChatRequest;
use rb_records::{
    Condition, DomainTerm, FieldMeta, FieldType, Operator, RecordStore, StoreError,
    StoreResult,
};
use serde_json::Value;

use crate::prompts;

/// Fields whose label is in this list never appear in a summary.
const IGNORED_FIELDS: [&str; 4] = ["Followers", "Followers (Partners)", "Messages", "Website Messages"];

/// Related models whose records are expanded inline, with the sub-fields
/// shown for each.
pub const RELATIONAL_BINDINGS: &[(&str, &[&str])] = &[
    ("res.partner", &["name"]),
    ("res.users", &["name"]),
    ("sale.order.line", &["name", "qty_to_deliver", "price_unit"]),
    ("account.move.line", &["name", "quantity", "price_unit", "price_subtotal"]),
    (
        "stock.move",
        &["display_name", "product_id", "product_uom_qty", "forecast_availability", "quantity_done"],
    ),
    ("product.product", &["name", "lst_price", "standard_price", "detailed_type"]),
    ("mrp.bom.line", &["display_name", "product_qty"]),
    ("account.payment.term", &["name", "note"]),
];

fn binding(relation: &str) -> Option<&'static [&'static str]> {
    RELATIONAL_BINDINGS
        .iter()
        .find(|(model, _)| *model == relation)
        .map(|(_, fields)| *fields)
}

/// The summary request: one system message, the 4k model, no tools.
pub fn summary_request(record_info: &str, temperature: f32) -> ChatRequest {
    ChatRequest {
        messages: vec![Message::system(prompts::summary_prompt(record_info))],
        tools: Vec::new(),
        temperature: Some(temperature),
        model: Some(ModelTier::Standard4k.model_id().to_owned()),
    }
}

/// Render `model(id)` as a header line followed by one line per field.
pub async fn render_record_info(store: &dyn RecordStore, model: &str, id: i64) -> StoreResult<String> {
    let fields = store.describe_fields(model).await?;
    let label = store
        .list_models()
        .await?
        .into_iter()
        .find(|m| m.model == model)
        .map(|m| m.label)
        .unwrap_or_else(|| model.to_owned());

    let shown: Vec<(&String, &FieldMeta)> = fields
        .iter()
        .filter(|(_, meta)| !IGNORED_FIELDS.contains(&meta.string.as_str()))
        .collect();
    let mut wanted: Vec<String> = shown.iter().map(|(name, _)| (*name).clone()).collect();
    wanted.push("display_name".into());

    let record = store
        .search_read(model, &wanted, &[id_in(vec![id])], Some(1), None)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::NoMatch(format!("{model}({id},)")))?;

    let name = record
        .get("name")
        .filter(|v| fields.contains_key("name") && !is_falsy(v))
        .or_else(|| record.get("display_name"))
        .map(plain)
        .unwrap_or_default();

    let mut out = format!("Record Information: {label} {name} [{model}({id},)]\n");
    for (field, meta) in shown {
        let value = record.get(field.as_str()).unwrap_or(&Value::Null);
        if let Some(line) = field_line(store, field, meta, value).await? {
            out.push_str(&line);
        }
    }
    Ok(out)
}

async fn field_line(
    store: &dyn RecordStore,
    field: &str,
    meta: &FieldMeta,
    value: &Value,
) -> StoreResult<Option<String>> {
    let label = &meta.string;
    if meta.field_type == FieldType::Boolean {
        let flag = value.as_bool().unwrap_or(false);
        return Ok(Some(format!("'{label}' [{field}] = {flag}\n")));
    }
    if is_falsy(value) {
        return Ok(None);
    }

    let rendered = match meta.field_type {
        FieldType::Selection => {
            let tech = plain(value);
            match meta.selection_label(&tech) {
                Some(display) => format!("('{tech}', '{display}')"),
                None => tech,
            }
        }
        ft if ft.is_relational() => {
            let relation = meta.relation.as_deref().unwrap_or_default();
            let ids = related_ids(value);
            let expanded = match binding(relation) {
                Some(sub_fields) => related_rows(store, relation, sub_fields, &ids).await?,
                None => None,
            };
            if let Some(rows) = expanded {
                let line = if ft == FieldType::Many2one {
                    let first = rows.into_iter().next().unwrap_or_default();
                    format!("{label} with the following values: {first}\n")
                } else {
                    let mut block = format!("{label} with the following values:\n");
                    for row in rows {
                        block.push_str(&row);
                        block.push('\n');
                    }
                    block
                };
                return Ok(Some(format!("'{label}' [{field}] = {line}")));
            }
            if ft == FieldType::Many2one {
                plain(value)
            } else {
                recordset(relation, &ids)
            }
        }
        _ => plain(value),
    };
    Ok(Some(format!("'{label}' [{field}] = {rendered}\n")))
}

/// `model(1,)` for one id, `model(1, 2)` for several.
fn recordset(model: &str, ids: &[i64]) -> String {
    match ids {
        [id] => format!("{model}({id},)"),
        _ => {
            let ids: Vec<String> = ids.iter().map(i64::to_string).collect();
            format!("{model}({})", ids.join(", "))
        }
    }
}

/// One `Label = value, ...` string per related record, in id order.
/// `None` when the host store does not know `relation`.
async fn related_rows(
    store: &dyn RecordStore,
    relation: &str,
    sub_fields: &[&str],
    ids: &[i64],
) -> StoreResult<Option<Vec<String>>> {
    let meta = match store.describe_fields(relation).await {
        Ok(meta) => meta,
        Err(StoreError::UnknownModel(_)) => {
            tracing::debug!(relation, "bound relation missing from the store, not expanded");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    let fields: Vec<String> = sub_fields
        .iter()
        .filter(|f| **f == "display_name" || meta.contains_key(**f))
        .map(|f| (*f).to_owned())
        .collect();
    let rows = store
        .search_read(relation, &fields, &[id_in(ids.to_vec())], None, None)
        .await?;

    Ok(Some(rows
        .iter()
        .map(|row| {
            fields
                .iter()
                .map(|f| {
                    let label = meta.get(f).map_or("Display Name", |m| m.string.as_str());
                    let value = row.get(f).map(plain).unwrap_or_default();
                    format!("{label} = {value}")
                })
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect()))
}

fn id_in(ids: Vec<i64>) -> DomainTerm {
    DomainTerm::Leaf(Condition {
        field: "id".into(),
        operator: Operator::In,
        value: Value::from(ids),
    })
}

/// Ids referenced by a rendered relational value.
fn related_ids(value: &Value) -> Vec<i64> {
    match value {
        // many2one reads back as [id, name]
        Value::Array(items) if items.len() == 2 && items[1].is_string() => {
            items[0].as_i64().into_iter().collect()
        }
        Value::Array(items) => items.iter().filter_map(Value::as_i64).collect(),
        other => other.as_i64().into_iter().collect(),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Human form of a read value: strings unquoted, many2one as its name.
fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) if items.len() == 2 && items[0].is_i64() && items[1].is_string() => {
            plain(&items[1])
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rb_records::MemoryRecordStore;

    const FIXTURE: &str = r#"{
      "models": {
        "sale.order": {
          "label": "Sales Order",
          "fields": {
            "name": { "type": "char", "string": "Order Reference" },
            "partner_id": { "type": "many2one", "string": "Customer", "relation": "res.partner" },
            "state": { "type": "selection", "string": "Status",
                       "selection": [["draft", "Quotation"], ["sale", "Sales Order"]] },
            "invoiced": { "type": "boolean", "string": "Fully Invoiced" },
            "note": { "type": "text", "string": "Terms and conditions" },
            "amount_total": { "type": "float", "string": "Total" },
            "order_line": { "type": "one2many", "string": "Order Lines", "relation": "sale.order.line" },
            "tag_ids": { "type": "many2many", "string": "Tags", "relation": "crm.tag" },
            "message_ids": { "type": "one2many", "string": "Messages", "relation": "mail.message" }
          },
          "records": [
            { "id": 7, "name": "S00007", "partner_id": 1, "state": "sale", "invoiced": false,
              "note": "", "amount_total": 1740.5, "order_line": [1, 2], "tag_ids": [3],
              "message_ids": [11] }
          ]
        },
        "res.partner": {
          "label": "Contact",
          "fields": { "name": { "type": "char", "string": "Name" } },
          "records": [ { "id": 1, "name": "Deco Addict" } ]
        },
        "sale.order.line": {
          "label": "Sales Order Line",
          "fields": {
            "name": { "type": "char", "string": "Description" },
            "qty_to_deliver": { "type": "float", "string": "Quantity To Deliver" },
            "price_unit": { "type": "float", "string": "Unit Price" }
          },
          "records": [
            { "id": 1, "name": "Desk", "qty_to_deliver": 2, "price_unit": 500 },
            { "id": 2, "name": "Chair", "qty_to_deliver": 3, "price_unit": 246.83 }
          ]
        },
        "crm.tag": {
          "label": "Tag",
          "fields": { "name": { "type": "char", "string": "Name" } },
          "records": [ { "id": 3, "name": "VIP" } ]
        },
        "stock.move": {
          "label": "Stock Move",
          "fields": { "product_uom_qty": { "type": "float", "string": "Demand" } },
          "records": [ { "id": 4, "product_uom_qty": 5 } ]
        }
      }
    }"#;

    async fn info(model: &str, id: i64) -> String {
        let store = MemoryRecordStore::from_json(FIXTURE).unwrap();
        render_record_info(&store, model, id).await.unwrap()
    }

    #[tokio::test]
    async fn header_names_label_record_and_reference() {
        let text = info("sale.order", 7).await;
        assert!(text.starts_with("Record Information: Sales Order S00007 [sale.order(7,)]\n"));
    }

    #[tokio::test]
    async fn header_falls_back_to_display_name() {
        let text = info("stock.move", 4).await;
        assert!(text.starts_with("Record Information: Stock Move stock.move,4 [stock.move(4,)]\n"));
    }

    #[tokio::test]
    async fn booleans_always_shown_and_falsy_values_skipped() {
        let text = info("sale.order", 7).await;
        assert!(text.contains("'Fully Invoiced' [invoiced] = false\n"));
        assert!(!text.contains("[note]"));
        assert!(text.contains("'Total' [amount_total] = 1740.5\n"));
    }

    #[tokio::test]
    async fn selection_shows_both_names() {
        let text = info("sale.order", 7).await;
        assert!(text.contains("'Status' [state] = ('sale', 'Sales Order')\n"));
    }

    #[tokio::test]
    async fn bound_relations_are_expanded() {
        let text = info("sale.order", 7).await;
        assert!(text.contains(
            "'Customer' [partner_id] = Customer with the following values: Name = Deco Addict\n"
        ));
        assert!(text.contains(
            "'Order Lines' [order_line] = Order Lines with the following values:\n\
             Description = Desk, Quantity To Deliver = 2, Unit Price = 500\n\
             Description = Chair, Quantity To Deliver = 3, Unit Price = 246.83\n"
        ));
    }

    #[tokio::test]
    async fn unbound_relations_and_ignored_fields() {
        let text = info("sale.order", 7).await;
        assert!(text.contains("'Tags' [tag_ids] = crm.tag(3,)\n"));
        assert!(!text.contains("message_ids"));
    }

    #[tokio::test]
    async fn bound_relation_missing_from_store_falls_back() {
        let store = MemoryRecordStore::from_json(
            r#"{
              "models": {
                "sale.order": {
                  "label": "Sales Order",
                  "fields": {
                    "name": { "type": "char", "string": "Order Reference" },
                    "partner_id": { "type": "many2one", "string": "Customer", "relation": "res.partner" },
                    "order_line": { "type": "one2many", "string": "Order Lines", "relation": "sale.order.line" }
                  },
                  "records": [ { "id": 1, "name": "S00001", "partner_id": 5, "order_line": [8, 9] } ]
                }
              }
            }"#,
        )
        .unwrap();

        let text = render_record_info(&store, "sale.order", 1).await.unwrap();
        assert!(text.contains("'Customer' [partner_id] = res.partner,5\n"), "{text}");
        assert!(text.contains("'Order Lines' [order_line] = sale.order.line(8, 9)\n"), "{text}");
    }

    #[test]
    fn recordset_form() {
        assert_eq!(recordset("crm.tag", &[3]), "crm.tag(3,)");
        assert_eq!(recordset("crm.tag", &[3, 4]), "crm.tag(3, 4)");
    }

    #[tokio::test]
    async fn missing_record_is_an_error() {
        let store = MemoryRecordStore::from_json(FIXTURE).unwrap();
        let err = render_record_info(&store, "sale.order", 99).await.unwrap_err();
        assert!(matches!(err, StoreError::NoMatch(_)));
    }

    #[test]
    fn summary_request_uses_4k_model_without_tools() {
        let req = summary_request("Record Information: x\n", 0.1);
        assert_eq!(req.messages.len(), 1);
        assert!(req.tools.is_empty());
        assert_eq!(req.model.as_deref(), Some("gpt-3.5-turbo-0613"));
        assert_eq!(req.temperature, Some(0.1));
    }
}
