//! Prompt library: the fixed texts the assistant sends to the model and
//! the fixed replies it sends to users.

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fixed replies
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Posted when no provider API key is configured.
pub const SETUP_MESSAGE: &str =
    "Please set the OpenAI API key in the settings under integrations";

/// Posted when moderation flags the user's message.
pub const DECLINE_MESSAGE: &str =
    "[Request Decline] The request violates OpenAI usage policy, please try another request.";

/// Posted when the loop ends without a usable answer.
pub const APOLOGY_MESSAGE: &str = "I am sorry that I failed to process your query, please provide more details/instructions and retry!";

/// Reply posted in a record's chatter when the record cannot be read.
pub fn record_unavailable(model: &str, id: i64, error: &str) -> String {
    format!("I could not read {model}({id},) to summarize it: {error}")
}

/// Joins a corrective helper prompt and the user's original query.
pub const RETRY_INSTRUCTION: &str =
    "Based on the information above, please respond to the following user query again:";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// System prompt
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const BASE: &str = "You are RecordBot, a friendly AI assistant. Users may ask questions or ask you to \
perform actions, and you have full access to the records of the current business application.";

const INLINE_LINKS: &str = r#"
Reference records with HTML links in this exact format:
<a href='#' data-oe-model='model name' data-oe-id='id number'>link text</a>

For example: <a href='#' data-oe-model='sale.order' data-oe-id='7'>Sale Order 7</a>

Every record returned by `read_record` that you mention should be linked this way, so the user can
open it directly. Do not use the square bracket format such as
[Product 45](#&data-oe-model=product.product&data-oe-id=45); always use the <a> tag shown above."#;

const TOOL_USAGE: &str = r#"
You have three functions to work with the database.

`read_record` reads fields of matching records. For example, the three most recent sale orders:
read_record {"model": "sale.order", "field": ["name", "date_order"], "order": "date_order desc", "limit": 3}

`create_record` creates records. For example, a new customer named Diego:
create_record {"model": "res.partner", "values": [{"name": "Diego"}]}

`update_record` changes the first record matching a search domain. For example, Diego's phone and email:
update_record {"model": "res.partner", "field": ["name"], "field_to_update": [{"phone": "99999999", "email": "diego@example.com"}], "search_domains": [["name", "=", "Diego"]], "limit": 1}

Relational fields hold record ids. To create a sale order for a customer, pass the customer's id as
`partner_id`. When you do not know an id, look it up first with `read_record`, e.g. a product whose
name contains "cabinet":
read_record {"model": "product.product", "field": ["id"], "search_domains": [["name", "=ilike", "%cabinet%"]], "limit": 1}

Ids returned by earlier calls can be used as arguments in later calls."#;

const SEARCH_DOMAINS: &str = r#"
Search domains are lists of conditions [field, operator, value]. Conditions can be combined with the
prefix operators '&' (AND, the default), '|' (OR) and '!' (NOT). '&' and '|' take two operands and
'!' takes one.

Partners named ABC from Belgium or Germany whose language is not English:
[["name", "=", "ABC"], "!", ["language.code", "=", "en_US"], "|", ["country_id.code", "=", "be"], ["country_id.code", "=", "de"]]

Products named x, y or z:
["|", "|", ["name", "ilike", "%x%"], ["name", "ilike", "%y%"], ["name", "ilike", "%z%"]]"#;

const SYSTEM_MODULES: [(&str, &str); 4] = [
    ("base", BASE),
    ("inline_links", INLINE_LINKS),
    ("tool_usage", TOOL_USAGE),
    ("search_domains", SEARCH_DOMAINS),
];

/// The system message that opens every conversation transcript.
pub fn system_prompt() -> String {
    let mut prompt = String::new();
    for (name, text) in SYSTEM_MODULES {
        tracing::trace!(module = name, chars = text.len(), "system prompt module");
        prompt.push_str(text);
        prompt.push('\n');
    }
    prompt
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Planning
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Sent once before the loop so the model decomposes the query into
/// record operations before acting.
pub const PLANNING_INSTRUCTION: &str = r#"Instructions while running a query:
A search domain passed to read_record() must not repeat a field.
When looking up the id of a single record, each read_record() call must target one record.
Wrong: {"model": "res.partner", "field": ["id"], "search_domains": [["name", "=", "Odoo Wheel"], ["name", "=", "Odoo Frame"]], "limit": 1}
Right: {"model": "res.partner", "field": ["id"], "search_domains": [["name", "=", "Odoo Wheel"]], "limit": 1}
followed by {"model": "res.partner", "field": ["id"], "search_domains": [["name", "=", "Odoo Frame"]], "limit": 1}
Always read a single record at a time.

If the request above needs no data operations, return nothing. Otherwise state which operations are
required (only read, create or update) and which models they use (technical model names only).
Summarize within 100 words, then perform these operations."#;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Corrective prompts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What the model got wrong in the last tool call, with the context the
/// helper prompt needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Correction {
    /// Unknown model; `candidates` are valid models sharing its prefix.
    Model { model: String, candidates: Vec<String> },
    /// Unknown field; `fields` are the fields the model does define.
    Field { model: String, fields: Vec<String> },
    Type,
    Other,
}

fn helper_prompt(correction: &Correction) -> String {
    match correction {
        Correction::Model { model, candidates } => format!(
            "The model {model} is invalid. Only use models that exist in this application; \
             the valid model names are: {candidates:?}."
        ),
        Correction::Field { model, fields } => format!(
            "The {model} model defines the following fields: {fields:?}. \
             You must only use defined field names."
        ),
        Correction::Type => "You must use the correct value type for each field. For a relational \
            field such as partner_id, perform a read operation first to find the correct id."
            .into(),
        Correction::Other => "Please correct the error shown in the last function response.\n\
            If it was a JSON error, produce valid JSON next time; use \"[\" and \"]\" instead of \"(\" and \")\".\n\
            If a not-null constraint was violated, the field is required and you must provide it. \
            If the required field is an id, perform a read operation to find the correct id."
            .into(),
    }
}

/// User-role entry appended after a failed tool call.
pub fn corrective_prompt(correction: &Correction, query: &str) -> String {
    format!("{} {RETRY_INSTRUCTION} {query}", helper_prompt(correction))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Record summary
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Wrap rendered record information into the summary request.
pub fn summary_prompt(record_info: &str) -> String {
    format!(
        "You are a friendly AI business assistant.

Use the record information below to answer. Your response must be professional and concise.

The record information starts with a record description and model_name(record_id), followed by
one line per field: 'field description' [field_name] = field_value.

<Record information starts>
{record_info}<Record information ends>

Selection fields are given as tuples of (technical_name, display_name).

Keep the summary concise and professional and include only the most relevant information.
Do not just list the fields: summarize the record as a whole, in a business context rather than a
technical one."
    )
}
