use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use rb_assistant::failure::describe_provider_failure;
use rb_assistant::prompts::{APOLOGY_MESSAGE, DECLINE_MESSAGE, PLANNING_INSTRUCTION, SETUP_MESSAGE};
use rb_assistant::{Assistant, Reply};
use rb_domain::config::{AssistantConfig, ModelTier};
use rb_domain::error::{Error, Result};
use rb_domain::thread::{
    ChannelKind, IncomingMessage, MessageType, NewMessage, ThreadInfo, ThreadMessage, ThreadTarget,
};
use rb_domain::tool::{Role, ToolCall};
use rb_providers::{ChatRequest, ChatResponse, LlmProvider};
use rb_records::{parse_domain, MemoryRecordStore, RecordStore, RecordTools};
use rb_threads::{ThreadLog, ThreadStore};

const BOT: i64 = 2;
const USER: i64 = 7;

const FIXTURE: &str = r#"{
  "models": {
    "res.partner": {
      "label": "Contact",
      "fields": {
        "name": { "type": "char", "string": "Name", "required": true },
        "phone": { "type": "char", "string": "Phone" }
      },
      "records": [
        { "id": 1, "name": "Azure Interior" },
        { "id": 2, "name": "Deco Addict" },
        { "id": 3, "name": "Mark Cheng", "phone": "555-0199" },
        { "id": 4, "name": "Mark Cheng", "phone": "555-0200" }
      ]
    },
    "sale.order": {
      "label": "Sales Order",
      "fields": {
        "name": { "type": "char", "string": "Order Reference", "required": true },
        "partner_id": { "type": "many2one", "string": "Customer", "relation": "res.partner" },
        "date_order": { "type": "datetime", "string": "Order Date" },
        "amount_total": { "type": "float", "string": "Total" }
      },
      "records": [
        { "id": 1, "name": "S00001", "partner_id": 1, "date_order": "2023-06-01 10:00:00", "amount_total": 100.0 },
        { "id": 2, "name": "S00002", "partner_id": 2, "date_order": "2023-06-03 10:00:00", "amount_total": 250.0 },
        { "id": 3, "name": "S00003", "partner_id": 3, "date_order": "2023-06-02 10:00:00", "amount_total": 75.5 },
        { "id": 4, "name": "S00004", "partner_id": 2, "date_order": "2023-06-04 10:00:00", "amount_total": 10.0 }
      ]
    }
  }
}"#;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scripted provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct MockProvider {
    responses: tokio::sync::Mutex<VecDeque<Result<ChatResponse>>>,
    /// Returned once the script runs out.
    fallback: Option<ChatResponse>,
    requests: tokio::sync::Mutex<Vec<ChatRequest>>,
    flagged: bool,
    chat_calls: AtomicUsize,
}

impl MockProvider {
    fn new(responses: Vec<Result<ChatResponse>>) -> Self {
        Self {
            responses: tokio::sync::Mutex::new(responses.into()),
            fallback: None,
            requests: tokio::sync::Mutex::new(Vec::new()),
            flagged: false,
            chat_calls: AtomicUsize::new(0),
        }
    }

    fn repeating(response: ChatResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::new(Vec::new())
        }
    }

    fn calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    async fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(req.clone());
        match self.responses.lock().await.pop_front() {
            Some(resp) => resp,
            None => Ok(self.fallback.clone().unwrap_or_else(|| text("Done."))),
        }
    }

    async fn moderate(&self, _input: &str) -> Result<bool> {
        Ok(self.flagged)
    }

    fn provider_id(&self) -> &str {
        "mock"
    }
}

fn text(content: &str) -> ChatResponse {
    ChatResponse {
        content: content.into(),
        finish_reason: Some("stop".into()),
        ..Default::default()
    }
}

fn tool(id: &str, name: &str, args: Value) -> ChatResponse {
    ChatResponse {
        tool_calls: vec![ToolCall {
            call_id: id.into(),
            tool_name: name.into(),
            arguments: args.to_string(),
        }],
        finish_reason: Some("tool_calls".into()),
        ..Default::default()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Harness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Harness {
    assistant: Assistant,
    provider: Arc<MockProvider>,
    threads: Arc<ThreadLog>,
    records: Arc<MemoryRecordStore>,
}

fn config() -> AssistantConfig {
    AssistantConfig {
        plan_first: false,
        ..Default::default()
    }
}

fn harness_with(config: AssistantConfig, provider: MockProvider, with_key: bool) -> Harness {
    harness_on(FIXTURE, config, provider, with_key)
}

fn harness_on(fixture: &str, config: AssistantConfig, provider: MockProvider, with_key: bool) -> Harness {
    let provider = Arc::new(provider);
    let records = Arc::new(MemoryRecordStore::from_json(fixture).unwrap());
    let threads = Arc::new(ThreadLog::in_memory());
    let llm: Option<Arc<dyn LlmProvider>> = with_key.then(|| provider.clone() as Arc<dyn LlmProvider>);
    let assistant = Assistant::new(config, llm, RecordTools::new(records.clone()), threads.clone());
    Harness {
        assistant,
        provider,
        threads,
        records,
    }
}

fn harness(provider: MockProvider) -> Harness {
    harness_with(config(), provider, true)
}

fn dm() -> ThreadTarget {
    ThreadTarget::Channel {
        id: "dm-7".into(),
        kind: ChannelKind::Chat,
        member_ids: vec![USER, BOT],
    }
}

impl Harness {
    /// Post `text` as the user into the private chat, then let the
    /// assistant handle it.
    async fn say(&self, text: &str) -> Option<Reply> {
        let target = dm();
        self.threads
            .post_message(&target, NewMessage::comment(text, USER))
            .await
            .unwrap();
        self.assistant
            .handle_message(&ThreadInfo::single(target), &IncomingMessage::comment(USER, text))
            .await
            .unwrap()
    }

    /// Thread history in chronological order.
    async fn history(&self) -> Vec<ThreadMessage> {
        let mut msgs = self.threads.fetch_messages(&dm(), None).await.unwrap();
        msgs.reverse();
        msgs
    }
}

/// A mention of the bot, as posted in a record's chatter.
fn chatter_mention() -> IncomingMessage {
    let mut msg = IncomingMessage::comment(USER, "@RecordBot summarize");
    msg.recipient_ids = vec![BOT];
    msg
}

fn record(model: &str, id: i64) -> ThreadTarget {
    ThreadTarget::Record {
        model: model.into(),
        id,
    }
}

fn kinds(history: &[ThreadMessage]) -> Vec<MessageType> {
    history.iter().map(|m| m.message_type).collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenarios
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn latest_sale_orders_with_links() {
    let h = harness(MockProvider::new(vec![
        Ok(tool(
            "call_1",
            "read_record",
            json!({"model": "sale.order", "field": ["name", "date_order"], "order": "date_order desc", "limit": 3}),
        )),
        Ok(text(
            "The latest order is [S00004](#&data-oe-model=sale.order&data-oe-id=4).",
        )),
    ]));

    let reply = h.say("Show me the last 3 sale orders").await.unwrap();
    assert_eq!(
        reply.body,
        "The latest order is <a href='#' data-oe-model='sale.order' data-oe-id='4'>S00004</a>."
    );
    assert_eq!(reply.message_type, MessageType::Comment);

    let requests = h.provider.requests().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].temperature, Some(0.5));
    assert_eq!(requests[0].tools.len(), 3);
    let result = requests[1].messages.last().unwrap();
    assert_eq!(result.role, Role::Function);
    let rows: Vec<Value> = serde_json::from_str(&result.content.extract_all_text()).unwrap();
    let names: Vec<_> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["S00004", "S00002", "S00003"]);

    let history = h.history().await;
    assert_eq!(
        kinds(&history),
        [
            MessageType::Comment,
            MessageType::BotFunctionRequest,
            MessageType::BotFunction,
            MessageType::Comment,
        ]
    );
    assert!(history[1].body.is_empty());
    assert_eq!(history[1].author_id, BOT);
    assert!(history[1].function_payload.as_ref().unwrap().tool_call().is_some());
    assert_eq!(history[3].subtype.as_deref(), Some("comment"));
}

#[tokio::test]
async fn update_on_duplicate_names_writes_only_first_match() {
    let h = harness(MockProvider::new(vec![
        Ok(tool(
            "call_1",
            "update_record",
            json!({
                "model": "res.partner",
                "field": ["name"],
                "field_to_update": [{"phone": "555-9999"}],
                "search_domains": [["name", "=", "Mark Cheng"]]
            }),
        )),
        Ok(text("Updated Mark Cheng's phone.")),
    ]));

    h.say("Set Mark Cheng's phone to 555-9999").await.unwrap();

    let domain = parse_domain(&json!([["name", "=", "Mark Cheng"]])).unwrap();
    let rows = h
        .records
        .search_read("res.partner", &["phone".to_owned()], &domain, None, None)
        .await
        .unwrap();
    let phones: Vec<_> = rows.iter().map(|r| (r["id"].as_i64().unwrap(), r["phone"].clone())).collect();
    assert_eq!(phones, [(3, json!("555-9999")), (4, json!("555-0200"))]);
}

#[tokio::test]
async fn missing_api_key_asks_for_setup() {
    let h = harness_with(config(), MockProvider::new(vec![Ok(text("unused"))]), false);

    let reply = h.say("hello").await.unwrap();
    assert_eq!(reply.body, SETUP_MESSAGE);
    assert_eq!(h.provider.calls(), 0);
    assert_eq!(h.history().await.len(), 2);
}

#[tokio::test]
async fn provider_failure_in_first_round_posts_only_the_description() {
    let h = harness(MockProvider::new(vec![Err(Error::Timeout("60s elapsed".into()))]));

    let reply = h.say("list my orders").await.unwrap();
    assert!(reply.body.starts_with("[Request Timeout]"), "{}", reply.body);
    assert_eq!(kinds(&h.history().await), [MessageType::Comment, MessageType::Comment]);
}

#[tokio::test]
async fn round_budget_ends_in_apology_without_persisting() {
    let h = harness(MockProvider::repeating(tool(
        "call_x",
        "read_record",
        json!({"model": "sale.ordr", "field": ["name"]}),
    )));

    let reply = h.say("show sale orders").await.unwrap();
    assert_eq!(reply.body, APOLOGY_MESSAGE);
    assert_eq!(h.provider.calls(), 20);
    assert_eq!(h.history().await.len(), 2);

    let requests = h.provider.requests().await;
    let correction = requests[1].messages.last().unwrap();
    assert_eq!(correction.role, Role::User);
    let correction = correction.content.text().unwrap();
    assert!(correction.contains("The model sale.ordr is invalid"));
    assert!(correction.contains("\"sale.order\""));
    assert!(correction.ends_with("show sale orders"));
}

#[tokio::test]
async fn recovered_failure_persists_only_successful_pair() {
    let h = harness(MockProvider::new(vec![
        Ok(tool("call_1", "read_record", json!({"model": "sale.order", "field": ["reference"]}))),
        Ok(tool("call_2", "read_record", json!({"model": "sale.order", "field": ["name"], "limit": 1}))),
        Ok(text("S00001 is the first order.")),
    ]));

    h.say("what is the first order?").await.unwrap();

    let requests = h.provider.requests().await;
    let field_hint = requests[1].messages.last().unwrap().content.text().unwrap().to_owned();
    assert!(field_hint.contains("The sale.order model defines the following fields"));
    assert!(field_hint.contains("\"date_order\""));

    let history = h.history().await;
    assert_eq!(
        kinds(&history),
        [
            MessageType::Comment,
            MessageType::BotFunctionRequest,
            MessageType::BotFunction,
            MessageType::Comment,
        ]
    );
    let call = history[1].function_payload.as_ref().unwrap().tool_call().unwrap();
    assert_eq!(call.call_id, "call_2");
}

#[tokio::test]
async fn failure_in_last_tool_round_persists_nothing() {
    let h = harness(MockProvider::new(vec![
        Ok(tool("call_1", "read_record", json!({"model": "sale.order", "field": ["name"]}))),
        Ok(tool("call_2", "create_record", json!({"model": "res.partner", "values": [{"phone": "1"}]}))),
        Ok(text("I could not create the contact.")),
    ]));

    let reply = h.say("create a contact").await.unwrap();
    assert_eq!(reply.body, "I could not create the contact.");
    assert_eq!(kinds(&h.history().await), [MessageType::Comment, MessageType::Comment]);
}

#[tokio::test]
async fn persisted_tool_history_is_replayed_next_turn() {
    let h = harness(MockProvider::new(vec![
        Ok(tool("call_1", "read_record", json!({"model": "res.partner", "field": ["phone"], "limit": 1}))),
        Ok(text("Azure Interior has no phone.")),
        Ok(text("You asked about Azure Interior.")),
    ]));

    h.say("first contact?").await.unwrap();
    h.say("who did I ask about?").await.unwrap();

    let requests = h.provider.requests().await;
    let roles: Vec<_> = requests[2].messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        [
            Role::System,
            Role::Assistant,
            Role::User,
            Role::Assistant,
            Role::Function,
            Role::Assistant,
            Role::User,
        ]
    );
    assert_eq!(requests[2].messages[1].content.text(), Some(config().greeting.as_str()));
}

#[tokio::test]
async fn flagged_message_is_declined() {
    let mut provider = MockProvider::new(vec![Ok(text("unused"))]);
    provider.flagged = true;
    let h = harness(provider);

    let reply = h.say("something nasty").await.unwrap();
    assert_eq!(reply.body, DECLINE_MESSAGE);
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn planning_request_precedes_the_loop() {
    let h = harness_with(
        AssistantConfig::default(),
        MockProvider::new(vec![
            Ok(text("Read sale.order sorted by date.")),
            Ok(text("Here are your orders.")),
        ]),
        true,
    );

    let reply = h.say("latest orders").await.unwrap();
    assert_eq!(reply.body, "Here are your orders.");

    let requests = h.provider.requests().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[0].messages.last().unwrap().content.text(),
        Some(PLANNING_INSTRUCTION)
    );
    let second = &requests[1].messages;
    let n = second.len();
    assert_eq!(second[n - 2].content.text(), Some("Read sale.order sorted by date."));
    assert_eq!(second[n - 1].role, Role::User);
    assert_eq!(second[n - 1].content.text(), Some("latest orders"));
}

#[tokio::test]
async fn per_user_model_is_sent_to_the_provider() {
    let mut cfg = config();
    cfg.user_models.insert(USER.to_string(), ModelTier::Gpt4);
    let h = harness_with(cfg, MockProvider::new(vec![Ok(text("hi"))]), true);

    h.say("hello").await.unwrap();
    assert_eq!(h.provider.requests().await[0].model.as_deref(), Some("gpt-4"));
}

#[tokio::test]
async fn record_chatter_gets_a_summary_notification() {
    let h = harness(MockProvider::new(vec![Ok(text("Order S00001 for Azure Interior."))]));
    let target = ThreadTarget::Record {
        model: "sale.order".into(),
        id: 1,
    };
    let mut msg = IncomingMessage::comment(USER, "@RecordBot summarize");
    msg.recipient_ids = vec![BOT];

    let reply = h
        .assistant
        .handle_message(&ThreadInfo::single(target.clone()), &msg)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply.message_type, MessageType::Notification);
    assert_eq!(reply.body, "Order S00001 for Azure Interior.");

    let requests = h.provider.requests().await;
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert!(req.tools.is_empty());
    assert_eq!(req.model.as_deref(), Some("gpt-3.5-turbo-0613"));
    assert_eq!(req.messages.len(), 1);
    assert_eq!(req.messages[0].role, Role::System);
    assert!(req.messages[0]
        .content
        .text()
        .unwrap()
        .contains("Record Information: Sales Order S00001 [sale.order(1,)]"));

    let posted = h.threads.fetch_messages(&target, None).await.unwrap();
    assert_eq!(posted[0].message_type, MessageType::Notification);
}

#[tokio::test]
async fn planning_failure_is_the_answer() {
    let h = harness_with(
        AssistantConfig::default(),
        MockProvider::new(vec![Err(Error::RateLimited("slow down".into()))]),
        true,
    );

    let reply = h.say("latest orders").await.unwrap();
    assert_eq!(
        reply.body,
        describe_provider_failure(&Error::RateLimited("slow down".into()))
    );
    assert_eq!(h.provider.calls(), 1);
    assert_eq!(kinds(&h.history().await), [MessageType::Comment, MessageType::Comment]);
}

#[tokio::test]
async fn chatter_summary_survives_a_dangling_relation() {
    const DANGLING: &str = r#"{
      "models": {
        "sale.order": {
          "label": "Sales Order",
          "fields": {
            "name": { "type": "char", "string": "Order Reference" },
            "partner_id": { "type": "many2one", "string": "Customer", "relation": "res.partner" }
          },
          "records": [ { "id": 1, "name": "S00001", "partner_id": 1 } ]
        }
      }
    }"#;
    let h = harness_on(DANGLING, config(), MockProvider::new(vec![Ok(text("Order S00001."))]), true);
    let target = record("sale.order", 1);

    let reply = h
        .assistant
        .handle_message(&ThreadInfo::single(target.clone()), &chatter_mention())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply.body, "Order S00001.");

    let requests = h.provider.requests().await;
    let prompt = requests[0].messages[0].content.text().unwrap();
    assert!(prompt.contains("'Customer' [partner_id] = res.partner,1"), "{prompt}");
    assert_eq!(h.threads.fetch_messages(&target, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unreadable_record_gets_a_comment_instead_of_an_error() {
    let h = harness(MockProvider::new(vec![Ok(text("unused"))]));
    let target = record("sale.order", 99);

    let reply = h
        .assistant
        .handle_message(&ThreadInfo::single(target.clone()), &chatter_mention())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply.message_type, MessageType::Comment);
    assert!(reply.body.starts_with("I could not read sale.order(99,)"), "{}", reply.body);
    assert_eq!(h.provider.calls(), 0);

    let posted = h.threads.fetch_messages(&target, None).await.unwrap();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].body, reply.body);
}

#[tokio::test]
async fn empty_summary_is_not_posted() {
    let h = harness(MockProvider::new(vec![Ok(text("  "))]));
    let target = record("sale.order", 1);

    let reply = h
        .assistant
        .handle_message(&ThreadInfo::single(target.clone()), &chatter_mention())
        .await
        .unwrap();
    assert!(reply.is_none());
    assert_eq!(h.provider.calls(), 1);
    assert!(h.threads.fetch_messages(&target, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn unaddressed_channel_message_is_ignored() {
    let h = harness(MockProvider::new(vec![Ok(text("unused"))]));
    let general = ThreadTarget::Channel {
        id: "general".into(),
        kind: ChannelKind::Channel,
        member_ids: vec![USER, BOT, 9],
    };

    let reply = h
        .assistant
        .handle_message(&ThreadInfo::single(general.clone()), &IncomingMessage::comment(USER, "lunch?"))
        .await
        .unwrap();
    assert!(reply.is_none());
    assert!(h.threads.fetch_messages(&general, None).await.unwrap().is_empty());
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn welcome_once_and_reset_to_greeting() {
    let h = harness(MockProvider::new(vec![Ok(text("hi"))]));
    let cfg = config();

    assert!(h.assistant.ensure_welcome(&dm()).await.unwrap());
    assert!(!h.assistant.ensure_welcome(&dm()).await.unwrap());
    assert_eq!(h.history().await[0].body, cfg.welcome);

    h.say("hello").await.unwrap();
    let reply = h.assistant.reset(&dm()).await.unwrap();
    assert_eq!(reply.body, cfg.greeting);

    let history = h.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].body, cfg.greeting);
    assert_eq!(history[0].author_id, BOT);
}
