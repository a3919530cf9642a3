//! OpenAI-compatible adapter.
//!
//! Works with OpenAI and any other endpoint that follows the OpenAI chat
//! completions and moderations contract.

use std::time::{Duration, Instant};

use rb_domain::config::ProviderConfig;
use rb_domain::error::{Error, Result};
use rb_domain::tool::{ContentPart, Message, MessageContent, Role, ToolCall, ToolDefinition, Usage};
use rb_domain::trace::TraceEvent;
use serde_json::Value;

use crate::traits::{ChatRequest, ChatResponse, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};

const DEFAULT_MODEL: &str = "gpt-3.5-turbo-0613";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An LLM provider adapter for any OpenAI-compatible API endpoint.
pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: String,
    auth_header: String,
    auth_prefix: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new provider from the deserialized provider config.
    ///
    /// Fails with [`Error::Auth`] when no API key can be resolved; callers
    /// treat that as "not configured" rather than as a hard error.
    pub fn from_config(cfg: &ProviderConfig, timeout: Duration) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.auth)?;
        Self::with_key(cfg, api_key, timeout)
    }

    /// Create a provider with an already-resolved key.
    pub fn with_key(cfg: &ProviderConfig, api_key: String, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::Auth("API key is empty".into()));
        }

        let auth_header = cfg
            .auth
            .header
            .clone()
            .unwrap_or_else(|| "Authorization".into());
        let auth_prefix = cfg.auth.prefix.clone().unwrap_or_else(|| "Bearer ".into());

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            auth_header,
            auth_prefix,
            client,
        })
    }

    // ── Internal: build authenticated request builder ──────────────

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        let header_value = format!("{}{}", self.auth_prefix, self.api_key);
        self.client
            .post(url)
            .header(&self.auth_header, &header_value)
            .header("Content-Type", "application/json")
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        let resp = self
            .authed_post(url)
            .json(body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(classify_status(&self.id, status.as_u16(), &resp_text));
        }

        serde_json::from_str(&resp_text).map_err(|e| Error::Provider {
            provider: self.id.clone(),
            message: format!("malformed response body: {e}"),
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn build_chat_body(req: &ChatRequest) -> Value {
    let messages: Vec<Value> = req.messages.iter().map(msg_to_openai).collect();

    let mut body = serde_json::json!({
        "model": req.model.as_deref().unwrap_or(DEFAULT_MODEL),
        "messages": messages,
    });

    if !req.tools.is_empty() {
        let tools: Vec<Value> = req.tools.iter().map(tool_to_openai).collect();
        body["tools"] = Value::Array(tools);
        body["tool_choice"] = Value::String("auto".into());
        body["parallel_tool_calls"] = Value::Bool(false);
    }
    if let Some(temp) = req.temperature {
        body["temperature"] = serde_json::json!(temp);
    }
    body
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Function => "tool",
    }
}

fn msg_to_openai(msg: &Message) -> Value {
    match msg.role {
        Role::Function => function_result_to_openai(msg),
        Role::Assistant => assistant_to_openai(msg),
        _ => {
            let text = msg.content.extract_all_text();
            serde_json::json!({
                "role": role_to_str(msg.role),
                "content": text,
            })
        }
    }
}

fn assistant_to_openai(msg: &Message) -> Value {
    let mut obj = serde_json::json!({"role": "assistant"});
    let mut text_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<Value> = Vec::new();

    match &msg.content {
        MessageContent::Text(t) => {
            text_parts.push(t.clone());
        }
        MessageContent::Parts(parts) => {
            for part in parts {
                match part {
                    ContentPart::Text { text } => text_parts.push(text.clone()),
                    ContentPart::ToolUse { id, name, arguments } => {
                        tool_calls.push(serde_json::json!({
                            "id": id,
                            "type": "function",
                            "function": {
                                "name": name,
                                "arguments": arguments,
                            }
                        }));
                    }
                    ContentPart::ToolResult { .. } => {}
                }
            }
        }
    }

    if text_parts.is_empty() {
        obj["content"] = Value::Null;
    } else {
        obj["content"] = Value::String(text_parts.join("\n"));
    }
    if !tool_calls.is_empty() {
        obj["tool_calls"] = Value::Array(tool_calls);
    }
    obj
}

fn function_result_to_openai(msg: &Message) -> Value {
    match &msg.content {
        MessageContent::Parts(parts) => {
            for part in parts {
                if let ContentPart::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } = part
                {
                    return serde_json::json!({
                        "role": "tool",
                        "tool_call_id": tool_use_id,
                        "content": content,
                    });
                }
            }
            serde_json::json!({"role": "tool", "tool_call_id": "", "content": ""})
        }
        MessageContent::Text(t) => serde_json::json!({
            "role": "tool",
            "tool_call_id": "",
            "content": t,
        }),
    }
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_chat_response(provider: &str, body: &Value) -> Result<ChatResponse> {
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::Provider {
            provider: provider.into(),
            message: "no choices in response".into(),
        })?;

    let message = choice.get("message").ok_or_else(|| Error::Provider {
        provider: provider.into(),
        message: "no message in choice".into(),
    })?;

    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let finish_reason = choice
        .get("finish_reason")
        .and_then(|v| v.as_str())
        .map(String::from);

    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    let tool_calls = parse_openai_tool_calls(message);
    let usage = body.get("usage").and_then(parse_openai_usage);

    Ok(ChatResponse {
        content,
        tool_calls,
        usage,
        model,
        finish_reason,
    })
}

/// Arguments are kept verbatim; malformed JSON is the loop's concern.
fn parse_openai_tool_calls(message: &Value) -> Vec<ToolCall> {
    let arr = match message.get("tool_calls").and_then(|v| v.as_array()) {
        Some(a) => a,
        None => return Vec::new(),
    };
    arr.iter()
        .filter_map(|tc| {
            let call_id = tc.get("id")?.as_str()?.to_string();
            let func = tc.get("function")?;
            let tool_name = func.get("name")?.as_str()?.to_string();
            let arguments = func
                .get("arguments")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            Some(ToolCall {
                call_id,
                tool_name,
                arguments,
            })
        })
        .collect()
}

fn parse_openai_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

fn parse_moderation(provider: &str, body: &Value) -> Result<bool> {
    body.get("results")
        .and_then(|r| r.as_array())
        .and_then(|a| a.first())
        .and_then(|r| r.get("flagged"))
        .and_then(|f| f.as_bool())
        .ok_or_else(|| Error::Provider {
            provider: provider.into(),
            message: "no moderation result in response".into(),
        })
}

/// Map a non-success HTTP status to the domain error taxonomy.
fn classify_status(provider: &str, status: u16, body: &str) -> Error {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string());
    let message = format!("HTTP {status} - {detail}");

    match status {
        401 | 403 => Error::Auth(message),
        429 => Error::RateLimited(message),
        503 => Error::Unavailable(message),
        400 | 404 | 413 | 422 => Error::InvalidRequest(message),
        _ => Error::Provider {
            provider: provider.into(),
            message,
        },
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = build_chat_body(req);
        let model = body["model"].as_str().unwrap_or(DEFAULT_MODEL).to_string();

        tracing::debug!(provider = %self.id, url = %url, messages = req.messages.len(), "chat request");

        let started = Instant::now();
        let resp_json = self.post_json(&url, &body).await?;
        let resp = parse_chat_response(&self.id, &resp_json)?;

        TraceEvent::LlmRequest {
            provider: self.id.clone(),
            model,
            with_tools: !req.tools.is_empty(),
            duration_ms: started.elapsed().as_millis() as u64,
            prompt_tokens: resp.usage.map(|u| u.prompt_tokens),
            completion_tokens: resp.usage.map(|u| u.completion_tokens),
            total_tokens: resp.usage.map(|u| u.total_tokens),
        }
        .emit();

        Ok(resp)
    }

    async fn moderate(&self, input: &str) -> Result<bool> {
        let url = format!("{}/moderations", self.base_url);
        let body = serde_json::json!({ "input": input });

        let resp_json = self.post_json(&url, &body).await?;
        let flagged = parse_moderation(&self.id, &resp_json)?;

        TraceEvent::ModerationChecked {
            provider: self.id.clone(),
            flagged,
        }
        .emit();

        Ok(flagged)
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_call() -> ToolCall {
        ToolCall {
            call_id: "call_7".into(),
            tool_name: "read_record".into(),
            arguments: r#"{"model":"sale.order","field":["name"]}"#.into(),
        }
    }

    #[test]
    fn chat_body_declares_tools_and_disables_parallel_calls() {
        let req = ChatRequest {
            messages: vec![Message::system("sys"), Message::user("hi")],
            tools: vec![ToolDefinition {
                name: "read_record".into(),
                description: "Read records".into(),
                parameters: serde_json::json!({"type": "object"}),
            }],
            temperature: Some(0.5),
            model: Some("gpt-4".into()),
        };
        let body = build_chat_body(&req);
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["parallel_tool_calls"], false);
        assert_eq!(body["tools"][0]["function"]["name"], "read_record");
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[test]
    fn chat_body_without_tools_omits_tool_choice() {
        let req = ChatRequest {
            messages: vec![Message::system("summarize")],
            ..Default::default()
        };
        let body = build_chat_body(&req);
        assert_eq!(body["model"], DEFAULT_MODEL);
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn tool_exchange_serializes_as_tool_calls_and_tool_role() {
        let call = read_call();
        let assistant = msg_to_openai(&Message::assistant_tool_call("", &call));
        assert!(assistant["content"].is_null());
        assert_eq!(assistant["tool_calls"][0]["id"], "call_7");
        assert_eq!(
            assistant["tool_calls"][0]["function"]["arguments"],
            call.arguments.as_str()
        );

        let result = msg_to_openai(&Message::function_result(&call, "[]", false));
        assert_eq!(result["role"], "tool");
        assert_eq!(result["tool_call_id"], "call_7");
        assert_eq!(result["content"], "[]");
    }

    #[test]
    fn parses_tool_call_keeping_raw_arguments() {
        let body = serde_json::json!({
            "model": "gpt-3.5-turbo-0613",
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "read_record", "arguments": "{\"model\": 'bad'}" }
                    }]
                }
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        });
        let resp = parse_chat_response("openai", &body).unwrap();
        assert_eq!(resp.content, "");
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].arguments, "{\"model\": 'bad'}");
        assert_eq!(resp.usage.map(|u| u.total_tokens), Some(15));
        assert_eq!(resp.finish_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn missing_choices_is_a_provider_error() {
        let err = parse_chat_response("openai", &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
    }

    #[test]
    fn status_codes_map_to_failure_kinds() {
        let body = r#"{"error": {"message": "Incorrect API key provided"}}"#;
        match classify_status("openai", 401, body) {
            Error::Auth(m) => assert!(m.contains("Incorrect API key provided")),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(classify_status("openai", 429, ""), Error::RateLimited(_)));
        assert!(matches!(classify_status("openai", 503, ""), Error::Unavailable(_)));
        assert!(matches!(classify_status("openai", 400, "{}"), Error::InvalidRequest(_)));
        assert!(matches!(classify_status("openai", 500, ""), Error::Provider { .. }));
    }

    #[test]
    fn moderation_result_is_read_from_first_entry() {
        let body = serde_json::json!({"results": [{"flagged": true}]});
        assert!(parse_moderation("openai", &body).unwrap());
        assert!(parse_moderation("openai", &serde_json::json!({"results": []})).is_err());
    }

    #[test]
    fn empty_key_is_rejected() {
        let cfg = ProviderConfig::default();
        let err = OpenAiCompatProvider::with_key(&cfg, "  ".into(), Duration::from_secs(60))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Auth(_)));
    }
}
