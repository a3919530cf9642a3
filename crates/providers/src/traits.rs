use rb_domain::error::Result;
use rb_domain::tool::{Message, ToolCall, ToolDefinition, Usage};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic chat completion request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// The conversation messages to send.
    pub messages: Vec<Message>,
    /// Tool definitions the model may invoke.
    pub tools: Vec<ToolDefinition>,
    /// Sampling temperature (0.0 – 2.0). `None` lets the provider choose.
    pub temperature: Option<f32>,
    /// Model identifier override. When `None`, the provider uses its default.
    pub model: Option<String>,
}

/// A provider-agnostic chat completion response.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    /// Textual content of the response.
    pub content: String,
    /// Tool calls emitted by the model.
    pub tool_calls: Vec<ToolCall>,
    /// Token usage information.
    pub usage: Option<Usage>,
    /// The model that actually produced the response.
    pub model: String,
    /// The reason the model stopped generating (e.g. "stop", "tool_calls").
    pub finish_reason: Option<String>,
}

impl ChatResponse {
    /// The tool call this response asks for. Only one call is honoured per
    /// round-trip; parallel calls are disabled on the wire.
    pub fn tool_call(&self) -> Option<&ToolCall> {
        self.tool_calls.first()
    }

    /// The assistant transcript entry for this response.
    pub fn to_message(&self) -> Message {
        match self.tool_call() {
            Some(call) => Message::assistant_tool_call(&self.content, call),
            None => Message::assistant(self.content.clone()),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait that every chat-completion adapter must implement.
///
/// Errors are reported through the domain [`Error`](rb_domain::error::Error)
/// provider variants (`Auth`, `RateLimited`, `Timeout`, ...) so callers can
/// turn them into user-facing text without knowing the wire format.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request and wait for the full response.
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse>;

    /// Run the provider's content moderation on `input`. Returns `true`
    /// when the text is flagged.
    async fn moderate(&self, input: &str) -> Result<bool>;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rb_domain::tool::Role;

    #[test]
    fn response_without_tool_call_is_plain_assistant_text() {
        let resp = ChatResponse {
            content: "Done.".into(),
            ..Default::default()
        };
        let msg = resp.to_message();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content.text(), Some("Done."));
        assert!(msg.tool_call().is_none());
    }

    #[test]
    fn only_first_tool_call_is_kept() {
        let call = |id: &str| ToolCall {
            call_id: id.into(),
            tool_name: "read_record".into(),
            arguments: "{}".into(),
        };
        let resp = ChatResponse {
            tool_calls: vec![call("a"), call("b")],
            ..Default::default()
        };
        assert_eq!(resp.to_message().tool_call().map(|c| c.call_id), Some("a".into()));
    }
}
