use serde::Serialize;

/// Structured trace events emitted across all RecordBot crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    LlmRequest {
        provider: String,
        model: String,
        with_tools: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
        total_tokens: Option<u32>,
    },
    ModerationChecked {
        provider: String,
        flagged: bool,
    },
    ToolInvoked {
        tool: String,
        model: Option<String>,
        ok: bool,
        error_kind: Option<String>,
        duration_ms: u64,
    },
    LoopFinished {
        thread: String,
        rounds: usize,
        persisted_entries: usize,
        outcome: String,
    },
    ThreadAppend {
        thread: String,
        lines: usize,
    },
    ThreadCleared {
        thread: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "rb_event");
    }
}
