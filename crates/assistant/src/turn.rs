//! Orchestration loop: alternates provider calls and record tool calls
//! until the model produces a final answer or the round budget runs out.

use rb_domain::config::ModelTier;
use rb_domain::thread::MessageType;
use rb_domain::tool::Message;
use rb_domain::trace::TraceEvent;
use rb_providers::{ChatRequest, LlmProvider};
use rb_records::{tool_definitions, RecordStore, RecordTools, ToolErrorKind, ToolFailure};

use crate::failure::describe_provider_failure;
use crate::links::rewrite_links;
use crate::prompts::{self, Correction};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Loop parameters and state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything one loop run needs besides the transcript.
pub struct LoopContext<'a> {
    pub provider: &'a dyn LlmProvider,
    pub tools: &'a RecordTools,
    pub model: ModelTier,
    pub temperature: f32,
    pub max_rounds: usize,
    /// Send the planning request before the first round.
    pub plan_first: bool,
    /// Thread key, for logging.
    pub thread: &'a str,
}

/// Mutable bookkeeping of one loop run.
#[derive(Debug)]
pub struct LoopState {
    pub round: usize,
    pub max_rounds: usize,
    /// Failure of the most recent tool call, if it failed.
    pub last_failure: Option<ToolFailure>,
    /// Successful `(tool call, result)` entries waiting to be persisted.
    pub staged: Vec<(Message, MessageType)>,
}

impl LoopState {
    pub fn new(max_rounds: usize) -> Self {
        Self {
            round: 0,
            max_rounds,
            last_failure: None,
            staged: Vec::new(),
        }
    }

    fn exhausted(&self) -> bool {
        self.round >= self.max_rounds
    }
}

/// How a loop run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEnd {
    /// The model answered without calling a tool.
    Final,
    /// A provider call failed; the answer is the failure description.
    ProviderFailure,
    /// The round budget ran out while the model kept calling tools.
    Exhausted,
}

impl LoopEnd {
    fn as_str(self) -> &'static str {
        match self {
            LoopEnd::Final => "final",
            LoopEnd::ProviderFailure => "provider_failure",
            LoopEnd::Exhausted => "exhausted",
        }
    }
}

/// Result of a loop run.
#[derive(Debug)]
pub struct LoopOutcome {
    /// Visible reply, links already rewritten.
    pub answer: String,
    /// Function entries to persist before the reply, in order. Empty unless
    /// the run produced a final answer and its last tool call succeeded.
    pub persist: Vec<(Message, MessageType)>,
    pub rounds: usize,
    pub end: LoopEnd,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run the loop over `transcript`. `query` is the user's request, repeated
/// in corrective prompts after a failed tool call.
pub async fn run_loop(ctx: &LoopContext<'_>, mut transcript: Vec<Message>, query: &str) -> LoopOutcome {
    let tools = tool_definitions();

    if ctx.plan_first {
        if let Err(answer) = plan(ctx, &mut transcript, &tools).await {
            return finish(ctx, LoopState::new(ctx.max_rounds), answer, LoopEnd::ProviderFailure);
        }
    }

    let mut state = LoopState::new(ctx.max_rounds);
    while !state.exhausted() {
        let req = ChatRequest {
            messages: transcript.clone(),
            tools: tools.clone(),
            temperature: Some(ctx.temperature),
            model: Some(ctx.model.model_id().to_owned()),
        };
        let resp = match ctx.provider.chat(&req).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(thread = ctx.thread, round = state.round, error = %e, "provider call failed");
                return finish(ctx, state, describe_provider_failure(&e), LoopEnd::ProviderFailure);
            }
        };
        state.round += 1;

        let assistant_msg = resp.to_message();
        transcript.push(assistant_msg.clone());

        let Some(call) = resp.tool_call().cloned() else {
            tracing::debug!(thread = ctx.thread, round = state.round, "final answer");
            return finish(ctx, state, resp.content, LoopEnd::Final);
        };
        tracing::debug!(
            thread = ctx.thread,
            round = state.round,
            tool = %call.tool_name,
            "tool call requested"
        );

        match ctx.tools.invoke(&call).await {
            Ok(result) => {
                let result_msg = Message::function_result(&call, result, false);
                transcript.push(result_msg.clone());
                state.staged.push((assistant_msg, MessageType::BotFunctionRequest));
                state.staged.push((result_msg, MessageType::BotFunction));
                state.last_failure = None;
            }
            Err(failure) => {
                transcript.push(Message::function_result(&call, failure.message.clone(), true));
                let correction = correction_for(ctx.tools.store().as_ref(), &failure).await;
                transcript.push(Message::user(prompts::corrective_prompt(&correction, query)));
                state.last_failure = Some(failure);
            }
        }
    }

    tracing::warn!(thread = ctx.thread, rounds = state.round, "round budget exhausted");
    finish(ctx, state, String::new(), LoopEnd::Exhausted)
}

/// Planning request: ask the model to lay out the record operations, keep
/// its answer, then repeat the user's entry so the real query comes last.
/// A provider failure yields the reply text as `Err`.
async fn plan(
    ctx: &LoopContext<'_>,
    transcript: &mut Vec<Message>,
    tools: &[rb_domain::tool::ToolDefinition],
) -> Result<(), String> {
    let user_entry = transcript.last().cloned();
    transcript.push(Message::user(prompts::PLANNING_INSTRUCTION));

    let req = ChatRequest {
        messages: transcript.clone(),
        tools: tools.to_vec(),
        temperature: Some(ctx.temperature),
        model: Some(ctx.model.model_id().to_owned()),
    };
    match ctx.provider.chat(&req).await {
        Ok(resp) => {
            // Only the plan text is kept: a tool call here would have no result.
            if !resp.content.trim().is_empty() {
                transcript.push(Message::assistant(resp.content));
            }
        }
        Err(e) => {
            tracing::warn!(thread = ctx.thread, error = %e, "planning request failed");
            return Err(describe_provider_failure(&e));
        }
    }

    if let Some(entry) = user_entry {
        transcript.push(entry);
    }
    Ok(())
}

fn finish(ctx: &LoopContext<'_>, state: LoopState, content: String, end: LoopEnd) -> LoopOutcome {
    let (answer, persist) = match end {
        LoopEnd::ProviderFailure => (content, Vec::new()),
        LoopEnd::Final | LoopEnd::Exhausted if content.trim().is_empty() => {
            (prompts::APOLOGY_MESSAGE.to_owned(), Vec::new())
        }
        LoopEnd::Final | LoopEnd::Exhausted => {
            let persist = if state.last_failure.is_none() {
                state.staged
            } else {
                Vec::new()
            };
            (rewrite_links(&content), persist)
        }
    };

    TraceEvent::LoopFinished {
        thread: ctx.thread.to_owned(),
        rounds: state.round,
        persisted_entries: persist.len(),
        outcome: end.as_str().to_owned(),
    }
    .emit();

    LoopOutcome {
        answer,
        persist,
        rounds: state.round,
        end,
    }
}

/// Gather what the corrective prompt for `failure` needs from the store.
/// Falls back to the generic correction when the lookup fails.
async fn correction_for(store: &dyn RecordStore, failure: &ToolFailure) -> Correction {
    let Some(model) = failure.model.clone() else {
        return match failure.kind {
            ToolErrorKind::TypeMismatch => Correction::Type,
            _ => Correction::Other,
        };
    };

    match failure.kind {
        ToolErrorKind::ModelNotFound => {
            let prefix = model.split('.').next().unwrap_or_default();
            match store.list_models().await {
                Ok(models) => Correction::Model {
                    candidates: models
                        .into_iter()
                        .map(|m| m.model)
                        .filter(|m| m.split('.').next() == Some(prefix))
                        .collect(),
                    model,
                },
                Err(e) => {
                    tracing::warn!(error = %e, "listing models for correction failed");
                    Correction::Other
                }
            }
        }
        ToolErrorKind::FieldNotFound => match store.describe_fields(&model).await {
            Ok(fields) => Correction::Field {
                fields: fields.into_keys().collect(),
                model,
            },
            Err(e) => {
                tracing::warn!(error = %e, "describing fields for correction failed");
                Correction::Other
            }
        },
        ToolErrorKind::TypeMismatch => Correction::Type,
        ToolErrorKind::Other => Correction::Other,
    }
}
