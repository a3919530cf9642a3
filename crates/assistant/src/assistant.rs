//! Entry point: takes a message delivered by the host, decides whether to
//! answer, produces the answer and posts it back to the thread.

use std::sync::Arc;

use rb_domain::config::{AssistantConfig, ModelTier};
use rb_domain::error::Result;
use rb_domain::thread::{
    ChannelKind, IncomingMessage, MessageType, NewMessage, ThreadInfo, ThreadTarget,
};
use rb_providers::LlmProvider;
use rb_records::RecordTools;
use rb_threads::ThreadStore;

use crate::failure::describe_provider_failure;
use crate::gate::should_respond;
use crate::prompts;
use crate::summary::{render_record_info, summary_request};
use crate::transcript::{build_transcript, last_user_query, strip_markup};
use crate::turn::{run_loop, LoopContext};

/// A reply the assistant posted.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub body: String,
    pub message_type: MessageType,
    /// Id of the posted thread message.
    pub message_id: u64,
}

pub struct Assistant {
    config: AssistantConfig,
    /// `None` when no API key is configured.
    provider: Option<Arc<dyn LlmProvider>>,
    tools: RecordTools,
    threads: Arc<dyn ThreadStore>,
}

impl Assistant {
    pub fn new(
        config: AssistantConfig,
        provider: Option<Arc<dyn LlmProvider>>,
        tools: RecordTools,
        threads: Arc<dyn ThreadStore>,
    ) -> Self {
        Self {
            config,
            provider,
            tools,
            threads,
        }
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub fn tools(&self) -> &RecordTools {
        &self.tools
    }

    /// Handle `msg`, which the host has already appended to `thread`,
    /// using the model tier configured for its author.
    ///
    /// Returns `None` when the message is not for the assistant.
    pub async fn handle_message(
        &self,
        thread: &ThreadInfo,
        msg: &IncomingMessage,
    ) -> Result<Option<Reply>> {
        let tier = self.config.model_for(msg.author_id);
        self.handle_message_with(thread, msg, tier).await
    }

    /// [`handle_message`](Self::handle_message) with an explicit model tier.
    pub async fn handle_message_with(
        &self,
        thread: &ThreadInfo,
        msg: &IncomingMessage,
        tier: ModelTier,
    ) -> Result<Option<Reply>> {
        if !should_respond(msg, thread, self.config.bot_id) {
            tracing::trace!(author = msg.author_id, "message not addressed to the assistant");
            return Ok(None);
        }

        let key = thread.target.key();
        tracing::info!(thread = %key, author = msg.author_id, model = %tier, "handling message");

        let Some((body, message_type)) = self.answer(&thread.target, msg, tier).await? else {
            tracing::debug!(thread = %key, "empty answer, nothing posted");
            return Ok(None);
        };
        let reply = self.post(&thread.target, body, message_type).await?;
        Ok(Some(reply))
    }

    async fn answer(
        &self,
        target: &ThreadTarget,
        msg: &IncomingMessage,
        tier: ModelTier,
    ) -> Result<Option<(String, MessageType)>> {
        let Some(provider) = self.provider.as_deref() else {
            tracing::warn!("no provider API key configured");
            return Ok(Some((prompts::SETUP_MESSAGE.to_owned(), MessageType::Comment)));
        };

        match provider.moderate(&normalize_query(&msg.body)).await {
            Ok(false) => {}
            Ok(true) => {
                tracing::info!(author = msg.author_id, "message flagged by moderation");
                return Ok(Some((prompts::DECLINE_MESSAGE.to_owned(), MessageType::Comment)));
            }
            Err(e) => {
                tracing::warn!(error = %e, "moderation call failed");
                return Ok(Some((describe_provider_failure(&e), MessageType::Comment)));
            }
        }

        match target {
            ThreadTarget::Channel { .. } => {
                let answer = self.channel_answer(provider, target, msg, tier).await?;
                Ok(Some((answer, MessageType::Comment)))
            }
            ThreadTarget::Record { model, id } => Ok(self.record_summary(provider, model, *id).await),
        }
    }

    async fn channel_answer(
        &self,
        provider: &dyn LlmProvider,
        target: &ThreadTarget,
        msg: &IncomingMessage,
        tier: ModelTier,
    ) -> Result<String> {
        let history = self.threads.fetch_messages(target, None).await?;
        let transcript = build_transcript(&history, self.config.bot_id, &self.config.greeting);
        let query = last_user_query(&transcript).unwrap_or_else(|| strip_markup(&msg.body));

        let key = target.key();
        let ctx = LoopContext {
            provider,
            tools: &self.tools,
            model: tier,
            temperature: self.config.temperature,
            max_rounds: self.config.max_rounds,
            plan_first: self.config.plan_first,
            thread: &key,
        };
        let outcome = run_loop(&ctx, transcript, &query).await;

        for (payload, message_type) in outcome.persist {
            self.threads
                .post_message(
                    target,
                    NewMessage {
                        body: String::new(),
                        author_id: self.config.bot_id,
                        message_type,
                        subtype: Some(self.config.subtype.clone()),
                        function_payload: Some(payload),
                    },
                )
                .await?;
        }
        Ok(outcome.answer)
    }

    /// Chatter path: summarize the record the thread belongs to. A provider
    /// or record store failure becomes a comment describing it; an empty
    /// summary is not posted.
    async fn record_summary(
        &self,
        provider: &dyn LlmProvider,
        model: &str,
        id: i64,
    ) -> Option<(String, MessageType)> {
        let info = match render_record_info(self.tools.store().as_ref(), model, id).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(model, id, error = %e, "record information unavailable");
                let body = prompts::record_unavailable(model, id, &e.to_string());
                return Some((body, MessageType::Comment));
            }
        };
        tracing::debug!(model, id, chars = info.len(), "record information rendered");

        let req = summary_request(&info, self.config.summary_temperature);
        match provider.chat(&req).await {
            Ok(resp) if resp.content.trim().is_empty() => None,
            Ok(resp) => Some((resp.content, MessageType::Notification)),
            Err(e) => {
                tracing::warn!(model, id, error = %e, "summary request failed");
                Some((describe_provider_failure(&e), MessageType::Comment))
            }
        }
    }

    /// Summarize `model(id)` without going through a thread. An empty
    /// summary comes back as an empty string.
    pub async fn summarize(&self, model: &str, id: i64) -> Result<String> {
        let Some(provider) = self.provider.as_deref() else {
            return Ok(prompts::SETUP_MESSAGE.to_owned());
        };
        Ok(self
            .record_summary(provider, model, id)
            .await
            .map(|(body, _)| body)
            .unwrap_or_default())
    }

    /// Clear the conversation and start over with the greeting.
    pub async fn reset(&self, channel: &ThreadTarget) -> Result<Reply> {
        self.threads.clear(channel).await?;
        tracing::info!(thread = %channel.key(), "conversation reset");
        self.post(channel, self.config.greeting.clone(), MessageType::Comment)
            .await
    }

    /// Post the welcome banner into an empty private chat. Returns `true`
    /// when the banner was posted.
    pub async fn ensure_welcome(&self, channel: &ThreadTarget) -> Result<bool> {
        if !matches!(channel, ThreadTarget::Channel { kind: ChannelKind::Chat, .. }) {
            return Ok(false);
        }
        if !self.threads.fetch_messages(channel, Some(1)).await?.is_empty() {
            return Ok(false);
        }
        self.post(channel, self.config.welcome.clone(), MessageType::Comment)
            .await?;
        Ok(true)
    }

    async fn post(
        &self,
        target: &ThreadTarget,
        body: String,
        message_type: MessageType,
    ) -> Result<Reply> {
        let stored = self
            .threads
            .post_message(
                target,
                NewMessage {
                    body: body.clone(),
                    author_id: self.config.bot_id,
                    message_type,
                    subtype: Some(self.config.subtype.clone()),
                    function_payload: None,
                },
            )
            .await?;
        Ok(Reply {
            body,
            message_type,
            message_id: stored.id,
        })
    }
}

/// Text sent to moderation: markup removed, trimmed, lowercased, without
/// leading or trailing `.` and `!`.
pub fn normalize_query(body: &str) -> String {
    strip_markup(body)
        .trim()
        .to_lowercase()
        .trim_matches(['.', '!'])
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_query_strips_markup_and_punctuation() {
        assert_eq!(
            normalize_query("<p>Show me the LAST orders!\u{a0}Thanks.</p>"),
            "show me the last orders! thanks"
        );
    }

    #[test]
    fn normalize_query_keeps_interior_dots() {
        assert_eq!(normalize_query("Read sale.order!!"), "read sale.order");
        assert_eq!(normalize_query("...hi."), "hi");
    }

    #[test]
    fn normalize_query_keeps_other_punctuation() {
        assert_eq!(normalize_query("  who is S00007?  "), "who is s00007?");
    }
}
