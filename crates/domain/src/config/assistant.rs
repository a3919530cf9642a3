use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::thread::PartnerId;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Assistant identity and loop behaviour
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Partner id the bot posts as and is mentioned by.
    #[serde(default = "d_bot_id")]
    pub bot_id: PartnerId,
    /// Fixed opening line; also replayed as the first assistant turn.
    #[serde(default = "d_greeting")]
    pub greeting: String,
    /// Banner posted into a fresh private channel on first use.
    #[serde(default = "d_welcome")]
    pub welcome: String,
    /// Message subtype attached to every post.
    #[serde(default = "d_subtype")]
    pub subtype: String,
    /// Upper bound on provider round-trips in one tool loop.
    #[serde(default = "d_20")]
    pub max_rounds: usize,
    #[serde(default = "d_half")]
    pub temperature: f32,
    /// Run the planning request before the tool loop.
    #[serde(default = "d_true")]
    pub plan_first: bool,
    #[serde(default = "d_summary_temperature")]
    pub summary_temperature: f32,
    #[serde(default)]
    pub default_model: ModelTier,
    /// Per-user model selection, keyed by partner id.
    #[serde(default)]
    pub user_models: HashMap<String, ModelTier>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            bot_id: d_bot_id(),
            greeting: d_greeting(),
            welcome: d_welcome(),
            subtype: d_subtype(),
            max_rounds: 20,
            temperature: 0.5,
            plan_first: true,
            summary_temperature: d_summary_temperature(),
            default_model: ModelTier::default(),
            user_models: HashMap::new(),
        }
    }
}

impl AssistantConfig {
    /// The model tier selected by `user`, falling back to the default.
    pub fn model_for(&self, user: PartnerId) -> ModelTier {
        self.user_models
            .get(&user.to_string())
            .copied()
            .unwrap_or(self.default_model)
    }
}

/// The three context-size tiers a user can pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelTier {
    /// 4k context.
    #[default]
    #[serde(rename = "gpt-3.5-turbo-0613")]
    Standard4k,
    /// 16k context.
    #[serde(rename = "gpt-3.5-turbo-16k")]
    Extended16k,
    /// GPT-4, 8k context.
    #[serde(rename = "gpt-4")]
    Gpt4,
}

impl ModelTier {
    pub const ALL: [ModelTier; 3] = [ModelTier::Standard4k, ModelTier::Extended16k, ModelTier::Gpt4];

    /// Provider model identifier.
    pub fn model_id(self) -> &'static str {
        match self {
            ModelTier::Standard4k => "gpt-3.5-turbo-0613",
            ModelTier::Extended16k => "gpt-3.5-turbo-16k",
            ModelTier::Gpt4 => "gpt-4",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ModelTier::Standard4k => "4k Context Model",
            ModelTier::Extended16k => "16k Context Model",
            ModelTier::Gpt4 => "GPT4 8k",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.model_id())
    }
}

impl FromStr for ModelTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelTier::ALL
            .into_iter()
            .find(|t| t.model_id() == s)
            .or(match s {
                "4k" => Some(ModelTier::Standard4k),
                "16k" => Some(ModelTier::Extended16k),
                "8k" => Some(ModelTier::Gpt4),
                _ => None,
            })
            .ok_or_else(|| format!("unknown model tier: {s}"))
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_bot_id() -> PartnerId {
    2
}
fn d_greeting() -> String {
    "Hi, I'm RecordBot, an AI assistant. Feel free to ask me any questions.".into()
}
fn d_welcome() -> String {
    "RecordBot: Hello, I am RecordBot, a friendly AI assistant. Feel free to ask me any questions, or ask me to perform any action.".into()
}
fn d_subtype() -> String {
    "comment".into()
}
fn d_20() -> usize {
    20
}
fn d_half() -> f32 {
    0.5
}
fn d_true() -> bool {
    true
}
fn d_summary_temperature() -> f32 {
    0.1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_for_falls_back_to_default() {
        let mut cfg = AssistantConfig::default();
        cfg.user_models.insert("7".into(), ModelTier::Gpt4);
        assert_eq!(cfg.model_for(7), ModelTier::Gpt4);
        assert_eq!(cfg.model_for(8), ModelTier::Standard4k);
    }

    #[test]
    fn tier_parses_from_id_or_short_name() {
        assert_eq!("gpt-3.5-turbo-16k".parse::<ModelTier>(), Ok(ModelTier::Extended16k));
        assert_eq!("8k".parse::<ModelTier>(), Ok(ModelTier::Gpt4));
        assert!("gpt-5".parse::<ModelTier>().is_err());
    }

    #[test]
    fn tier_serializes_as_model_id() {
        let json = serde_json::to_string(&ModelTier::Gpt4).unwrap();
        assert_eq!(json, r#""gpt-4""#);
    }
}
