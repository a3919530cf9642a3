mod assistant;
mod llm;
mod storage;

pub use assistant::*;
pub use llm::*;
pub use storage::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl ConfigError {
    fn error(field: &str, message: &str) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: &str, message: &str) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.llm.provider.base_url.is_empty() {
            errors.push(ConfigError::error(
                "llm.provider.base_url",
                "base_url must not be empty",
            ));
        }

        if self.llm.timeout_ms == 0 {
            errors.push(ConfigError::error(
                "llm.timeout_ms",
                "timeout must be greater than 0",
            ));
        }

        // A missing key is not fatal: every message is answered with the
        // setup instructions until one is configured.
        let auth = &self.llm.provider.auth;
        if auth.key.is_none() && auth.env.is_none() && auth.service.is_none() {
            errors.push(ConfigError::warning(
                "llm.provider.auth",
                "no API key source configured",
            ));
        }
        if auth.key.is_some() {
            errors.push(ConfigError::warning(
                "llm.provider.auth.key",
                "plaintext API key in config; prefer env or keychain",
            ));
        }

        if self.assistant.max_rounds == 0 {
            errors.push(ConfigError::error(
                "assistant.max_rounds",
                "max_rounds must be greater than 0",
            ));
        }

        if !(0.0..=2.0).contains(&self.assistant.temperature) {
            errors.push(ConfigError::error(
                "assistant.temperature",
                "temperature must be within 0.0..=2.0",
            ));
        }

        if self.assistant.greeting.trim().is_empty() {
            errors.push(ConfigError::error(
                "assistant.greeting",
                "greeting must not be empty",
            ));
        }

        for key in self.assistant.user_models.keys() {
            if key.parse::<i64>().is_err() {
                errors.push(ConfigError::error(
                    &format!("assistant.user_models.{key}"),
                    "user key must be a numeric partner id",
                ));
            }
        }

        errors
    }
}
