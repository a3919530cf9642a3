use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Per-request timeout for the chat-completion round-trip.
    #[serde(default = "d_60000")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            provider: ProviderConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "d_provider_id")]
    pub id: String,
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            id: d_provider_id(),
            base_url: d_base_url(),
            auth: AuthConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Header name (e.g. "Authorization", "api-key").
    #[serde(default)]
    pub header: Option<String>,
    /// Header value prefix (e.g. "Bearer ").
    #[serde(default)]
    pub prefix: Option<String>,
    /// Env var containing the key.
    #[serde(default)]
    pub env: Option<String>,
    /// Direct key (for config-only setups; prefer env or keychain).
    #[serde(default)]
    pub key: Option<String>,
    /// Keychain service name (e.g., "recordbot").
    #[serde(default)]
    pub service: Option<String>,
    /// Keychain account name (e.g., "openai-api-key").
    #[serde(default)]
    pub account: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            header: None,
            prefix: None,
            env: Some("OPENAI_API_KEY".into()),
            key: None,
            service: None,
            account: None,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_60000() -> u64 {
    60_000
}
fn d_provider_id() -> String {
    "openai".into()
}
fn d_base_url() -> String {
    "https://api.openai.com/v1".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeout_is_sixty_seconds() {
        assert_eq!(LlmConfig::default().timeout_ms, 60_000);
    }

    #[test]
    fn auth_defaults_to_openai_env_var() {
        let auth = AuthConfig::default();
        assert_eq!(auth.env.as_deref(), Some("OPENAI_API_KEY"));
        assert!(auth.key.is_none());
    }

    #[test]
    fn provider_config_deserializes_keychain_fields() {
        let json = r#"{
            "id": "openai",
            "base_url": "https://example.test/v1",
            "auth": { "service": "recordbot", "account": "openai-api-key" }
        }"#;
        let cfg: ProviderConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.base_url, "https://example.test/v1");
        assert_eq!(cfg.auth.service.as_deref(), Some("recordbot"));
        assert_eq!(cfg.auth.account.as_deref(), Some("openai-api-key"));
        // Explicit auth tables replace the env default entirely.
        assert!(cfg.auth.env.is_none());
    }
}
