use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{AgentError, Result};

/// Environment lookup with injectable overrides, so configuration resolution
/// is testable without touching process state.
#[derive(Debug, Clone, Default)]
pub struct Env {
    overrides: BTreeMap<String, String>,
}

impl Env {
    /// Reads from the process environment only.
    pub fn process() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    /// Blank values are treated as unset, for overrides and process
    /// variables alike.
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.overrides.get(key) {
            return Some(value.clone()).filter(|value| !value.trim().is_empty());
        }
        std::env::var(key)
            .ok()
            .filter(|value| !value.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Anthropic,
    OpenaiCompatible,
}

impl ProviderKind {
    pub fn default_api_key_env(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::OpenaiCompatible => "OPENAI_API_KEY",
        }
    }
}

/// Declarative provider configuration, deserializable from TOML:
///
/// ```toml
/// kind = "openai_compatible"
/// base_url = "http://localhost:11434/v1"
/// model = "llama3.2"
/// api_key_env = "OLLAMA_API_KEY"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl ProviderConfig {
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|err| AgentError::Config(format!("invalid provider config: {err}")))
    }

    /// Resolves the API key from the configured variable, falling back to the
    /// provider's conventional one. A missing key fails at construction time
    /// rather than mid-run.
    pub fn resolve_api_key(&self, env: &Env) -> Result<String> {
        let key = self
            .api_key_env
            .as_deref()
            .unwrap_or_else(|| self.kind.default_api_key_env());
        env.get(key)
            .ok_or_else(|| AgentError::Config(format!("environment variable {key} is not set")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_toml_config() -> Result<()> {
        let config = ProviderConfig::from_toml(
            r#"
            kind = "anthropic"
            model = "claude-3-7-sonnet-20250219"
            "#,
        )?;
        assert_eq!(config.kind, ProviderKind::Anthropic);
        assert_eq!(config.model.as_deref(), Some("claude-3-7-sonnet-20250219"));
        assert!(config.base_url.is_none());
        Ok(())
    }

    #[test]
    fn rejects_unknown_config_keys() {
        let err = ProviderConfig::from_toml("kind = \"anthropic\"\nretries = 3\n")
            .expect_err("unknown key should be rejected");
        assert!(matches!(err, AgentError::Config(_)));
    }

    #[test]
    fn resolves_api_key_with_override_and_fallback() -> Result<()> {
        let config = ProviderConfig::from_toml("kind = \"openai_compatible\"")?;
        let env = Env::default().with_var("OPENAI_API_KEY", "sk-test");
        assert_eq!(config.resolve_api_key(&env)?, "sk-test");

        let custom = ProviderConfig::from_toml(
            "kind = \"openai_compatible\"\napi_key_env = \"LOCAL_KEY\"\n",
        )?;
        let env = Env::default().with_var("LOCAL_KEY", "sk-local");
        assert_eq!(custom.resolve_api_key(&env)?, "sk-local");
        Ok(())
    }

    #[test]
    fn blank_override_counts_as_unset() {
        let env = Env::default().with_var("REAGENT_TEST_BLANK_KEY", "  ");
        assert_eq!(env.get("REAGENT_TEST_BLANK_KEY"), None);

        let env = Env::default().with_var("REAGENT_TEST_SET_KEY", "sk-test");
        assert_eq!(env.get("REAGENT_TEST_SET_KEY"), Some("sk-test".to_string()));
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let config = ProviderConfig {
            kind: ProviderKind::Anthropic,
            base_url: None,
            model: None,
            api_key_env: Some("REAGENT_TEST_UNSET_KEY".to_string()),
        };
        let err = config
            .resolve_api_key(&Env::default())
            .expect_err("unset variable should fail");
        assert!(matches!(err, AgentError::Config(_)));
    }
}
