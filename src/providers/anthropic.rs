use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::adapter::ProviderAdapter;
use crate::catalog::ToolCatalog;
use crate::config::{Env, ProviderConfig};
use crate::error::{AgentError, ProviderError};
use crate::turns::{ArgumentMap, Role, ToolCallRequest, ToolChoice, Turn};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Adapter for the Anthropic Messages API: replies arrive as an array of
/// typed content blocks (`text` / `tool_use`), tool results go back as
/// `tool_result` blocks inside a user-role message.
#[derive(Clone)]
pub struct AnthropicAdapter {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    version: String,
    max_tokens: u32,
    temperature: Option<f32>,
    tool_choice: ToolChoice,
}

impl AnthropicAdapter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            version: DEFAULT_VERSION.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            tool_choice: ToolChoice::Auto,
        }
    }

    pub fn from_config(config: &ProviderConfig, env: &Env) -> Result<Self, AgentError> {
        let api_key = config.resolve_api_key(env)?;
        let model = config
            .model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| AgentError::Config("anthropic model is not set".to_string()))?;
        let mut out = Self::new(api_key, model);
        if let Some(base_url) = config.base_url.as_deref().filter(|s| !s.trim().is_empty()) {
            out = out.with_base_url(base_url);
        }
        Ok(out)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sampling temperature; the Messages API accepts [0, 1], so values
    /// outside that range are clamped at encode time.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Per-call deadline; expiry surfaces as a transport-level
    /// [`ProviderError`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = tool_choice;
        self
    }

    fn messages_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/messages") {
            base.to_string()
        } else {
            format!("{base}/messages")
        }
    }

    fn tool_declaration(spec: &crate::catalog::ToolSpec) -> Value {
        serde_json::json!({
            "name": spec.name,
            "description": spec.description,
            "input_schema": spec.input_schema,
        })
    }

    fn tool_choice_value(choice: &ToolChoice) -> Option<Value> {
        match choice {
            ToolChoice::Auto => Some(serde_json::json!({ "type": "auto" })),
            ToolChoice::Required => Some(serde_json::json!({ "type": "any" })),
            ToolChoice::Tool { name } => Some(serde_json::json!({ "type": "tool", "name": name })),
            ToolChoice::None => None,
        }
    }

    fn turn_to_message(turn: &Turn) -> Option<Value> {
        match turn.role {
            // Leading system turns are hoisted by the caller; anything else
            // system-role has no Messages API shape.
            Role::System => None,
            // A defined-but-empty text still encodes, so degenerate turns
            // stay visible in the wire transcript.
            Role::User => turn.text.as_deref().map(|text| {
                serde_json::json!({
                    "role": "user",
                    "content": [{ "type": "text", "text": text }],
                })
            }),
            Role::Assistant => {
                let mut blocks = Vec::<Value>::new();
                if let Some(text) = turn.text.as_deref().filter(|t| !t.is_empty()) {
                    blocks.push(serde_json::json!({ "type": "text", "text": text }));
                }
                for call in &turn.tool_calls {
                    blocks.push(serde_json::json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": Value::Object(call.arguments.clone()),
                    }));
                }
                (!blocks.is_empty())
                    .then(|| serde_json::json!({ "role": "assistant", "content": blocks }))
            }
            Role::Tool => {
                let blocks: Vec<Value> = turn
                    .tool_results
                    .iter()
                    .map(|result| {
                        serde_json::json!({
                            "type": "tool_result",
                            "tool_use_id": result.request_id,
                            "content": result.payload(),
                            "is_error": result.is_error(),
                        })
                    })
                    .collect();
                (!blocks.is_empty())
                    .then(|| serde_json::json!({ "role": "user", "content": blocks }))
            }
        }
    }

    fn request_body(&self, conversation: &[Turn], catalog: &ToolCatalog) -> Value {
        let mut system = Vec::<String>::new();
        let mut saw_non_system = false;
        let mut messages = Vec::<Value>::new();

        for turn in conversation {
            if turn.role == Role::System {
                if saw_non_system {
                    warn!("dropping system turn that follows non-system turns");
                } else if !turn.text().is_empty() {
                    system.push(turn.text().to_string());
                }
                continue;
            }
            saw_non_system = true;
            if let Some(message) = Self::turn_to_message(turn) {
                messages.push(message);
            }
        }

        let mut body = Map::<String, Value>::new();
        body.insert("model".to_string(), Value::String(self.model.clone()));
        body.insert("messages".to_string(), Value::Array(messages));
        body.insert("max_tokens".to_string(), Value::Number(self.max_tokens.into()));
        if let Some(temperature) = self.temperature {
            let clamped = temperature.clamp(0.0, 1.0);
            if clamped != temperature {
                warn!(
                    original = f64::from(temperature),
                    clamped = f64::from(clamped),
                    "clamping temperature to the messages api range"
                );
            }
            body.insert(
                "temperature".to_string(),
                Value::Number(
                    serde_json::Number::from_f64(f64::from(clamped)).unwrap_or_else(|| 0.into()),
                ),
            );
        }
        if !system.is_empty() {
            body.insert("system".to_string(), Value::String(system.join("\n\n")));
        }

        if !catalog.is_empty() && self.tool_choice != ToolChoice::None {
            let tools: Vec<Value> = catalog.declarations().map(Self::tool_declaration).collect();
            body.insert("tools".to_string(), Value::Array(tools));
            if let Some(choice) = Self::tool_choice_value(&self.tool_choice) {
                body.insert("tool_choice".to_string(), choice);
            }
        }

        Value::Object(body)
    }
}

#[derive(Debug, Deserialize)]
struct MessagesReply {
    #[serde(default)]
    content: Vec<Value>,
}

fn decode_reply(reply: &MessagesReply) -> Result<Turn, ProviderError> {
    let mut text = String::new();
    let mut saw_text = false;
    let mut tool_calls = Vec::<ToolCallRequest>::new();

    for block in &reply.content {
        let Some(kind) = block.get("type").and_then(Value::as_str) else {
            continue;
        };
        match kind {
            "text" => {
                if let Some(chunk) = block.get("text").and_then(Value::as_str) {
                    saw_text = true;
                    text.push_str(chunk);
                }
            }
            "tool_use" => {
                let name = block
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ProviderError::MalformedReply("tool_use block without name".to_string())
                    })?
                    .to_string();
                let id = match block.get("id").and_then(Value::as_str) {
                    Some(id) if !id.trim().is_empty() => id.to_string(),
                    _ => format!("toolu_synth_{}", tool_calls.len()),
                };
                let arguments = decode_input(block.get("input"))?;
                tool_calls.push(ToolCallRequest {
                    id,
                    name,
                    arguments,
                });
            }
            _ => {}
        }
    }

    Ok(Turn::assistant_reply(saw_text.then_some(text), tool_calls))
}

fn decode_input(input: Option<&Value>) -> Result<ArgumentMap, ProviderError> {
    match input {
        None | Some(Value::Null) => Ok(ArgumentMap::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(other) => Err(ProviderError::MalformedReply(format!(
            "tool_use input is not an object: {other}"
        ))),
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn provider(&self) -> &str {
        "anthropic"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn send(
        &self,
        conversation: &[Turn],
        catalog: &ToolCatalog,
    ) -> Result<Turn, ProviderError> {
        let body = self.request_body(conversation, catalog);

        let response = self
            .http
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.version)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }

        let reply = response.json::<MessagesReply>().await?;
        decode_reply(&reply)
    }
}
