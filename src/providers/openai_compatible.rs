use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::adapter::ProviderAdapter;
use crate::catalog::ToolCatalog;
use crate::config::{Env, ProviderConfig};
use crate::error::{AgentError, ProviderError};
use crate::turns::{ArgumentMap, Role, ToolCallRequest, ToolChoice, Turn};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Adapter for OpenAI-style chat/completions endpoints (OpenAI, Ollama,
/// vLLM, OpenRouter, ...): one assistant message per reply with a parallel
/// `tool_calls` array whose arguments are JSON-encoded strings.
#[derive(Clone)]
pub struct OpenAiCompatibleAdapter {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    tool_choice: ToolChoice,
}

impl OpenAiCompatibleAdapter {
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
            tool_choice: ToolChoice::Auto,
        }
    }

    pub fn from_config(config: &ProviderConfig, env: &Env) -> Result<Self, AgentError> {
        let api_key = config.resolve_api_key(env)?;
        let model = config
            .model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| AgentError::Config("openai-compatible model is not set".to_string()))?;
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

    /// Per-call deadline; expiry surfaces as a transport-level
    /// [`ProviderError`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = tool_choice;
        self
    }

    fn chat_completions_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{base}/chat/completions")
        }
    }

    fn tool_declaration(spec: &crate::catalog::ToolSpec) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": spec.name,
                "description": spec.description,
                "parameters": spec.input_schema,
            }
        })
    }

    fn tool_choice_value(choice: &ToolChoice) -> Value {
        match choice {
            ToolChoice::Auto => Value::String("auto".to_string()),
            ToolChoice::None => Value::String("none".to_string()),
            ToolChoice::Required => Value::String("required".to_string()),
            ToolChoice::Tool { name } => serde_json::json!({
                "type": "function",
                "function": { "name": name }
            }),
        }
    }

    fn turn_to_messages(turn: &Turn, out: &mut Vec<Value>) {
        match turn.role {
            Role::System => {
                let text = turn.text();
                if !text.is_empty() {
                    out.push(serde_json::json!({ "role": "system", "content": text }));
                }
            }
            // A defined-but-empty text still encodes, so degenerate turns
            // stay visible in the wire transcript.
            Role::User => {
                if let Some(text) = turn.text.as_deref() {
                    out.push(serde_json::json!({ "role": "user", "content": text }));
                }
            }
            Role::Assistant => {
                let mut message = Map::<String, Value>::new();
                message.insert("role".to_string(), Value::String("assistant".to_string()));
                message.insert(
                    "content".to_string(),
                    match turn.text.as_deref() {
                        Some(text) => Value::String(text.to_string()),
                        None => Value::Null,
                    },
                );
                if !turn.tool_calls.is_empty() {
                    let calls: Vec<Value> = turn
                        .tool_calls
                        .iter()
                        .map(|call| {
                            serde_json::json!({
                                "id": call.id,
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": Value::Object(call.arguments.clone()).to_string(),
                                }
                            })
                        })
                        .collect();
                    message.insert("tool_calls".to_string(), Value::Array(calls));
                }
                out.push(Value::Object(message));
            }
            // One wire message per result; the id carries the correlation.
            Role::Tool => {
                for result in &turn.tool_results {
                    out.push(serde_json::json!({
                        "role": "tool",
                        "tool_call_id": result.request_id,
                        "content": result.payload(),
                    }));
                }
            }
        }
    }

    fn request_body(&self, conversation: &[Turn], catalog: &ToolCatalog) -> Value {
        let mut messages = Vec::<Value>::new();
        for turn in conversation {
            Self::turn_to_messages(turn, &mut messages);
        }

        let mut body = Map::<String, Value>::new();
        body.insert("model".to_string(), Value::String(self.model.clone()));
        body.insert("messages".to_string(), Value::Array(messages));

        if !catalog.is_empty() {
            let tools: Vec<Value> = catalog.declarations().map(Self::tool_declaration).collect();
            body.insert("tools".to_string(), Value::Array(tools));
            body.insert(
                "tool_choice".to_string(),
                Self::tool_choice_value(&self.tool_choice),
            );
        }

        Value::Object(body)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsReply {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize, Default)]
struct ChatChoice {
    #[serde(default)]
    message: ChatMessage,
}

#[derive(Debug, Deserialize, Default)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize, Default)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    #[serde(default)]
    function: WireFunction,
}

#[derive(Debug, Deserialize, Default)]
struct WireFunction {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: String,
}

fn decode_reply(reply: ChatCompletionsReply) -> Result<Turn, ProviderError> {
    let Some(choice) = reply.choices.into_iter().next() else {
        return Err(ProviderError::MalformedReply(
            "reply contained no choices".to_string(),
        ));
    };

    let mut tool_calls = Vec::<ToolCallRequest>::new();
    for (index, call) in choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .enumerate()
    {
        let id = if call.id.trim().is_empty() {
            format!("call_synth_{index}")
        } else {
            call.id
        };
        tool_calls.push(ToolCallRequest {
            id,
            name: call.function.name,
            arguments: decode_arguments(&call.function.arguments)?,
        });
    }

    Ok(Turn::assistant_reply(choice.message.content, tool_calls))
}

fn decode_arguments(raw: &str) -> Result<ArgumentMap, ProviderError> {
    if raw.trim().is_empty() {
        return Ok(ArgumentMap::new());
    }
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(ArgumentMap::new()),
        other => Err(ProviderError::MalformedReply(format!(
            "tool call arguments are not a json object: {other}"
        ))),
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatibleAdapter {
    fn provider(&self) -> &str {
        "openai-compatible"
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
            .post(self.chat_completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }

        let reply = response.json::<ChatCompletionsReply>().await?;
        decode_reply(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ToolSpec;
    use crate::turns::ToolCallResult;
    use serde_json::json;

    fn adapter() -> OpenAiCompatibleAdapter {
        OpenAiCompatibleAdapter::new("sk-test", "gpt-4o")
    }

    fn catalog() -> ToolCatalog {
        ToolCatalog::new().with_tool(ToolSpec::new(
            "add",
            "Add two integers.",
            json!({
                "type": "object",
                "properties": {
                    "a": { "type": "integer" },
                    "b": { "type": "integer" }
                },
                "required": ["a", "b"]
            }),
            |_| Ok(json!(null)),
        ))
    }

    #[test]
    fn encodes_assistant_calls_and_tool_results() {
        let mut arguments = ArgumentMap::new();
        arguments.insert("a".to_string(), json!(2));
        arguments.insert("b".to_string(), json!(2));
        let request = ToolCallRequest {
            id: "call_1".to_string(),
            name: "add".to_string(),
            arguments,
        };
        let result = ToolCallResult::success(&request, json!(4));

        let body = adapter().request_body(
            &[
                Turn::system("You are a helpful AI assistant."),
                Turn::user("What is 2+2 using the add tool?"),
                Turn::assistant_reply(None, vec![request]),
                Turn::tool_result(result),
            ],
            &catalog(),
        );

        let messages = body["messages"].as_array().expect("messages array");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], json!("system"));
        assert_eq!(messages[2]["content"], json!(null));
        assert_eq!(
            messages[2]["tool_calls"][0]["function"]["arguments"],
            json!(r#"{"a":2,"b":2}"#)
        );
        assert_eq!(messages[3]["role"], json!("tool"));
        assert_eq!(messages[3]["tool_call_id"], json!("call_1"));
        assert_eq!(messages[3]["content"], json!("4"));
        assert_eq!(body["tools"][0]["function"]["name"], json!("add"));
        assert_eq!(body["tool_choice"], json!("auto"));
    }

    #[test]
    fn with_model_overrides_constructor_model() {
        let body = adapter()
            .with_model("gpt-4o-mini")
            .request_body(&[Turn::user("hi")], &catalog());
        assert_eq!(body["model"], json!("gpt-4o-mini"));
    }

    #[test]
    fn empty_user_text_still_reaches_the_wire() {
        let body = adapter().request_body(&[Turn::user("")], &catalog());
        let messages = body["messages"].as_array().expect("messages array");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0], json!({ "role": "user", "content": "" }));
    }

    #[test]
    fn decodes_parallel_tool_calls_in_order() -> Result<(), ProviderError> {
        let reply: ChatCompletionsReply = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [
                        {
                            "id": "call_a",
                            "type": "function",
                            "function": { "name": "add", "arguments": "{\"a\":1,\"b\":2}" }
                        },
                        {
                            "id": "",
                            "type": "function",
                            "function": { "name": "add", "arguments": "" }
                        }
                    ]
                }
            }]
        }))
        .expect("fixture parses");

        let turn = decode_reply(reply)?;
        assert!(turn.text.is_none());
        assert_eq!(turn.tool_calls.len(), 2);
        assert_eq!(turn.tool_calls[0].id, "call_a");
        assert_eq!(turn.tool_calls[0].arguments["b"], json!(2));
        // Empty wire id gets a synthesized stable one.
        assert_eq!(turn.tool_calls[1].id, "call_synth_1");
        assert!(turn.tool_calls[1].arguments.is_empty());
        Ok(())
    }

    #[test]
    fn empty_choices_is_malformed() {
        let reply = ChatCompletionsReply {
            choices: Vec::new(),
        };
        let err = decode_reply(reply).expect_err("empty choices should fail");
        assert!(matches!(err, ProviderError::MalformedReply(_)));
    }

    #[test]
    fn non_object_arguments_are_malformed() {
        let err = decode_arguments("[1, 2]").expect_err("array arguments should fail");
        assert!(matches!(err, ProviderError::MalformedReply(_)));
    }

    #[test]
    fn unparseable_arguments_surface_as_json_error() {
        let err = decode_arguments("{not json").expect_err("bad json should fail");
        assert!(matches!(err, ProviderError::Json(_)));
    }
}
