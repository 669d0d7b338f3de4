use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Parsed tool-call arguments. `serde_json`'s `preserve_order` feature keeps
/// the provider's key order, which callers reading the transcript rely on.
pub type ArgumentMap = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One message-equivalent unit in a conversation.
///
/// Invariant: an assistant turn has nonempty `tool_calls` or a defined `text`
/// (possibly the empty string), never neither.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolCallResult>,
}

impl Turn {
    pub fn system(text: impl Into<String>) -> Self {
        Self::text_turn(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text_turn(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text_turn(Role::Assistant, text)
    }

    fn text_turn(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: Some(text.into()),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
        }
    }

    /// Assistant turn as decoded from a provider reply: optional text plus
    /// zero or more tool-call requests.
    pub fn assistant_reply(text: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            text,
            tool_calls,
            tool_results: Vec::new(),
        }
    }

    /// Tool-role turn carrying exactly one dispatch result.
    pub fn tool_result(result: ToolCallResult) -> Self {
        Self {
            role: Role::Tool,
            text: None,
            tool_calls: Vec::new(),
            tool_results: vec![result],
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

/// A structured tool invocation requested by the model. `id` is the
/// provider's correlation token; adapters synthesize one when the provider
/// omits it, so id-matched results can always be sent back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: ArgumentMap,
}

/// Recoverable tool failure. Never aborts the run: each variant becomes an
/// error payload in a [`ToolCallResult`] fed back to the model, which can
/// then self-correct on the next iteration.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolError {
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },
    #[error("tool execution failed: {message}")]
    ExecutionFailed { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { value: Value },
    Error { error: ToolError },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub request_id: String,
    pub name: String,
    pub outcome: ToolOutcome,
}

impl ToolCallResult {
    pub fn success(request: &ToolCallRequest, value: Value) -> Self {
        Self {
            request_id: request.id.clone(),
            name: request.name.clone(),
            outcome: ToolOutcome::Success { value },
        }
    }

    pub fn error(request: &ToolCallRequest, error: ToolError) -> Self {
        Self {
            request_id: request.id.clone(),
            name: request.name.clone(),
            outcome: ToolOutcome::Error { error },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Error { .. })
    }

    /// JSON payload sent back to the model as the tool's output. Errors are
    /// rendered as `{"error": "..."}` so the model sees what went wrong.
    pub fn payload(&self) -> String {
        match &self.outcome {
            ToolOutcome::Success { value } => value.to_string(),
            ToolOutcome::Error { error } => {
                serde_json::json!({ "error": error.to_string() }).to_string()
            }
        }
    }
}

/// Tool-selection policy forwarded to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
    Tool {
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(id: &str) -> ToolCallRequest {
        let mut arguments = ArgumentMap::new();
        arguments.insert("ticker".to_string(), json!("MSFT"));
        ToolCallRequest {
            id: id.to_string(),
            name: "get_stock_price".to_string(),
            arguments,
        }
    }

    #[test]
    fn success_payload_is_raw_json() {
        let result = ToolCallResult::success(&request("call_1"), json!({ "price": 402.5 }));
        assert!(!result.is_error());
        assert_eq!(result.payload(), r#"{"price":402.5}"#);
    }

    #[test]
    fn error_payload_names_the_failure() {
        let result = ToolCallResult::error(
            &request("call_1"),
            ToolError::UnknownTool {
                name: "get_stock_price".to_string(),
            },
        );
        assert!(result.is_error());
        assert_eq!(
            result.payload(),
            r#"{"error":"unknown tool: get_stock_price"}"#
        );
    }

    #[test]
    fn turn_serde_roundtrip_keeps_argument_order() {
        let mut arguments = ArgumentMap::new();
        arguments.insert("b".to_string(), json!(2));
        arguments.insert("a".to_string(), json!(1));
        let turn = Turn::assistant_reply(
            None,
            vec![ToolCallRequest {
                id: "call_1".to_string(),
                name: "add".to_string(),
                arguments,
            }],
        );

        let raw = serde_json::to_string(&turn).expect("serialize turn");
        let parsed: Turn = serde_json::from_str(&raw).expect("parse turn");
        let keys: Vec<&String> = parsed.tool_calls[0].arguments.keys().collect();
        assert_eq!(keys, ["b", "a"]);
    }
}
