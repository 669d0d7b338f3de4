//! Provider-agnostic tool-calling agent loop ("ReAct" loop) for LLM chat
//! APIs: send the conversation plus a tool catalog to a model, execute the
//! tool calls it requests, fold the results back in, and repeat until the
//! model answers in plain text or the iteration budget runs out.

pub mod adapter;
pub mod agent;
pub mod catalog;
pub mod config;
mod dispatch;
mod error;
pub mod providers;
pub mod session;
pub mod turns;

pub use adapter::ProviderAdapter;
pub use agent::{AgentLoop, AgentOutcome, DEFAULT_MAX_ITERATIONS};
pub use catalog::{HandlerError, ToolCatalog, ToolHandler, ToolSpec};
pub use config::{Env, ProviderConfig, ProviderKind};
pub use dispatch::dispatch;
pub use error::{AgentError, ProviderError, Result};
pub use providers::{AnthropicAdapter, OpenAiCompatibleAdapter};
pub use session::AgentSession;
pub use turns::{
    ArgumentMap, Role, ToolCallRequest, ToolCallResult, ToolChoice, ToolError, ToolOutcome, Turn,
};
