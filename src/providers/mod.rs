mod anthropic;
mod openai_compatible;

pub use anthropic::AnthropicAdapter;
pub use openai_compatible::OpenAiCompatibleAdapter;
