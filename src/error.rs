use thiserror::Error;

/// Failure at the provider boundary. Unrecoverable inside the loop: the run
/// terminates and the error surfaces to the caller. No retries happen here;
/// retry/backoff policy belongs to whoever wraps [`crate::AgentLoop::run`].
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to parse provider json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed provider reply: {0}")]
    MalformedReply(String),
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("iteration budget exhausted after {iterations} provider calls")]
    IterationBudgetExceeded { iterations: usize },
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T, E = AgentError> = std::result::Result<T, E>;
