use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures raised by capability handlers and the registry around them.
///
/// These never reach the agent loop as errors: the executor folds every one of
/// them into a failed [`ToolResult`](crate::models::tool::ToolResult).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Unknown capability: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("{0}")]
    ExecutionError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Failures of a round trip to the completion endpoint.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to reach the completion endpoint: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request failed: {status}\n{body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Operation cancelled")]
    Cancelled,
}

pub type ProviderResult<T> = Result<T, ProviderError>;
