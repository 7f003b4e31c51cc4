use serde::Serialize;
use serde_json::Value;

use super::tool::ToolResult;

/// Why a reply ended without a final answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalKind {
    /// The completion endpoint could not be reached or answered badly
    Failed,
    /// The model kept requesting capabilities past the iteration cap
    MaxIterations,
    /// The caller fired the cancellation token
    Cancelled,
}

/// Lifecycle events emitted by the agent while it processes one request.
///
/// Every event stream ends with exactly one `Done` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Thinking {
        iteration: usize,
    },
    Content {
        text: String,
    },
    CapabilityStart {
        id: String,
        name: String,
        arguments: Value,
    },
    CapabilityDone {
        id: String,
        name: String,
        result: ToolResult,
    },
    Done {
        content: String,
    },
    Error {
        kind: TerminalKind,
        message: String,
        /// Whatever final content had been accumulated, possibly empty
        content: String,
    },
}

impl AgentEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentEvent::Done { .. } | AgentEvent::Error { .. })
    }
}
