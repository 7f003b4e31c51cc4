use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Serialize;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::capabilities::{CapabilityExecutor, CapabilityRegistry};
use crate::context::prune_messages;
use crate::errors::{AgentError, AgentResult, ProviderError};
use crate::models::event::{AgentEvent, TerminalKind};
use crate::models::message::Message;
use crate::models::tool::ToolResult;
use crate::prompt_template::load_prompt_file;
use crate::providers::base::{Provider, StreamEvent};
use crate::token_counter::TokenCounter;

pub const DEFAULT_MAX_ITERATIONS: usize = 10;
pub const DEFAULT_MAX_CONTEXT_TOKENS: usize = 8192;

const CANCELLED: &str = "Operation cancelled";
const MAX_ITERATIONS_REACHED: &str = "Maximum iterations reached";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Completion round trips allowed per reply
    pub max_iterations: usize,
    pub max_context_tokens: usize,
    /// Replaces the rendered `system.md` prompt when set
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_context_tokens: DEFAULT_MAX_CONTEXT_TOKENS,
            system_prompt: None,
        }
    }
}

/// Summary of one reply once its event stream is drained
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutcome {
    pub content: String,
    pub iterations: usize,
    /// Capability calls whose results reached the conversation
    pub tool_calls: usize,
    /// Set when the reply ended in an error event
    pub terminal: Option<TerminalKind>,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
struct SystemInfo {
    name: String,
    description: String,
    instructions: String,
}

/// Agent integrates a foundational LLM with the systems it needs to pilot
pub struct Agent {
    provider: Box<dyn Provider>,
    executor: CapabilityExecutor,
    config: AgentConfig,
    token_counter: TokenCounter,
}

impl Agent {
    /// Create a new Agent with the specified provider and capabilities
    pub fn new(provider: Box<dyn Provider>, registry: CapabilityRegistry) -> Self {
        Self {
            provider,
            executor: CapabilityExecutor::new(registry),
            config: AgentConfig::default(),
            token_counter: TokenCounter::new(),
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        self.executor.registry()
    }

    /// The system prompt sent ahead of the conversation
    pub fn system_prompt(&self) -> AgentResult<String> {
        if let Some(prompt) = &self.config.system_prompt {
            return Ok(prompt.clone());
        }

        let systems_info: Vec<SystemInfo> = self
            .registry()
            .systems()
            .iter()
            .map(|system| SystemInfo {
                name: system.name().to_string(),
                description: system.description().to_string(),
                instructions: system.instructions().to_string(),
            })
            .collect();

        let mut context = HashMap::new();
        context.insert("systems", systems_info);
        load_prompt_file("system.md", &context).map_err(|e| AgentError::Internal(e.to_string()))
    }

    /// Answer `user_text`, appending every message of the exchange to `messages`.
    ///
    /// The returned stream ends with exactly one `Done` or `Error` event.
    /// Nothing is sent to the model or executed after `cancel` fires; a
    /// capability already running finishes but its result is discarded.
    pub fn reply<'a>(
        &'a self,
        messages: &'a mut Vec<Message>,
        user_text: &str,
        cancel: CancellationToken,
    ) -> BoxStream<'a, AgentEvent> {
        let user_text = user_text.to_string();

        Box::pin(async_stream::stream! {
            messages.push(Message::user().with_text(&user_text));

            let system = match self.system_prompt() {
                Ok(prompt) => Message::system().with_text(prompt),
                Err(e) => {
                    error!(error = %e, "could not render the system prompt");
                    yield terminal(TerminalKind::Failed, e.to_string(), String::new());
                    return;
                }
            };
            let tools = self.registry().tools();
            let capability_tokens = self.token_counter.count_tool_tokens(&tools);
            let mut content = String::new();
            let mut iteration = 0;

            loop {
                if cancel.is_cancelled() {
                    info!(iteration, "reply cancelled");
                    yield terminal(TerminalKind::Cancelled, CANCELLED, content);
                    return;
                }
                if iteration >= self.config.max_iterations {
                    warn!(iteration, "iteration cap reached");
                    yield terminal(TerminalKind::MaxIterations, MAX_ITERATIONS_REACHED, content);
                    return;
                }
                iteration += 1;
                yield AgentEvent::Thinking { iteration };

                let mut request = Vec::with_capacity(messages.len() + 1);
                request.push(system.clone());
                request.extend(messages.iter().cloned());
                let request = prune_messages(
                    &request,
                    self.config.max_context_tokens,
                    capability_tokens,
                );
                debug!(
                    iteration,
                    sent = request.len(),
                    history = messages.len() + 1,
                    "requesting completion"
                );

                let mut events = match self.provider.stream(&request, &tools, &cancel).await {
                    Ok(events) => events,
                    Err(e) => {
                        yield provider_failure(e, &cancel, content);
                        return;
                    }
                };

                let mut response = None;
                loop {
                    let event = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        event = events.recv() => event,
                    };
                    match event {
                        Some(StreamEvent::Content(text)) => yield AgentEvent::Content { text },
                        Some(StreamEvent::Done(message)) => {
                            response = Some(message);
                            break;
                        }
                        Some(StreamEvent::Error(e)) => {
                            error!(error = %e, "completion stream broke");
                            yield terminal(TerminalKind::Failed, e, content);
                            return;
                        }
                        None => break,
                    }
                }

                let Some(response) = response else {
                    if cancel.is_cancelled() {
                        yield terminal(TerminalKind::Cancelled, CANCELLED, content);
                    } else {
                        error!("completion stream closed without a response");
                        yield terminal(
                            TerminalKind::Failed,
                            "The completion stream closed before the response was complete",
                            content,
                        );
                    }
                    return;
                };

                content = response.content.clone();
                messages.push(response.clone());

                if !response.has_tool_calls() {
                    info!(iteration, "reply complete");
                    yield AgentEvent::Done { content };
                    return;
                }

                for (index, call) in response.tool_calls.iter().enumerate() {
                    if cancel.is_cancelled() {
                        close_unanswered(messages, &response, index);
                        yield terminal(TerminalKind::Cancelled, CANCELLED, content);
                        return;
                    }

                    yield AgentEvent::CapabilityStart {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    };
                    if cancel.is_cancelled() {
                        close_unanswered(messages, &response, index);
                        yield terminal(TerminalKind::Cancelled, CANCELLED, content);
                        return;
                    }

                    let result = self.executor.execute(call).await;
                    if cancel.is_cancelled() {
                        debug!(name = %call.name, "discarding result of cancelled capability");
                        close_unanswered(messages, &response, index);
                        yield terminal(TerminalKind::Cancelled, CANCELLED, content);
                        return;
                    }

                    messages.push(Message::tool_result(&call.id, &result));
                    yield AgentEvent::CapabilityDone {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        result,
                    };
                }
            }
        })
    }

    /// Drive a reply to completion
    pub async fn run(
        &self,
        messages: &mut Vec<Message>,
        user_text: &str,
        cancel: CancellationToken,
    ) -> AgentOutcome {
        let mut outcome = AgentOutcome {
            content: String::new(),
            iterations: 0,
            tool_calls: 0,
            terminal: None,
            error: None,
        };

        let mut events = self.reply(messages, user_text, cancel);
        while let Some(event) = events.next().await {
            match event {
                AgentEvent::Thinking { iteration } => outcome.iterations = iteration,
                AgentEvent::CapabilityDone { .. } => outcome.tool_calls += 1,
                AgentEvent::Done { content } => outcome.content = content,
                AgentEvent::Error {
                    kind,
                    message,
                    content,
                } => {
                    outcome.content = content;
                    outcome.terminal = Some(kind);
                    outcome.error = Some(message);
                }
                AgentEvent::Content { .. } | AgentEvent::CapabilityStart { .. } => {}
            }
        }
        outcome
    }
}

fn terminal(kind: TerminalKind, message: impl Into<String>, content: String) -> AgentEvent {
    AgentEvent::Error {
        kind,
        message: message.into(),
        content,
    }
}

fn provider_failure(
    error: ProviderError,
    cancel: &CancellationToken,
    content: String,
) -> AgentEvent {
    if cancel.is_cancelled() || matches!(error, ProviderError::Cancelled) {
        return terminal(TerminalKind::Cancelled, CANCELLED, content);
    }
    error!(error = %error, "completion request failed");
    terminal(TerminalKind::Failed, error.to_string(), content)
}

/// Answer the calls from `first` onwards that will never run, so every call in
/// the conversation stays paired with a tool message
fn close_unanswered(messages: &mut Vec<Message>, response: &Message, first: usize) {
    let cancelled = ToolResult::err(CANCELLED);
    for call in &response.tool_calls[first..] {
        messages.push(Message::tool_result(&call.id, &cancelled));
    }
}
