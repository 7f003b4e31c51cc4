use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::base::{single_event, Provider, StreamEvent, STREAM_CHANNEL_CAPACITY};
use super::configs::OllamaProviderConfig;
use crate::errors::{ProviderError, ProviderResult};
use crate::models::message::Message;
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

pub const OLLAMA_HOST: &str = "http://localhost:11434";
pub const OLLAMA_MODEL: &str = "qwen2.5";

pub struct OllamaProvider {
    client: Client,
    config: OllamaProviderConfig,
}

impl OllamaProvider {
    pub fn new(config: OllamaProviderConfig) -> ProviderResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OllamaProviderConfig {
        &self.config
    }

    fn create_payload(&self, messages: &[Message], tools: &[Tool], stream: bool) -> Value {
        let mut options = json!({ "num_ctx": self.config.context_window });
        if let Some(temperature) = self.config.temperature {
            options["temperature"] = json!(temperature);
        }

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_to_ollama_format(messages),
            "stream": stream,
            "options": options,
            "keep_alive": self.config.keep_alive,
        });
        if !tools.is_empty() {
            payload["tools"] = json!(tools_to_ollama_format(tools));
        }
        payload
    }

    async fn post(&self, payload: &Value, cancel: &CancellationToken) -> ProviderResult<Response> {
        let url = format!("{}/api/chat", self.config.host.trim_end_matches('/'));
        debug!(
            %url,
            model = %self.config.model,
            stream = %payload["stream"],
            "sending chat request"
        );

        // dropping the request future aborts the connection
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            response = self.client.post(&url).json(payload).send() => response?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }
        Ok(response)
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
        cancel: &CancellationToken,
    ) -> ProviderResult<Message> {
        let payload = self.create_payload(messages, tools, false);
        let response = self.post(&payload, cancel).await?;

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            body = response.text() => body?,
        };
        let data: Value = serde_json::from_str(&body)
            .map_err(|e| ProviderError::MalformedResponse(format!("{}: {}", e, body)))?;

        response_to_message(&data)
    }

    async fn stream(
        &self,
        messages: &[Message],
        tools: &[Tool],
        cancel: &CancellationToken,
    ) -> ProviderResult<mpsc::Receiver<StreamEvent>> {
        // Streamed answers tend to narrate before a tool call is fully formed,
        // so any request offering tools is delivered in one piece.
        if !tools.is_empty() || !self.config.stream {
            let message = self.complete(messages, tools, cancel).await?;
            return Ok(single_event(message));
        }

        let payload = self.create_payload(messages, tools, true);
        let response = self.post(&payload, cancel).await?;

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        tokio::spawn(read_stream(response, tx, cancel.clone()));
        Ok(rx)
    }
}

async fn read_stream(
    response: Response,
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
) {
    let mut body = response.bytes_stream();
    let mut decoder = LineDecoder::default();
    let mut content = String::new();

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("stream cancelled while waiting for data");
                return;
            }
            chunk = body.next() => chunk,
        };

        let (lines, exhausted) = match chunk {
            Some(Ok(bytes)) => (decoder.push(&bytes), false),
            Some(Err(e)) => {
                let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                return;
            }
            None => (decoder.finish().into_iter().collect(), true),
        };

        match forward_lines(&lines, &mut content, &tx).await {
            LineOutcome::Closed => return,
            LineOutcome::Done => break,
            LineOutcome::Continue if exhausted => break,
            LineOutcome::Continue => {}
        }
    }

    let _ = tx
        .send(StreamEvent::Done(Message::assistant().with_text(&content)))
        .await;
}

enum LineOutcome {
    Continue,
    Done,
    Closed,
}

/// Forward the fragments in `lines`, accumulating them into `content`
async fn forward_lines(
    lines: &[String],
    content: &mut String,
    tx: &mpsc::Sender<StreamEvent>,
) -> LineOutcome {
    for line in lines {
        let chunk: StreamChunk = match serde_json::from_str(line) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(error = %e, line = %line, "skipping malformed stream line");
                continue;
            }
        };

        if let Some(error) = chunk.error {
            let _ = tx.send(StreamEvent::Error(error)).await;
            return LineOutcome::Closed;
        }
        if let Some(fragment) = chunk.message.map(|m| m.content) {
            if !fragment.is_empty() {
                content.push_str(&fragment);
                if tx.send(StreamEvent::Content(fragment)).await.is_err() {
                    // consumer is gone
                    return LineOutcome::Closed;
                }
            }
        }
        if chunk.done {
            return LineOutcome::Done;
        }
    }
    LineOutcome::Continue
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

/// Splits a byte stream into trimmed, non-empty lines; a partial line is held
/// until its newline arrives
#[derive(Debug, Default)]
struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..pos]).trim().to_string();
            if !text.is_empty() {
                lines.push(text);
            }
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        let text = String::from_utf8_lossy(&self.buffer).trim().to_string();
        self.buffer.clear();
        (!text.is_empty()).then_some(text)
    }
}

/// Convert internal messages to the Ollama chat message format
pub fn messages_to_ollama_format(messages: &[Message]) -> Vec<Value> {
    let mut call_names: HashMap<&str, &str> = HashMap::new();
    let mut converted_messages = Vec::with_capacity(messages.len());

    for message in messages {
        let mut converted = json!({
            "role": message.role.as_str(),
            "content": message.content,
        });

        if !message.tool_calls.is_empty() {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|call| {
                    call_names.insert(&call.id, &call.name);
                    json!({
                        "function": {
                            "name": call.name,
                            "arguments": call.arguments,
                        }
                    })
                })
                .collect();
            converted["tool_calls"] = json!(calls);
        }

        if message.role == Role::Tool {
            if let Some(name) = message
                .tool_call_id
                .as_deref()
                .and_then(|id| call_names.get(id))
            {
                converted["tool_name"] = json!(name);
            }
        }

        converted_messages.push(converted);
    }
    converted_messages
}

pub fn tools_to_ollama_format(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                }
            })
        })
        .collect()
}

/// Parse a single-shot chat response.
///
/// When the model requests tools, any text it produced alongside is dropped:
/// the turn is either an answer or a set of calls, never both.
pub fn response_to_message(response: &Value) -> ProviderResult<Message> {
    let message = response
        .get("message")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            ProviderError::MalformedResponse(format!("no message in response: {}", response))
        })?;

    let calls = match message.get("tool_calls") {
        Some(Value::Array(calls)) => calls
            .iter()
            .map(parse_tool_call)
            .collect::<ProviderResult<Vec<_>>>()?,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            return Err(ProviderError::MalformedResponse(format!(
                "tool_calls is not a list: {}",
                other
            )))
        }
    };

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default();

    if calls.is_empty() {
        return Ok(Message::assistant().with_text(content));
    }

    if !content.trim().is_empty() {
        debug!(discarded = %content, "dropping text that accompanied tool calls");
    }
    Ok(calls
        .into_iter()
        .fold(Message::assistant(), |message, call| message.with_tool_call(call)))
}

fn parse_tool_call(call: &Value) -> ProviderResult<ToolCall> {
    let function = call.get("function").ok_or_else(|| {
        ProviderError::MalformedResponse(format!("tool call without function: {}", call))
    })?;
    let name = function
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ProviderError::MalformedResponse(format!("tool call without name: {}", call))
        })?;

    // some models send the arguments as an encoded JSON string
    let arguments = match function.get("arguments") {
        Some(Value::String(raw)) if raw.trim().is_empty() => Value::Object(Map::new()),
        Some(Value::String(raw)) => serde_json::from_str(raw).map_err(|e| {
            ProviderError::MalformedResponse(format!(
                "could not parse arguments of {}: {}",
                name, e
            ))
        })?,
        Some(Value::Null) | None => Value::Object(Map::new()),
        Some(value) => value.clone(),
    };

    let id = call
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    Ok(ToolCall::new(id, name, arguments))
}
