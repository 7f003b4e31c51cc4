use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::errors::{ProviderError, ProviderResult};
use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{single_event, Provider, StreamEvent};

/// One scripted turn of the mock provider
#[derive(Debug, Clone)]
pub enum MockResponse {
    Reply(Message),
    /// Streamed as one content event per fragment, then `Done`
    Fragments(Vec<String>),
    Fail(String),
    /// Never answers; resolves only through cancellation
    Hang,
}

/// A request the mock provider has seen
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<Tool>,
}

/// A mock provider that returns pre-configured responses for testing
#[derive(Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<MockResponse>>>,
    repeat: Option<MockResponse>,
    requests: Arc<Mutex<Vec<MockRequest>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self::scripted(responses.into_iter().map(MockResponse::Reply).collect())
    }

    pub fn scripted(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            repeat: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A provider that answers every request with the same message
    pub fn repeating(message: Message) -> Self {
        Self {
            repeat: Some(MockResponse::Reply(message)),
            ..Self::scripted(Vec::new())
        }
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<MockRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_response(&self, messages: &[Message], tools: &[Tool]) -> MockResponse {
        self.requests.lock().unwrap().push(MockRequest {
            messages: messages.to_vec(),
            tools: tools.to_vec(),
        });

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            // Return empty response if no more pre-configured responses
            self.repeat
                .clone()
                .unwrap_or_else(|| MockResponse::Reply(Message::assistant()))
        } else {
            responses.remove(0)
        }
    }
}

async fn resolve(response: MockResponse, cancel: &CancellationToken) -> ProviderResult<Message> {
    match response {
        MockResponse::Reply(message) => Ok(message),
        MockResponse::Fragments(fragments) => {
            Ok(Message::assistant().with_text(fragments.concat()))
        }
        MockResponse::Fail(reason) => Err(ProviderError::MalformedResponse(reason)),
        MockResponse::Hang => {
            cancel.cancelled().await;
            Err(ProviderError::Cancelled)
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
        cancel: &CancellationToken,
    ) -> ProviderResult<Message> {
        let response = self.next_response(messages, tools);
        resolve(response, cancel).await
    }

    async fn stream(
        &self,
        messages: &[Message],
        tools: &[Tool],
        cancel: &CancellationToken,
    ) -> ProviderResult<mpsc::Receiver<StreamEvent>> {
        let response = self.next_response(messages, tools);
        let fragments = match response {
            MockResponse::Fragments(fragments) if tools.is_empty() => fragments,
            other => return Ok(single_event(resolve(other, cancel).await?)),
        };

        let (tx, rx) = mpsc::channel(fragments.len() + 1);
        let assembled = Message::assistant().with_text(fragments.concat());
        for fragment in fragments {
            let _ = tx.try_send(StreamEvent::Content(fragment));
        }
        let _ = tx.try_send(StreamEvent::Done(assembled));
        Ok(rx)
    }
}
