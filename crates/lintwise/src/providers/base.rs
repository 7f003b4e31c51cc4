use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::errors::ProviderResult;
use crate::models::message::Message;
use crate::models::tool::Tool;

/// Capacity of the channel between a streaming response and its consumer
pub const STREAM_CHANNEL_CAPACITY: usize = 32;

/// Low-level events produced while a completion is delivered
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// An incremental fragment of the answer
    Content(String),
    /// The assembled response; always the last event of a successful stream
    Done(Message),
    /// The stream broke after it started
    Error(String),
}

/// Base trait for completion endpoints
#[async_trait]
pub trait Provider: Send + Sync {
    /// Send the conversation and wait for the whole response
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
        cancel: &CancellationToken,
    ) -> ProviderResult<Message>;

    /// Deliver the response as a sequence of events.
    ///
    /// Providers that cannot stream, and every request that offers tools,
    /// produce a single `Done` event from a blocking completion.
    async fn stream(
        &self,
        messages: &[Message],
        tools: &[Tool],
        cancel: &CancellationToken,
    ) -> ProviderResult<mpsc::Receiver<StreamEvent>> {
        let message = self.complete(messages, tools, cancel).await?;
        Ok(single_event(message))
    }
}

/// A receiver that yields one `Done` event and then closes
pub fn single_event(message: Message) -> mpsc::Receiver<StreamEvent> {
    let (tx, rx) = mpsc::channel(1);
    // capacity 1 and a fresh channel: this cannot fail
    let _ = tx.try_send(StreamEvent::Done(message));
    rx
}
