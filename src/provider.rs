use bytes::Bytes;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::models::chat::ChatMessage;

/// Type alias for the raw SSE body returned by a provider
pub type ProviderStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Type alias for the future returned by stream_chat
pub type StreamFuture = Pin<Box<dyn Future<Output = Result<ProviderStream>> + Send>>;

/// Trait for upstream chat-completion services the relay forwards to
pub trait Provider: Send + Sync {
    /// Start a streamed completion
    ///
    /// # Arguments
    /// * `messages` - Full conversation, system prompt included
    ///
    /// # Returns
    /// The provider's SSE body, untouched
    fn stream_chat(&self, messages: Vec<ChatMessage>) -> StreamFuture;

    /// Get the provider name for logging
    fn name(&self) -> &str;
}
