use serde::{Deserialize, Serialize};

use super::chat::ChatMessage;

/// OpenAI-compatible chat-completion request sent to the gateway
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionRequest {
    pub model: String,

    /// System prompt first, then the conversation
    pub messages: Vec<ChatMessage>,

    /// Always true: the relay only forwards streamed replies
    pub stream: bool,
}

impl CompletionRequest {
    pub fn streaming(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
        }
    }
}
