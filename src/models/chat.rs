use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Kind of answer requested. Unknown values fall back to plain chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum ChatMode {
    #[serde(rename = "study-guide")]
    StudyGuide,
    #[default]
    #[serde(rename = "chat")]
    #[serde(other)]
    Chat,
}

/// Document the user is currently reading, if any.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DocumentContext {
    pub title: String,
    pub aircraft: String,
    pub category: String,
}

/// Body posted to the chat endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Conversation so far, oldest first
    pub messages: Vec<ChatMessage>,

    /// Optional mode tag, sent as `type`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ChatMode>,

    /// Optional document the question is about
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_context: Option<DocumentContext>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            mode: None,
            document_context: None,
        }
    }

    pub fn mode(&self) -> ChatMode {
        self.mode.unwrap_or_default()
    }
}

/// Body of every non-success response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorBody {
    pub error: String,
}
