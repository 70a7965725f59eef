use serde::Serialize;

use crate::error::ChatError;
use crate::models::chat::Role;

/// The reply being assembled: role plus everything streamed so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssembledMessage {
    pub role: Role,
    pub content: String,
}

impl AssembledMessage {
    pub fn new() -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl Default for AssembledMessage {
    fn default() -> Self {
        Self::new()
    }
}

/// Notification delivered to whoever consumes an exchange.
///
/// An exchange yields any number of `ContentUpdated` followed by exactly one
/// `Completed` or `Failed`.
#[derive(Debug)]
pub enum ChatEvent {
    /// Snapshot carrying the cumulative content after a new fragment.
    ContentUpdated(AssembledMessage),
    Completed(AssembledMessage),
    Failed(ChatError),
}

impl ChatEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChatEvent::ContentUpdated(_))
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            ChatEvent::ContentUpdated(message) | ChatEvent::Completed(message) => {
                Some(&message.content)
            }
            ChatEvent::Failed(_) => None,
        }
    }
}
