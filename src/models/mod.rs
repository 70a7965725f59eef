pub mod chat;
pub mod completion;

pub use chat::{ChatMessage, ChatMode, ChatRequest, DocumentContext, ErrorBody, Role};
pub use completion::CompletionRequest;
