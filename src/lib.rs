//! # Flight Instructor Stream
//!
//! Streaming chat plumbing for the AI flight instructor assistant.
//!
//! ## Overview
//!
//! The consuming side turns a chat-completion SSE response into a growing
//! assistant message:
//! - **[`StreamFrameDecoder`]** - Raw bytes to SSE lines, across arbitrary chunk boundaries
//! - **[`DeltaAssembler`]** - SSE lines to content deltas and a running message
//! - **[`InstructorClient`]** - `begin_stream(messages, mode)` returning a [`ChatSubscription`]
//!
//! The serving side is a small relay that adds the instructor system prompt
//! and forwards the conversation to an OpenAI-compatible gateway.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flight_instructor_stream::config::ClientConfig;
//! use flight_instructor_stream::models::ChatMessage;
//! use flight_instructor_stream::{ChatEvent, InstructorClient};
//! use futures::StreamExt;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = InstructorClient::new(ClientConfig::default())?;
//! let mut events = client.begin_stream(vec![ChatMessage::user("What is V1?")], None);
//!
//! while let Some(event) = events.next().await {
//!     match event {
//!         ChatEvent::ContentUpdated(message) => println!("{}", message.content),
//!         ChatEvent::Completed(_) => break,
//!         ChatEvent::Failed(e) => return Err(e.into()),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`streaming`] - Frame decoder, delta assembler and exchange pump
//! - [`client`] - Chat endpoint client and upstream gateway client
//! - [`handler`] - Axum relay endpoints
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Error types and handling

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod models;
pub mod prompt;
pub mod provider;
pub mod streaming;
pub mod validation;

pub use client::{GatewayClient, InstructorClient};
pub use config::RelayConfig;
pub use error::{ChatError, Result};
pub use streaming::{
    AssembledMessage, AssemblyState, ChatEvent, ChatSubscription, DeltaAssembler,
    StreamFrameDecoder,
};
