use futures::stream::{self, StreamExt};
use reqwest::{Client, Response};
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::{ChatError, Result};
use crate::models::chat::{ChatMessage, ChatMode, ChatRequest, DocumentContext, ErrorBody};
use crate::streaming::{ChatEvent, ChatSubscription, DeltaAssembler, pump};

/// Caller-side client of the chat endpoint.
///
/// Every call to [`begin_stream`](Self::begin_stream) is an independent
/// exchange with its own assembler; nothing is shared between them.
#[derive(Clone)]
pub struct InstructorClient {
    client: Client,
    config: ClientConfig,
    document_context: Option<DocumentContext>,
}

impl InstructorClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ChatError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            document_context: None,
        })
    }

    /// Attach the document the user is reading to every request.
    pub fn with_document_context(mut self, document: DocumentContext) -> Self {
        self.document_context = Some(document);
        self
    }

    pub fn document_context(&self) -> Option<&DocumentContext> {
        self.document_context.as_ref()
    }

    /// Post the conversation and stream the reply.
    ///
    /// The returned subscription yields content updates followed by exactly one
    /// terminal event. HTTP failures, including 429 and 402, arrive as a single
    /// `Failed` event. Dropping the subscription cancels the exchange.
    pub fn begin_stream(&self, messages: Vec<ChatMessage>, mode: Option<ChatMode>) -> ChatSubscription {
        let request = ChatRequest {
            messages,
            mode,
            document_context: self.document_context.clone(),
        };
        let client = self.client.clone();
        let url = self.config.chat_url.clone();
        let api_key = self.config.api_key.clone();
        let assembler = DeltaAssembler::with_limits(self.config.recovery_limits())
            .end_of_stream(self.config.end_of_stream_policy());

        let exchange = async move {
            let exchange_id = assembler.exchange_id();
            info!(
                exchange_id = %exchange_id,
                messages = request.messages.len(),
                mode = ?request.mode(),
                "Starting chat exchange"
            );

            match Self::send(&client, &url, &api_key, &request).await {
                Ok(response) => pump(response.bytes_stream(), assembler).boxed(),
                Err(e) => {
                    warn!(exchange_id = %exchange_id, error = %e, "Chat request rejected");
                    stream::iter([ChatEvent::Failed(e)]).boxed()
                }
            }
        };

        ChatSubscription::new(stream::once(exchange).flatten())
    }

    async fn send(client: &Client, url: &str, api_key: &str, request: &ChatRequest) -> Result<Response> {
        let mut builder = client.post(url).json(request);
        if !api_key.is_empty() {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|e| ChatError::Transport {
            status: None,
            message: format!("Failed to reach chat service: {}", e),
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| "Failed to get response".to_string());
            return Err(ChatError::from_status(status.as_u16(), message));
        }

        Ok(response)
    }
}
