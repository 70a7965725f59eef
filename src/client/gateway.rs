use reqwest::Client;
use tracing::{error, info};

use crate::config::GatewayConfig;
use crate::error::{ChatError, Result};
use crate::models::chat::ChatMessage;
use crate::models::completion::CompletionRequest;
use crate::provider::{Provider, ProviderStream, StreamFuture};

/// OpenAI-compatible chat-completion gateway
pub struct GatewayClient {
    client: Client,
    config: GatewayConfig,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ChatError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }
}

impl Provider for GatewayClient {
    fn stream_chat(&self, messages: Vec<ChatMessage>) -> StreamFuture {
        let client = self.client.clone();
        let url = self.config.endpoint.clone();
        let api_key = self.config.api_key.clone();
        let request = CompletionRequest::streaming(self.config.model.clone(), messages);

        Box::pin(async move { Self::stream_chat_impl(client, url, api_key, request).await })
    }

    fn name(&self) -> &str {
        "Gateway"
    }
}

impl GatewayClient {
    async fn stream_chat_impl(
        client: Client,
        url: String,
        api_key: String,
        request: CompletionRequest,
    ) -> Result<ProviderStream> {
        if api_key.is_empty() {
            error!("Gateway API key is not configured");
            return Err(ChatError::ConfigError("AI service is not configured".to_string()));
        }

        info!(
            model = %request.model,
            messages = request.messages.len(),
            "Gateway: Sending chat completion request"
        );

        let response = client
            .post(&url)
            .bearer_auth(&api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::Transport {
                status: None,
                message: format!("Gateway request failed: {}", e),
            })?;

        let status = response.status();
        info!("Gateway responded with status: {}", status);

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = status.as_u16(), body = %error_body, "Gateway error");
            return Err(ChatError::from_status(status.as_u16(), error_body));
        }

        Ok(Box::pin(response.bytes_stream()))
    }
}
