use crate::error::{ChatError, Result};
use crate::streaming::{EndOfStreamPolicy, RecoveryLimits};
use serde::Deserialize;
use std::env;
use std::fs;
use std::time::Duration;

const DEFAULT_GATEWAY_ENDPOINT: &str = "https://ai.gateway.lovable.dev/v1/chat/completions";
const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";
const DEFAULT_CHAT_URL: &str = "http://127.0.0.1:8080/functions/v1/ai-flight-instructor";

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

/// Upstream OpenAI-compatible chat-completion gateway used by the relay.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gateway_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Settings for the consuming side: where to post chat requests and how
/// tolerant the assembler is.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_chat_url")]
    pub chat_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_requeues")]
    pub max_requeues: usize,
    #[serde(default = "default_max_unresolved_bytes")]
    pub max_unresolved_bytes: usize,
    #[serde(default)]
    pub require_sentinel: bool,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_gateway_endpoint() -> String {
    DEFAULT_GATEWAY_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_chat_url() -> String {
    DEFAULT_CHAT_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_requeues() -> usize {
    RecoveryLimits::default().max_requeues
}

fn default_max_unresolved_bytes() -> usize {
    RecoveryLimits::default().max_unresolved_bytes
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_gateway_endpoint(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            chat_url: default_chat_url(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
            max_requeues: default_max_requeues(),
            max_unresolved_bytes: default_max_unresolved_bytes(),
            require_sentinel: false,
        }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn recovery_limits(&self) -> RecoveryLimits {
        RecoveryLimits {
            max_requeues: self.max_requeues,
            max_unresolved_bytes: self.max_unresolved_bytes,
        }
    }

    pub fn end_of_stream_policy(&self) -> EndOfStreamPolicy {
        if self.require_sentinel {
            EndOfStreamPolicy::RequireSentinel
        } else {
            EndOfStreamPolicy::Complete
        }
    }

    /// Checks the settings `ask` needs; the gateway section is not required.
    pub fn validate(&self) -> Result<()> {
        if self.chat_url.is_empty() {
            return Err(ChatError::ConfigError("Chat URL is empty".to_string()));
        }

        if self.timeout_secs == 0 {
            return Err(ChatError::ConfigError(
                "Client timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_requeues == 0 || self.max_unresolved_bytes == 0 {
            return Err(ChatError::ConfigError(
                "Recovery limits must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ChatError::ConfigError(format!("Invalid {} value: {}", name, e))),
        Err(_) => Ok(default),
    }
}

impl RelayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let listen_addr = env::var("INSTRUCTOR_LISTEN_ADDR").unwrap_or_else(|_| default_listen_addr());

        let gateway = GatewayConfig {
            api_key: env::var("AI_GATEWAY_API_KEY").unwrap_or_default(),
            endpoint: env::var("AI_GATEWAY_ENDPOINT").unwrap_or_else(|_| default_gateway_endpoint()),
            model: env::var("AI_GATEWAY_MODEL").unwrap_or_else(|_| default_model()),
            timeout_secs: env_parse("AI_GATEWAY_TIMEOUT_SECS", default_timeout_secs())?,
        };

        let client = ClientConfig {
            chat_url: env::var("INSTRUCTOR_CHAT_URL").unwrap_or_else(|_| default_chat_url()),
            api_key: env::var("INSTRUCTOR_API_KEY").unwrap_or_default(),
            timeout_secs: env_parse("INSTRUCTOR_TIMEOUT_SECS", default_timeout_secs())?,
            max_requeues: env_parse("INSTRUCTOR_MAX_REQUEUES", default_max_requeues())?,
            max_unresolved_bytes: env_parse(
                "INSTRUCTOR_MAX_UNRESOLVED_BYTES",
                default_max_unresolved_bytes(),
            )?,
            require_sentinel: env_parse("INSTRUCTOR_REQUIRE_SENTINEL", false)?,
        };

        Ok(RelayConfig {
            server: ServerConfig { listen_addr },
            gateway,
            client,
        })
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ChatError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let mut config: RelayConfig = toml::from_str(&contents)
            .map_err(|e| ChatError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        // Secrets from the environment win over the file
        if let Ok(api_key) = env::var("AI_GATEWAY_API_KEY") {
            config.gateway.api_key = api_key;
        }
        if let Ok(api_key) = env::var("INSTRUCTOR_API_KEY") {
            config.client.api_key = api_key;
        }

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.gateway.api_key.is_empty() {
            return Err(ChatError::ConfigError("Gateway API key is empty".to_string()));
        }

        if self.gateway.endpoint.is_empty() {
            return Err(ChatError::ConfigError("Gateway endpoint is empty".to_string()));
        }

        if self.gateway.model.is_empty() {
            return Err(ChatError::ConfigError("Gateway model is empty".to_string()));
        }

        if self.server.listen_addr.is_empty() {
            return Err(ChatError::ConfigError("Listen address is empty".to_string()));
        }

        self.client.validate()
    }
}
