use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    /// The HTTP exchange failed, returned a non-success status, or the body
    /// stream broke off mid-way.
    #[error("{message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    QuotaExhausted(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Stream closed without a completion marker")]
    MissingSentinel,

    #[error("Invalid chat request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] std::env::VarError),
}

impl ChatError {
    /// Map a non-success HTTP status and its server-provided message to the
    /// matching error subtype.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => ChatError::RateLimited(message),
            402 => ChatError::QuotaExhausted(message),
            _ => ChatError::Transport {
                status: Some(status),
                message,
            },
        }
    }

    /// True for every error raised by the transport, including the rate-limit
    /// and quota subtypes.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ChatError::Transport { .. }
                | ChatError::RateLimited(_)
                | ChatError::QuotaExhausted(_)
                | ChatError::HttpError(_)
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ChatError::Transport { status, .. } => *status,
            ChatError::RateLimited(_) => Some(429),
            ChatError::QuotaExhausted(_) => Some(402),
            ChatError::HttpError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
