use thiserror::Error;

/// Transport-level failures talking to the chat completions endpoint.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language model is not configured")]
    NotConfigured,

    #[error("rate limited by language model provider")]
    RateLimited,

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited => true,
            LlmError::Api { status, .. } => *status >= 500,
            LlmError::Network(_) => true,
            LlmError::NotConfigured | LlmError::InvalidResponse(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("request text is empty")]
    EmptyInput,

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("model output is not a date request: {0}")]
    Unparseable(String),
}

impl ExtractionError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExtractionError::Llm(error) if error.is_retryable())
    }
}

#[derive(Debug, Error)]
pub enum NarrationError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("model returned an empty narrative")]
    EmptyOutput,
}

impl NarrationError {
    pub fn is_unconfigured(&self) -> bool {
        matches!(self, NarrationError::Llm(LlmError::NotConfigured))
    }
}
