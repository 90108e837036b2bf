use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{0} API key is not configured")]
    NotConfigured(&'static str),

    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("date is {days_ahead} days ahead, beyond the forecast horizon")]
    ForecastOutOfRange { days_ahead: i64 },
}

impl SourceError {
    /// Network failures, timeouts, 429 and 5xx are worth one more attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Http(error) => !error.is_decode() && !error.is_builder(),
            SourceError::Status { status, .. } => *status == 429 || *status >= 500,
            SourceError::NotConfigured(_)
            | SourceError::InvalidResponse(_)
            | SourceError::ForecastOutOfRange { .. } => false,
        }
    }
}
