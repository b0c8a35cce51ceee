use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("Request to TeachAssist failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("TeachAssist answered {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Authentication failed. Please check your credentials.")]
    AuthenticationFailed,

    #[error("The TeachAssist session appears to have expired")]
    SessionExpired,

    #[error("Could not find required element on the page: {0}")]
    ElementNotFound(String),

    #[error("Failed to parse HTML: {0}")]
    ParsingError(String),

    #[error("Request budget exhausted, retry in {retry_after:?}")]
    RateLimited { retry_after: Duration },
}

/// Coarse classification callers use to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport trouble. Safe to retry with backoff.
    Network,
    /// Credentials rejected or session lost. Re-prompt, never retry blindly.
    Auth,
    /// The portal markup no longer matches what we expect.
    Parse,
    /// Our own request budget ran out.
    RateLimit,
}

impl ScraperError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScraperError::RequestError(_) | ScraperError::HttpStatus { .. } => ErrorKind::Network,
            ScraperError::AuthenticationFailed | ScraperError::SessionExpired => ErrorKind::Auth,
            ScraperError::ElementNotFound(_) | ScraperError::ParsingError(_) => ErrorKind::Parse,
            ScraperError::RateLimited { .. } => ErrorKind::RateLimit,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Network
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
