/// Shared error type used across all RecordBot crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider could not be reached (DNS, TLS, connection refused).
    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// Invalid, expired or revoked credentials (HTTP 401/403).
    #[error("auth: {0}")]
    Auth(String),

    /// Request rate or quota exhausted (HTTP 429).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Provider outage (HTTP 503).
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The provider rejected the request shape (HTTP 400/404/422).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Any other provider-side failure (HTTP 5xx, malformed body).
    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("config: {0}")]
    Config(String),

    #[error("record store: {0}")]
    Store(String),

    #[error("thread: {0}")]
    Thread(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for every failure that originates from the chat-completion
    /// provider rather than from the host stores.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Error::Http(_)
                | Error::Timeout(_)
                | Error::Auth(_)
                | Error::RateLimited(_)
                | Error::Unavailable(_)
                | Error::InvalidRequest(_)
                | Error::Provider { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
