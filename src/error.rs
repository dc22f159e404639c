use thiserror::Error;

/// Error taxonomy for the monitoring core.
///
/// "Lineup not yet published" is deliberately NOT an error; the client
/// normalizes it into [`crate::types::LineupResponse::NotPublished`].
#[derive(Error, Debug)]
pub enum Error {
    /// Network-level or timeout failure that is worth retrying.
    #[error("transient upstream error: {0}")]
    Transient(String),

    /// The circuit breaker is open; the dependency is known to be failing.
    #[error("upstream unavailable: circuit open")]
    UpstreamUnavailable,

    /// All retry attempts consumed. Terminal for one call.
    #[error("retry exhausted after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// Non-transient upstream response (4xx other than not-found, bad contract).
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Upstream payload did not match the expected shape.
    #[error("malformed upstream payload: {0}")]
    Parse(String),

    /// A notification channel failed to deliver. Always logged, never propagated
    /// past the router.
    #[error("notification delivery failed via {channel}: {reason}")]
    Notification { channel: String, reason: String },

    /// Invalid configuration. Fatal at startup only.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the retry policy should re-attempt after this failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            return Error::Transient(err.to_string());
        }
        if let Some(status) = err.status() {
            if status.is_server_error() || status.as_u16() == 429 {
                return Error::Transient(format!("upstream returned {status}"));
            }
        }
        Error::Upstream(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
