use thiserror::Error;

/// Result type used by the Tesla client.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by [`TeslaApi`](super::TeslaApi) and [`Vehicle`](super::Vehicle).
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied argument was rejected before any request was sent.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// The token request failed, either in transport or with a non-2xx status.
    #[error("unable to initialize, token fetch failed: {0}")]
    Authentication(#[source] reqwest::Error),

    /// An access token could not be used as an `Authorization` header value.
    #[error("access token contains characters not allowed in a header")]
    InvalidToken,

    /// A request against the vehicle API failed, either in transport or with a non-2xx status.
    #[error("request to {path} failed: {source}")]
    Command {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response body was not the JSON envelope the endpoint promises.
    #[error("malformed response from {path}: {source}")]
    Protocol {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The vehicle accepted the request but refused to carry it out.
    #[error("{command} rejected by vehicle, reason={reason}")]
    Rejected { command: String, reason: String },

    /// The vehicle did not come online before the deadline.
    #[error("timed out waiting for vehicle")]
    Timeout,

    /// The underlying HTTP client could not be built.
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Returns the HTTP status attached to a failed request, if there was one.
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Error::Authentication(e) | Error::Command { source: e, .. } | Error::Http(e) => {
                e.status()
            }
            _ => None,
        }
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::Timeout
    }
}
