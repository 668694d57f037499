use thiserror::Error;

/// Failure classes surfaced to callers of the data layer.
///
/// Per-post enrichment failures never appear here: they are logged and the
/// affected entry falls back to zero-valued defaults.
#[derive(Debug, Error)]
pub enum Error {
    /// No session, or the operation needs a complete profile.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Bad local input. Raised before anything is sent to the backend.
    #[error("{0}")]
    Validation(String),

    /// The pre-flight connectivity check failed; nothing was sent.
    #[error("no internet connection")]
    NetworkUnavailable,

    /// The backing store rejected a request. Carries the store's message
    /// verbatim; never retried automatically.
    #[error("{message}")]
    Remote { message: String, status: Option<u16> },
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn remote(message: impl Into<String>, status: Option<u16>) -> Self {
        Error::Remote {
            message: message.into(),
            status,
        }
    }
}
