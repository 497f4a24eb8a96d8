#[derive(Debug, thiserror::Error)]
pub enum SecretsError {
    /// No caller credential configured, or the store rejected it.
    /// Configuration error; retrying cannot help.
    #[error("secret store credentials missing or rejected: {0}")]
    MissingCredentials(String),

    /// The named secret does not exist in the store.
    #[error("secret not found: {0}")]
    NotFound(String),

    /// The store rejected the request as malformed, or the secret payload
    /// itself is unusable (empty value, unparseable JSON).
    #[error("malformed secret or request: {0}")]
    Malformed(String),

    /// Server-side failure in the store. Safe to retry; retry is not
    /// performed here.
    #[error("transient secret store error (status {status}): {message}")]
    Transient { status: u16, message: String },

    /// Anything the taxonomy does not cover; propagated as-is.
    #[error("unclassified secret store error (status {status}): {message}")]
    Unclassified { status: u16, message: String },

    #[error("secret store request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl SecretsError {
    /// Whether a retry of the same request could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Request(_))
    }
}
