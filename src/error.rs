/// Error type used while executing one attempt.
///
/// These never cross the public executor boundary as `Err`: each variant is
/// rendered into [`CallResult::error`](crate::CallResult) for its id.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// Network or request execution error from `reqwest`. Retry-eligible.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// The request or client could not be set up (bad URL, bad method,
    /// unusable TLS material). Terminal for its id.
    #[error("invalid request: {0}")]
    Init(String),
    /// A file referenced by a multipart part could not be read. Terminal.
    #[error("could not read {path}: {source}")]
    File {
        /// Path of the unreadable file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl CallError {
    /// Whether this failure belongs to the network class of the retry
    /// policy, as opposed to a setup problem retrying cannot fix.
    pub(crate) fn is_network(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
