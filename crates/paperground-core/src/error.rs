use std::time::Duration;
use thiserror::Error;

/// Failure of one external collaborator call. Transience decides whether
/// the retry policy may try again.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("malformed model response: {0}")]
    Malformed(String),

    #[error("call failed: {0}")]
    Failed(String),
}

impl ModelError {
    /// Only network-shaped failures are retried; a well-formed but
    /// unusable response is not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::RateLimited(_) | Self::Transport(_)
        )
    }
}

/// Request-fatal errors surfaced to the caller verbatim.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no passages loaded for this session")]
    EmptyCorpus,

    #[error("no relevant passages found")]
    NoRelevantPassages,

    #[error("request cancelled")]
    Cancelled,

    #[error("query embedding failed: {0}")]
    Embedding(ModelError),

    #[error("answer synthesis failed: {0}")]
    Synthesis(ModelError),
}

pub type Result<T> = std::result::Result<T, Error>;
