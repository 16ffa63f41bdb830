//! Session backend: the extend and logout endpoints.

pub mod http;

pub use http::HttpSessionBackend;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from session endpoint calls.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid endpoint {url:?}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("request failed: {0}")]
    Transport(#[from] hyper::Error),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("endpoint returned {0}")]
    Status(hyper::StatusCode),
}

/// Remote session endpoints.
///
/// Both calls are signals only; response bodies carry no contract.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Asks the server to extend the session.
    async fn extend(&self) -> Result<(), BackendError>;

    /// Tells the server the session is over.
    async fn logout(&self) -> Result<(), BackendError>;
}
