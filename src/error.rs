//! Crate-level error type.

use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::session::BackendError;

/// Result type alias for idlewarden operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the binary.
///
/// The monitor itself never returns these from its state transitions;
/// backend and surface failures are logged and recovered locally, so only
/// startup can fail.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or is invalid
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Session endpoint call failed
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}
