//! idlewarden - session inactivity monitor.
//!
//! Watches page activity, warns the user with a countdown before the
//! session idles out, and forces a logout when the warning is ignored.

pub mod config;
pub mod error;
pub mod monitor;
pub mod server;
pub mod session;
pub mod surface;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{Config, MonitorConfig, ServerConfig};
pub use error::{Error, Result};
pub use monitor::{ActivityEvent, ActivityHub, ActivityKind, InactivityMonitor, Phase};
