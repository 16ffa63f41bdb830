//! Presentation capabilities the monitor drives.
//!
//! The warning dialog and browser navigation are reached only through
//! these traits so the state machine runs without a real page.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from presentation collaborators.
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// No page is connected to receive the command.
    #[error("no page connected")]
    Detached,
}

/// The session warning dialog.
///
/// Implementations should treat `show` on an already visible dialog as a
/// no-op; the monitor also guards against it.
pub trait WarningSurface: Send + Sync {
    fn show(&self) -> Result<(), SurfaceError>;

    fn hide(&self) -> Result<(), SurfaceError>;

    /// Updates the countdown text (e.g. `"2:59"`).
    fn set_countdown_text(&self, text: &str) -> Result<(), SurfaceError>;
}

/// Sends the browser somewhere else.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &str) -> Result<(), SurfaceError>;
}

/// Controls on the warning dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningAction {
    /// "Stay Logged In"
    StayLoggedIn,
    /// "Logout Now"
    LogoutNow,
}

/// Builds the login redirect marking a timeout.
///
/// `login.php` + message -> `login.php?timeout=1&message=...`. An existing
/// query string is extended rather than replaced.
pub fn timeout_redirect_url(login_url: &str, message: &str) -> String {
    let separator = if login_url.contains('?') { '&' } else { '?' };
    format!(
        "{login_url}{separator}timeout=1&message={}",
        urlencoding::encode(message)
    )
}
