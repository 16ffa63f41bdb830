//! Warning dialog and navigation rendered by the connected page.

use super::Broadcaster;
use crate::surface::{Navigator, SurfaceError, WarningSurface};
use std::sync::atomic::{AtomicBool, Ordering};

/// Drives the page's warning dialog over the WebSocket.
///
/// `show` is sent once per warning. `hide` is always sent, since a page
/// that connected mid-warning draws the dialog from its `session_state`
/// snapshot without ever seeing `warning_show`.
#[derive(Debug)]
pub struct WsWarningSurface {
    broadcaster: Broadcaster,
    visible: AtomicBool,
}

impl WsWarningSurface {
    pub fn new(broadcaster: Broadcaster) -> Self {
        Self {
            broadcaster,
            visible: AtomicBool::new(false),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }
}

impl WarningSurface for WsWarningSurface {
    fn show(&self) -> Result<(), SurfaceError> {
        if self.visible.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(e) = self.broadcaster.send("warning_show", &serde_json::json!({})) {
            self.visible.store(false, Ordering::SeqCst);
            return Err(e);
        }
        Ok(())
    }

    fn hide(&self) -> Result<(), SurfaceError> {
        self.visible.store(false, Ordering::SeqCst);
        self.broadcaster
            .send("warning_hide", &serde_json::json!({}))
            .map(|_| ())
    }

    fn set_countdown_text(&self, text: &str) -> Result<(), SurfaceError> {
        self.broadcaster
            .send(
                "countdown",
                &serde_json::json!({
                    "text": text,
                    "label": format!("{text} remaining"),
                }),
            )
            .map(|_| ())
    }
}

/// Asks the page to load another URL.
#[derive(Debug)]
pub struct WsNavigator {
    broadcaster: Broadcaster,
}

impl WsNavigator {
    pub fn new(broadcaster: Broadcaster) -> Self {
        Self { broadcaster }
    }
}

impl Navigator for WsNavigator {
    fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        tracing::info!(%url, "Redirecting page");
        self.broadcaster
            .send("navigate", &serde_json::json!({ "url": url }))
            .map(|_| ())
    }
}
