//! Input activity events and the hub that fans them out to listeners.
//!
//! The page reports every pointer, key, scroll, touch, focus and
//! visibility event it captures. Classification happens here so the
//! state machine only has to ask whether an event is low-signal.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Kind of input event observed on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    PointerMove,
    PointerDown,
    Key,
    Scroll,
    Touch,
    Focus,
    Visibility,
}

/// Where on the page the event was dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTarget {
    #[default]
    Page,
    /// Inside the session warning dialog.
    WarningDialog,
}

/// A single observed input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub kind: ActivityKind,

    #[serde(default)]
    pub target: EventTarget,

    /// Whether the warning dialog held focus when the event fired.
    #[serde(default)]
    pub warning_focused: bool,
}

impl ActivityEvent {
    /// An event on the page body, outside the warning dialog.
    pub fn page(kind: ActivityKind) -> Self {
        Self {
            kind,
            target: EventTarget::Page,
            warning_focused: false,
        }
    }

    /// An event dispatched inside the warning dialog.
    pub fn in_warning(kind: ActivityKind) -> Self {
        Self {
            kind,
            target: EventTarget::WarningDialog,
            warning_focused: true,
        }
    }

    pub fn with_warning_focus(mut self, focused: bool) -> Self {
        self.warning_focused = focused;
        self
    }

    /// Events that must not dismiss an open warning.
    ///
    /// Anything dispatched inside the dialog, and pointer drift while the
    /// dialog has focus. The dialog's own buttons act through
    /// [`WarningAction`](crate::surface::WarningAction) instead.
    pub fn is_low_signal(&self) -> bool {
        self.target == EventTarget::WarningDialog
            || (self.kind == ActivityKind::PointerMove && self.warning_focused)
    }
}

/// Fan-out channel for activity events.
///
/// Subscribing is the equivalent of attaching document-level listeners;
/// dropping the receiver detaches them.
#[derive(Debug, Clone)]
pub struct ActivityHub {
    tx: broadcast::Sender<ActivityEvent>,
}

impl ActivityHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes an event to every attached listener.
    ///
    /// Returns the number of listeners that received it.
    pub fn publish(&self, event: ActivityEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEvent> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ActivityHub {
    fn default() -> Self {
        Self::new(256)
    }
}
