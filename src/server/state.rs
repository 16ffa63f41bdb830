//! Shared application state for the HTTP bridge.

use super::Broadcaster;
use crate::monitor::{InactivityMonitor, Phase};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// Builds the monitor for a new page session.
pub type MonitorFactory = Arc<dyn Fn() -> InactivityMonitor + Send + Sync>;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast channel for WebSocket updates.
    pub broadcaster: Broadcaster,

    /// Monitor of the current page session. Replaced once it has expired
    /// and a page loads again.
    monitor: Arc<Mutex<InactivityMonitor>>,

    factory: Option<MonitorFactory>,
}

impl AppState {
    pub fn new(broadcaster: Broadcaster, monitor: InactivityMonitor) -> Self {
        Self {
            broadcaster,
            monitor: Arc::new(Mutex::new(monitor)),
            factory: None,
        }
    }

    /// Lets [`begin_session`](Self::begin_session) replace an expired
    /// monitor with one built by `factory`.
    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> InactivityMonitor + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    fn slot(&self) -> MutexGuard<'_, InactivityMonitor> {
        self.monitor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Monitor of the current session.
    pub fn monitor(&self) -> InactivityMonitor {
        self.slot().clone()
    }

    /// Called when a page loads.
    ///
    /// Keeps a live session. An expired one is stopped and replaced by a
    /// freshly started monitor.
    pub fn begin_session(&self) -> InactivityMonitor {
        let mut current = self.slot();
        if current.phase() != Phase::Expired {
            return current.clone();
        }
        let Some(factory) = &self.factory else {
            tracing::debug!("Session expired and no factory to renew it");
            return current.clone();
        };

        let fresh = factory();
        fresh.start();
        let previous = std::mem::replace(&mut *current, fresh.clone());
        previous.stop();
        tracing::info!("Expired session replaced for new page load");
        fresh
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.broadcaster.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{ActivityEvent, ActivityHub, ActivityKind, ActivityOutcome};
    use crate::testing::{test_config, Harness, RecordingBackend, RecordingNavigator, RecordingSurface};

    fn renewable(h: &Harness) -> (AppState, Arc<RecordingSurface>) {
        let surface = Arc::new(RecordingSurface::default());
        let backend = Arc::new(RecordingBackend::default());
        let fresh_surface = Arc::clone(&surface);
        let state = AppState::new(Broadcaster::new(16), h.monitor.clone()).with_factory(move || {
            InactivityMonitor::new(
                test_config(),
                backend.clone(),
                fresh_surface.clone(),
                Arc::new(RecordingNavigator::default()),
                ActivityHub::new(64),
            )
        });
        (state, surface)
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_session_is_kept() {
        let h = Harness::started();
        let (state, _) = renewable(&h);

        h.advance_to(720).await;
        let monitor = state.begin_session();
        assert_eq!(monitor.phase(), Phase::Warning);
        assert_eq!(state.monitor().hub().listener_count(), 1);
        assert_eq!(h.surface.shows(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_session_is_replaced_on_page_load() {
        let h = Harness::started();
        let (state, surface) = renewable(&h);

        h.advance_to(901).await;
        assert_eq!(state.monitor().phase(), Phase::Expired);
        assert_eq!(h.navigator.urls().len(), 1);

        let fresh = state.begin_session();
        assert_eq!(fresh.phase(), Phase::Active);
        assert!(fresh.is_running());
        assert_eq!(
            fresh.record_activity(ActivityEvent::page(ActivityKind::Key)),
            ActivityOutcome::Refreshed
        );

        // The new session warns on its own schedule
        h.advance_to(1500).await;
        assert_eq!(state.monitor().phase(), Phase::Active);
        h.advance_to(1650).await;
        assert_eq!(state.monitor().phase(), Phase::Warning);
        assert_eq!(surface.shows(), 1);

        // The expired one stays put
        assert_eq!(h.monitor.phase(), Phase::Expired);
        assert_eq!(h.surface.shows(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_session_without_factory_is_kept() {
        let h = Harness::started();
        let state = AppState::new(Broadcaster::new(16), h.monitor.clone());

        h.advance_to(901).await;
        assert_eq!(state.begin_session().phase(), Phase::Expired);
    }
}
