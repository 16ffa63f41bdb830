//! Recording doubles shared by the unit tests.

use crate::config::MonitorConfig;
use crate::monitor::{ActivityHub, InactivityMonitor};
use crate::session::{BackendError, SessionBackend};
use crate::surface::{Navigator, SurfaceError, WarningSurface};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// 15 minute timeout, 3 minute warning, 30 second poll.
pub fn test_config() -> MonitorConfig {
    MonitorConfig {
        timeout_secs: 900,
        warning_secs: 180,
        poll_interval_secs: 30,
        ..Default::default()
    }
}

#[derive(Default)]
pub struct RecordingBackend {
    extends: AtomicUsize,
    logouts: AtomicUsize,
    fail: AtomicBool,
    stall: AtomicBool,
}

impl RecordingBackend {
    /// Every call is counted, then fails.
    pub fn failing() -> Self {
        Self {
            fail: AtomicBool::new(true),
            ..Default::default()
        }
    }

    /// Every call is counted, then never completes.
    pub fn stalled() -> Self {
        Self {
            stall: AtomicBool::new(true),
            ..Default::default()
        }
    }

    pub fn extend_calls(&self) -> usize {
        self.extends.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    async fn result(&self) -> Result<(), BackendError> {
        if self.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            Err(BackendError::Timeout(Duration::from_secs(10)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionBackend for RecordingBackend {
    async fn extend(&self) -> Result<(), BackendError> {
        self.extends.fetch_add(1, Ordering::SeqCst);
        self.result().await
    }

    async fn logout(&self) -> Result<(), BackendError> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        self.result().await
    }
}

#[derive(Debug, Default)]
struct SurfaceLog {
    visible: bool,
    shows: usize,
    texts: Vec<String>,
}

/// Warning dialog double. A detached surface behaves like no page being
/// connected.
#[derive(Default)]
pub struct RecordingSurface {
    log: Mutex<SurfaceLog>,
    detached: bool,
}

impl RecordingSurface {
    pub fn detached() -> Self {
        Self {
            detached: true,
            ..Default::default()
        }
    }

    pub fn shows(&self) -> usize {
        self.log.lock().unwrap().shows
    }

    pub fn is_visible(&self) -> bool {
        self.log.lock().unwrap().visible
    }

    pub fn last_text(&self) -> Option<String> {
        self.log.lock().unwrap().texts.last().cloned()
    }

    fn check(&self) -> Result<(), SurfaceError> {
        if self.detached {
            Err(SurfaceError::Detached)
        } else {
            Ok(())
        }
    }
}

impl WarningSurface for RecordingSurface {
    fn show(&self) -> Result<(), SurfaceError> {
        self.check()?;
        let mut log = self.log.lock().unwrap();
        log.shows += 1;
        log.visible = true;
        Ok(())
    }

    fn hide(&self) -> Result<(), SurfaceError> {
        self.check()?;
        self.log.lock().unwrap().visible = false;
        Ok(())
    }

    fn set_countdown_text(&self, text: &str) -> Result<(), SurfaceError> {
        self.check()?;
        self.log.lock().unwrap().texts.push(text.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    urls: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

/// A monitor wired to recording doubles, with a reference start instant.
pub struct Harness {
    pub monitor: InactivityMonitor,
    pub backend: Arc<RecordingBackend>,
    pub surface: Arc<RecordingSurface>,
    pub navigator: Arc<RecordingNavigator>,
    started: Instant,
}

impl Harness {
    /// Default doubles, not started.
    pub fn new() -> Self {
        Self::configured(
            test_config(),
            RecordingBackend::default(),
            RecordingSurface::default(),
        )
    }

    /// Default doubles, started.
    pub fn started() -> Self {
        let harness = Self::new();
        harness.monitor.start();
        harness
    }

    /// Given doubles with the test config, started.
    pub fn with(backend: RecordingBackend, surface: RecordingSurface) -> Self {
        let harness = Self::configured(test_config(), backend, surface);
        harness.monitor.start();
        harness
    }

    /// Given config and doubles, not started.
    pub fn configured(
        config: MonitorConfig,
        backend: RecordingBackend,
        surface: RecordingSurface,
    ) -> Self {
        let backend = Arc::new(backend);
        let surface = Arc::new(surface);
        let navigator = Arc::new(RecordingNavigator::default());
        let monitor = InactivityMonitor::new(
            config,
            backend.clone(),
            surface.clone(),
            navigator.clone(),
            ActivityHub::new(64),
        );
        Self {
            monitor,
            backend,
            surface,
            navigator,
            started: Instant::now(),
        }
    }

    /// Sleeps on the paused clock until just past `secs` after creation,
    /// letting every task due at `secs` run first.
    pub async fn advance_to(&self, secs: u64) {
        let target = self.started + Duration::from_secs(secs) + Duration::from_millis(1);
        tokio::time::sleep_until(target).await;
    }
}
