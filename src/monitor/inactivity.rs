//! Inactivity monitor: drives the idle state machine with timers.
//!
//! Three kinds of task run while the monitor is started:
//! - the activity listener, fed by [`ActivityHub`];
//! - the idle poll, every `poll_interval`;
//! - the countdown, only during a warning. It refreshes the dialog text
//!   once a second and fires the forced logout at the session deadline.
//!
//! Every logout runs on its own task so that it can cancel every timer
//! without cancelling itself, and so that dropping a caller cannot leave
//! the session expired without a redirect.

use super::activity::{ActivityEvent, ActivityHub};
use super::state::{format_countdown, ActivityOutcome, IdleCheck, Phase, SessionState};
use crate::config::MonitorConfig;
use crate::session::SessionBackend;
use crate::surface::{timeout_redirect_url, Navigator, WarningAction, WarningSurface};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};

/// Countdown text refresh period.
const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// Why a logout happened. Used for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    /// Warning countdown reached zero.
    Countdown,
    /// Idle poll or late activity found the session past its deadline.
    SafetyNet,
    /// "Logout Now" on the warning dialog.
    UserRequested,
}

/// Point-in-time view of the monitor, served by the status API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub idle_secs: u64,
    pub remaining_secs: u64,
    /// Dialog text while warning.
    pub countdown: Option<String>,
    pub logging_out: bool,
    pub running: bool,
}

#[derive(Default)]
struct Tasks {
    poll: Option<JoinHandle<()>>,
    listener: Option<JoinHandle<()>>,
    countdown: Option<JoinHandle<()>>,
    logout: Option<AbortHandle>,
}

impl Tasks {
    fn abort_timers(&mut self) {
        for handle in [
            self.poll.take(),
            self.listener.take(),
            self.countdown.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }
}

struct Inner {
    config: MonitorConfig,
    state: Mutex<SessionState>,
    backend: Arc<dyn SessionBackend>,
    surface: Arc<dyn WarningSurface>,
    navigator: Arc<dyn Navigator>,
    hub: ActivityHub,
    tasks: Mutex<Tasks>,
    logging_out: AtomicBool,
}

/// Handle to a session inactivity monitor.
///
/// Cheap to clone; all clones share one session. Create one per
/// authenticated page and call [`stop`](Self::stop) on teardown.
#[derive(Clone)]
pub struct InactivityMonitor {
    inner: Arc<Inner>,
}

impl InactivityMonitor {
    pub fn new(
        config: MonitorConfig,
        backend: Arc<dyn SessionBackend>,
        surface: Arc<dyn WarningSurface>,
        navigator: Arc<dyn Navigator>,
        hub: ActivityHub,
    ) -> Self {
        let state = SessionState::new(config.timeout(), config.warning_lead(), Instant::now());
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(state),
                backend,
                surface,
                navigator,
                hub,
                tasks: Mutex::new(Tasks::default()),
                logging_out: AtomicBool::new(false),
            }),
        }
    }

    /// Attaches the activity listener and starts the idle poll.
    ///
    /// Must be called from within a Tokio runtime. A second call while
    /// running is ignored.
    pub fn start(&self) {
        self.inner.start();
    }

    /// Detaches the listener and cancels every timer.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Applies one observed input event.
    pub fn record_activity(&self, event: ActivityEvent) -> ActivityOutcome {
        self.inner.record_activity(event)
    }

    /// Re-evaluates idle time now, as the poll does.
    pub fn check_idle(&self) {
        self.inner.check_idle();
    }

    /// Extends the session locally, then notifies the server.
    ///
    /// Fails open: an endpoint error is logged and the local extension
    /// stands. Returns false if the session already expired.
    pub async fn extend_session(&self) -> bool {
        self.inner.extend_session().await
    }

    /// Logs out and redirects to the login page. Runs at most once.
    ///
    /// Waits for the redirect. The logout carries on if this future is
    /// dropped first.
    pub async fn logout(&self, reason: LogoutReason) {
        let Some(handle) = self.inner.spawn_logout(reason) else {
            tracing::debug!(?reason, "Logout already in progress");
            return;
        };
        if let Err(e) = handle.await {
            tracing::debug!(error = %e, "Logout task did not finish");
        }
    }

    /// Handles a warning dialog button.
    pub async fn handle_action(&self, action: WarningAction) {
        match action {
            WarningAction::StayLoggedIn => {
                self.extend_session().await;
            }
            WarningAction::LogoutNow => self.logout(LogoutReason::UserRequested).await,
        }
    }

    pub fn phase(&self) -> Phase {
        self.inner.state().phase()
    }

    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    pub fn hub(&self) -> &ActivityHub {
        &self.inner.hub
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let running = self.inner.is_running();
        let logging_out = self.inner.logging_out.load(Ordering::SeqCst);
        let now = Instant::now();
        let state = self.inner.state();
        let remaining = state.remaining(now);

        SessionSnapshot {
            phase: state.phase(),
            idle_secs: state.idle_for(now).as_secs(),
            remaining_secs: remaining.as_secs(),
            countdown: (state.phase() == Phase::Warning).then(|| format_countdown(remaining)),
            logging_out,
            running,
        }
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tasks(&self) -> MutexGuard<'_, Tasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_running(&self) -> bool {
        self.tasks().poll.is_some()
    }

    fn start(self: &Arc<Self>) {
        let mut tasks = self.tasks();
        if tasks.poll.is_some() {
            tracing::warn!("Inactivity monitor already started");
            return;
        }
        if self.logging_out.load(Ordering::SeqCst) {
            tracing::warn!("Session already logged out, not starting monitor");
            return;
        }

        self.state().restart(Instant::now());

        let mut rx = self.hub.subscribe();
        let inner = Arc::clone(self);
        tasks.listener = Some(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        inner.record_activity(event);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Activity listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));

        let inner = Arc::clone(self);
        let period = self.config.poll_interval();
        tasks.poll = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !inner.check_idle() {
                    break;
                }
            }
        }));

        tracing::info!(
            timeout_secs = self.config.timeout_secs,
            warning_secs = self.config.warning_secs,
            poll_secs = self.config.poll_interval_secs,
            "Inactivity monitor started"
        );
    }

    fn stop(&self) {
        let mut tasks = self.tasks();
        tasks.abort_timers();
        if let Some(handle) = tasks.logout.take() {
            handle.abort();
        }
        tracing::info!("Inactivity monitor stopped");
    }

    fn record_activity(self: &Arc<Self>, event: ActivityEvent) -> ActivityOutcome {
        let outcome = self.state().record_activity(&event, Instant::now());
        match outcome {
            ActivityOutcome::Resumed => {
                tracing::info!(kind = ?event.kind, "Activity dismissed idle warning");
                self.dismiss_warning();
            }
            ActivityOutcome::Overdue => {
                tracing::info!(kind = ?event.kind, "Activity arrived after session deadline");
                self.trigger_logout(LogoutReason::SafetyNet);
            }
            ActivityOutcome::Ignored => {
                tracing::trace!(kind = ?event.kind, "Ignoring low-signal event during warning");
            }
            ActivityOutcome::Refreshed | ActivityOutcome::Rejected => {}
        }
        outcome
    }

    /// Returns false once polling is pointless (session over).
    fn check_idle(self: &Arc<Self>) -> bool {
        let check = self.state().evaluate(Instant::now());
        match check {
            IdleCheck::Idle => self.state().phase() != Phase::Expired,
            IdleCheck::WarningDue { .. } => {
                self.show_warning();
                true
            }
            IdleCheck::TimedOut => {
                tracing::warn!("Idle poll found session past its deadline");
                self.trigger_logout(LogoutReason::SafetyNet);
                false
            }
        }
    }

    /// Active -> Warning: shows the dialog and arms the countdown.
    ///
    /// Returns false (and does nothing) unless the session was Active.
    fn show_warning(self: &Arc<Self>) -> bool {
        let now = Instant::now();
        let (deadline, remaining) = {
            let mut state = self.state();
            if !state.begin_warning() {
                return false;
            }
            (state.deadline(), state.remaining(now))
        };

        tracing::info!(remaining_secs = remaining.as_secs(), "Showing idle warning");
        if let Err(e) = self.surface.show() {
            tracing::debug!(error = %e, "Warning dialog unavailable");
        }

        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move { inner.run_countdown(deadline).await });
        if let Some(previous) = self.tasks().countdown.replace(handle) {
            previous.abort();
        }
        true
    }

    async fn run_countdown(self: Arc<Self>, deadline: Instant) {
        let mut ticker = time::interval(COUNTDOWN_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let expiry = time::sleep_until(deadline);
        tokio::pin!(expiry);

        loop {
            tokio::select! {
                biased;
                _ = &mut expiry => {
                    if self.state().evaluate(Instant::now()) == IdleCheck::TimedOut {
                        self.trigger_logout(LogoutReason::Countdown);
                    }
                    break;
                }
                _ = ticker.tick() => {
                    if !self.refresh_countdown() {
                        break;
                    }
                }
            }
        }
    }

    /// Recomputes the dialog text from the last activity instant.
    fn refresh_countdown(&self) -> bool {
        let text = {
            let state = self.state();
            if state.phase() != Phase::Warning {
                return false;
            }
            format_countdown(state.remaining(Instant::now()))
        };

        if let Err(e) = self.surface.set_countdown_text(&text) {
            tracing::trace!(error = %e, "Countdown text not updated");
        }
        true
    }

    fn dismiss_warning(&self) {
        if let Some(handle) = self.tasks().countdown.take() {
            handle.abort();
        }
        if let Err(e) = self.surface.hide() {
            tracing::debug!(error = %e, "Warning dialog unavailable");
        }
    }

    async fn extend_session(&self) -> bool {
        if self.logging_out.load(Ordering::SeqCst) {
            tracing::debug!("Extend ignored, logout in progress");
            return false;
        }
        let Some(previous) = self.state().extend(Instant::now()) else {
            tracing::debug!("Extend ignored, session expired");
            return false;
        };

        self.dismiss_warning();
        tracing::info!(from = ?previous, "Session extended");

        if let Err(e) = self.backend.extend().await {
            tracing::warn!(error = %e, "Extend endpoint failed, keeping local extension");
        }
        true
    }

    /// Sets the logout guard. Only the first caller gets true.
    fn claim_logout(&self) -> bool {
        !self.logging_out.swap(true, Ordering::SeqCst)
    }

    /// Logout from a timer or listener task.
    fn trigger_logout(self: &Arc<Self>, reason: LogoutReason) {
        if !self.is_running() {
            tracing::debug!(?reason, "Monitor stopped, skipping logout");
            return;
        }
        // Detached; `stop` can still abort it
        let _ = self.spawn_logout(reason);
    }

    /// Claims the guard and starts the logout task. `None` if another
    /// logout already claimed it.
    fn spawn_logout(self: &Arc<Self>, reason: LogoutReason) -> Option<JoinHandle<()>> {
        if !self.claim_logout() {
            return None;
        }

        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move { inner.perform_logout(reason).await });
        self.tasks().logout = Some(handle.abort_handle());
        Some(handle)
    }

    async fn perform_logout(&self, reason: LogoutReason) {
        self.state().expire();
        self.tasks().abort_timers();
        tracing::info!(?reason, "Session expired, logging out");

        let limit = self.config.request_timeout();
        match time::timeout(limit, self.backend.logout()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Logout endpoint failed, redirecting anyway"),
            Err(_) => tracing::warn!(
                timeout_secs = limit.as_secs(),
                "Logout endpoint did not answer, redirecting anyway"
            ),
        }

        let url = timeout_redirect_url(&self.config.login_url, &self.config.expiry_message);
        if let Err(e) = self.navigator.navigate(&url) {
            tracing::error!(error = %e, %url, "Could not redirect to login page");
        }
    }
}
