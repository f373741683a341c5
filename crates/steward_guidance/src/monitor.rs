//! Per-session autopilot monitor.
//!
//! Every enabled session gets a ticker task. Each tick runs one guarded cycle:
//! snapshot the recent output, ask the orchestrator, and write the winning
//! guidance back into the session. At most one cycle per session is in
//! flight, and a disabled session's in-flight cycle is cancelled.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use steward_core::{AnalysisContext, AutopilotConfig, GuidanceResult, TerminalSession};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::error::{EngineResult, GuidanceError};
use crate::events::{AutopilotEvent, MonitorStatus};
use crate::orchestrator::GuidanceOrchestrator;
use crate::rate::RateBudget;
use crate::state::AutopilotMonitorState;

/// Buffered events before new ones are dropped.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Shortest accepted analysis delay.
const MIN_ANALYSIS_DELAY: Duration = Duration::from_millis(10);

/// What a single cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Nothing was analyzed.
    Skipped(&'static str),
    /// The hourly budget is spent.
    RateLimited,
    /// Analyzed, no guidance written.
    NoGuidance(GuidanceResult),
    /// Guidance was written into the session.
    Guided(GuidanceResult),
    /// The session was disabled mid-cycle.
    Cancelled,
    /// Writing the guidance failed or the cycle panicked.
    Failed(String),
}

impl CycleOutcome {
    pub fn is_guided(&self) -> bool {
        matches!(self, CycleOutcome::Guided(_))
    }
}

type SharedState = Arc<Mutex<AutopilotMonitorState>>;

struct Ticker {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct SessionEntry {
    session: Arc<dyn TerminalSession>,
    state: SharedState,
    ticker: Option<Ticker>,
}

struct MonitorInner {
    orchestrator: Arc<GuidanceOrchestrator>,
    config: RwLock<AutopilotConfig>,
    sessions: Mutex<HashMap<String, SessionEntry>>,
    events: mpsc::Sender<AutopilotEvent>,
}

/// Drives analysis cycles for enabled sessions. Clones share state.
#[derive(Clone)]
pub struct AutopilotMonitor {
    inner: Arc<MonitorInner>,
}

/// Clears `analysis_in_progress` however the cycle ends.
struct InFlight(SharedState);

impl InFlight {
    fn acquire(state: &SharedState) -> Option<Self> {
        let mut guard = state.lock();
        if guard.analysis_in_progress {
            return None;
        }
        guard.analysis_in_progress = true;
        Some(Self(state.clone()))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.lock().analysis_in_progress = false;
    }
}

impl AutopilotMonitor {
    /// Create a monitor and the receiving end of its event channel.
    pub fn new(
        orchestrator: Arc<GuidanceOrchestrator>,
        config: AutopilotConfig,
    ) -> (Self, mpsc::Receiver<AutopilotEvent>) {
        let (events, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let monitor = Self {
            inner: Arc::new(MonitorInner {
                orchestrator,
                config: RwLock::new(config),
                sessions: Mutex::new(HashMap::new()),
                events,
            }),
        };
        (monitor, rx)
    }

    pub fn orchestrator(&self) -> &Arc<GuidanceOrchestrator> {
        &self.inner.orchestrator
    }

    pub fn config(&self) -> AutopilotConfig {
        self.inner.config.read().clone()
    }

    /// Start monitoring `session`. A no-op when it is already enabled.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn enable(&self, session: Arc<dyn TerminalSession>) {
        let id = session.id().to_string();
        {
            let mut sessions = self.inner.sessions.lock();
            let entry = sessions.entry(id.clone()).or_insert_with(|| SessionEntry {
                session: session.clone(),
                state: Arc::new(Mutex::new(AutopilotMonitorState::new())),
                ticker: None,
            });
            if entry.ticker.is_some() {
                debug!("Autopilot already enabled for session {}", id);
                return;
            }
            entry.session = session;
            entry.state.lock().is_active = true;
            entry.ticker = Some(spawn_ticker(&self.inner, id.clone()));
        }

        info!("Autopilot enabled for session {}", id);
        self.emit(AutopilotEvent::StatusChanged {
            session_id: id,
            status: MonitorStatus::Active,
        });
    }

    /// Stop monitoring a session and cancel its in-flight cycle.
    ///
    /// State is kept, so re-enabling continues the same hourly budget.
    pub fn disable(&self, session_id: &str) -> EngineResult<()> {
        let ticker = {
            let mut sessions = self.inner.sessions.lock();
            let entry = sessions
                .get_mut(session_id)
                .ok_or_else(|| GuidanceError::SessionNotFound(session_id.to_string()))?;
            entry.state.lock().is_active = false;
            entry.ticker.take()
        };

        let Some(ticker) = ticker else {
            return Ok(());
        };
        let _ = ticker.stop.send(true);

        info!("Autopilot disabled for session {}", session_id);
        self.emit(AutopilotEvent::StatusChanged {
            session_id: session_id.to_string(),
            status: MonitorStatus::Standby,
        });
        Ok(())
    }

    /// Flip monitoring for `session`. Returns whether it is now enabled.
    pub fn toggle(&self, session: Arc<dyn TerminalSession>) -> bool {
        if self.is_enabled(session.id()) {
            // The entry exists, so disable cannot fail
            let _ = self.disable(session.id());
            false
        } else {
            self.enable(session);
            true
        }
    }

    /// Replace the configuration and push it into every source.
    ///
    /// Running tickers pick up a changed analysis delay after their next tick.
    pub fn update_config(&self, config: AutopilotConfig) {
        self.inner.orchestrator.update_config(&config);
        *self.inner.config.write() = config;
    }

    pub fn is_enabled(&self, session_id: &str) -> bool {
        self.inner
            .sessions
            .lock()
            .get(session_id)
            .is_some_and(|e| e.ticker.is_some())
    }

    /// Snapshot of a session's state.
    pub fn state(&self, session_id: &str) -> Option<AutopilotMonitorState> {
        let sessions = self.inner.sessions.lock();
        sessions.get(session_id).map(|e| e.state.lock().clone())
    }

    /// Ids of every session seen, enabled or not.
    pub fn sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.sessions.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Disable every session and wait for the tickers to exit.
    pub async fn shutdown(&self) {
        let stopped: Vec<(String, Ticker)> = {
            let mut sessions = self.inner.sessions.lock();
            sessions
                .iter_mut()
                .filter_map(|(id, entry)| {
                    entry.state.lock().is_active = false;
                    entry.ticker.take().map(|t| (id.clone(), t))
                })
                .collect()
        };

        for (id, ticker) in stopped {
            let _ = ticker.stop.send(true);
            if let Err(e) = ticker.handle.await {
                warn!("Ticker for session {} ended abnormally: {}", id, e);
            }
            self.emit(AutopilotEvent::StatusChanged {
                session_id: id,
                status: MonitorStatus::Standby,
            });
        }
    }

    /// Run one guarded cycle for an enabled session.
    ///
    /// Skips while another cycle for the same session is in flight. A panic
    /// inside the cycle is reported as `analysisError` and never escapes.
    pub async fn run_cycle(&self, session_id: &str) -> CycleOutcome {
        match AssertUnwindSafe(self.guarded_cycle(session_id)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                let error = "analysis cycle panicked".to_string();
                warn!("Analysis cycle for session {} panicked", session_id);
                self.emit(AutopilotEvent::AnalysisError {
                    session_id: session_id.to_string(),
                    error: error.clone(),
                });
                CycleOutcome::Failed(error)
            }
        }
    }

    async fn guarded_cycle(&self, session_id: &str) -> CycleOutcome {
        let (session, state, stop) = {
            let sessions = self.inner.sessions.lock();
            let Some(entry) = sessions.get(session_id) else {
                return CycleOutcome::Skipped("unknown session");
            };
            let Some(ticker) = &entry.ticker else {
                return CycleOutcome::Skipped("autopilot disabled");
            };
            (entry.session.clone(), entry.state.clone(), ticker.stop.subscribe())
        };

        let Some(_in_flight) = InFlight::acquire(&state) else {
            trace!("Analysis already in progress for session {}", session_id);
            return CycleOutcome::Skipped("analysis in progress");
        };

        tokio::select! {
            biased;
            _ = stopped(stop) => {
                debug!("Cycle for session {} cancelled", session_id);
                CycleOutcome::Cancelled
            }
            outcome = self.analyze(session.as_ref(), &state) => outcome,
        }
    }

    async fn analyze(&self, session: &dyn TerminalSession, state: &SharedState) -> CycleOutcome {
        let session_id = session.id().to_string();
        if !session.is_active() {
            return CycleOutcome::Skipped("session inactive");
        }

        let config = self.config();
        let budget = RateBudget::new(config.max_guidances_per_hour);
        let allowed = budget.allows(&mut state.lock(), Utc::now());
        if !allowed {
            debug!(
                "Session {} reached {} guidances this hour",
                session_id,
                budget.max_per_hour()
            );
            return CycleOutcome::RateLimited;
        }

        let lines = session.recent_output(config.output_lines);
        let context = AnalysisContext::from_lines(&session_id, &lines, session.worktree_path());
        if context.is_empty() {
            return CycleOutcome::Skipped("no output");
        }

        let result = self.inner.orchestrator.generate_guidance(&context).await;
        self.emit(AutopilotEvent::AnalysisComplete {
            session_id: session_id.clone(),
            result: result.clone(),
        });

        let line = match result.formatted_line() {
            Some(line) if result.should_intervene => line,
            _ => return CycleOutcome::NoGuidance(result),
        };

        // The session may have exited while sources were running
        if !session.is_active() {
            return CycleOutcome::Skipped("session ended during analysis");
        }

        if let Err(e) = session.write_input(&line).await {
            warn!("Failed to write guidance to session {}: {}", session_id, e);
            self.emit(AutopilotEvent::AnalysisError {
                session_id,
                error: e.to_string(),
            });
            return CycleOutcome::Failed(e.to_string());
        }

        budget.record(&mut state.lock(), Utc::now());
        info!("Guidance from {} written to session {}", result.source, session_id);
        self.emit(AutopilotEvent::GuidanceProvided {
            session_id,
            guidance: result.guidance_text().unwrap_or_default().to_string(),
            source: result.source.clone(),
        });
        CycleOutcome::Guided(result)
    }

    fn emit(&self, event: AutopilotEvent) {
        emit(&self.inner.events, event);
    }

    #[cfg(test)]
    fn with_state<R>(&self, session_id: &str, f: impl FnOnce(&mut AutopilotMonitorState) -> R) -> Option<R> {
        let sessions = self.inner.sessions.lock();
        sessions.get(session_id).map(|e| f(&mut e.state.lock()))
    }
}

impl std::fmt::Debug for AutopilotMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutopilotMonitor")
            .field("sessions", &self.sessions())
            .field("orchestrator", &self.inner.orchestrator)
            .finish()
    }
}

fn emit(events: &mpsc::Sender<AutopilotEvent>, event: AutopilotEvent) {
    match events.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(event)) => {
            warn!("Event channel full, dropping {} for session {}", event.name(), event.session_id());
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            trace!("Event receiver dropped");
        }
    }
}

/// Resolves once the stop flag is raised or its sender is gone.
async fn stopped(mut stop: watch::Receiver<bool>) {
    loop {
        let raised = *stop.borrow_and_update();
        if raised || stop.changed().await.is_err() {
            return;
        }
    }
}

fn analysis_delay(inner: &MonitorInner) -> Duration {
    Duration::from_millis(inner.config.read().analysis_delay_ms).max(MIN_ANALYSIS_DELAY)
}

fn spawn_ticker(inner: &Arc<MonitorInner>, session_id: String) -> Ticker {
    let (stop, mut stop_rx) = watch::channel(false);
    let weak: Weak<MonitorInner> = Arc::downgrade(inner);
    let mut period = analysis_delay(inner);

    let handle = tokio::spawn(async move {
        let mut ticks = interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stop_rx.changed() => break,
                _ = ticks.tick() => {}
            }
            let stop_now = *stop_rx.borrow();
            if stop_now {
                break;
            }

            let Some(inner) = weak.upgrade() else {
                break;
            };
            let monitor = AutopilotMonitor { inner };

            let outcome = monitor.run_cycle(&session_id).await;
            trace!("Cycle for session {}: {:?}", session_id, outcome);

            let next = analysis_delay(&monitor.inner);
            if next != period {
                debug!("Analysis delay for session {} now {:?}", session_id, next);
                period = next;
                ticks = interval_at(Instant::now() + period, period);
                ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            }
        }
        trace!("Ticker for session {} stopped", session_id);
    });

    Ticker { stop, handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use steward_core::MemorySession;

    use crate::source::GuidanceSource;

    struct Always;

    #[async_trait]
    impl GuidanceSource for Always {
        fn id(&self) -> &str {
            "always"
        }
        fn priority(&self) -> u32 {
            1
        }
        fn can_short_circuit(&self) -> bool {
            false
        }
        async fn analyze(&self, _context: &AnalysisContext) -> EngineResult<GuidanceResult> {
            Ok(GuidanceResult::intervene("always", 1, 0.8, "Run the tests.", "always"))
        }
    }

    fn monitor(max_per_hour: u32) -> (AutopilotMonitor, mpsc::Receiver<AutopilotEvent>) {
        let orchestrator = GuidanceOrchestrator::new();
        orchestrator.add_source(Arc::new(Always)).unwrap();
        let config = AutopilotConfig {
            max_guidances_per_hour: max_per_hour,
            ..Default::default()
        };
        AutopilotMonitor::new(Arc::new(orchestrator), config)
    }

    fn session() -> Arc<MemorySession> {
        let session = Arc::new(MemorySession::new("s1", "/tmp/project"));
        session.push_output("Edited src/lib.rs");
        session
    }

    fn drain(rx: &mut mpsc::Receiver<AutopilotEvent>) -> Vec<&'static str> {
        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(event.name());
        }
        names
    }

    #[tokio::test]
    async fn test_cycle_writes_guidance_and_counts_it() {
        let (monitor, mut rx) = monitor(10);
        let session = session();
        monitor.enable(session.clone());

        let outcome = monitor.run_cycle("s1").await;
        assert!(outcome.is_guided());
        assert_eq!(session.written(), vec!["🤖 Autopilot: Run the tests.\n"]);

        let state = monitor.state("s1").unwrap();
        assert_eq!(state.guidances_provided, 1);
        assert!(state.last_guidance_time.is_some());
        assert!(!state.analysis_in_progress);
        assert_eq!(
            drain(&mut rx),
            vec!["statusChanged", "analysisComplete", "guidanceProvided"]
        );
    }

    #[tokio::test]
    async fn test_enable_is_idempotent() {
        let (monitor, mut rx) = monitor(10);
        let session = session();
        monitor.enable(session.clone());
        monitor.enable(session);
        assert_eq!(drain(&mut rx), vec!["statusChanged"]);
        assert!(monitor.is_enabled("s1"));
    }

    #[tokio::test]
    async fn test_rate_limit_blocks_within_hour() {
        let (monitor, _rx) = monitor(1);
        monitor.enable(session());

        assert!(monitor.run_cycle("s1").await.is_guided());
        assert_eq!(monitor.run_cycle("s1").await, CycleOutcome::RateLimited);
    }

    #[tokio::test]
    async fn test_rate_window_rollover() {
        let (monitor, _rx) = monitor(2);
        monitor.enable(session());
        monitor.with_state("s1", |s| {
            s.guidances_provided = 2;
            s.last_guidance_time = Some(Utc::now() - ChronoDuration::hours(2));
        });

        assert!(monitor.run_cycle("s1").await.is_guided());
        assert_eq!(monitor.state("s1").unwrap().guidances_provided, 1);
    }

    #[tokio::test]
    async fn test_in_flight_cycle_is_skipped() {
        let (monitor, _rx) = monitor(10);
        monitor.enable(session());
        monitor.with_state("s1", |s| s.analysis_in_progress = true);

        assert_eq!(
            monitor.run_cycle("s1").await,
            CycleOutcome::Skipped("analysis in progress")
        );
    }

    #[tokio::test]
    async fn test_disabled_and_unknown_sessions_skip() {
        let (monitor, mut rx) = monitor(10);
        assert_eq!(monitor.run_cycle("nope").await, CycleOutcome::Skipped("unknown session"));
        assert!(matches!(
            monitor.disable("nope"),
            Err(GuidanceError::SessionNotFound(_))
        ));

        let session = session();
        monitor.enable(session.clone());
        monitor.disable("s1").unwrap();
        assert_eq!(monitor.run_cycle("s1").await, CycleOutcome::Skipped("autopilot disabled"));
        assert!(session.written().is_empty());
        assert_eq!(drain(&mut rx), vec!["statusChanged", "statusChanged"]);
    }

    #[tokio::test]
    async fn test_inactive_session_is_skipped() {
        let (monitor, mut rx) = monitor(10);
        let session = session();
        monitor.enable(session.clone());
        session.set_active(false);

        assert_eq!(monitor.run_cycle("s1").await, CycleOutcome::Skipped("session inactive"));
        assert_eq!(drain(&mut rx), vec!["statusChanged"]);
    }

    struct Crashing;

    #[async_trait]
    impl TerminalSession for Crashing {
        fn id(&self) -> &str {
            "crash"
        }
        fn worktree_path(&self) -> &std::path::Path {
            std::path::Path::new("/tmp")
        }
        fn recent_output(&self, _lines: usize) -> Vec<String> {
            panic!("terminal buffer poisoned")
        }
        fn is_active(&self) -> bool {
            true
        }
        async fn write_input(&self, _text: &str) -> steward_core::CoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_manual_cycle_reports_panic() {
        let (monitor, mut rx) = monitor(10);
        monitor.enable(Arc::new(Crashing));

        let outcome = monitor.run_cycle("crash").await;
        assert_eq!(outcome, CycleOutcome::Failed("analysis cycle panicked".to_string()));
        assert_eq!(drain(&mut rx), vec!["statusChanged", "analysisError"]);

        let state = monitor.state("crash").unwrap();
        assert!(!state.analysis_in_progress);
        assert_eq!(state.guidances_provided, 0);
    }

    #[tokio::test]
    async fn test_toggle() {
        let (monitor, _rx) = monitor(10);
        let session = session();
        assert!(monitor.toggle(session.clone()));
        assert!(!monitor.toggle(session.clone()));
        assert!(!monitor.is_enabled("s1"));
        assert!(monitor.toggle(session));
        assert_eq!(monitor.sessions(), vec!["s1"]);
    }
}
