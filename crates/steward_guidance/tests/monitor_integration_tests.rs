//! Integration tests for the autopilot monitor loop.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use tokio::time::{sleep, timeout};

use steward_core::{
    AnalysisContext, AutopilotConfig, CoreError, CoreResult, GuidanceResult, MemorySession,
    TerminalSession,
};
use steward_guidance::{
    AutopilotEvent, AutopilotMonitor, CycleOutcome, EngineResult, GuidanceOrchestrator,
    GuidanceSource, MonitorStatus,
};

/// Always asks for the same guidance.
struct Nudge {
    calls: AtomicUsize,
}

#[async_trait]
impl GuidanceSource for Nudge {
    fn id(&self) -> &str {
        "nudge"
    }

    fn priority(&self) -> u32 {
        1
    }

    fn can_short_circuit(&self) -> bool {
        true
    }

    async fn analyze(&self, _context: &AnalysisContext) -> EngineResult<GuidanceResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GuidanceResult::intervene("nudge", 1, 0.95, "Commit your work.", "tests are green"))
    }
}

/// Blocks inside `analyze` until released.
#[derive(Default)]
struct Gate {
    entered: Notify,
    release: Notify,
    calls: AtomicUsize,
}

#[async_trait]
impl GuidanceSource for Gate {
    fn id(&self) -> &str {
        "gate"
    }

    fn priority(&self) -> u32 {
        1
    }

    fn can_short_circuit(&self) -> bool {
        false
    }

    async fn analyze(&self, _context: &AnalysisContext) -> EngineResult<GuidanceResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        Ok(GuidanceResult::intervene("gate", 1, 0.8, "Slow down.", "gated"))
    }
}

/// A session whose input stream rejects every write.
struct BrokenPipe;

#[async_trait]
impl TerminalSession for BrokenPipe {
    fn id(&self) -> &str {
        "broken"
    }

    fn worktree_path(&self) -> &Path {
        Path::new("/tmp")
    }

    fn recent_output(&self, _lines: usize) -> Vec<String> {
        vec!["Tests: 4 passed".to_string()]
    }

    fn is_active(&self) -> bool {
        true
    }

    async fn write_input(&self, _text: &str) -> CoreResult<()> {
        Err(CoreError::SessionClosed("broken".to_string()))
    }
}

fn config(delay_ms: u64, max_per_hour: u32) -> AutopilotConfig {
    AutopilotConfig {
        enabled: true,
        analysis_delay_ms: delay_ms,
        max_guidances_per_hour: max_per_hour,
        ..Default::default()
    }
}

fn monitor_with(
    source: Arc<dyn GuidanceSource>,
    config: AutopilotConfig,
) -> (AutopilotMonitor, mpsc::Receiver<AutopilotEvent>) {
    let orchestrator = GuidanceOrchestrator::new();
    orchestrator.add_source(source).unwrap();
    AutopilotMonitor::new(Arc::new(orchestrator), config)
}

fn session() -> Arc<MemorySession> {
    let session = Arc::new(MemorySession::new("s1", "/tmp/project"));
    session.push_output("\x1b[32m✓\x1b[0m 12 tests passed");
    session
}

async fn next_event(rx: &mut mpsc::Receiver<AutopilotEvent>) -> AutopilotEvent {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// The ticker keeps writing guidance until the hourly budget is spent.
#[tokio::test]
async fn test_ticker_respects_hourly_budget() {
    let nudge = Arc::new(Nudge {
        calls: AtomicUsize::new(0),
    });
    let (monitor, _rx) = monitor_with(nudge.clone(), config(20, 3));
    let session = session();
    monitor.enable(session.clone());

    sleep(Duration::from_millis(400)).await;
    monitor.shutdown().await;

    assert_eq!(session.written().len(), 3);
    assert!(session
        .written()
        .iter()
        .all(|line| line == "🤖 Autopilot: Commit your work.\n"));
    assert_eq!(nudge.calls.load(Ordering::SeqCst), 3);

    let state = monitor.state("s1").unwrap();
    assert_eq!(state.guidances_provided, 3);
    assert!(!state.is_active);
    assert!(!state.analysis_in_progress);
}

/// Events arrive in order and carry the session id.
#[tokio::test]
async fn test_event_sequence() {
    let nudge = Arc::new(Nudge {
        calls: AtomicUsize::new(0),
    });
    let (monitor, mut rx) = monitor_with(nudge, config(20, 1));
    monitor.enable(session());

    let event = next_event(&mut rx).await;
    assert_eq!(
        event,
        AutopilotEvent::StatusChanged {
            session_id: "s1".to_string(),
            status: MonitorStatus::Active,
        }
    );

    match next_event(&mut rx).await {
        AutopilotEvent::AnalysisComplete { session_id, result } => {
            assert_eq!(session_id, "s1");
            assert_eq!(result.source, "nudge");
        }
        other => panic!("unexpected event {:?}", other),
    }

    match next_event(&mut rx).await {
        AutopilotEvent::GuidanceProvided { guidance, source, .. } => {
            assert_eq!(guidance, "Commit your work.");
            assert_eq!(source, "nudge");
        }
        other => panic!("unexpected event {:?}", other),
    }

    monitor.disable("s1").unwrap();
    // Budget of one: later ticks are rate limited and emit nothing
    let last = loop {
        let event = next_event(&mut rx).await;
        if event.name() == "statusChanged" {
            break event;
        }
    };
    assert_eq!(
        last,
        AutopilotEvent::StatusChanged {
            session_id: "s1".to_string(),
            status: MonitorStatus::Standby,
        }
    );
}

/// A second cycle is skipped while the first is still running.
#[tokio::test]
async fn test_single_flight_per_session() {
    let gate = Arc::new(Gate::default());
    let (monitor, _rx) = monitor_with(gate.clone(), config(60_000, 10));
    let session = session();
    monitor.enable(session.clone());

    let first = tokio::spawn({
        let monitor = monitor.clone();
        async move { monitor.run_cycle("s1").await }
    });
    gate.entered.notified().await;

    assert!(monitor.state("s1").unwrap().analysis_in_progress);
    assert_eq!(
        monitor.run_cycle("s1").await,
        CycleOutcome::Skipped("analysis in progress")
    );

    gate.release.notify_one();
    assert!(first.await.unwrap().is_guided());
    assert_eq!(gate.calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.written().len(), 1);
    assert!(!monitor.state("s1").unwrap().analysis_in_progress);
}

/// Disabling a session cancels its in-flight cycle and clears the guard.
#[tokio::test]
async fn test_disable_cancels_in_flight_cycle() {
    let gate = Arc::new(Gate::default());
    let (monitor, _rx) = monitor_with(gate.clone(), config(60_000, 10));
    let session = session();
    monitor.enable(session.clone());

    let cycle = tokio::spawn({
        let monitor = monitor.clone();
        async move { monitor.run_cycle("s1").await }
    });
    gate.entered.notified().await;

    monitor.disable("s1").unwrap();
    assert_eq!(cycle.await.unwrap(), CycleOutcome::Cancelled);

    let state = monitor.state("s1").unwrap();
    assert!(!state.analysis_in_progress);
    assert_eq!(state.guidances_provided, 0);
    assert!(session.written().is_empty());
}

/// Re-enabling keeps the hourly count from before.
#[tokio::test]
async fn test_reenable_keeps_budget() {
    let nudge = Arc::new(Nudge {
        calls: AtomicUsize::new(0),
    });
    let (monitor, _rx) = monitor_with(nudge, config(60_000, 1));
    let session = session();

    monitor.enable(session.clone());
    assert!(monitor.run_cycle("s1").await.is_guided());
    monitor.disable("s1").unwrap();

    monitor.enable(session);
    assert_eq!(monitor.run_cycle("s1").await, CycleOutcome::RateLimited);
}

/// A failed write is reported as an analysis error and is not counted.
#[tokio::test]
async fn test_write_failure_reported() {
    let nudge = Arc::new(Nudge {
        calls: AtomicUsize::new(0),
    });
    let (monitor, mut rx) = monitor_with(nudge, config(60_000, 10));
    monitor.enable(Arc::new(BrokenPipe));
    let _ = next_event(&mut rx).await;

    let outcome = monitor.run_cycle("broken").await;
    assert!(matches!(outcome, CycleOutcome::Failed(_)));

    assert_eq!(next_event(&mut rx).await.name(), "analysisComplete");
    match next_event(&mut rx).await {
        AutopilotEvent::AnalysisError { session_id, error } => {
            assert_eq!(session_id, "broken");
            assert!(error.contains("broken"));
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(monitor.state("broken").unwrap().guidances_provided, 0);
}

/// A new analysis delay reaches running tickers after their next tick.
#[tokio::test]
async fn test_update_config_changes_delay() {
    let nudge = Arc::new(Nudge {
        calls: AtomicUsize::new(0),
    });
    let (monitor, _rx) = monitor_with(nudge.clone(), config(50, 100));
    let session = session();
    monitor.enable(session.clone());

    sleep(Duration::from_millis(80)).await;
    monitor.update_config(config(60_000, 100));
    let calls = nudge.calls.load(Ordering::SeqCst);
    assert!(calls >= 1);

    sleep(Duration::from_millis(200)).await;
    assert!(nudge.calls.load(Ordering::SeqCst) <= calls + 1);
    monitor.shutdown().await;
}
