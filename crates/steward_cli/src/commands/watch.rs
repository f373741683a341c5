//! Watch command - Tail a log file as a session and run the autopilot.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

use steward_core::{MemorySession, GUIDANCE_MARKER};
use steward_guidance::{AutopilotEvent, AutopilotMonitor, GuidanceOrchestrator};

use super::ProjectArgs;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Args)]
pub struct WatchArgs {
    /// Log file written by the assistant's terminal
    #[arg(short, long)]
    file: PathBuf,

    /// Session id used in events
    #[arg(long, default_value = "watch")]
    session: String,

    /// Override analysisDelayMs
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Print every event as JSON
    #[arg(long)]
    events: bool,

    #[command(flatten)]
    project: ProjectArgs,
}

pub async fn execute(args: WatchArgs) -> Result<()> {
    let project = args.project.project_dir()?;
    let mut config = args.project.load_config(&project)?;
    if let Some(delay) = args.delay_ms {
        config.analysis_delay_ms = delay;
    }
    config.validate().context("Invalid configuration")?;

    if !args.file.exists() {
        anyhow::bail!("Log file not found: {}", args.file.display());
    }

    let session = Arc::new(
        MemorySession::new(&args.session, &project).with_capacity(config.output_lines.max(200)),
    );
    let orchestrator = Arc::new(GuidanceOrchestrator::standard(&config));
    let (monitor, mut events) = AutopilotMonitor::new(orchestrator, config.clone());

    let mut tail = tokio::spawn(follow(args.file.clone(), session.clone()));
    monitor.enable(session.clone());

    println!(
        "👀 Watching {} every {} ms (Ctrl-C to stop)",
        args.file.display(),
        config.analysis_delay_ms
    );

    let failure = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break None,
            joined = &mut tail => {
                break match joined {
                    Ok(Err(e)) => Some(e),
                    Ok(Ok(())) => None,
                    Err(e) => Some(anyhow::anyhow!("Log follower stopped: {}", e)),
                };
            }
            event = events.recv() => match event {
                Some(event) => print_event(&event, args.events),
                None => break None,
            },
        }
    };

    monitor.shutdown().await;
    tail.abort();

    if let Some(state) = monitor.state(&args.session) {
        println!();
        println!("Guidance written this hour: {}", state.guidances_provided);
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn print_event(event: &AutopilotEvent, as_json: bool) {
    if as_json {
        match serde_json::to_string(event) {
            Ok(json) => println!("{}", json),
            Err(e) => warn!("Failed to serialize {} event: {}", event.name(), e),
        }
        return;
    }

    match event {
        AutopilotEvent::GuidanceProvided { guidance, source, .. } => {
            println!("{} {}  [{}]", GUIDANCE_MARKER, guidance, source);
        }
        AutopilotEvent::AnalysisError { error, .. } => warn!("Analysis failed: {}", error),
        AutopilotEvent::StatusChanged { session_id, status } => {
            info!("Session {} is now {}", session_id, status)
        }
        AutopilotEvent::AnalysisComplete { result, .. } => debug!("Cycle done: {}", result.reasoning),
    }
}

/// Feed complete lines appended to `path` into `session`.
///
/// Starts from the beginning of the file and restarts after truncation.
async fn follow(path: PathBuf, session: Arc<MemorySession>) -> Result<()> {
    let mut offset = 0u64;
    let mut partial = String::new();
    let mut ticks = tokio::time::interval(POLL_INTERVAL);

    loop {
        ticks.tick().await;
        let (read, next) = read_from(&path, offset).await?;
        if next < offset {
            debug!("{} was truncated, starting over", path.display());
            partial.clear();
        }
        offset = next;
        partial.push_str(&read);

        if let Some(end) = partial.rfind('\n') {
            let complete: String = partial.drain(..=end).collect();
            session.push_output(&complete);
        }
    }
}

/// Text appended after `offset`, and the new offset.
async fn read_from(path: &Path, offset: u64) -> Result<(String, u64)> {
    let len = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Log file not found: {}", path.display()))?
        .len();
    let start = if len < offset { 0 } else { offset };
    if len == start {
        return Ok((String::new(), len));
    }

    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(start)).await?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).await?;
    let next = start + buf.len() as u64;
    Ok((String::from_utf8_lossy(&buf).into_owned(), next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_read_from_offset_and_truncation() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("session.log");
        fs::write(&path, "one\ntwo\n").unwrap();

        let (text, offset) = read_from(&path, 0).await.unwrap();
        assert_eq!(text, "one\ntwo\n");
        assert_eq!(offset, 8);

        fs::write(&path, "one\ntwo\nthree\n").unwrap();
        let (text, offset) = read_from(&path, offset).await.unwrap();
        assert_eq!(text, "three\n");
        assert_eq!(offset, 14);

        fs::write(&path, "new\n").unwrap();
        let (text, offset) = read_from(&path, offset).await.unwrap();
        assert_eq!(text, "new\n");
        assert_eq!(offset, 4);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let temp = tempdir().unwrap();
        assert!(read_from(&temp.path().join("nope.log"), 0).await.is_err());
    }
}
