//! Session contract consumed from the process layer.
//!
//! The engine never spawns, resizes or terminates a session. It only reads the
//! rolling output buffer and writes guidance lines into the input stream.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{CoreError, CoreResult};

/// A running assistant session observed by the monitor.
#[async_trait]
pub trait TerminalSession: Send + Sync {
    /// Stable session identifier.
    fn id(&self) -> &str;

    /// Project directory the session works in.
    fn worktree_path(&self) -> &Path;

    /// The last `lines` lines of output, oldest first, ANSI codes intact.
    fn recent_output(&self, lines: usize) -> Vec<String>;

    /// Whether the underlying process is still running.
    fn is_active(&self) -> bool;

    /// Inject text into the assistant's input stream.
    async fn write_input(&self, text: &str) -> CoreResult<()>;
}

/// In-memory session with a bounded output buffer.
///
/// Captures everything written to it so callers can inspect injected
/// guidance. Clones share the same buffers.
#[derive(Clone)]
pub struct MemorySession {
    id: String,
    worktree: PathBuf,
    capacity: usize,
    output: Arc<RwLock<VecDeque<String>>>,
    written: Arc<RwLock<Vec<String>>>,
    active: Arc<AtomicBool>,
}

impl MemorySession {
    pub fn new(id: impl Into<String>, worktree: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            worktree: worktree.into(),
            capacity: 1000,
            output: Arc::new(RwLock::new(VecDeque::new())),
            written: Arc::new(RwLock::new(Vec::new())),
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Append output lines, evicting the oldest beyond capacity.
    pub fn push_output(&self, text: &str) {
        let mut output = self.output.write();
        for line in text.lines() {
            output.push_back(line.to_string());
            while output.len() > self.capacity {
                output.pop_front();
            }
        }
    }

    pub fn clear_output(&self) {
        self.output.write().clear();
    }

    /// Everything written through [`TerminalSession::write_input`].
    pub fn written(&self) -> Vec<String> {
        self.written.read().clone()
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for MemorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySession")
            .field("id", &self.id)
            .field("worktree", &self.worktree)
            .field("lines", &self.output.read().len())
            .finish()
    }
}

#[async_trait]
impl TerminalSession for MemorySession {
    fn id(&self) -> &str {
        &self.id
    }

    fn worktree_path(&self) -> &Path {
        &self.worktree
    }

    fn recent_output(&self, lines: usize) -> Vec<String> {
        let output = self.output.read();
        let skip = output.len().saturating_sub(lines);
        output.iter().skip(skip).cloned().collect()
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn write_input(&self, text: &str) -> CoreResult<()> {
        if !self.is_active() {
            return Err(CoreError::SessionClosed(self.id.clone()));
        }
        self.written.write().push(text.to_string());
        Ok(())
    }
}
