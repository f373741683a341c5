//! Git status collection.
//!
//! Status comes from a single `git status --porcelain --branch` call. Any
//! failure (git missing, not a repository) is reported as an error and the
//! context builder treats the status as unavailable.

use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ContextError, ContextResult};

/// Working tree status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitStatus {
    pub branch: Option<String>,
    pub staged_files: Vec<String>,
    pub unstaged_files: Vec<String>,
    pub untracked_files: Vec<String>,
    pub ahead: usize,
    pub behind: usize,
}

impl GitStatus {
    /// Distinct files with any pending change.
    pub fn changed_count(&self) -> usize {
        let mut files: Vec<&String> = self
            .staged_files
            .iter()
            .chain(&self.unstaged_files)
            .chain(&self.untracked_files)
            .collect();
        files.sort();
        files.dedup();
        files.len()
    }

    pub fn has_changes(&self) -> bool {
        self.changed_count() > 0
    }

    pub fn is_clean(&self) -> bool {
        !self.has_changes()
    }
}

/// Source of git status for a project directory.
#[cfg_attr(test, mockall::automock)]
pub trait GitStatusProvider: Send + Sync {
    fn status(&self, path: &Path) -> ContextResult<GitStatus>;
}

/// Reads status by shelling out to the `git` binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }

    /// Check if Git is available on the system.
    pub fn is_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

impl GitStatusProvider for GitCli {
    fn status(&self, path: &Path) -> ContextResult<GitStatus> {
        let output = Command::new("git")
            .args(["status", "--porcelain=v1", "--branch"])
            .current_dir(path)
            .output()
            .map_err(|e| ContextError::Git(format!("Failed to run git status: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ContextError::Git(format!("git status failed: {}", stderr.trim())));
        }

        let status = parse_porcelain(&String::from_utf8_lossy(&output.stdout));
        debug!(
            "git status for {}: {} changed files",
            path.display(),
            status.changed_count()
        );
        Ok(status)
    }
}

/// Parse `git status --porcelain=v1 --branch` output.
pub fn parse_porcelain(stdout: &str) -> GitStatus {
    let mut status = GitStatus::default();

    for line in stdout.lines() {
        if let Some(header) = line.strip_prefix("## ") {
            parse_branch_header(header, &mut status);
            continue;
        }
        if line.len() < 4 {
            continue;
        }
        let x = &line[0..1];
        let y = &line[1..2];
        let file = line[3..].to_string();

        if x == "?" && y == "?" {
            status.untracked_files.push(file);
            continue;
        }
        if x != " " {
            status.staged_files.push(file.clone());
        }
        if y != " " {
            status.unstaged_files.push(file);
        }
    }

    status
}

fn parse_branch_header(header: &str, status: &mut GitStatus) {
    // "main...origin/main [ahead 1, behind 2]" or "No commits yet on main"
    let (names, tracking) = match header.split_once(" [") {
        Some((names, rest)) => (names, Some(rest.trim_end_matches(']'))),
        None => (header, None),
    };

    let branch = names
        .strip_prefix("No commits yet on ")
        .unwrap_or(names)
        .split("...")
        .next()
        .unwrap_or_default()
        .trim();
    if !branch.is_empty() && branch != "HEAD (no branch)" {
        status.branch = Some(branch.to_string());
    }

    if let Some(tracking) = tracking {
        for part in tracking.split(", ") {
            if let Some(n) = part.strip_prefix("ahead ") {
                status.ahead = n.parse().unwrap_or(0);
            } else if let Some(n) = part.strip_prefix("behind ") {
                status.behind = n.parse().unwrap_or(0);
            }
        }
    }
}
