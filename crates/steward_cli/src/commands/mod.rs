//! CLI command definitions.
//!
//! Each subcommand maps to one piece of the guidance engine, so it can be
//! exercised against a real project without a terminal host.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use steward_core::{AutopilotConfig, ConfigStore, JsonConfigStore};

pub mod analyze;
pub mod config;
pub mod confirm;
pub mod context;
pub mod llm_check;
pub mod watch;

/// Steward - autopilot guidance for coding assistants
#[derive(Parser)]
#[command(name = "steward")]
#[command(version, about = "Steward - autopilot guidance for coding assistants")]
#[command(long_about = r#"
Steward watches a coding assistant's terminal output and decides whether to
step in with a short corrective instruction.

COMMANDS:
  analyze     → Run one guidance cycle over a log file or stdin
  context     → Show the detected project context
  confirm     → Classify a confirmation prompt
  watch       → Tail a log file and run the autopilot until Ctrl-C
  config      → Show or initialize the autopilot configuration
  llm-check   → Verify the configured LLM provider

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Configuration error
  4 - LLM provider error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one guidance cycle and print the result as JSON
    Analyze(analyze::AnalyzeArgs),

    /// Print the detected project context
    Context(context::ContextArgs),

    /// Classify a confirmation prompt
    Confirm(confirm::ConfirmArgs),

    /// Tail a log file as a session and run the autopilot
    Watch(watch::WatchArgs),

    /// Show or initialize configuration
    Config(config::ConfigArgs),

    /// Test the configured LLM provider
    #[command(name = "llm-check")]
    LlmCheck(llm_check::LlmCheckArgs),
}

/// Project selection shared by every command.
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project directory (defaults to current directory)
    #[arg(short, long)]
    pub project: Option<PathBuf>,

    /// Config file (defaults to <project>/.steward/autopilot.json)
    #[arg(long, env = "STEWARD_CONFIG")]
    pub config: Option<PathBuf>,
}

impl ProjectArgs {
    pub fn project_dir(&self) -> Result<PathBuf> {
        match &self.project {
            Some(path) => Ok(path.clone()),
            None => std::env::current_dir().context("Failed to read current directory"),
        }
    }

    pub fn store(&self, project: &Path) -> JsonConfigStore {
        match &self.config {
            Some(path) => JsonConfigStore::new(path),
            None => JsonConfigStore::for_workspace(project),
        }
    }

    /// Stored configuration with API keys filled from the environment.
    pub fn load_config(&self, project: &Path) -> Result<AutopilotConfig> {
        let store = self.store(project);
        let config = store
            .load()
            .with_context(|| format!("Failed to load config from {}", store.path().display()))?;
        Ok(config.with_env_overrides())
    }
}

/// Last `lines` lines of `text`.
pub fn tail_lines(text: &str, lines: usize) -> Vec<&str> {
    let all: Vec<&str> = text.lines().collect();
    let skip = all.len().saturating_sub(lines);
    all[skip..].to_vec()
}
