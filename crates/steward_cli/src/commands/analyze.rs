//! Analyze command - Run one guidance cycle over captured output.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tokio::io::AsyncReadExt;
use tracing::info;

use steward_core::AnalysisContext;
use steward_guidance::GuidanceOrchestrator;

use super::{tail_lines, ProjectArgs};

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Log file to analyze (reads stdin when omitted)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Number of trailing lines to analyze (defaults to outputLines)
    #[arg(short, long)]
    lines: Option<usize>,

    /// Print only the guidance line, if any
    #[arg(long)]
    guidance_only: bool,

    #[command(flatten)]
    project: ProjectArgs,
}

pub async fn execute(args: AnalyzeArgs) -> Result<()> {
    let project = args.project.project_dir()?;
    let config = args.project.load_config(&project)?;

    let text = match &args.file {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Log file not found: {}", path.display());
            }
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?
        }
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read stdin")?;
            buf
        }
    };

    let lines = tail_lines(&text, args.lines.unwrap_or(config.output_lines));
    info!("Analyzing {} lines for {}", lines.len(), project.display());

    let orchestrator = GuidanceOrchestrator::standard(&config);
    let context = AnalysisContext::from_lines("cli", &lines, &project);
    let result = orchestrator.generate_guidance(&context).await;

    if args.guidance_only {
        if let Some(line) = result.formatted_line().filter(|_| result.should_intervene) {
            print!("{}", line);
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    Ok(())
}
