//! Context command - Show what the engine knows about a project.

use anyhow::Result;
use clap::Args;

use steward_context::ContextBuilder;

use super::ProjectArgs;

#[derive(Args)]
pub struct ContextArgs {
    /// Print a one-line summary instead of JSON
    #[arg(short, long)]
    summary: bool,

    /// Also list the project's compliance patterns
    #[arg(long)]
    compliance: bool,

    #[command(flatten)]
    project: ProjectArgs,
}

pub async fn execute(args: ContextArgs) -> Result<()> {
    let project = args.project.project_dir()?;
    if !project.is_dir() {
        anyhow::bail!("Project directory not found: {}", project.display());
    }
    let config = args.project.load_config(&project)?;

    let builder = ContextBuilder::new(config.context);
    let context = builder.build_project_context(&project).await;

    if args.summary {
        println!("{}", ContextBuilder::summarize(&context));
    } else {
        println!("{}", serde_json::to_string_pretty(&context)?);
    }

    if args.compliance {
        let patterns = builder.get_compliance_patterns(&project).await;
        if patterns.is_empty() {
            println!("No compliance patterns for this project");
        }
        for pattern in patterns {
            println!("  [{}] {} - {}", pattern.priority, pattern.id, pattern.guidance);
        }
    }

    Ok(())
}
