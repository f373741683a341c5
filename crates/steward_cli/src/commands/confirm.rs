//! Confirm command - Classify a confirmation prompt against a project.

use anyhow::Result;
use clap::Args;

use steward_context::{ConfirmationDialogHandler, ContextBuilder};

use super::ProjectArgs;

#[derive(Args)]
pub struct ConfirmArgs {
    /// Prompt text, e.g. "Do you want me to run npm test?"
    prompt: String,

    /// Print the decision as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    project: ProjectArgs,
}

pub async fn execute(args: ConfirmArgs) -> Result<()> {
    let project = args.project.project_dir()?;
    let config = args.project.load_config(&project)?;

    let context = ContextBuilder::new(config.context)
        .build_project_context(&project)
        .await;
    let handler = ConfirmationDialogHandler::new();
    let decision = handler.should_auto_confirm(&args.prompt, &context);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
        return Ok(());
    }

    let answer = decision.confidence >= handler.get_confidence_threshold();
    println!("Dialog:     {}", decision.dialog_type);
    println!("Confidence: {:.2}", decision.confidence);
    println!("Reasoning:  {}", decision.reasoning);
    match decision.response.as_deref() {
        Some(response) if decision.should_confirm && answer => {
            println!("✅ Would answer \"{}\"", response)
        }
        _ => println!("⏸️  Would leave the prompt to the user"),
    }

    Ok(())
}
