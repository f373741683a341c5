//! LLM check command - Verify provider credentials with a minimal request.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use steward_llm::{LlmClient, ProviderRegistry};

use super::ProjectArgs;

#[derive(Args)]
pub struct LlmCheckArgs {
    /// List the known models for every provider and exit
    #[arg(long)]
    list_models: bool,

    #[command(flatten)]
    project: ProjectArgs,
}

pub async fn execute(args: LlmCheckArgs) -> Result<()> {
    let project = args.project.project_dir()?;
    let config = args.project.load_config(&project)?;
    let client = LlmClient::new(config.clone(), Arc::new(ProviderRegistry::builtin()));

    if args.list_models {
        let active = client.model();
        for provider in steward_core::LlmProvider::all() {
            println!("{}:", provider);
            for model in client.registry().models_for(provider) {
                let marker = if provider == client.provider() && active.as_deref() == Some(model.id.as_str()) {
                    " *"
                } else {
                    ""
                };
                println!("  {} ({}){}", model.id, model.display_name, marker);
            }
        }
        return Ok(());
    }

    if !client.is_configured() {
        anyhow::bail!(
            "No API key configured for {} (set {} or add it to the config)",
            config.provider,
            config.provider.env_key()
        );
    }

    let model = client.model().unwrap_or_default();
    info!("Testing {} / {}", config.provider, model);
    client
        .test_connection()
        .await
        .with_context(|| format!("LLM provider {} failed the connection test", config.provider))?;

    println!("✅ {} / {} is reachable", config.provider, model);
    Ok(())
}
