//! Config command - Show or initialize the autopilot configuration.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use steward_core::{AutopilotConfig, ConfigStore, LlmProvider};

use super::ProjectArgs;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,

    #[command(flatten)]
    project: ProjectArgs,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (API keys redacted)
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn execute(args: ConfigArgs) -> Result<()> {
    let project = args.project.project_dir()?;

    match args.action {
        ConfigAction::Show => {
            let config = args.project.load_config(&project)?;
            println!("{}", serde_json::to_string_pretty(&redacted(config))?);
        }
        ConfigAction::Init { force } => {
            let store = args.project.store(&project);
            if store.path().exists() && !force {
                anyhow::bail!(
                    "Config already exists at {}. Use --force to overwrite.",
                    store.path().display()
                );
            }
            store
                .save(&AutopilotConfig::default())
                .with_context(|| format!("Failed to write config to {}", store.path().display()))?;

            println!("✅ Wrote default configuration to {}", store.path().display());
            println!();
            println!("Next steps:");
            println!("  export ANTHROPIC_API_KEY=...   (or OPENAI_API_KEY / GEMINI_API_KEY)");
            println!("  steward llm-check");
        }
    }

    Ok(())
}

fn redacted(mut config: AutopilotConfig) -> AutopilotConfig {
    for provider in LlmProvider::all() {
        if config.api_keys.get(provider).is_some() {
            config.api_keys.set(provider, "********");
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_hides_keys() {
        let mut config = AutopilotConfig::default();
        config.api_keys.set(LlmProvider::Anthropic, "sk-ant-secret");

        let shown = redacted(config);
        assert_eq!(shown.api_keys.get(LlmProvider::Anthropic), Some("********"));
        assert_eq!(shown.api_keys.get(LlmProvider::OpenAI), None);
    }
}
