//! Placement - Main Entry Point

use clap::Parser;
use placement::cli::{cmd_predict, cmd_schema, cmd_train, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "placement=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train { data, output, target, config } => {
            cmd_train(&data, &output, target.as_deref(), config.as_deref())?;
        }
        Commands::Predict { artifacts, input, set, threshold, config, json } => {
            cmd_predict(&artifacts, input.as_deref(), &set, threshold, config.as_deref(), json)?;
        }
        Commands::Schema => {
            cmd_schema()?;
        }
    }

    Ok(())
}
