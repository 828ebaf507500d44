//! stacking-cv - Main Entry Point
//!
//! Evaluates stacked cross-validated ensembles from the command line.

use clap::Parser;
use stacking_cv::cli::{cmd_evaluate, cmd_params, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stacking_cv=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate(args) => cmd_evaluate(&args)?,
        Commands::Params(args) => cmd_params(&args)?,
    }

    Ok(())
}
