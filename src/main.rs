//! Score predictor - Main Entry Point
//!
//! Train, track and serve the student score regression model.

use clap::Parser;
use score_predictor::cli::{
    cmd_ingest, cmd_predict, cmd_run_all, cmd_serve, cmd_status, cmd_train, cmd_transform, Cli, Commands,
};
use score_predictor::config::ArtifactConfig;
use score_predictor::logging;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let log_file = logging::init(&cli.log_dir)?;
    tracing::debug!(log_file = %log_file.display(), "Logging initialised");

    let artifacts = ArtifactConfig::in_dir(&cli.artifacts);

    match cli.command {
        Some(Commands::Ingest { source }) => {
            cmd_ingest(&artifacts, &source)?;
        }
        Some(Commands::Transform { infer_target }) => {
            cmd_transform(&artifacts, infer_target.as_deref())?;
        }
        Some(Commands::Train { threshold, infer_target }) => {
            cmd_train(&artifacts, threshold, infer_target.as_deref())?;
        }
        Some(Commands::Predict { input, output }) => {
            cmd_predict(&artifacts, &input, &output)?;
        }
        Some(Commands::Serve { host, port }) => {
            cmd_serve(&artifacts, &host, port)?;
        }
        Some(Commands::RunAll { source, threshold, port, startup_timeout }) => {
            cmd_run_all(&artifacts, &source, threshold, port, startup_timeout)?;
        }
        Some(Commands::Status) | None => {
            cmd_status(&artifacts)?;
        }
    }

    Ok(())
}
