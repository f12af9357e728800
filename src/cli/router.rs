//! Command routing and execution

use crate::cli::args::Commands;
use crate::cli::commands::*;
use crate::config::DynarunConfig;
use anyhow::Result;
use std::path::Path;
use tracing::debug;

/// Execute a CLI command and return the process exit code
pub async fn execute_command(command: Commands, config_path: Option<&Path>) -> Result<i32> {
    let config = DynarunConfig::load(config_path)?;
    debug!("Effective configuration: {:?}", config);

    match command {
        Commands::Run {
            entry,
            analyses,
            name,
            coverage,
            coverage_dir,
            init,
            output,
            json,
            args,
        } => {
            run_session_command(
                config,
                RunArgs {
                    entry,
                    analyses,
                    name,
                    coverage,
                    coverage_dir,
                    init,
                    output,
                    json,
                    args,
                },
            )
            .await
        }
        Commands::Instrument {
            directory,
            analysis,
            module,
            external_dir,
            ignore,
            quiet,
        } => {
            run_instrument_command(
                config,
                InstrumentArgs {
                    directory,
                    analysis,
                    module,
                    external_dir,
                    ignore,
                    quiet,
                },
            )
            .await
        }
    }
}
