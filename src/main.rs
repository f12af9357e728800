use clap::Parser;
use dynarun::cli::{execute_command, get_log_level, Cli};
use dynarun::error::{describe_error_code, DynarunError};
use tracing::{debug, error, trace};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(get_log_level(cli.verbose))
        .with_target(cli.verbose >= 2) // Show target module for -vv and above
        .with_thread_ids(cli.verbose >= 3) // Show thread IDs for -vvv
        .with_line_number(cli.verbose >= 3) // Show line numbers for -vvv
        .with_writer(std::io::stderr)
        .init();

    debug!("dynarun started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let code = match execute_command(cli.command, cli.config.as_deref()).await {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            match e.downcast_ref::<DynarunError>() {
                Some(err) => {
                    debug!("E{:04}: {}", err.code(), describe_error_code(err.code()));
                    eprintln!("Error: {}", err.user_message());
                    err.exit_code()
                }
                None => {
                    eprintln!("Error: {e:#}");
                    1
                }
            }
        }
    };

    std::process::exit(code);
}
