//! Formulize - a step debugger for formula scripts
//!
//! Runs scripts one evaluation at a time, stopping at `view()` calls to
//! show the labeled values they name.

use clap::Parser;
use commands::Commands;
use formulize::common::{config::Config, logging};
use formulize::{cli, commands};

#[derive(Parser)]
#[command(name = "formulize", about = "Step debugger for formula scripts")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // The interactive prompt logs to a file instead of the terminal
    if !matches!(cli.command, Commands::Debug { .. }) {
        logging::init_cli();
    }

    let result = match Config::load() {
        Ok(config) => {
            let local = tokio::task::LocalSet::new();
            local.run_until(cli::dispatch(cli.command, config)).await
        }
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
