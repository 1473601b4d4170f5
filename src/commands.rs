//! CLI command definitions
//!
//! Defines the clap commands for the formula debugger CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a script to completion, reporting every view() breakpoint
    Run {
        /// Path to the script
        file: PathBuf,

        /// JSON file with the environment (an object of named values)
        #[arg(long, short)]
        env: Option<PathBuf>,

        /// Print breakpoints and final variables as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the view() declarations in a script without running it
    Views {
        /// Path to the script
        file: PathBuf,
    },

    /// Debug a script interactively
    #[command(alias = "d")]
    Debug {
        /// Path to the script
        file: PathBuf,

        /// JSON file with the environment (an object of named values)
        #[arg(long, short)]
        env: Option<PathBuf>,
    },

    /// Execute test scenarios defined in YAML files
    Test {
        /// Paths to the YAML scenario files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Verbose output
        #[arg(long, short)]
        verbose: bool,
    },
}
