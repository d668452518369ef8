//! DataLocator CLI - Command-line interface
//!
//! This binary resolves virtual resource paths through the DataLocator
//! library and manages the local cache.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use datalocator::logging::{default_log_dir, init_logging, DEFAULT_LOG_FILE};

use commands::cache::CacheAction;
use commands::common::GlobalOptions;
use commands::config::ConfigCommands;
use error::CliError;

#[derive(Parser)]
#[command(name = "datalocator")]
#[command(version)]
#[command(about = "Resolve application data files from a local bundle or a remote origin", long_about = None)]
struct Cli {
    #[command(flatten)]
    options: GlobalOptions,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve virtual paths and print the local files
    Locate {
        /// Virtual paths, e.g. /maps/geo_region_2880.jpg
        #[arg(required = true)]
        paths: Vec<String>,

        /// Issue all requests without blocking and wait for completions
        #[arg(long = "async")]
        background: bool,
    },

    /// Show classification and cache state without fetching
    Status {
        /// Virtual paths to inspect
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Manage the local cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    let _logging_guard = match init_logging(&default_log_dir(), DEFAULT_LOG_FILE, level) {
        Ok(guard) => guard,
        Err(e) => CliError::LoggingInit(e.to_string()).exit(),
    };

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Locate { paths, background } => {
            commands::locate::run(cli.options.resolve()?, &paths, background)
        }
        Commands::Status { paths } => commands::status::run(cli.options.resolve()?, &paths),
        Commands::Cache { action } => commands::cache::run(cli.options.resolve()?, action),
        Commands::Config { command } => commands::config::run(&cli.options, command),
    }
}
