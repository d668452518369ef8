//! Configuration management CLI commands.
//!
//! Provides `config path`, `config show` and `config init` for inspecting
//! and creating the configuration file.

use clap::Subcommand;
use datalocator::config::{config_file_path, ConfigFile};

use super::common::GlobalOptions;
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective configuration, after command-line overrides
    Show,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(options: &GlobalOptions, command: ConfigCommands) -> Result<(), CliError> {
    let path = options.config.clone().unwrap_or_else(config_file_path);

    match command {
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => run_show(options),
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::Config(format!(
                    "{} already exists. Use --force to overwrite.",
                    path.display()
                )));
            }
            ConfigFile::default().save_to(&path)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}

/// Print the effective configuration.
fn run_show(options: &GlobalOptions) -> Result<(), CliError> {
    let config = options.resolve()?;
    let not_set = || "(not set)".to_string();

    println!("[cache]");
    println!("  directory = {}", config.base_dir.display());
    println!();
    println!("[bundle]");
    println!(
        "  directory = {}",
        config
            .bundle_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(not_set)
    );
    println!();
    println!("[remote]");
    println!(
        "  origin = {}",
        config.remote_origin.clone().unwrap_or_else(not_set)
    );
    println!("  timeout = {}", config.timeout.as_secs());
    println!("  connect_timeout = {}", config.connect_timeout.as_secs());
    println!();
    println!("[workers]");
    println!("  threads = {}", config.worker_threads);

    Ok(())
}
