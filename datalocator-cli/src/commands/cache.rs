//! Cache management CLI commands.

use clap::Subcommand;
use datalocator::{CacheStore, LocatorConfig};

use super::common::format_size;
use crate::error::CliError;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Clear the cache, removing all materialized resources
    Clear,
    /// Show cache statistics
    Stats,
}

/// Run a cache subcommand.
pub fn run(config: LocatorConfig, action: CacheAction) -> Result<(), CliError> {
    let store = CacheStore::new(config.base_dir);
    let cache_dir = store.base_dir();

    match action {
        CacheAction::Clear => {
            println!("Clearing cache at: {}", cache_dir.display());

            let result = store.clear().map_err(CliError::CacheClear)?;
            println!(
                "Deleted {} files, freed {}",
                result.files_deleted,
                format_size(result.bytes_freed)
            );
            Ok(())
        }
        CacheAction::Stats => {
            println!("Cache: {}", cache_dir.display());

            let (files, bytes) = store.stats().map_err(CliError::CacheStats)?;
            println!("  Files: {}", files);
            println!("  Size:  {}", format_size(bytes));
            Ok(())
        }
    }
}
