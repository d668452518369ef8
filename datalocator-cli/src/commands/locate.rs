//! `locate` command: resolve virtual paths to local files.
//!
//! Resolved files are printed to stdout, one per line, in argument order.
//! Failures are reported on stderr.

use std::sync::mpsc;

use datalocator::{FetchResult, LocateError, LocatorConfig, ResourceLocator, VirtualPath};

use super::common::{create_locator, parse_paths};
use crate::error::CliError;

/// Run the locate command.
pub fn run(config: LocatorConfig, raw_paths: &[String], background: bool) -> Result<(), CliError> {
    let paths = parse_paths(raw_paths)?;
    let locator = create_locator(config)?;
    tracing::debug!(count = paths.len(), background, "Resolving paths");

    let results = if background {
        locate_in_background(&locator, &paths)
    } else {
        paths.iter().map(|path| locator.locate(path)).collect()
    };

    let mut failed = 0;
    for (path, result) in paths.iter().zip(results) {
        match result {
            Ok(file) => println!("{}", file.display()),
            Err(e) => {
                failed += 1;
                eprintln!("{}: {}", path, e);
            }
        }
    }

    locator.log_stats();

    if failed > 0 {
        return Err(CliError::Unresolved {
            failed,
            total: paths.len(),
        });
    }
    Ok(())
}

/// Issue every request without blocking, then collect the callbacks.
fn locate_in_background(locator: &ResourceLocator, paths: &[VirtualPath]) -> Vec<FetchResult> {
    let (tx, rx) = mpsc::channel::<(usize, FetchResult)>();
    let mut results: Vec<Option<FetchResult>> = vec![None; paths.len()];

    for (idx, path) in paths.iter().enumerate() {
        let tx = tx.clone();
        let immediate = locator.locate_async_with_result(path, move |result| {
            let _ = tx.send((idx, result));
        });
        if let Some(file) = immediate {
            results[idx] = Some(Ok(file));
        }
    }
    drop(tx);

    // Ends once every pending callback has run and dropped its sender.
    for (idx, result) in rx {
        results[idx] = Some(result);
    }

    results
        .into_iter()
        .zip(paths)
        .map(|(result, path)| {
            result.unwrap_or_else(|| {
                Err(LocateError::Aborted {
                    path: path.to_string(),
                })
            })
        })
        .collect()
}
