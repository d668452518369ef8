//! `status` command: show how each path would be resolved, without fetching.

use datalocator::classify::ResourceSource;
use datalocator::{LocatorConfig, Packaging, ResourceLocator, VirtualPath};

use super::common::{create_locator, parse_paths};
use crate::error::CliError;

/// Run the status command.
pub fn run(config: LocatorConfig, raw_paths: &[String]) -> Result<(), CliError> {
    let paths = parse_paths(raw_paths)?;
    let locator = create_locator(config)?;

    for (i, path) in paths.iter().enumerate() {
        if i > 0 {
            println!();
        }
        print_status(&locator, path);
    }

    Ok(())
}

fn print_status(locator: &ResourceLocator, path: &VirtualPath) {
    println!("{}", path);

    match locator.classify(path) {
        Ok(classification) => {
            let source = match &classification.source {
                ResourceSource::Bundled(file) => file.display().to_string(),
                ResourceSource::Remote(url) => url.clone(),
            };
            println!("  Kind:      {}", classification.kind());
            println!("  Packaging: {}", classification.packaging);
            println!("  Source:    {}", source);
            if classification.packaging == Packaging::ZipEntry {
                println!("  Entry:     {}", classification.entry_name);
            }
        }
        Err(e) => println!("  Kind:      unresolvable ({})", e),
    }

    let location = locator.location(path);
    if locator.is_available(path) {
        println!("  Cached:    yes ({})", location.display());
    } else {
        println!("  Cached:    no (would be stored at {})", location.display());
    }
}
