//! Removal of editor and converter litter left next to the output files.

use crate::util::remove_with_backoff;
use anyhow::Result;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

fn is_temp_litter(name: &str) -> bool {
    name.starts_with("~$") || name.ends_with(".tmp")
}

/// Delete lock files (`~$...`) and `.tmp` leftovers anywhere under `root`.
/// Returns the number of files removed; individual failures are logged and
/// skipped so one locked file does not stop the sweep.
pub fn scrub_temp_files(root: &Path) -> Result<usize> {
    if !root.is_dir() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !is_temp_litter(&name) {
            continue;
        }
        match remove_with_backoff(entry.path(), 4, 50) {
            Ok(()) => {
                debug!(path = %entry.path().display(), "removed temp file");
                removed += 1;
            }
            Err(e) => {
                warn!(path = %entry.path().display(), error = %format!("{e:#}"), "could not remove temp file")
            }
        }
    }
    Ok(removed)
}
