//! Removal of generated output from a source tree.

use std::fs;
use std::path::Path;

use ignore::WalkBuilder;
use tracing::{debug, info};

use anno::{Result, errorf};

use crate::synth::{FAILED_FILE, GENERATED_FILE};

/// Delete every generated declarations file under `dir`, including any
/// failed-output side files. Returns the number of files removed.
pub fn clean_dir(dir: &Path) -> Result<usize> {
    if !dir.is_dir() {
        return Err(errorf!("PathNotFound: {} is not a directory", dir.display()));
    }

    let mut removed = 0usize;
    for entry in WalkBuilder::new(dir).build() {
        let entry = entry
            .map_err(|e| errorf!("FailedToRead: walk of {} failed", dir.display()).add_source(e))?;
        let path = entry.path();
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if name != GENERATED_FILE && name != FAILED_FILE {
            continue;
        }
        fs::remove_file(path).map_err(|e| {
            errorf!("FailedToDelete: failed to remove {}", path.display()).add_source(e)
        })?;
        debug!(file = %path.display(), "removed");
        removed += 1;
    }

    info!(dir = %dir.display(), removed, "cleaned");
    Ok(removed)
}
