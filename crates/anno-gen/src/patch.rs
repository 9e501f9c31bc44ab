//! The source patcher: splices call-site rewrites into file text and writes
//! results with a backup-rename-restore discipline, so a failed write never
//! destroys the original.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use anno::{Result, errorf};

/// One splice: replace the byte range with the replacement text.
#[derive(Debug, Clone)]
pub struct Rewrite {
    pub range: std::ops::Range<usize>,
    pub replacement: String,
}

/// Apply rewrites to a file's text. Splicing back-to-front keeps the
/// earlier ranges valid; ranges must not overlap.
pub fn apply_rewrites(text: &str, rewrites: &[Rewrite]) -> String {
    let mut sorted: Vec<&Rewrite> = rewrites.iter().collect();
    sorted.sort_by(|a, b| b.range.start.cmp(&a.range.start));

    let mut out = text.to_string();
    for rewrite in sorted {
        out.replace_range(rewrite.range.clone(), &rewrite.replacement);
    }
    out
}

fn backup_path(path: &Path) -> PathBuf {
    let mut backup = path.as_os_str().to_owned();
    backup.push(".bak");
    PathBuf::from(backup)
}

/// Overwrite `path` with `text`. The original is first renamed aside; if
/// the write fails it is renamed back, and on success the backup is removed.
pub fn backup_and_overwrite(path: &Path, text: &str) -> Result<()> {
    let backup = backup_path(path);
    fs::rename(path, &backup).map_err(|e| {
        errorf!("FailedToBackup: failed to move {} aside", path.display()).add_source(e)
    })?;

    if let Err(e) = fs::write(path, text) {
        let restored = restore_original(path, &backup);
        return Err(errorf!(
            "FailedToWrite: failed to write {} (original {})",
            path.display(),
            if restored { "restored" } else { "left at .bak" }
        )
        .add_source(e));
    }

    fs::remove_file(&backup).map_err(|e| {
        errorf!("FailedToWrite: failed to remove backup {}", backup.display()).add_source(e)
    })?;
    debug!(file = %path.display(), "patched");
    Ok(())
}

/// Move the backup over `path` again after a failed replacement write,
/// clobbering any partial output. A rename failure leaves the backup in
/// place for manual recovery.
fn restore_original(path: &Path, backup: &Path) -> bool {
    fs::rename(backup, path).is_ok()
}

/// Write declarations into the generated file at `path`: create it with the
/// header when absent, otherwise append the missing `use` lines and the new
/// declarations under the backup discipline.
pub fn append_or_create(
    path: &Path,
    header: &str,
    use_lines: &[String],
    decls: &str,
) -> Result<()> {
    if !path.exists() {
        let mut text = String::from(header);
        text.push('\n');
        for line in use_lines {
            text.push_str(line);
            text.push('\n');
        }
        text.push_str(decls);
        return fs::write(path, &text).map_err(|e| {
            errorf!("FailedToWrite: failed to create {}", path.display()).add_source(e)
        });
    }

    let existing = fs::read_to_string(path).map_err(|e| {
        errorf!("FailedToRead: failed to read {}", path.display()).add_source(e)
    })?;

    let mut text = existing.clone();
    // New imports go right after the last existing `use` line.
    let missing: Vec<&String> = use_lines
        .iter()
        .filter(|line| !existing.contains(line.as_str()))
        .collect();
    if !missing.is_empty() {
        let insert_at = last_use_line_end(&existing);
        let mut block = String::new();
        for line in missing {
            block.push_str(line);
            block.push('\n');
        }
        text.insert_str(insert_at, &block);
    }

    if !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(decls);
    backup_and_overwrite(path, &text)
}

/// Byte offset just past the final top-level `use` line, or past the
/// header when the file has none.
fn last_use_line_end(text: &str) -> usize {
    let mut end = 0usize;
    let mut offset = 0usize;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with("use ") || trimmed.starts_with("//") || trimmed.is_empty() {
            if trimmed.starts_with("use ") {
                end = offset + line.len();
            }
            offset += line.len();
            continue;
        }
        break;
    }
    if end == 0 { offset } else { end }
}
