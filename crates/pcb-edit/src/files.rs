use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use atomicwrites::{AtomicFile, OverwriteBehavior};

/// Absolute form of a user-supplied path, with a leading `~` expanded.
pub fn expand_path(raw: &str) -> PathBuf {
    let expanded = match raw.strip_prefix("~") {
        Some(rest) if rest.is_empty() || rest.starts_with(['/', '\\']) => dirs::home_dir()
            .map(|home| home.join(rest.trim_start_matches(['/', '\\'])))
            .unwrap_or_else(|| PathBuf::from(raw)),
        _ => PathBuf::from(raw),
    };
    std::path::absolute(&expanded).unwrap_or(expanded)
}

/// Replace `path` in one step, creating missing parent directories.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| {
            f.write_all(contents)?;
            f.flush()
        })
        .map_err(|err| anyhow::anyhow!("Failed to write {}: {err}", path.display()))
}
