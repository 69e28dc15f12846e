//! Generated-file writing.
//!
//! Emitted Makefiles and project files are written whole-buffer through
//! a capability-scoped directory handle. A write is skipped when the
//! existing file is byte-identical, so re-generation never invalidates
//! the external tool's own incremental state.

use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs as cap_fs};
use std::io::Write;
use tracing::{debug, info};

/// Write `content` to `path`, creating parent directories, unless the
/// file already holds exactly these bytes. Returns whether a write
/// happened.
///
/// # Errors
///
/// Returns an error when no ancestor of an absolute path can be opened
/// or the write itself fails.
pub fn write_if_changed(path: &Utf8Path, content: &str) -> Result<bool> {
    let (dir, relative) = derive_dir_and_relative(path)?;

    match dir.read(relative.as_str()) {
        Ok(existing) if existing == content.as_bytes() => {
            debug!("skipping {path}: contents unchanged");
            return Ok(false);
        }
        _ => {}
    }

    if let Some(parent) = relative.parent().filter(|p| !p.as_str().is_empty()) {
        dir.create_dir_all(parent.as_str())
            .with_context(|| format!("creating parent directory for {path}"))?;
    }
    let mut file = dir
        .create(relative.as_str())
        .with_context(|| format!("creating {path}"))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("writing {path}"))?;
    file.flush().with_context(|| format!("flushing {path}"))?;
    info!("Wrote {path}");
    Ok(true)
}

fn derive_dir_and_relative(path: &Utf8Path) -> Result<(cap_fs::Dir, Utf8PathBuf)> {
    if path.is_relative() {
        let dir = cap_fs::Dir::open_ambient_dir(".", ambient_authority())
            .context("opening the working directory")?;
        return Ok((dir, path.to_owned()));
    }

    let mut ancestors = path.ancestors();
    ancestors.next();
    let (base, dir) = ancestors
        .find_map(|candidate| {
            cap_fs::Dir::open_ambient_dir(candidate.as_str(), ambient_authority())
                .ok()
                .map(|handle| (candidate.to_owned(), handle))
        })
        .ok_or_else(|| anyhow!("no existing ancestor directory for {path}"))?;
    let relative = path
        .strip_prefix(&base)
        .with_context(|| format!("deriving the path of {path} relative to {base}"))?
        .to_owned();
    Ok((dir, relative))
}
