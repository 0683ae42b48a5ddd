//! Temporarily move toolchain binaries out of the way.
//!
//! Some builds pick up `as`/`ld` from the SDK bin directory even though they
//! must use the host tools. [`with_stashed`] renames the listed files to
//! `<name>.backup` for the duration of a closure and restores them on every
//! exit path.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

pub const BACKUP_SUFFIX: &str = ".backup";

pub fn backup_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}{BACKUP_SUFFIX}"))
}

/// Presence check that also sees dangling symlinks.
fn is_present(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Guard for binaries renamed to `<name>.backup`.
///
/// Call [`StashedBinaries::restore`] to observe restore errors. If the guard is
/// dropped without it (e.g. on panic), restoration still happens and failures
/// are logged.
#[derive(Debug)]
pub struct StashedBinaries {
    dir: PathBuf,
    names: Vec<String>,
    moved: Vec<String>,
    restored: bool,
}

impl StashedBinaries {
    /// Rename each present `name` in `dir` to `<name>.backup`.
    ///
    /// A stale backup is overwritten. If a rename fails, files already moved
    /// are put back before the error is returned.
    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub fn stash(dir: &Path, names: &[&str]) -> Result<Self> {
        let mut guard = Self {
            dir: dir.to_path_buf(),
            names: names.iter().map(|n| n.to_string()).collect(),
            moved: Vec::new(),
            restored: false,
        };
        for name in names {
            let original = dir.join(name);
            if !is_present(&original) {
                debug!(name, "not present, nothing to stash");
                continue;
            }
            let backup = backup_path(dir, name);
            fs::rename(&original, &backup).with_context(|| {
                format!("rename {} to {}", original.display(), backup.display())
            })?;
            debug!(name, "stashed");
            guard.moved.push(name.to_string());
        }
        Ok(guard)
    }

    /// Names renamed by [`StashedBinaries::stash`], in order.
    pub fn moved(&self) -> &[String] {
        &self.moved
    }

    /// Restore every `<name>.backup` that exists, including leftovers from an
    /// interrupted earlier run. All names are attempted; the first error is returned.
    pub fn restore(mut self) -> Result<()> {
        self.restored = true;
        restore_all(&self.dir, &self.names)
    }
}

impl Drop for StashedBinaries {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(e) = restore_all(&self.dir, &self.names) {
            warn!(err = %format!("{e:#}"), "failed to restore stashed binaries");
        }
    }
}

fn restore_all(dir: &Path, names: &[String]) -> Result<()> {
    let mut first_error = None;
    for name in names {
        let backup = backup_path(dir, name);
        if !is_present(&backup) {
            continue;
        }
        let original = dir.join(name);
        match fs::rename(&backup, &original) {
            Ok(()) => debug!(name = %name, "restored"),
            Err(e) => {
                warn!(name = %name, err = %e, "restore failed");
                if first_error.is_none() {
                    first_error = Some(anyhow::Error::new(e).context(format!(
                        "restore {} to {}",
                        backup.display(),
                        original.display()
                    )));
                }
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// The subset of `names` currently present in `dir`.
fn present_names<'a>(dir: &Path, names: &[&'a str]) -> Vec<&'a str> {
    names
        .iter()
        .copied()
        .filter(|name| is_present(&dir.join(name)))
        .collect()
}

/// Run `f` with `names` in `dir` stashed, restoring them afterwards.
///
/// If `f` fails, its error is returned even when restoration also fails (the
/// restore error is logged). In pretend mode nothing is renamed.
pub fn with_stashed<T>(
    dir: &Path,
    names: &[&str],
    pretend: bool,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    if pretend {
        let present = present_names(dir, names);
        for name in &present {
            info!(
                "would move {} to {}",
                dir.join(name).display(),
                backup_path(dir, name).display()
            );
        }
        let result = f();
        for name in &present {
            info!(
                "would restore {} to {}",
                backup_path(dir, name).display(),
                dir.join(name).display()
            );
        }
        return result;
    }

    let guard = StashedBinaries::stash(dir, names)?;
    let result = f();
    let restored = guard.restore();
    match (result, restored) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(restore_err)) => {
            warn!(err = %format!("{restore_err:#}"), "restore failed after build error");
            Err(e)
        }
    }
}
