use std::path::Path;

use anyhow::{Context, Result};
use selfup_core::PRESERVED_ENTRIES;

use crate::{remove_path_if_exists, BackupHandle, InstallLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanOptions {
    pub remove_dependency_cache: bool,
    pub remove_lockfile: bool,
}

impl CleanOptions {
    pub fn from_reinstall(reinstall: bool) -> Self {
        Self {
            remove_dependency_cache: reinstall,
            remove_lockfile: reinstall,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub removed: Vec<String>,
    pub kept: Vec<String>,
}

/// Prepares the live tree for overlay.
///
/// Takes the snapshot handle so the purge of preserved members can only
/// happen after a backup exists.
pub fn clean_installation(
    layout: &InstallLayout,
    _snapshot: &BackupHandle,
    options: CleanOptions,
) -> Result<CleanReport> {
    let mut report = CleanReport::default();

    for path in layout.metadata_paths() {
        remove_tracked(layout.root(), &path, &mut report)?;
    }

    let conditional = [
        (layout.dependency_cache_dir(), options.remove_dependency_cache),
        (layout.lockfile_path(), options.remove_lockfile),
    ];
    for (path, remove) in conditional {
        if remove {
            remove_tracked(layout.root(), &path, &mut report)?;
        } else if path.exists() {
            report.kept.push(display_relative(layout.root(), &path));
        }
    }

    for entry in PRESERVED_ENTRIES.iter().filter(|entry| entry.purged) {
        remove_tracked(layout.root(), &entry.path_under(layout.root()), &mut report)?;
    }

    Ok(report)
}

fn remove_tracked(root: &Path, path: &Path, report: &mut CleanReport) -> Result<()> {
    let removed = remove_path_if_exists(path)
        .with_context(|| format!("failed removing {}", path.display()))?;
    if removed {
        let relative = display_relative(root, path);
        tracing::debug!(path = %relative, "removed");
        report.removed.push(relative);
    }
    Ok(())
}

fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
