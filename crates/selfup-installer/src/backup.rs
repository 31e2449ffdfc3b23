use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use selfup_core::{
    file_contains_marker, members_digest, BackupStamp, PreservedEntry, UpdateConfig, UpdateError,
    PRESERVED_ENTRIES,
};

use crate::{copy_path, InstallLayout};

const SNAPSHOT_FILE_NAME: &str = "snapshot.json";
const RETAIN_FILE_NAME: &str = "RETAINED";

/// A backup directory that has been allocated but not yet sealed.
#[derive(Debug)]
pub struct PendingBackup {
    root: PathBuf,
    stamp: BackupStamp,
}

impl PendingBackup {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// A completed snapshot of the preserved subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHandle {
    root: PathBuf,
    snapshot_id: String,
    captured: Vec<&'static str>,
    warnings: Vec<String>,
}

impl BackupHandle {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }

    pub fn captured(&self) -> &[&'static str] {
        &self.captured
    }

    /// Marker-check warnings raised while copying customization files.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleBackupFailure {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Serialize)]
struct SnapshotFile {
    version: u32,
    stamp: String,
    created_at: String,
    snapshot_id: String,
    members: Vec<String>,
}

/// Lists backup directories left by earlier runs. Backups marked as retained
/// hold the only good copy after a failed run and are left out.
pub fn collect_stale_backups(install_root: &Path) -> Result<Vec<PathBuf>> {
    let mut stale = Vec::new();
    for entry in fs::read_dir(install_root)
        .with_context(|| format!("failed reading directory {}", install_root.display()))?
    {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if BackupStamp::parse(name).is_none() {
            continue;
        }
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if is_retained(&entry.path()) {
            tracing::info!(path = %entry.path().display(), "keeping retained backup");
            continue;
        }
        stale.push(entry.path());
    }

    stale.sort();
    Ok(stale)
}

/// Removes stale backups. Failures are returned, never raised.
pub fn purge_stale_backups(paths: &[PathBuf]) -> Vec<StaleBackupFailure> {
    let mut failures = Vec::new();
    for path in paths {
        match fs::remove_dir_all(path) {
            Ok(()) => tracing::info!(path = %path.display(), "removed stale backup"),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed removing stale backup");
                failures.push(StaleBackupFailure {
                    path: path.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    failures
}

/// Allocates a fresh backup directory under the installation root.
pub fn begin_snapshot(layout: &InstallLayout) -> Result<PendingBackup> {
    let stamp = allocate_backup_stamp(layout, BackupStamp::now());
    let root = layout.backup_dir(&stamp);
    if root
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        anyhow::bail!("invalid backup path: {}", root.display());
    }

    fs::create_dir_all(&root)
        .with_context(|| format!("failed creating backup dir {}", root.display()))?;
    Ok(PendingBackup { root, stamp })
}

/// Copies the captured members into `pending` and seals it. On any error the
/// partially written directory stays where it is.
pub fn complete_snapshot(
    layout: &InstallLayout,
    config: &UpdateConfig,
    pending: PendingBackup,
) -> Result<BackupHandle> {
    let captured = copy_captured_members(layout, pending.root())?;
    seal_snapshot(layout, config, pending, captured)
}

pub(crate) fn copy_captured_members(
    layout: &InstallLayout,
    backup_root: &Path,
) -> Result<Vec<&'static str>> {
    let mut captured = Vec::new();
    for entry in captured_entries() {
        let source = entry.path_under(layout.root());
        if !source.exists() {
            tracing::debug!(member = entry.relative_path, "preserved member absent, skipping");
            continue;
        }

        copy_path(&source, &entry.path_under(backup_root))
            .with_context(|| format!("failed backing up {}", entry.relative_path))?;
        captured.push(entry.relative_path);
    }
    Ok(captured)
}

pub(crate) fn seal_snapshot(
    layout: &InstallLayout,
    config: &UpdateConfig,
    pending: PendingBackup,
    captured: Vec<&'static str>,
) -> Result<BackupHandle> {
    let missing = verify_snapshot(layout, pending.root());
    if !missing.is_empty() {
        tracing::error!(backup = %pending.root.display(), ?missing, "backup is incomplete");
        return Err(UpdateError::BackupIncomplete {
            backup: pending.root,
            missing,
        }
        .into());
    }

    let mut warnings = Vec::new();
    for entry in captured_entries() {
        let Some(marker) = config.marker_for(entry) else {
            continue;
        };
        let copy = entry.path_under(pending.root());
        if copy.exists() && !file_contains_marker(&copy, marker) {
            tracing::warn!(member = entry.relative_path, "backup copy lacks customization marker");
            warnings.push(format!(
                "{} in backup does not contain the marker '{}'; check that it is the customized version",
                entry.relative_path, marker
            ));
        }
    }

    let snapshot_id = members_digest(pending.root(), &captured)?;
    write_snapshot_file(&pending, &snapshot_id, &captured)?;
    tracing::info!(
        backup = %pending.root.display(),
        snapshot_id = %snapshot_id,
        members = captured.len(),
        "snapshot created"
    );

    Ok(BackupHandle {
        root: pending.root,
        snapshot_id,
        captured,
        warnings,
    })
}

/// Members that exist in the live tree but have no copy under `backup_root`.
pub fn verify_snapshot(layout: &InstallLayout, backup_root: &Path) -> Vec<String> {
    captured_entries()
        .filter(|entry| entry.path_under(layout.root()).exists())
        .filter(|entry| !entry.path_under(backup_root).exists())
        .map(|entry| entry.relative_path.to_string())
        .collect()
}

/// Copies every captured member present in the snapshot back into the live
/// tree. Files are overwritten, so repeating a restore is harmless. Nothing
/// is copied when the backup no longer matches its recorded snapshot id.
pub fn restore_snapshot(layout: &InstallLayout, handle: &BackupHandle) -> Result<Vec<&'static str>> {
    let current = members_digest(handle.root(), handle.captured())
        .with_context(|| format!("failed verifying backup {}", handle.root().display()))?;
    if current != handle.snapshot_id() {
        anyhow::bail!(
            "backup {} changed since it was taken (expected {}, found {current})",
            handle.root().display(),
            handle.snapshot_id()
        );
    }

    let mut restored = Vec::new();
    for entry in captured_entries() {
        let source = entry.path_under(handle.root());
        if !source.exists() {
            continue;
        }

        let destination = entry.path_under(layout.root());
        copy_path(&source, &destination).with_context(|| {
            format!(
                "failed restoring {} from {}",
                entry.relative_path,
                handle.root().display()
            )
        })?;
        tracing::debug!(member = entry.relative_path, "restored preserved member");
        restored.push(entry.relative_path);
    }

    Ok(restored)
}

/// Marks a backup as the operator's recovery copy so later runs do not
/// collect it as stale.
pub fn retain_backup(handle: &BackupHandle, reason: &str) -> Result<()> {
    let path = handle.root().join(RETAIN_FILE_NAME);
    fs::write(&path, format!("{reason}\n"))
        .with_context(|| format!("failed writing {}", path.display()))
}

pub fn is_retained(backup_root: &Path) -> bool {
    backup_root.join(RETAIN_FILE_NAME).is_file()
}

pub fn remove_backup(handle: &BackupHandle) -> Result<()> {
    fs::remove_dir_all(handle.root())
        .with_context(|| format!("failed removing backup {}", handle.root().display()))
}

fn captured_entries() -> impl Iterator<Item = &'static PreservedEntry> {
    PRESERVED_ENTRIES.iter().filter(|entry| entry.captured)
}

pub(crate) fn allocate_backup_stamp(layout: &InstallLayout, start: BackupStamp) -> BackupStamp {
    let mut stamp = start;
    while layout.backup_dir(&stamp).exists() {
        stamp = stamp.successor();
    }
    stamp
}

fn write_snapshot_file(
    pending: &PendingBackup,
    snapshot_id: &str,
    captured: &[&'static str],
) -> Result<()> {
    let path = pending.root.join(SNAPSHOT_FILE_NAME);
    let snapshot = SnapshotFile {
        version: 1,
        stamp: pending.stamp.dir_name(),
        created_at: pending.stamp.at().to_rfc3339(),
        snapshot_id: snapshot_id.to_string(),
        members: captured.iter().map(|member| member.to_string()).collect(),
    };
    let content = serde_json::to_string_pretty(&snapshot)
        .with_context(|| format!("failed serializing snapshot {}", path.display()))?;
    fs::write(&path, content).with_context(|| format!("failed writing snapshot {}", path.display()))
}
