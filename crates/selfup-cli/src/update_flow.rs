use std::fmt;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use selfup_core::{classify_dependencies, DependencyClassification, UpdateConfig, UpdateError};
use selfup_installer::{
    apply_staged_tree, begin_snapshot, clean_installation, collect_stale_backups,
    complete_snapshot, install_dependencies, purge_stale_backups, remove_backup,
    remove_path_if_exists, restore_snapshot, retain_backup, BackupHandle, CleanOptions,
    DependencyInstaller, InstallLayout,
};
use selfup_source::{stage_source, RevisionCounter, SourceFetcher};

use crate::confirm::Confirmation;
use crate::interrupt::InterruptGate;
use crate::preflight::Preflight;
use crate::render::TerminalRenderer;

/// Progress of one update run. Variants are declared in the order the run
/// reaches them; `Failed` is terminal.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub(crate) enum UpdateState {
    Idle,
    RequirementsChecked,
    Confirmed,
    BackedUp,
    Downloaded,
    Classified,
    Cleaned,
    Applied,
    Restored,
    DependenciesInstalled,
    Finalized,
    Failed,
}

impl UpdateState {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::RequirementsChecked => "requirements-checked",
            Self::Confirmed => "confirmed",
            Self::BackedUp => "backed-up",
            Self::Downloaded => "downloaded",
            Self::Classified => "classified",
            Self::Cleaned => "cleaned",
            Self::Applied => "applied",
            Self::Restored => "restored",
            Self::DependenciesInstalled => "dependencies-installed",
            Self::Finalized => "finalized",
            Self::Failed => "failed",
        }
    }

    /// The step that moves the run into this state.
    pub(crate) fn step_label(self) -> &'static str {
        match self {
            Self::Idle | Self::Failed => "starting",
            Self::RequirementsChecked => "checking requirements",
            Self::Confirmed => "confirming",
            Self::BackedUp => "backing up",
            Self::Downloaded => "fetching the release",
            Self::Classified => "classifying dependencies",
            Self::Cleaned => "cleaning the installation",
            Self::Applied => "applying the release",
            Self::Restored => "restoring preserved data",
            Self::DependenciesInstalled => "installing dependencies",
            Self::Finalized => "finalizing",
        }
    }
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the failure path did about the live tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Compensation {
    /// Failed before a snapshot existed; nothing had been modified.
    NotNeeded,
    /// Preserved data was copied back from the snapshot. When the release had
    /// already been fetched it was discarded together with the staging tree.
    Restored { release_discarded: bool },
    /// The automatic restore itself failed.
    RestoreFailed,
    /// The release was already applied; the snapshot is kept for manual
    /// recovery.
    SnapshotPreserved,
}

#[derive(Debug, thiserror::Error)]
#[error("update failed while {}: {error}", .phase.step_label())]
pub(crate) struct UpdateFailure {
    pub(crate) phase: UpdateState,
    pub(crate) furthest: UpdateState,
    #[source]
    pub(crate) error: UpdateError,
    /// The snapshot, or the partial backup directory when the snapshot
    /// itself failed.
    pub(crate) backup: Option<PathBuf>,
    pub(crate) snapshot_id: Option<String>,
    /// Later runs keep this backup instead of purging it as stale.
    pub(crate) backup_retained: bool,
    pub(crate) compensation: Compensation,
    pub(crate) compensation_error: Option<UpdateError>,
    pub(crate) manual_hint: Option<String>,
}

impl UpdateFailure {
    /// Operator-facing report as `(status, message)` pairs.
    pub(crate) fn report_lines(&self) -> Vec<(&'static str, String)> {
        let mut lines = vec![
            ("error", self.to_string()),
            ("info", format!("last completed state: {}", self.furthest)),
        ];

        match &self.compensation {
            Compensation::NotNeeded if self.backup.is_some() => lines.push((
                "info",
                "the backup did not complete; the installation was not modified".to_string(),
            )),
            Compensation::NotNeeded => lines.push((
                "info",
                "no backup had been taken yet; the installation was not modified".to_string(),
            )),
            Compensation::Restored { release_discarded } => {
                lines.push(("info", "preserved data restored from the backup".to_string()));
                if *release_discarded {
                    lines.push((
                        "warn",
                        "the fetched release was not applied and has been discarded; run the updater again to retry"
                            .to_string(),
                    ));
                }
            }
            Compensation::RestoreFailed => {
                if let Some(err) = &self.compensation_error {
                    lines.push(("error", format!("automatic restore failed: {err}")));
                }
            }
            Compensation::SnapshotPreserved => lines.push((
                "warn",
                "the new release was already applied; preserved data was not rolled back automatically"
                    .to_string(),
            )),
        }

        if let Some(backup) = &self.backup {
            let snapshot = self
                .snapshot_id
                .as_deref()
                .map(|id| format!(" (snapshot {id})"))
                .unwrap_or_default();
            if self.compensation == Compensation::NotNeeded {
                lines.push((
                    "warn",
                    format!("partial backup left at {} for inspection", backup.display()),
                ));
            } else {
                lines.push((
                    "warn",
                    format!("backup available at {}{snapshot}", backup.display()),
                ));
            }
            if self.backup_retained {
                lines.push((
                    "info",
                    "later runs keep this backup; delete it once the installation is recovered"
                        .to_string(),
                ));
            }
            if matches!(
                self.compensation,
                Compensation::RestoreFailed | Compensation::SnapshotPreserved
            ) {
                lines.push((
                    "info",
                    "to restore manually, copy the contents of the backup's dados/ directory over the installation's dados/"
                        .to_string(),
                ));
            }
        }

        if let Some(hint) = &self.manual_hint {
            lines.push(("info", hint.clone()));
        }
        lines
    }
}

#[derive(Debug)]
pub(crate) struct UpdateOutcome {
    pub(crate) classification: DependencyClassification,
    pub(crate) installer_ran: bool,
    pub(crate) total_revisions: Option<u64>,
    pub(crate) snapshot_id: String,
    pub(crate) backup_removed: bool,
    pub(crate) warnings: Vec<String>,
}

pub(crate) struct Collaborators<'a> {
    pub(crate) preflight: &'a dyn Preflight,
    pub(crate) confirmation: &'a dyn Confirmation,
    pub(crate) fetcher: &'a dyn SourceFetcher,
    pub(crate) installer: &'a dyn DependencyInstaller,
    pub(crate) revisions: &'a dyn RevisionCounter,
    pub(crate) interrupts: &'a InterruptGate,
}

pub(crate) struct Updater<'a> {
    layout: &'a InstallLayout,
    config: &'a UpdateConfig,
    collaborators: Collaborators<'a>,
    renderer: TerminalRenderer,
}

struct RunProgress {
    furthest: UpdateState,
    partial_backup: Option<PathBuf>,
    backup: Option<BackupHandle>,
}

impl RunProgress {
    fn reach(&mut self, state: UpdateState) {
        tracing::debug!(from = %self.furthest, to = %state, "update state advanced");
        self.furthest = state;
    }
}

struct PhaseError {
    phase: UpdateState,
    error: UpdateError,
}

impl PhaseError {
    fn new(phase: UpdateState, error: UpdateError) -> Self {
        Self { phase, error }
    }
}

impl<'a> Updater<'a> {
    pub(crate) fn new(
        layout: &'a InstallLayout,
        config: &'a UpdateConfig,
        collaborators: Collaborators<'a>,
        renderer: TerminalRenderer,
    ) -> Self {
        Self {
            layout,
            config,
            collaborators,
            renderer,
        }
    }

    pub(crate) fn run(&self) -> Result<UpdateOutcome, UpdateFailure> {
        let mut progress = RunProgress {
            furthest: UpdateState::Idle,
            partial_backup: None,
            backup: None,
        };

        let result = match self.run_phases(&mut progress) {
            Ok(outcome) => Ok(outcome),
            Err(failure) => Err(self.compensate(progress, failure)),
        };
        self.collaborators.interrupts.release();
        result
    }

    fn run_phases(&self, progress: &mut RunProgress) -> Result<UpdateOutcome, PhaseError> {
        let mut warnings = Vec::new();

        self.renderer.print_status("step", "checking requirements");
        let preflight_warnings = self
            .collaborators
            .preflight
            .check(self.layout)
            .map_err(|err| {
                PhaseError::new(
                    UpdateState::RequirementsChecked,
                    typed_or(err, |err| UpdateError::PreconditionMissing {
                        tool: "preflight".to_string(),
                        hint: format!("{err:#}"),
                    }),
                )
            })?;
        self.warn_all(&preflight_warnings, &mut warnings);
        progress.reach(UpdateState::RequirementsChecked);

        self.collaborators.confirmation.confirm().map_err(|err| {
            PhaseError::new(
                UpdateState::Confirmed,
                UpdateError::Aborted(format!("{err:#}")),
            )
        })?;
        self.collaborators
            .interrupts
            .hold()
            .map_err(|err| PhaseError::new(UpdateState::Confirmed, err))?;
        progress.reach(UpdateState::Confirmed);

        self.purge_previous_backups();
        self.renderer.print_status("step", "backing up preserved data");
        let backup_failed = |err: anyhow::Error| {
            PhaseError::new(UpdateState::BackedUp, typed_or(err, UpdateError::BackupFailed))
        };
        let pending = begin_snapshot(self.layout).map_err(backup_failed)?;
        progress.partial_backup = Some(pending.root().to_path_buf());
        let handle = complete_snapshot(self.layout, self.config, pending).map_err(backup_failed)?;
        let handle_warnings = handle.warnings().to_vec();
        self.warn_all(&handle_warnings, &mut warnings);
        self.renderer.print_status(
            "ok",
            &format!(
                "backup created at {} ({})",
                handle.root().display(),
                handle.snapshot_id()
            ),
        );
        progress.backup = Some(handle.clone());
        progress.reach(UpdateState::BackedUp);

        let spinner = self.renderer.start_spinner("fetching release");
        let staging = match stage_source(self.collaborators.fetcher, self.layout) {
            Ok(staging) => {
                spinner.finish_success();
                staging
            }
            Err(err) => {
                spinner.finish_abandon();
                return Err(PhaseError::new(
                    UpdateState::Downloaded,
                    UpdateError::FetchFailed(err),
                ));
            }
        };
        progress.reach(UpdateState::Downloaded);

        let classification = classify_dependencies(
            &self.layout.manifest_path(),
            &staging.manifest_path(),
            &self.layout.dependency_cache_dir(),
        );
        if let DependencyClassification::ComparisonError { reason } = &classification {
            let err = UpdateError::ClassificationError(reason.clone());
            tracing::warn!(error = %err, "dependency comparison failed, reinstalling");
        }
        tracing::info!(classification = classification.as_str(), "dependencies classified");
        self.renderer.print_status("info", &classification.describe());
        progress.reach(UpdateState::Classified);

        let reinstall = classification.requires_install();
        let report = clean_installation(
            self.layout,
            &handle,
            CleanOptions::from_reinstall(reinstall),
        )
        .map_err(|err| PhaseError::new(UpdateState::Cleaned, UpdateError::CleanFailed(err)))?;
        self.renderer.print_status(
            "ok",
            &format!("removed {} outdated entries", report.removed.len()),
        );
        if !report.kept.is_empty() {
            self.renderer
                .print_status("info", &format!("kept {}", report.kept.join(", ")));
        }
        progress.reach(UpdateState::Cleaned);

        apply_staged_tree(self.layout, staging)
            .map_err(|err| PhaseError::new(UpdateState::Applied, UpdateError::ApplyFailed(err)))?;
        self.renderer.print_status("ok", "new release applied");
        progress.reach(UpdateState::Applied);

        let restored = restore_snapshot(self.layout, &handle).map_err(|err| {
            PhaseError::new(UpdateState::Restored, UpdateError::RestoreFailed(err))
        })?;
        self.renderer.print_status(
            "ok",
            &format!("restored {}", restored.join(", ")),
        );
        progress.reach(UpdateState::Restored);

        let installer_ran = if reinstall {
            let installer = self.collaborators.installer;
            let spinner = self.renderer.start_spinner("installing dependencies");
            match install_dependencies(installer, self.layout) {
                Ok(()) => spinner.finish_success(),
                Err(err) => {
                    spinner.finish_abandon();
                    return Err(PhaseError::new(
                        UpdateState::DependenciesInstalled,
                        UpdateError::DependencyInstallFailed(err),
                    ));
                }
            }
            true
        } else {
            self.renderer
                .print_status("ok", "dependencies already up to date, skipping install");
            false
        };
        progress.reach(UpdateState::DependenciesInstalled);

        self.discard_staging();
        let total_revisions = match self.record_revision_count() {
            Ok(total) => Some(total),
            Err(err) => {
                let warning = format!("could not record the upstream revision count: {err:#}");
                tracing::warn!("{warning}");
                self.renderer.print_status("warn", &warning);
                warnings.push(warning);
                None
            }
        };
        progress.reach(UpdateState::Finalized);

        let backup_removed = match remove_backup(&handle) {
            Ok(()) => true,
            Err(err) => {
                let warning = format!(
                    "backup could not be removed, delete it manually: {} ({err:#})",
                    handle.root().display()
                );
                self.renderer.print_status("warn", &warning);
                warnings.push(warning);
                false
            }
        };

        Ok(UpdateOutcome {
            classification,
            installer_ran,
            total_revisions,
            snapshot_id: handle.snapshot_id().to_string(),
            backup_removed,
            warnings,
        })
    }

    fn compensate(&self, progress: RunProgress, failure: PhaseError) -> UpdateFailure {
        let RunProgress {
            furthest,
            partial_backup,
            backup,
        } = progress;
        tracing::error!(
            phase = %failure.phase,
            furthest = %furthest,
            error = %failure.error,
            "update failed"
        );
        tracing::debug!(state = %UpdateState::Failed, "update state advanced");

        let (compensation, compensation_error) = match &backup {
            None => (Compensation::NotNeeded, None),
            Some(handle) if furthest < UpdateState::Applied => {
                match restore_snapshot(self.layout, handle) {
                    Ok(_) => (
                        Compensation::Restored {
                            release_discarded: furthest >= UpdateState::Downloaded,
                        },
                        None,
                    ),
                    Err(err) => {
                        tracing::error!(error = %format!("{err:#}"), "automatic restore failed");
                        (
                            Compensation::RestoreFailed,
                            Some(UpdateError::RestoreFailed(err)),
                        )
                    }
                }
            }
            Some(_) => (Compensation::SnapshotPreserved, None),
        };

        let backup_retained = match &backup {
            Some(handle)
                if matches!(
                    compensation,
                    Compensation::RestoreFailed | Compensation::SnapshotPreserved
                ) =>
            {
                match retain_backup(handle, failure.phase.as_str()) {
                    Ok(()) => true,
                    Err(err) => {
                        tracing::warn!(error = %format!("{err:#}"), "failed marking backup as retained");
                        false
                    }
                }
            }
            _ => false,
        };

        self.discard_staging();

        let manual_hint = (failure.phase == UpdateState::DependenciesInstalled).then(|| {
            format!(
                "try installing manually: {}",
                self.collaborators.installer.describe()
            )
        });

        UpdateFailure {
            phase: failure.phase,
            furthest,
            error: failure.error,
            backup: backup
                .as_ref()
                .map(|handle| handle.root().to_path_buf())
                .or(partial_backup),
            snapshot_id: backup
                .as_ref()
                .map(|handle| handle.snapshot_id().to_string()),
            backup_retained,
            compensation,
            compensation_error,
            manual_hint,
        }
    }

    fn purge_previous_backups(&self) {
        let stale = match collect_stale_backups(self.layout.root()) {
            Ok(stale) => stale,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "failed listing stale backups");
                return;
            }
        };
        for failure in purge_stale_backups(&stale) {
            self.renderer.print_status(
                "warn",
                &format!(
                    "could not remove old backup {}: {}",
                    failure.path.display(),
                    failure.reason
                ),
            );
        }
    }

    fn discard_staging(&self) {
        let staging = self.layout.staging_dir();
        if let Err(err) = remove_path_if_exists(&staging) {
            tracing::warn!(path = %staging.display(), error = %err, "failed removing staging tree");
            self.renderer.print_status(
                "warn",
                &format!("could not remove {}: {err}", staging.display()),
            );
        }
    }

    fn record_revision_count(&self) -> Result<u64> {
        let total = self.collaborators.revisions.total_revisions()?;
        let path = self.layout.bookkeeping_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed creating {}", parent.display()))?;
        }
        let content = serde_json::to_string(&serde_json::json!({ "total": total }))
            .context("failed serializing revision count")?;
        fs::write(&path, content).with_context(|| format!("failed writing {}", path.display()))?;
        Ok(total)
    }

    fn warn_all(&self, new_warnings: &[String], warnings: &mut Vec<String>) {
        for warning in new_warnings {
            self.renderer.print_status("warn", warning);
            warnings.push(warning.clone());
        }
    }
}

fn typed_or(err: anyhow::Error, wrap: impl FnOnce(anyhow::Error) -> UpdateError) -> UpdateError {
    match err.downcast::<UpdateError>() {
        Ok(typed) => typed,
        Err(err) => wrap(err),
    }
}
