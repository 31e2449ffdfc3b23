use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced at the orchestrator boundary, one per update phase.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("aborted: {0}")]
    Aborted(String),

    #[error("precondition-missing: {tool} not found ({hint})")]
    PreconditionMissing { tool: String, hint: String },

    #[error("backup-failed: {0:#}")]
    BackupFailed(anyhow::Error),

    #[error("backup-incomplete: {} not copied into {}", .missing.join(", "), .backup.display())]
    BackupIncomplete {
        backup: PathBuf,
        missing: Vec<String>,
    },

    #[error("fetch-failed: {0:#}")]
    FetchFailed(anyhow::Error),

    #[error("clean-failed: {0:#}")]
    CleanFailed(anyhow::Error),

    #[error("apply-failed: {0:#}")]
    ApplyFailed(anyhow::Error),

    #[error("restore-failed: {0:#}")]
    RestoreFailed(anyhow::Error),

    #[error("dependency-install-failed: {0:#}")]
    DependencyInstallFailed(anyhow::Error),

    #[error("classification-error: {0}")]
    ClassificationError(String),
}
