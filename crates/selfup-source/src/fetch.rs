use std::fs;
use std::path::{Component, Path};

use anyhow::{Context, Result};
use selfup_core::UpdateConfig;
use selfup_installer::{remove_path_if_exists, InstallLayout, StagingTree};

use crate::{probe_host, run_git_clone};

/// Produces a fresh copy of the upstream source tree.
pub trait SourceFetcher {
    fn fetch(&self, destination: &Path) -> Result<()>;

    fn describe(&self) -> String;

    /// Extra context appended to a fetch failure. Never changes the outcome.
    fn diagnose_failure(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSourceFetcher {
    repository_url: String,
    probe_host: String,
}

impl GitSourceFetcher {
    pub fn new(repository_url: impl Into<String>, probe_host: impl Into<String>) -> Self {
        Self {
            repository_url: repository_url.into(),
            probe_host: probe_host.into(),
        }
    }

    pub fn from_config(config: &UpdateConfig) -> Self {
        Self::new(config.repository_url.clone(), config.probe_host.clone())
    }
}

impl SourceFetcher for GitSourceFetcher {
    fn fetch(&self, destination: &Path) -> Result<()> {
        run_git_clone(&self.repository_url, destination)
    }

    fn describe(&self) -> String {
        format!("git clone {} --depth 1", self.repository_url)
    }

    fn diagnose_failure(&self) -> Option<String> {
        if self.probe_host.is_empty() {
            return None;
        }
        Some(format!("{}: {}", self.probe_host, probe_host(&self.probe_host)))
    }
}

/// Fetches the upstream source into the layout's staging directory.
///
/// A leftover staging directory from an earlier run is removed first. The
/// fetch only counts as successful when the destination carries a `.git`
/// directory afterward; the release's top-level README is dropped.
pub fn stage_source(fetcher: &dyn SourceFetcher, layout: &InstallLayout) -> Result<StagingTree> {
    let staging_root = layout.staging_dir();
    let escapes_root = match staging_root.strip_prefix(layout.root()) {
        Ok(relative) => relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_))),
        Err(_) => true,
    };
    if escapes_root {
        anyhow::bail!("invalid staging path {}", staging_root.display());
    }

    remove_path_if_exists(&staging_root).with_context(|| {
        format!(
            "failed removing stale staging dir {}",
            staging_root.display()
        )
    })?;

    tracing::info!(fetcher = %fetcher.describe(), staging = %staging_root.display(), "fetching source");
    let fetched = fetcher.fetch(&staging_root).and_then(|()| {
        if staging_root.join(".git").is_dir() {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "{} has no .git directory after {}",
                staging_root.display(),
                fetcher.describe()
            ))
        }
    });

    if let Err(err) = fetched {
        if let Err(purge_err) = remove_path_if_exists(&staging_root) {
            tracing::warn!(
                path = %staging_root.display(),
                error = %purge_err,
                "failed removing staging tree after fetch failure"
            );
        }
        return Err(match fetcher.diagnose_failure() {
            Some(diagnostic) => anyhow::anyhow!("{err:#} ({diagnostic})"),
            None => err,
        });
    }

    let readme = staging_root.join("README.md");
    if readme.is_file() {
        fs::remove_file(&readme)
            .with_context(|| format!("failed removing {}", readme.display()))?;
    }

    Ok(StagingTree::new(staging_root))
}
