use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::manifest::{DependencyGroup, DependencyManifest, DEPENDENCY_GROUPS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyClassification {
    ManifestMissing,
    DependenciesChanged { group: DependencyGroup },
    CacheMissing,
    SpecificDependencyMissing { name: String },
    NoChange,
    ComparisonError { reason: String },
}

impl DependencyClassification {
    /// Anything short of a confirmed match reinstalls, including a failed
    /// comparison.
    pub fn requires_install(&self) -> bool {
        !matches!(self, Self::NoChange)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManifestMissing => "manifest-missing",
            Self::DependenciesChanged { .. } => "dependencies-changed",
            Self::CacheMissing => "cache-missing",
            Self::SpecificDependencyMissing { .. } => "specific-dependency-missing",
            Self::NoChange => "no-change",
            Self::ComparisonError { .. } => "comparison-error",
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::ManifestMissing => "package.json not found, install required".to_string(),
            Self::DependenciesChanged { group } => format!(
                "'{}' changed between versions, reinstall required",
                group.manifest_key()
            ),
            Self::CacheMissing => "dependency cache not found, install required".to_string(),
            Self::SpecificDependencyMissing { name } => {
                format!("dependency '{name}' missing from cache, install required")
            }
            Self::NoChange => "dependencies unchanged, reinstall not required".to_string(),
            Self::ComparisonError { reason } => {
                format!("dependency comparison failed ({reason}), reinstalling to be safe")
            }
        }
    }
}

/// Compares the installed and staged manifests and the local dependency
/// cache. Never fails: any error is folded into `ComparisonError`.
pub fn classify_dependencies(
    installed_manifest: &Path,
    staged_manifest: &Path,
    cache_root: &Path,
) -> DependencyClassification {
    match try_classify(installed_manifest, staged_manifest, cache_root) {
        Ok(classification) => classification,
        Err(err) => DependencyClassification::ComparisonError {
            reason: format!("{err:#}"),
        },
    }
}

fn try_classify(
    installed_manifest: &Path,
    staged_manifest: &Path,
    cache_root: &Path,
) -> Result<DependencyClassification> {
    if !installed_manifest.is_file() || !staged_manifest.is_file() {
        return Ok(DependencyClassification::ManifestMissing);
    }

    let installed = DependencyManifest::read(installed_manifest)?;
    let staged = DependencyManifest::read(staged_manifest)?;

    if let Some(group) = first_changed_group(&installed, &staged) {
        return Ok(DependencyClassification::DependenciesChanged { group });
    }

    if !cache_root.is_dir() {
        return Ok(DependencyClassification::CacheMissing);
    }

    for name in installed.declared_package_names() {
        if !cache_entry_path(cache_root, name).exists() {
            return Ok(DependencyClassification::SpecificDependencyMissing {
                name: name.to_string(),
            });
        }
    }

    Ok(DependencyClassification::NoChange)
}

fn first_changed_group(
    installed: &DependencyManifest,
    staged: &DependencyManifest,
) -> Option<DependencyGroup> {
    DEPENDENCY_GROUPS
        .into_iter()
        .find(|group| installed.group(*group) != staged.group(*group))
}

// Scoped packages (`@scope/name`) live in nested cache directories.
fn cache_entry_path(cache_root: &Path, name: &str) -> PathBuf {
    name.split('/')
        .fold(cache_root.to_path_buf(), |path, segment| path.join(segment))
}
