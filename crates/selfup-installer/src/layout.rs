use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use selfup_core::{BackupStamp, UpdateConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
    staging_dir_name: String,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>, staging_dir_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            staging_dir_name: staging_dir_name.into(),
        }
    }

    pub fn from_config(root: impl Into<PathBuf>, config: &UpdateConfig) -> Self {
        Self::new(root, config.staging_dir_name.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("package.json")
    }

    pub fn lockfile_path(&self) -> PathBuf {
        self.root.join("package-lock.json")
    }

    pub fn dependency_cache_dir(&self) -> PathBuf {
        self.root.join("node_modules")
    }

    pub fn readme_path(&self) -> PathBuf {
        self.root.join("README.md")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("dados")
    }

    pub fn database_dir(&self) -> PathBuf {
        self.data_dir().join("database")
    }

    pub fn bookkeeping_path(&self) -> PathBuf {
        self.database_dir().join("updateSave.json")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(&self.staging_dir_name)
    }

    pub fn backup_dir(&self, stamp: &BackupStamp) -> PathBuf {
        self.root.join(stamp.dir_name())
    }

    /// Metadata directories and files that never survive into the new
    /// release.
    pub fn metadata_paths(&self) -> Vec<PathBuf> {
        vec![
            self.root.join(".git"),
            self.root.join(".github"),
            self.root.join(".npm"),
            self.readme_path(),
        ]
    }
}

/// A freshly fetched copy of the upstream source awaiting overlay.
#[derive(Debug, PartialEq, Eq)]
pub struct StagingTree {
    root: PathBuf,
}

impl StagingTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("package.json")
    }

    pub fn discard(self) -> io::Result<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}
