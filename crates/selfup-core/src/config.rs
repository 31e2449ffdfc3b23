use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "selfup.toml";
pub const ROOT_ENV_VAR: &str = "SELFUP_ROOT";

/// Settings for one update run. Every field has a default, so an absent or
/// partial `selfup.toml` is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    pub repository_url: String,
    pub commits_api_url: String,
    pub staging_dir_name: String,
    pub install_program: String,
    pub install_args: Vec<String>,
    pub countdown_secs: u64,
    pub update_marker: String,
    pub index_marker: String,
    pub probe_host: String,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            repository_url: "https://github.com/hiudyy/nazuna.git".to_string(),
            commits_api_url: "https://api.github.com/repos/hiudyy/nazuna/commits".to_string(),
            staging_dir_name: "temp_nazuna".to_string(),
            install_program: "npm".to_string(),
            install_args: vec!["run".to_string(), "config:install".to_string()],
            countdown_secs: 5,
            update_marker: "// --- MINHA VERSÃO PERSONALIZADA UPDATE ---".to_string(),
            index_marker: "// --- MINHA VERSÃO PERSONALIZADA INDEX ---".to_string(),
            probe_host: "github.com".to_string(),
        }
    }
}

impl UpdateConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse updater config")?;
        if config.staging_dir_name.trim().is_empty() {
            anyhow::bail!("staging_dir_name must not be empty");
        }
        if config.install_program.trim().is_empty() {
            anyhow::bail!("install_program must not be empty");
        }
        Ok(config)
    }

    /// Reads `selfup.toml` from the installation root, falling back to the
    /// defaults when the file does not exist.
    pub fn load(install_root: &Path) -> Result<Self> {
        let path = install_root.join(CONFIG_FILE_NAME);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no updater config, using defaults");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read updater config: {}", path.display()));
            }
        };

        Self::from_toml_str(&raw)
            .with_context(|| format!("failed parsing updater config: {}", path.display()))
    }

    pub fn marker_for(&self, entry: &crate::PreservedEntry) -> Option<&str> {
        match entry.marker {
            Some(crate::preserved::MarkerKind::Update) => Some(self.update_marker.as_str()),
            Some(crate::preserved::MarkerKind::Index) => Some(self.index_marker.as_str()),
            None => None,
        }
    }
}

pub fn resolve_install_root() -> Result<PathBuf> {
    if let Ok(root) = std::env::var(ROOT_ENV_VAR) {
        if !root.trim().is_empty() {
            return Ok(PathBuf::from(root));
        }
    }

    std::env::current_dir().context("failed to resolve current directory as installation root")
}
