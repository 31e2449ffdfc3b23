use std::process::{Command, Stdio};

use anyhow::Result;
use selfup_core::{DependencyManifest, UpdateConfig, UpdateError};
use selfup_installer::InstallLayout;
use semver::{Version, VersionReq};

/// Checks run before anything is touched. Returns non-fatal warnings; a
/// missing tool is an error.
pub(crate) trait Preflight {
    fn check(&self, layout: &InstallLayout) -> Result<Vec<String>>;
}

impl<F> Preflight for F
where
    F: Fn(&InstallLayout) -> Result<Vec<String>>,
{
    fn check(&self, layout: &InstallLayout) -> Result<Vec<String>> {
        self(layout)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    pub(crate) fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }
}

pub(crate) struct SystemPreflight {
    package_manager: String,
    platform: Platform,
}

impl SystemPreflight {
    pub(crate) fn from_config(config: &UpdateConfig) -> Self {
        Self {
            package_manager: config.install_program.clone(),
            platform: Platform::current(),
        }
    }

    fn require_tool(&self, tool: &str) -> Result<String> {
        match tool_version(tool) {
            Some(version) => {
                tracing::debug!(tool, version = %version, "found required tool");
                Ok(version)
            }
            None => Err(UpdateError::PreconditionMissing {
                tool: tool.to_string(),
                hint: install_hint(tool, self.platform),
            }
            .into()),
        }
    }
}

impl Preflight for SystemPreflight {
    fn check(&self, layout: &InstallLayout) -> Result<Vec<String>> {
        self.require_tool("git")?;
        self.require_tool(&self.package_manager)?;

        let mut warnings = Vec::new();
        if let Some(warning) = runtime_engine_warning(layout) {
            warnings.push(warning);
        }
        Ok(warnings)
    }
}

pub(crate) fn install_hint(tool: &str, platform: Platform) -> String {
    match (tool, platform) {
        ("git", Platform::Windows) => {
            "install Git from https://git-scm.com/download/win".to_string()
        }
        ("git", Platform::MacOs) => "install Git with: brew install git".to_string(),
        ("git", Platform::Linux) => {
            "install Git with: sudo apt-get install git (Ubuntu/Debian) or the distribution's equivalent"
                .to_string()
        }
        ("npm", _) | ("node", _) => "install Node.js and npm from https://nodejs.org".to_string(),
        (other, _) => format!("install {other} and make sure it is on PATH"),
    }
}

fn tool_version(program: &str) -> Option<String> {
    let mut command = if cfg!(windows) {
        let mut command = Command::new("cmd");
        command.arg("/C").arg(program);
        command
    } else {
        Command::new(program)
    };
    let output = command
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn runtime_engine_warning(layout: &InstallLayout) -> Option<String> {
    let manifest = match DependencyManifest::read(&layout.manifest_path()) {
        Ok(manifest) => manifest,
        Err(err) => {
            tracing::debug!(error = %format!("{err:#}"), "skipping engine check");
            return None;
        }
    };
    let requirement = manifest.engine_requirement("node")?;
    let Some(node_version) = tool_version("node") else {
        return Some(format!(
            "package.json requires node '{requirement}' but node was not found"
        ));
    };
    check_engine(requirement, &node_version)
}

/// Compares a runtime version against an `engines` range. Returns a warning
/// when the version does not satisfy the range or either side is unreadable.
pub(crate) fn check_engine(requirement: &str, runtime_version: &str) -> Option<String> {
    let Ok(version) = Version::parse(runtime_version.trim().trim_start_matches('v')) else {
        return Some(format!("could not read runtime version '{runtime_version}'"));
    };

    let alternatives = requirement
        .split("||")
        .map(|range| VersionReq::parse(&normalize_range(range)))
        .collect::<Vec<_>>();
    if alternatives.iter().all(|parsed| parsed.is_err()) {
        return Some(format!("could not interpret engines.node '{requirement}'"));
    }
    if alternatives
        .iter()
        .flatten()
        .any(|range| range.matches(&version))
    {
        return None;
    }

    Some(format!(
        "node {version} does not satisfy engines.node '{requirement}'"
    ))
}

/// npm separates comparators with spaces, `semver` with commas.
fn normalize_range(range: &str) -> String {
    let mut comparators: Vec<String> = Vec::new();
    let mut pending_operator = String::new();
    for token in range.split_whitespace() {
        if token.chars().all(|ch| matches!(ch, '<' | '>' | '=' | '~' | '^')) {
            pending_operator.push_str(token);
            continue;
        }
        comparators.push(format!("{pending_operator}{token}"));
        pending_operator.clear();
    }
    if comparators.is_empty() {
        return "*".to_string();
    }
    comparators.join(", ")
}
