use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{anyhow, Context, Result};
use selfup_core::UpdateConfig;

use crate::InstallLayout;

/// Runs the package manager's install step inside the installation root.
pub trait DependencyInstaller {
    fn install(&self, install_root: &Path) -> Result<()>;

    fn describe(&self) -> String;
}

/// Runs a named package-manager script, `npm run config:install` by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInstaller {
    program: String,
    args: Vec<String>,
}

impl ScriptInstaller {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &UpdateConfig) -> Self {
        Self::new(config.install_program.clone(), config.install_args.clone())
    }

    fn command(&self) -> Command {
        // npm ships as a .cmd shim on Windows.
        if cfg!(windows) {
            let mut command = Command::new("cmd");
            command.arg("/C").arg(&self.program).args(&self.args);
            command
        } else {
            let mut command = Command::new(&self.program);
            command.args(&self.args);
            command
        }
    }
}

impl DependencyInstaller for ScriptInstaller {
    fn install(&self, install_root: &Path) -> Result<()> {
        let output = self
            .command()
            .current_dir(install_root)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("{}: command failed to start", self.describe()))?;
        if output.status.success() {
            return Ok(());
        }

        Err(anyhow!(
            "{}: status={} stderr='{}'",
            self.describe(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ))
    }

    fn describe(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs the installer and checks that the dependency cache exists afterward.
pub fn install_dependencies(
    installer: &dyn DependencyInstaller,
    layout: &InstallLayout,
) -> Result<()> {
    installer.install(layout.root())?;

    let cache = layout.dependency_cache_dir();
    if !cache.is_dir() {
        anyhow::bail!(
            "{} exited successfully but {} was not created",
            installer.describe(),
            cache.display()
        );
    }
    Ok(())
}
