use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

pub(crate) fn base_git_command() -> Command {
    let mut command = Command::new("git");
    command
        .arg("-c")
        .arg("core.autocrlf=false")
        .arg("-c")
        .arg("advice.detachedHead=false");
    if cfg!(windows) {
        command.arg("-c").arg("core.longpaths=true");
    }
    command
}

/// Shallow-clones `location` into `destination`, which must not exist yet.
pub(crate) fn run_git_clone(location: &str, destination: &Path) -> Result<()> {
    let output = base_git_command()
        .arg("clone")
        .arg("--depth")
        .arg("1")
        .arg("--")
        .arg(location)
        .arg(destination)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("failed launching git clone of '{location}'"))?;
    if !output.status.success() {
        anyhow::bail!(
            "git clone of '{}' failed: {}",
            location,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}
