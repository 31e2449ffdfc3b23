use anyhow::{Context, Result};

use crate::{copy_dir_recursive, InstallLayout, StagingTree};

/// Overlays the staged release onto the live tree entry by entry, then
/// discards the staging tree whether or not the overlay succeeded.
pub fn apply_staged_tree(layout: &InstallLayout, staging: StagingTree) -> Result<()> {
    let overlay = copy_dir_recursive(staging.root(), layout.root()).with_context(|| {
        format!(
            "failed overlaying {} onto {}",
            staging.root().display(),
            layout.root().display()
        )
    });

    let staging_root = staging.root().to_path_buf();
    if let Err(err) = staging.discard() {
        tracing::warn!(path = %staging_root.display(), error = %err, "failed removing staging tree");
    }

    overlay?;

    let manifest = layout.manifest_path();
    if !manifest.is_file() {
        anyhow::bail!(
            "overlay incomplete: {} missing after apply",
            manifest.display()
        );
    }

    Ok(())
}
