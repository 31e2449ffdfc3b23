mod apply;
mod backup;
mod clean;
mod deps;
mod fs_utils;
mod layout;

pub use apply::apply_staged_tree;
pub use backup::{
    begin_snapshot, collect_stale_backups, complete_snapshot, is_retained, purge_stale_backups,
    remove_backup, restore_snapshot, retain_backup, verify_snapshot, BackupHandle,
    PendingBackup, StaleBackupFailure,
};
pub use clean::{clean_installation, CleanOptions, CleanReport};
pub use deps::{install_dependencies, DependencyInstaller, ScriptInstaller};
pub use fs_utils::{copy_dir_recursive, copy_path, remove_path_if_exists};
pub use layout::{InstallLayout, StagingTree};
