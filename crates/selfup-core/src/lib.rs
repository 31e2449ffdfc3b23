mod classify;
mod config;
mod digest;
mod error;
mod manifest;
mod preserved;
mod stamp;
mod verify;

pub use classify::{classify_dependencies, DependencyClassification};
pub use config::{resolve_install_root, UpdateConfig, CONFIG_FILE_NAME, ROOT_ENV_VAR};
pub use digest::{members_digest, sha256_hex};
pub use error::UpdateError;
pub use manifest::{DependencyGroup, DependencyManifest, DEPENDENCY_GROUPS};
pub use preserved::{PreservedEntry, PreservedKind, PRESERVED_ENTRIES};
pub use stamp::{BackupStamp, BACKUP_PREFIX};
pub use verify::file_contains_marker;

#[cfg(test)]
mod tests;
