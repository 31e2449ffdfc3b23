use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreservedKind {
    File,
    Directory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MarkerKind {
    Update,
    Index,
}

/// One member of the user-owned subtree.
///
/// `captured` members are copied into the backup and restored from it.
/// `purged` members are deleted from the live tree by the cleaner before the
/// new release is overlaid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreservedEntry {
    pub relative_path: &'static str,
    pub kind: PreservedKind,
    pub captured: bool,
    pub purged: bool,
    pub(crate) marker: Option<MarkerKind>,
}

impl PreservedEntry {
    pub fn path_under(&self, root: &Path) -> PathBuf {
        self.relative_path
            .split('/')
            .fold(root.to_path_buf(), |path, segment| path.join(segment))
    }
}

pub const PRESERVED_ENTRIES: &[PreservedEntry] = &[
    PreservedEntry {
        relative_path: "dados/database",
        kind: PreservedKind::Directory,
        captured: true,
        purged: false,
        marker: None,
    },
    PreservedEntry {
        relative_path: "dados/src/config.json",
        kind: PreservedKind::File,
        captured: true,
        purged: true,
        marker: None,
    },
    PreservedEntry {
        relative_path: "dados/src/.scripts/update.js",
        kind: PreservedKind::File,
        captured: true,
        purged: false,
        marker: Some(MarkerKind::Update),
    },
    PreservedEntry {
        relative_path: "dados/src/index.js",
        kind: PreservedKind::File,
        captured: true,
        purged: true,
        marker: Some(MarkerKind::Index),
    },
    PreservedEntry {
        relative_path: "dados/midias",
        kind: PreservedKind::Directory,
        captured: true,
        purged: false,
        marker: None,
    },
    // The automation-script directory goes as a whole; update.js inside it
    // is captured above.
    PreservedEntry {
        relative_path: "dados/src/.scripts",
        kind: PreservedKind::Directory,
        captured: false,
        purged: true,
        marker: None,
    },
    // Legacy location of the updater script.
    PreservedEntry {
        relative_path: "dados/src/update.js",
        kind: PreservedKind::File,
        captured: false,
        purged: true,
        marker: None,
    },
];
