use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Content id of the named members under `root`, rendered as `sha256:<hex>`.
///
/// Every file contributes its member-relative path and its own sha256, every
/// directory its path with a trailing `/`. Records are hashed in path order,
/// so the id does not depend on directory iteration order. A member that is
/// absent under `root` is an error.
pub fn members_digest(root: &Path, members: &[&str]) -> Result<String> {
    let mut records = BTreeMap::new();
    for member in members {
        let path = member
            .split('/')
            .fold(root.to_path_buf(), |path, segment| path.join(segment));
        record_path(&path, member.to_string(), &mut records)?;
    }

    let mut hasher = Sha256::new();
    for (name, digest) in &records {
        hasher.update(name.as_bytes());
        hasher.update([0]);
        hasher.update(digest.as_bytes());
        hasher.update([b'\n']);
    }
    Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
}

fn record_path(path: &Path, name: String, records: &mut BTreeMap<String, String>) -> Result<()> {
    let metadata =
        fs::metadata(path).with_context(|| format!("failed reading {}", path.display()))?;

    if metadata.is_dir() {
        for entry in
            fs::read_dir(path).with_context(|| format!("failed listing {}", path.display()))?
        {
            let entry = entry?;
            let child = format!("{name}/{}", entry.file_name().to_string_lossy());
            record_path(&entry.path(), child, records)?;
        }
        records.insert(format!("{name}/"), String::new());
    } else if metadata.is_file() {
        let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        records.insert(name, sha256_hex(&bytes));
    }
    Ok(())
}
