//! Content fingerprints for build artifacts
//!
//! All fingerprints use the `sha256:<hex>` format so they can be compared
//! against stored sync state and against remote content hashes.

use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::SyncResult;

/// Compute the fingerprint of a byte slice
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("sha256:{:x}", hasher.finalize())
}

/// Compute the fingerprint of a single file's content
pub fn hash_file(path: &Path) -> SyncResult<String> {
    let content = fs::read(path)?;
    Ok(hash_bytes(&content))
}

/// Compute a deterministic fingerprint of a directory tree.
///
/// Walks entries in sorted order and hashes each file's path relative to the
/// root together with its content, so renames and moves change the result.
pub fn hash_dir(root: &Path) -> SyncResult<String> {
    fn walk(dir: &Path, root: &Path, hasher: &mut Sha256) -> SyncResult<()> {
        let mut entries: Vec<_> = fs::read_dir(dir)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|e| e.path())
            .collect();
        entries.sort();

        for path in entries {
            if path.is_dir() {
                walk(&path, root, hasher)?;
            } else {
                let rel = path.strip_prefix(root).unwrap_or(&path);
                hasher.update(rel.to_string_lossy().as_bytes());
                hasher.update(fs::read(&path)?);
            }
        }
        Ok(())
    }

    let mut hasher = Sha256::new();
    walk(root, root, &mut hasher)?;
    Ok(format!("sha256:{:x}", hasher.finalize()))
}

/// Fingerprint an artifact path, whichever kind it is.
///
/// Built function code may be a packaged archive (a file) or an unpacked
/// build directory.
pub fn hash_artifact(path: &Path) -> SyncResult<String> {
    if path.is_dir() {
        hash_dir(path)
    } else {
        hash_file(path)
    }
}
