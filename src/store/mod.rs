// src/store/mod.rs
// =============================================================================
// Cross-run metadata: records, the trie that holds them, and the JSON file
// they are persisted to.
//
// Submodules:
// - record: one resource's version counters, timestamps and cached headers
// - tree: sparse trie keyed by path segments
// =============================================================================

mod record;
mod tree;

pub use record::{CachedHeaders, Record};
pub use tree::MetadataTree;

use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{MirrorError, Result};

// Loads the previous run's tree
//
// A missing file means "first run" and yields an empty tree.
// A file that exists but cannot be parsed is fatal.
pub async fn load(path: &Path) -> Result<MetadataTree> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => {
            debug!("exists: {}", path.display());
            serde_json::from_str(&text).map_err(|source| MirrorError::ParseMetadata {
                path: path.to_path_buf(),
                source,
            })
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!("does not exist: {}", path.display());
            Ok(MetadataTree::new())
        }
        Err(source) => Err(MirrorError::ReadMetadata {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes the tree as pretty-printed JSON
pub async fn save(path: &Path, tree: &MetadataTree) -> Result<()> {
    let persist_error = |reason: String| MirrorError::PersistMetadata {
        path: path.to_path_buf(),
        reason,
    };

    let json = serde_json::to_string_pretty(tree).map_err(|e| persist_error(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| persist_error(e.to_string()))?;
    }
    tokio::fs::write(path, json)
        .await
        .map_err(|e| persist_error(e.to_string()))?;

    info!("created: {}", path.display());
    Ok(())
}
