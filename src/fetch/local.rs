// src/fetch/local.rs
// =============================================================================
// Maps a resource path to the file it is mirrored into, and writes it there.
//
//   "/site/docs/"            -> <root>/site/docs/index.html
//   "/site/a%20b.html"       -> <root>/site/a b.html
//   "/site/list?page=2"      -> <root>/site/list@page=2
//   "https://cdn.x/lib.js"   -> <root>/<hash of origin>/lib.js
//
// The final file name is decided by the configured FilenamePolicy.
//
// A path can be a page and a directory at once ("/site/docs" next to
// "/site/docs/intro"). On disk a name is either a file or a directory, so
// the page moves into the directory as its index file:
//   "/site/docs" -> <root>/site/docs             while nothing lives below it
//                -> <root>/site/docs/index.html  once something does
// Every such move is remembered so the metadata can follow it.
// =============================================================================

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::config::FilenamePolicy;

#[derive(Debug)]
pub struct LocalPaths {
    root: PathBuf,
    policy: Arc<dyn FilenamePolicy>,
    // (from, to) relative to the root, for pages moved into directories
    moves: Mutex<Vec<(String, String)>>,
}

impl LocalPaths {
    pub fn new(root: PathBuf, policy: Arc<dyn FilenamePolicy>) -> Self {
        Self {
            root,
            policy,
            moves: Mutex::new(Vec::new()),
        }
    }

    // File for a canonical resource path (or an absolute URL)
    pub fn file_for(&self, resource: &str) -> PathBuf {
        let (namespace, path) = match split_absolute(resource) {
            Some((origin, rest)) => (Some(origin_dir(origin)), rest),
            None => (None, resource),
        };

        // '+' means space in paths produced by form-style encoders
        let plus_as_space = path.replace('+', "%20");
        let decoded = urlencoding::decode_binary(plus_as_space.as_bytes());
        let decoded = String::from_utf8_lossy(&decoded);
        let (path, query) = match decoded.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (&*decoded, None),
        };

        let mut target = self.root.clone();
        if let Some(namespace) = namespace {
            target.push(namespace);
        }
        // Only plain names are pushed, so a decoded ".." cannot leave the root
        for component in Path::new(path).components() {
            if let Component::Normal(name) = component {
                target.push(name);
            }
        }

        self.policy.filename(target, path.ends_with('/'), query)
    }

    /// `file` relative to the mirror root, with '/' separators
    pub fn relative(&self, file: &Path) -> String {
        let relative = file.strip_prefix(&self.root).unwrap_or(file);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    // Where a previous run left the copy of `file`, if it is still there
    //
    // Looks inside the directory of the same name when the page was moved.
    pub async fn existing(&self, file: &Path) -> Option<PathBuf> {
        if is_file(file).await {
            return Some(file.to_path_buf());
        }
        if is_dir(file).await {
            let index = self.index_of(file);
            if is_file(&index).await {
                return Some(index);
            }
        }
        None
    }

    // Writes `bytes` for `file`, making room on the way
    //
    // Returns: the path actually written (differs from `file` when a
    // directory of the same name already exists)
    pub async fn write(&self, file: &Path, bytes: &[u8]) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await?;

        // Every ancestor below the root must be a directory
        let relative = file.strip_prefix(&self.root).unwrap_or(file);
        let mut dir = self.root.clone();
        let mut components = relative.components().peekable();
        while let Some(component) = components.next() {
            if components.peek().is_none() {
                break;
            }
            dir.push(component);
            self.make_directory(&dir).await?;
        }

        // Children already live under this name: the page becomes the index
        let target = if is_dir(file).await {
            self.index_of(file)
        } else {
            file.to_path_buf()
        };

        match tokio::fs::write(&target, bytes).await {
            Ok(()) => Ok(target),
            // a child resource turned the name into a directory meanwhile
            Err(_) if target == file && is_dir(file).await => {
                let index = self.index_of(file);
                tokio::fs::write(&index, bytes).await?;
                Ok(index)
            }
            Err(err) => Err(err),
        }
    }

    /// Pages moved into directories since the last call
    pub fn take_moves(&self) -> Vec<(String, String)> {
        std::mem::take(&mut *self.moves.lock())
    }

    fn index_of(&self, dir: &Path) -> PathBuf {
        self.policy.filename(dir.to_path_buf(), true, None)
    }

    // Ensures `dir` is a directory, moving a page of the same name inside
    //
    // Concurrent fetches may race for the same name, hence the second try.
    async fn make_directory(&self, dir: &Path) -> io::Result<()> {
        for _ in 0..2 {
            if is_dir(dir).await {
                return Ok(());
            }
            if is_file(dir).await {
                self.move_into_directory(dir).await?;
            }
            match tokio::fs::create_dir(dir).await {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err),
            }
        }
        if is_dir(dir).await {
            Ok(())
        } else {
            Err(io::Error::new(
                ErrorKind::AlreadyExists,
                format!("{} is not a directory", dir.display()),
            ))
        }
    }

    // "docs" (a page) -> "docs/index.html"
    async fn move_into_directory(&self, file: &Path) -> io::Result<()> {
        let mut parked = file.as_os_str().to_owned();
        parked.push("@~moving");
        let parked = PathBuf::from(parked);

        match tokio::fs::rename(file, &parked).await {
            Ok(()) => {}
            // another fetch is moving it right now
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err),
        }
        tokio::fs::create_dir_all(file).await?;
        let index = self.index_of(file);
        tokio::fs::rename(&parked, &index).await?;

        debug!("moved: {} -> {}", file.display(), index.display());
        self.moves
            .lock()
            .push((self.relative(file), self.relative(&index)));
        Ok(())
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

// "https://host/x" -> ("https://host", "/x")
fn split_absolute(resource: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = resource.split_once("://")?;
    if scheme != "http" && scheme != "https" {
        return None;
    }
    let host_end = rest.find('/')?;
    let origin_len = scheme.len() + 3 + host_end;
    Some((&resource[..origin_len], &resource[origin_len..]))
}

fn origin_dir(origin: &str) -> String {
    let digest = Sha256::digest(origin.as_bytes());
    hex::encode(&digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexFilenames;
    use tempfile::TempDir;

    fn paths() -> LocalPaths {
        LocalPaths::new(PathBuf::from("/mirror"), Arc::new(IndexFilenames))
    }

    #[test]
    fn test_directory_gets_index() {
        let file = paths().file_for("/site/docs/");
        assert_eq!(file, PathBuf::from("/mirror/site/docs/index.html"));
        assert_eq!(paths().relative(&file), "site/docs/index.html");
    }

    #[test]
    fn test_percent_and_plus_decoding() {
        assert_eq!(
            paths().file_for("/site/a%20b+c.html"),
            PathBuf::from("/mirror/site/a b c.html")
        );
    }

    #[test]
    fn test_queries_do_not_collide() {
        let first = paths().file_for("/site/list?page=1");
        let second = paths().file_for("/site/list?page=2");
        assert_eq!(first, PathBuf::from("/mirror/site/list@page=1"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_encoded_dots_stay_inside_root() {
        let file = paths().file_for("/site/%2e%2e/%2e%2e/etc/passwd");
        assert!(file.starts_with("/mirror"));
    }

    #[test]
    fn test_remote_origins_are_namespaced() {
        let a = paths().file_for("https://cdn.one/lib.js");
        let b = paths().file_for("https://cdn.two/lib.js");
        assert_ne!(a, b);
        assert!(a.ends_with("lib.js"));
        assert_eq!(a.parent().unwrap().parent().unwrap(), Path::new("/mirror"));
    }

    fn paths_in(dir: &TempDir) -> LocalPaths {
        LocalPaths::new(dir.path().join("mirror"), Arc::new(IndexFilenames))
    }

    #[tokio::test]
    async fn test_page_moves_aside_for_children() {
        let dir = TempDir::new().unwrap();
        let local = paths_in(&dir);

        let page = local.file_for("/site/docs");
        assert_eq!(local.write(&page, b"docs").await.unwrap(), page);

        let child = local.file_for("/site/docs/intro");
        assert_eq!(local.write(&child, b"intro").await.unwrap(), child);

        let root = dir.path().join("mirror");
        assert_eq!(std::fs::read(root.join("site/docs/index.html")).unwrap(), b"docs");
        assert_eq!(std::fs::read(root.join("site/docs/intro")).unwrap(), b"intro");
        assert_eq!(
            local.take_moves(),
            vec![("site/docs".to_string(), "site/docs/index.html".to_string())]
        );
        assert!(local.take_moves().is_empty());
        assert_eq!(local.existing(&page).await, Some(root.join("site/docs/index.html")));
    }

    #[tokio::test]
    async fn test_page_after_children_becomes_index() {
        let dir = TempDir::new().unwrap();
        let local = paths_in(&dir);

        local.write(&local.file_for("/site/docs/intro"), b"intro").await.unwrap();
        let written = local.write(&local.file_for("/site/docs"), b"docs").await.unwrap();

        assert_eq!(local.relative(&written), "site/docs/index.html");
        assert!(local.take_moves().is_empty());
    }

    #[tokio::test]
    async fn test_existing_needs_a_saved_file() {
        let dir = TempDir::new().unwrap();
        let local = paths_in(&dir);

        let page = local.file_for("/site/a.css");
        assert_eq!(local.existing(&page).await, None);
        local.write(&page, b"a{}").await.unwrap();
        assert_eq!(local.existing(&page).await, Some(page.clone()));

        // a directory with children but no index of its own
        local.write(&local.file_for("/site/docs/intro"), b"x").await.unwrap();
        assert_eq!(local.existing(&local.file_for("/site/docs")).await, None);
    }
}
