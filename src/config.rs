// src/config.rs
// =============================================================================
// Everything a mirror run can be told.
//
// A config can come from a JSON file (keys in camelCase, every key optional)
// and/or from command-line flags, which win over the file.
//
// Example file:
//   {
//     "url": "https://example.com/docs/",
//     "localPath": "mirror",
//     "jsonPath": "mirror.json",
//     "parallel": 4,
//     "htmlLinks": { "a": ["href"], "img": ["src"] }
//   }
//
// Rust concepts:
// - #[serde(default)]: missing keys fall back to Default::default()
// - Trait objects: Arc<dyn FilenamePolicy> lets callers plug in naming rules
// =============================================================================

use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{MirrorError, Result};

/// Default pattern for references that stay remote (rewritten to "//host/...")
pub const DEFAULT_REMOTE_MATCH: &str =
    r"\b(?:maxcdn\.|cdnjs\.|code\.jquery|fonts\.googleapis)\b";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MirrorConfig {
    /// Crawl root, e.g. "https://example.com/docs/"
    pub url: String,
    /// Directory the mirrored files are written to
    pub local_path: PathBuf,
    /// Metadata file carried from run to run
    pub json_path: PathBuf,
    /// Fetches started together in one round
    pub parallel: usize,
    /// Send If-Modified-Since / If-None-Match when a local copy exists
    #[serde(rename = "try304")]
    pub try_304: bool,
    /// CSS selector -> attributes that hold links
    pub html_links: BTreeMap<String, Vec<String>>,
    /// Extra paths (relative to the base path) always fetched
    pub additional_targets: Vec<String>,
    /// References matching this stay remote and are made protocol-relative
    pub remote_match: String,
    pub user_agent: String,
    /// Static headers sent with every request
    pub headers: BTreeMap<String, String>,
    pub verbose: bool,
    /// Naming rule for files on disk
    #[serde(skip, default = "default_filename_policy")]
    pub filename: Arc<dyn FilenamePolicy>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        let html_links = [
            ("a", vec!["href"]),
            ("link", vec!["href"]),
            ("script", vec!["src"]),
            ("img", vec!["src", "data-original"]),
            ("meta[property='og:image']", vec!["content"]),
        ]
        .into_iter()
        .map(|(selector, attrs)| {
            (
                selector.to_string(),
                attrs.into_iter().map(String::from).collect(),
            )
        })
        .collect();

        Self {
            url: String::new(),
            local_path: PathBuf::from("mirror"),
            json_path: PathBuf::from("mirror.json"),
            parallel: 2,
            try_304: true,
            html_links,
            additional_targets: vec!["/robots.txt".to_string(), "/sitemap.xml".to_string()],
            remote_match: DEFAULT_REMOTE_MATCH.to_string(),
            user_agent: format!("site-mirror/{}", env!("CARGO_PKG_VERSION")),
            headers: BTreeMap::new(),
            verbose: false,
            filename: default_filename_policy(),
        }
    }
}

impl MirrorConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Reads a JSON config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            MirrorError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&text)
            .map_err(|e| MirrorError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    // Checks everything that can be checked before the first request
    //
    // Returns: the compiled remoteMatch pattern
    pub fn validate(&self) -> Result<Regex> {
        if self.parallel == 0 {
            return Err(MirrorError::Config("parallel must be at least 1".to_string()));
        }

        for selector in self.html_links.keys() {
            scraper::Selector::parse(selector).map_err(|e| {
                MirrorError::Config(format!("invalid selector '{selector}': {e}"))
            })?;
            selector.parse::<lol_html::Selector>().map_err(|e| {
                MirrorError::Config(format!("unsupported selector '{selector}': {e}"))
            })?;
        }

        for (name, value) in &self.headers {
            reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| MirrorError::Config(format!("invalid header name '{name}': {e}")))?;
            reqwest::header::HeaderValue::from_str(value)
                .map_err(|e| MirrorError::Config(format!("invalid value for header '{name}': {e}")))?;
        }

        Regex::new(&self.remote_match)
            .map_err(|e| MirrorError::Config(format!("invalid remoteMatch: {e}")))
    }
}

fn default_filename_policy() -> Arc<dyn FilenamePolicy> {
    Arc::new(IndexFilenames)
}

/// Decides the final on-disk name of a resource
///
/// `path` is the resource path joined onto the mirror root, `directory` says
/// whether the resource path ended in '/', `query` is the decoded query
/// string without its '?'. Different queries for the same path must map to
/// different files.
pub trait FilenamePolicy: Send + Sync + fmt::Debug {
    fn filename(&self, path: PathBuf, directory: bool, query: Option<&str>) -> PathBuf;
}

/// "dir/" -> "dir/index.html", "page?x=1" -> "page@x=1"
#[derive(Debug, Default, Clone, Copy)]
pub struct IndexFilenames;

impl FilenamePolicy for IndexFilenames {
    fn filename(&self, path: PathBuf, directory: bool, query: Option<&str>) -> PathBuf {
        let mut file = if directory { path.join("index.html") } else { path };

        if let Some(query) = query.filter(|q| !q.is_empty()) {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let query: String = query
                .chars()
                .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
                .collect();
            file.set_file_name(format!("{name}@{query}"));
        }
        file
    }
}
