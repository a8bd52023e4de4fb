// src/crawl/resolve.rs
// =============================================================================
// Turns a raw link found inside a resource into a canonical in-scope path.
//
// A crawl has a scope: the origin ("https://example.com") and the base path
// ("/site/") of the crawl root. Every link is resolved against the path of
// the resource it was found in, and the result is either a path below the
// base path or a rejection.
//
// Resolution steps:
// 1. Drop the fragment ("#...")
// 2. Set the query ("?...") aside, it is reattached at the end
// 3. Same-origin absolute URL -> strip the origin
// 4. Any other absolute reference ("mailto:", "//cdn...") -> External
// 5. Root-relative path ("/site/x") -> use it
// 6. Otherwise relative to the directory of the current resource
// 7. Anything that normalizes to a path above the base path -> EscapesBase
// =============================================================================

use url::Url;

use crate::error::{MirrorError, Result};

/// Outcome of resolving one link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Canonical path below the base path, query reattached
    InScope(String),
    /// Absolute reference to another origin or scheme
    External,
    /// Normalizes to a path above the base path
    EscapesBase,
    /// Not something a crawler can follow
    Malformed(&'static str),
}

/// Origin and base path of one crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    origin: String,
    base_path: String,
}

impl Scope {
    // Builds the scope from the crawl root URL
    //
    // A trailing '/' is added when missing, so "https://example.com/site"
    // covers everything below "/site/".
    pub fn from_root(root: &str) -> Result<Self> {
        let invalid = |reason: &str| MirrorError::InvalidRoot {
            url: root.to_string(),
            reason: reason.to_string(),
        };

        let normalized = if root.ends_with('/') {
            root.to_string()
        } else {
            format!("{root}/")
        };
        let url = Url::parse(&normalized).map_err(|e| invalid(&e.to_string()))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(invalid("only http and https roots can be mirrored"));
        }
        if url.host_str().is_none() {
            return Err(invalid("missing host"));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("root must not carry a query or fragment"));
        }

        Ok(Scope {
            origin: url.origin().ascii_serialization(),
            base_path: url.path().to_string(),
        })
    }

    /// "scheme://host[:port]" of the crawl root
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Path of the crawl root, always ending in '/'
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Resolves `link`, found in the resource at `current`
    pub fn resolve(&self, current: &str, link: &str) -> Resolution {
        // Control characters never belong in a followable link
        if link.chars().any(|c| c.is_ascii_control()) {
            return Resolution::Malformed("control character in link");
        }

        // Drop the fragment, then set the query aside for the end
        let link = link.split_once('#').map_or(link, |(before, _)| before);
        let (link, query) = match link.find('?') {
            Some(i) => (&link[..i], &link[i..]),
            None => (link, ""),
        };

        let path = if let Some(rest) = self.strip_origin(link) {
            // Absolute URL on our own origin: keep only the path
            normalize(if rest.is_empty() { "/" } else { rest })
        } else if link.starts_with("//") || has_scheme(link) {
            // Another host or scheme ("mailto:", "//cdn...")
            // TODO: admit selected remote hosts (matching remoteMatch) as
            // hash-namespaced resources once the mirror can serve them.
            return Resolution::External;
        } else if link.starts_with('/') {
            // root-relative: fine when under the base path, rejected below otherwise
            normalize(link)
        } else if link.is_empty() {
            // Empty link (or query only): the current resource itself
            let current_path = strip_query(current);
            if query.is_empty() {
                // an empty link points at the current resource, query included
                return self.accept(current_path.to_string(), &current[current_path.len()..]);
            }
            current_path.to_string()
        } else {
            // Relative link: join onto the directory of the current resource
            let current = strip_query(current);
            let dir = if current.ends_with('/') {
                current
            } else {
                current.trim_end_matches(|c| c != '/')
            };
            let mut joined = normalize(&format!("{dir}{link}"));

            // "." and "./" name a directory, keep the trailing '/'
            if (link.ends_with('.') || link.ends_with("./")) && !joined.ends_with('/') {
                joined.push('/');
            }
            joined
        };

        // Finally make sure we did not climb above the base path
        self.accept(path, query)
    }

    fn accept(&self, path: String, query: &str) -> Resolution {
        if path.starts_with(&self.base_path) {
            Resolution::InScope(path + query)
        } else {
            Resolution::EscapesBase
        }
    }

    // Returns the path part of `link` if it is an absolute URL on our origin
    fn strip_origin<'a>(&self, link: &'a str) -> Option<&'a str> {
        let head = link.get(..self.origin.len())?;
        if !head.eq_ignore_ascii_case(&self.origin) {
            return None;
        }
        let rest = &link[self.origin.len()..];
        (rest.is_empty() || rest.starts_with('/')).then_some(rest)
    }
}

fn strip_query(path: &str) -> &str {
    path.split_once('?').map_or(path, |(before, _)| before)
}

// "mailto:", "javascript:", "https:" ...
fn has_scheme(link: &str) -> bool {
    match link.split_once(':') {
        Some((scheme, _)) => {
            let mut chars = scheme.chars();
            chars.next().is_some_and(|c| c.is_ascii_alphabetic())
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

// Collapses ".", ".." and repeated separators the way POSIX path
// normalization does. A trailing '/' survives.
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let trailing = path.ends_with('/');

    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let mut out = parts.join("/");
    if absolute {
        out.insert(0, '/');
    }
    if out.is_empty() {
        out.push('.');
    }
    if trailing && !out.ends_with('/') {
        out.push('/');
    }
    out
}
