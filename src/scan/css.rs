// src/scan/css.rs
// =============================================================================
// Finds url(...) references in stylesheets.
//
// Handles all three spellings:
//   url(img/bg.png)   url('img/bg.png')   url("img/bg.png")
//
// The stylesheet itself is never modified.
// =============================================================================

use regex::Regex;
use tracing::debug;

use crate::crawl::LinkSink;
use crate::error::{MirrorError, Result};

#[derive(Debug)]
pub struct CssScanner {
    url_ref: Regex,
}

impl CssScanner {
    pub fn new() -> Result<Self> {
        let url_ref = Regex::new(r"(?i)\burl\s*\(([^)]+)")
            .map_err(|e| MirrorError::Config(format!("css url pattern: {e}")))?;
        Ok(Self { url_ref })
    }

    /// Reports every url(...) reference of the stylesheet to `links`
    pub fn scan(&self, current: &str, body: &[u8], links: LinkSink<'_>) {
        let text = String::from_utf8_lossy(body);
        for capture in self.url_ref.captures_iter(&text) {
            let reference = unquote(capture[1].trim());
            if let Some(path) = links.discover(current, reference) {
                debug!("scanCSS: url: {path}");
            }
        }
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::{Frontier, Scope};

    #[test]
    fn test_finds_all_url_spellings() {
        let scope = Scope::from_root("https://example.com/site/").unwrap();
        let frontier = Frontier::new();
        let css = br#"
            body { background: url(img/bg.png) }
            @font-face { src: url( "../fonts/a.woff2" ) format("woff2"); }
            .logo { background-image: URL('logo.svg'); }
            .x { background: url('/site/img/bg.png'); }
            .y { background: url(data:image/png;base64,AAAA); }
            .z { background: url(https://cdn.example/z.png); }
        "#;

        CssScanner::new()
            .unwrap()
            .scan("/site/css/main.css", css, LinkSink::new(&scope, &frontier));

        let queued: Vec<String> = std::iter::from_fn(|| frontier.dequeue()).collect();
        assert_eq!(
            queued,
            vec![
                "/site/css/img/bg.png",
                "/site/fonts/a.woff2",
                "/site/css/logo.svg",
                "/site/img/bg.png",
            ]
        );
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("'a.png'"), "a.png");
        assert_eq!(unquote("\"a.png\""), "a.png");
        assert_eq!(unquote("a.png"), "a.png");
        assert_eq!(unquote("'a.png\""), "'a.png\"");
    }
}
