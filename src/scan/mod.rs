// src/scan/mod.rs
// =============================================================================
// Content scanners: find further links in a fetched body and decide what
// bytes end up on disk.
//
// Submodules:
// - html: selector/attribute driven link discovery + CDN rewriting
// - css: url(...) discovery
//
// Scanners only ever add to the frontier through a LinkSink; they never
// fetch anything themselves.
// =============================================================================

mod css;
mod html;

pub use css::CssScanner;
pub use html::HtmlScanner;

use regex::Regex;
use std::borrow::Cow;

use crate::config::MirrorConfig;
use crate::crawl::LinkSink;
use crate::error::Result;

/// Which scanner a body goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Css,
    /// Saved verbatim, never scanned
    Other,
}

impl ContentKind {
    // Classifies a Content-Type header value
    //
    // Parameters are dropped: "text/html; charset=utf-8" -> Html
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let mime = content_type
            .unwrap_or_default()
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "text/html" => ContentKind::Html,
            "text/css" => ContentKind::Css,
            _ => ContentKind::Other,
        }
    }
}

/// Both scanners, built once per run
#[derive(Debug)]
pub struct Scanner {
    html: HtmlScanner,
    css: CssScanner,
}

impl Scanner {
    pub fn new(config: &MirrorConfig, remote_match: Regex) -> Result<Self> {
        Ok(Self {
            html: HtmlScanner::new(&config.html_links, remote_match)?,
            css: CssScanner::new()?,
        })
    }

    /// Scans `body` of the resource at `current`; returns the bytes to save
    pub fn scan<'b>(
        &self,
        kind: ContentKind,
        current: &str,
        body: &'b [u8],
        links: LinkSink<'_>,
    ) -> Result<Cow<'b, [u8]>> {
        match kind {
            ContentKind::Html => self.html.scan(current, body, links),
            ContentKind::Css => {
                self.css.scan(current, body, links);
                Ok(Cow::Borrowed(body))
            }
            ContentKind::Other => Ok(Cow::Borrowed(body)),
        }
    }
}
