// src/scan/html.rs
// =============================================================================
// Finds links in HTML pages and rewrites CDN references before saving.
//
// Two passes, each with the tool that suits it:
// - scraper (read-only DOM + CSS selectors) walks every configured
//   selector/attribute pair and reports the values to the LinkSink
// - lol_html (streaming rewriter) runs only if some attribute value matched
//   remoteMatch, turning "https://cdn/..." into "//cdn/..."
//
// A page with nothing to rewrite is saved byte-for-byte.
// =============================================================================

use lol_html::{element, HtmlRewriter, Settings};
use regex::Regex;
use scraper::{Html, Selector};
use std::borrow::Cow;
use std::collections::BTreeMap;
use tracing::debug;

use crate::crawl::LinkSink;
use crate::error::{MirrorError, Result};

// One configured selector and the attributes to look at
#[derive(Debug)]
struct LinkRule {
    source: String,
    selector: Selector,
    attributes: Vec<String>,
}

#[derive(Debug)]
pub struct HtmlScanner {
    rules: Vec<LinkRule>,
    remote_match: Regex,
}

impl HtmlScanner {
    pub fn new(html_links: &BTreeMap<String, Vec<String>>, remote_match: Regex) -> Result<Self> {
        let rules = html_links
            .iter()
            .map(|(source, attributes)| {
                let selector = Selector::parse(source).map_err(|e| {
                    MirrorError::Config(format!("invalid selector '{source}': {e}"))
                })?;
                Ok(LinkRule {
                    source: source.clone(),
                    selector,
                    attributes: attributes.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules, remote_match })
    }

    // Reports every link of the page and returns the bytes to save
    //
    // Parameters:
    //   current: path of the page (links are resolved against it)
    //   body: raw response body
    //   links: where discovered links go
    pub fn scan<'b>(&self, current: &str, body: &'b [u8], links: LinkSink<'_>) -> Result<Cow<'b, [u8]>> {
        let needs_rewrite = {
            let text = String::from_utf8_lossy(body);
            let document = Html::parse_document(&text);
            let mut needs_rewrite = false;

            for rule in &self.rules {
                for element in document.select(&rule.selector) {
                    for attribute in &rule.attributes {
                        let Some(value) = element.value().attr(attribute) else {
                            continue;
                        };
                        if value.is_empty() {
                            continue;
                        }
                        if let Some(path) = links.discover(current, value) {
                            debug!("scanHTML: {attribute}: {path}");
                        }
                        needs_rewrite |= self.remote_match.is_match(value);
                    }
                }
            }
            needs_rewrite
        };

        if !needs_rewrite {
            return Ok(Cow::Borrowed(body));
        }
        self.rewrite_remote(body)
            .map(Cow::Owned)
            .map_err(|reason| MirrorError::Rewrite {
                path: current.to_string(),
                reason,
            })
    }

    // Streams the page through lol_html, making remote references
    // protocol-relative
    fn rewrite_remote(&self, body: &[u8]) -> std::result::Result<Vec<u8>, String> {
        let handlers = self
            .rules
            .iter()
            .map(|rule| {
                let attributes = &rule.attributes;
                let remote_match = &self.remote_match;
                // selectors were validated when the config was checked
                element!(rule.source.as_str(), move |el| {
                    for attribute in attributes {
                        let Some(value) = el.get_attribute(attribute) else {
                            continue;
                        };
                        if !remote_match.is_match(&value) {
                            continue;
                        }
                        if let Some(relative) = protocol_relative(&value) {
                            el.set_attribute(attribute, &relative)?;
                        }
                    }
                    Ok(())
                })
            })
            .collect();

        let mut output = Vec::with_capacity(body.len());
        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: handlers,
                ..Settings::default()
            },
            |c: &[u8]| output.extend_from_slice(c),
        );
        rewriter.write(body).map_err(|e| e.to_string())?;
        rewriter.end().map_err(|e| e.to_string())?;

        Ok(output)
    }
}

// "https://cdn/x.js" -> "//cdn/x.js"; anything else is left alone
fn protocol_relative(value: &str) -> Option<String> {
    value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))
        .map(|rest| format!("//{rest}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MirrorConfig;
    use crate::crawl::{Frontier, Scope};

    // matches nothing a scanner ever looks at
    const NEVER_REMOTE: &str = "^$";

    fn scanner(remote: &str) -> HtmlScanner {
        let config = MirrorConfig::new("https://example.com/site/");
        HtmlScanner::new(&config.html_links, Regex::new(remote).unwrap()).unwrap()
    }

    fn drain(frontier: &Frontier) -> Vec<String> {
        std::iter::from_fn(|| frontier.dequeue()).collect()
    }

    #[test]
    fn test_collects_configured_links() {
        let scope = Scope::from_root("https://example.com/site/").unwrap();
        let frontier = Frontier::new();
        let html = br#"<html><head>
            <link rel="stylesheet" href="/site/style.css">
            <meta property="og:image" content="img/card.png">
            <script src="js/app.js"></script>
        </head><body>
            <a href="about/">About</a>
            <a href="about/#team">Team</a>
            <a href="https://other.example/">Elsewhere</a>
            <a href="">Nothing</a>
            <img src="logo.png" data-original="logo@2x.png">
        </body></html>"#;

        let out = scanner(NEVER_REMOTE)
            .scan("/site/", html, LinkSink::new(&scope, &frontier))
            .unwrap();

        assert!(matches!(out, Cow::Borrowed(_)));
        let mut queued = drain(&frontier);
        queued.sort();
        assert_eq!(
            queued,
            vec![
                "/site/about/",
                "/site/img/card.png",
                "/site/js/app.js",
                "/site/logo.png",
                "/site/logo@2x.png",
                "/site/style.css",
            ]
        );
    }

    #[test]
    fn test_rewrites_remote_matches_to_protocol_relative() {
        let scope = Scope::from_root("https://example.com/site/").unwrap();
        let frontier = Frontier::new();
        let html = br#"<html><head>
            <script src="https://cdn.example/x.js"></script>
            <script src="https://elsewhere.example/y.js"></script>
        </head><body></body></html>"#;

        let out = scanner(r"cdn\.example")
            .scan("/site/", html, LinkSink::new(&scope, &frontier))
            .unwrap();
        let out = String::from_utf8(out.into_owned()).unwrap();

        assert!(out.contains(r#"src="//cdn.example/x.js""#));
        assert!(out.contains(r#"src="https://elsewhere.example/y.js""#));
        assert!(drain(&frontier).is_empty());
    }

    #[test]
    fn test_protocol_relative() {
        assert_eq!(protocol_relative("http://a/b").as_deref(), Some("//a/b"));
        assert_eq!(protocol_relative("https://a/b").as_deref(), Some("//a/b"));
        assert_eq!(protocol_relative("//a/b"), None);
    }
}
