// src/fetch/http.rs
// =============================================================================
// Fetches one resource and turns the response into its next metadata record.
//
// Key functionality:
// - Conditional GET: If-Modified-Since / If-None-Match from the previous run,
//   but only when the previously saved file is still on disk
// - Status dispatch:
//     200           -> scan, save, bump fileversion
//     304           -> nothing to save
//     404, 401, 500 -> recorded, errors + 1, the run goes on
//     anything else -> fatal
// - At most one file write per call, and only on 200
// - Where the file lands on disk is up to LocalPaths
//
// Rust concepts:
// - async/await: the request, the saved-copy probe and the write all suspend
// - match on StatusCode constants
// =============================================================================

use chrono::Utc;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, IF_MODIFIED_SINCE, IF_NONE_MATCH,
};
use reqwest::{Client, StatusCode};
use tracing::{debug, info};

use super::local::LocalPaths;
use crate::config::MirrorConfig;
use crate::crawl::LinkSink;
use crate::error::{MirrorError, Result};
use crate::scan::{ContentKind, Scanner};
use crate::store::{CachedHeaders, Record};

pub struct Fetcher {
    client: Client,
    origin: String,
    try_304: bool,
    local: LocalPaths,
    scanner: Scanner,
}

impl Fetcher {
    // Creates the fetcher and its HTTP client
    //
    // We reuse one client for all requests (connection pooling).
    // gzip/deflate responses are decompressed transparently.
    pub fn new(config: &MirrorConfig, origin: &str, scanner: Scanner) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| MirrorError::Config(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| MirrorError::Config(format!("invalid header value: {e}")))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(MirrorError::Client)?;

        Ok(Self {
            client,
            origin: origin.to_string(),
            try_304: config.try_304,
            local: LocalPaths::new(config.local_path.clone(), config.filename.clone()),
            scanner,
        })
    }

    // Absolute URL for a resource path
    fn target_url(&self, resource: &str) -> String {
        if resource.starts_with('/') {
            format!("{}{}", self.origin, resource)
        } else {
            resource.to_string()
        }
    }

    // Fetches `resource` and returns its new record
    //
    // Parameters:
    //   resource: canonical path (or absolute URL)
    //   previous: the record from the previous run, if the path was visited
    //   links: where the scanner reports discovered links
    //
    // Returns: the record for this attempt, or a fatal error
    pub async fn fetch(
        &self,
        resource: &str,
        previous: Option<&Record>,
        links: LinkSink<'_>,
    ) -> Result<Record> {
        let url = self.target_url(resource);
        let local_file = self.local.file_for(resource);

        // Find the copy saved by an earlier run (it may have moved into a
        // directory of the same name since)
        let saved_copy = self.local.existing(&local_file).await;

        // Ask "has it changed?" only if we still hold what we would keep
        let mut request = self.client.get(&url);
        if let Some(previous) = previous.filter(|_| self.try_304) {
            if saved_copy.is_some() {
                if let Some(date) = &previous.headers.date {
                    request = request.header(IF_MODIFIED_SINCE, date);
                }
                if let Some(etag) = &previous.headers.etag {
                    request = request.header(IF_NONE_MATCH, etag);
                }
            }
        }

        // Send the request; failing to get any response at all is fatal
        debug!("fetch: {url}");
        let response = request
            .send()
            .await
            .map_err(|source| MirrorError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        info!("{url} -> {}", status.as_u16());

        // Start the new record from the previous one (or from scratch)
        let now = Utc::now();
        let mut record = Record::next_attempt(
            previous,
            self.local
                .relative(saved_copy.as_deref().unwrap_or(local_file.as_path())),
            status.as_u16(),
            now,
        );

        // Remember the headers the next run needs; absent ones keep their
        // previous value
        for name in CachedHeaders::NAMES {
            if let Some(value) = response.headers().get(name).and_then(|v| v.to_str().ok()) {
                record.headers.set(name, value);
            }
        }

        match status {
            // Fresh content: scan it, save it, then report the record
            StatusCode::OK => {
                let kind = ContentKind::from_content_type(
                    response
                        .headers()
                        .get(CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok()),
                );
                let body = response
                    .bytes()
                    .await
                    .map_err(|source| MirrorError::Transport {
                        url: url.clone(),
                        source,
                    })?;
                record.mark_saved(now, body.len() as u64);

                // The scanner queues links and hands back the bytes to keep
                let output = self.scanner.scan(kind, resource, &body, links)?;
                let written = self
                    .local
                    .write(&local_file, &output)
                    .await
                    .map_err(|source| MirrorError::Write {
                        path: local_file.clone(),
                        source,
                    })?;
                debug!("saved: {}", written.display());

                record.local = self.local.relative(&written);
                Ok(record)
            }

            // Unchanged: the saved copy stays as it is
            StatusCode::NOT_MODIFIED => Ok(record),

            // Recorded failures: count them and keep crawling
            StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED | StatusCode::INTERNAL_SERVER_ERROR => {
                record.mark_failed();
                Ok(record)
            }

            // Anything else stops the whole run
            other => Err(MirrorError::UnexpectedStatus {
                url,
                status: other.as_u16(),
            }),
        }
    }

    /// Saved pages that were moved into a directory of the same name,
    /// as (old, new) paths relative to the mirror root
    pub fn take_moves(&self) -> Vec<(String, String)> {
        self.local.take_moves()
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What does Option::filter do?
//    - Some(x).filter(f) stays Some(x) only if f(&x) returns true
//    - previous.filter(|_| self.try_304) drops the previous record when
//      conditional requests are switched off
//
// 2. Can you match on StatusCode constants?
//    - Yes: StatusCode::OK and friends are associated consts, so they work
//      as patterns, and `other` catches everything else
//
// 3. What is Bytes?
//    - reqwest hands the body back as bytes::Bytes, a cheaply cloneable
//      buffer; &body derefs to &[u8], which is all the scanners need
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::{Frontier, Scope};
    use mockito::Server;
    use tempfile::TempDir;

    struct Harness {
        fetcher: Fetcher,
        scope: Scope,
        frontier: Frontier,
        dir: TempDir,
    }

    fn harness(server_url: &str) -> Harness {
        harness_with(server_url, |_| {})
    }

    fn harness_with(server_url: &str, adjust: impl FnOnce(&mut MirrorConfig)) -> Harness {
        let dir = TempDir::new().unwrap();
        let mut config = MirrorConfig::new(format!("{server_url}/site/"));
        config.local_path = dir.path().join("mirror");
        adjust(&mut config);
        let remote = config.validate().unwrap();
        let scope = Scope::from_root(&config.url).unwrap();
        let scanner = Scanner::new(&config, remote).unwrap();
        Harness {
            fetcher: Fetcher::new(&config, scope.origin(), scanner).unwrap(),
            scope,
            frontier: Frontier::new(),
            dir,
        }
    }

    #[tokio::test]
    async fn test_200_saves_and_scans() {
        let mut server = Server::new_async().await;
        let _page = server
            .mock("GET", "/site/")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_header("etag", "\"v1\"")
            .with_body(r#"<a href="next.html">next</a>"#)
            .create_async()
            .await;

        let h = harness(&server.url());
        let record = h
            .fetcher
            .fetch("/site/", None, LinkSink::new(&h.scope, &h.frontier))
            .await
            .unwrap();

        assert_eq!(record.status, 200);
        assert_eq!(record.version, 1);
        assert_eq!(record.fileversion, Some(1));
        assert_eq!(record.headers.etag.as_deref(), Some("\"v1\""));
        assert_eq!(record.local, "site/index.html");
        assert_eq!(h.frontier.dequeue().as_deref(), Some("/site/next.html"));

        let saved = std::fs::read(h.dir.path().join("mirror/site/index.html")).unwrap();
        assert_eq!(saved, br#"<a href="next.html">next</a>"#);
    }

    #[tokio::test]
    async fn test_404_is_recorded_not_fatal() {
        let mut server = Server::new_async().await;
        let _missing = server
            .mock("GET", "/site/gone.html")
            .with_status(404)
            .create_async()
            .await;

        let h = harness(&server.url());
        let record = h
            .fetcher
            .fetch("/site/gone.html", None, LinkSink::new(&h.scope, &h.frontier))
            .await
            .unwrap();

        assert_eq!(record.status, 404);
        assert_eq!(record.errors, 1);
        assert_eq!(record.fileversion, None);
        assert!(!h.dir.path().join("mirror/site/gone.html").exists());
    }

    #[tokio::test]
    async fn test_401_and_500_are_recorded_not_fatal() {
        let mut server = Server::new_async().await;
        let h = harness(&server.url());

        for (status, path) in [(401, "/site/private.html"), (500, "/site/broken.html")] {
            let _failing = server
                .mock("GET", path)
                .with_status(status)
                .with_body("nope")
                .create_async()
                .await;

            let previous = Record::next_attempt(None, String::new(), 404, Utc::now());
            let record = h
                .fetcher
                .fetch(path, Some(&previous), LinkSink::new(&h.scope, &h.frontier))
                .await
                .unwrap();

            assert_eq!(record.status, status as u16);
            assert_eq!(record.errors, previous.errors + 1);
            assert_eq!(record.fileversion, None);
            let file = h.dir.path().join("mirror").join(path.trim_start_matches('/'));
            assert!(!file.exists(), "{path} must not be written");
        }
    }

    #[tokio::test]
    async fn test_unexpected_status_is_fatal() {
        let mut server = Server::new_async().await;
        let _busy = server
            .mock("GET", "/site/")
            .with_status(503)
            .create_async()
            .await;

        let h = harness(&server.url());
        let err = h
            .fetcher
            .fetch("/site/", None, LinkSink::new(&h.scope, &h.frontier))
            .await
            .unwrap_err();

        assert!(matches!(err, MirrorError::UnexpectedStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_no_conditional_headers_without_local_copy() {
        let mut server = Server::new_async().await;
        let plain = server
            .mock("GET", "/site/a.css")
            .match_header("if-none-match", mockito::Matcher::Missing)
            .with_status(200)
            .with_header("content-type", "text/css")
            .with_body("a{}")
            .create_async()
            .await;

        let h = harness(&server.url());
        let mut previous = Record::next_attempt(None, "site/a.css".to_string(), 200, Utc::now());
        previous.headers.etag = Some("\"old\"".to_string());

        let record = h
            .fetcher
            .fetch("/site/a.css", Some(&previous), LinkSink::new(&h.scope, &h.frontier))
            .await
            .unwrap();

        plain.assert_async().await;
        assert_eq!(record.version, 2);
    }

    // a previous record with both validators and a saved copy on disk
    fn saved_before(h: &Harness, resource: &str, local: &str) -> Record {
        let file = h.dir.path().join("mirror").join(local);
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "a{}").unwrap();

        let mut previous = Record::next_attempt(None, local.to_string(), 200, Utc::now());
        previous.mark_saved(Utc::now(), 3);
        previous.headers.etag = Some("\"old\"".to_string());
        previous.headers.date = Some("Wed, 01 May 2024 10:00:00 GMT".to_string());
        assert!(h.fetcher.local.file_for(resource).exists());
        previous
    }

    #[tokio::test]
    async fn test_conditional_headers_with_saved_copy() {
        let mut server = Server::new_async().await;
        let unchanged = server
            .mock("GET", "/site/a.css")
            .match_header("if-none-match", "\"old\"")
            .match_header("if-modified-since", "Wed, 01 May 2024 10:00:00 GMT")
            .with_status(304)
            .expect(1)
            .create_async()
            .await;

        let h = harness(&server.url());
        let previous = saved_before(&h, "/site/a.css", "site/a.css");
        let record = h
            .fetcher
            .fetch("/site/a.css", Some(&previous), LinkSink::new(&h.scope, &h.frontier))
            .await
            .unwrap();

        unchanged.assert_async().await;
        assert_eq!(record.status, 304);
        assert_eq!(record.fileversion, previous.fileversion);
        assert_eq!(record.length, previous.length);
    }

    #[tokio::test]
    async fn test_no_conditional_headers_when_try_304_is_off() {
        let mut server = Server::new_async().await;
        let plain = server
            .mock("GET", "/site/a.css")
            .match_header("if-none-match", mockito::Matcher::Missing)
            .match_header("if-modified-since", mockito::Matcher::Missing)
            .with_status(200)
            .with_header("content-type", "text/css")
            .with_body("b{}")
            .expect(1)
            .create_async()
            .await;

        let h = harness_with(&server.url(), |config| config.try_304 = false);
        let previous = saved_before(&h, "/site/a.css", "site/a.css");
        let record = h
            .fetcher
            .fetch("/site/a.css", Some(&previous), LinkSink::new(&h.scope, &h.frontier))
            .await
            .unwrap();

        plain.assert_async().await;
        assert_eq!(record.fileversion, Some(2));
        let saved = std::fs::read_to_string(h.dir.path().join("mirror/site/a.css")).unwrap();
        assert_eq!(saved, "b{}");
    }

    #[tokio::test]
    async fn test_transport_error_names_url() {
        // nothing listens on port 9 locally
        let h = harness("http://127.0.0.1:9");
        let err = h
            .fetcher
            .fetch("/site/", None, LinkSink::new(&h.scope, &h.frontier))
            .await
            .unwrap_err();

        assert!(matches!(err, MirrorError::Transport { .. }));
        assert!(err.to_string().contains("http://127.0.0.1:9/site/"));
    }
}
