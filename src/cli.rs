// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Two subcommands:
// - mirror: run one incremental mirror pass over a site
// - status: show what the metadata file knows about each resource
//
// Every `mirror` flag is optional except the URL. Flags that are given win
// over the values of a --config file; see `MirrorArgs::apply`.
//
// Rust concepts:
// - Derive macros: clap generates the parser from the struct definitions
// - Option<T>: "flag was not given" is None, so it can't clobber the file
// - Vec<T> + ArgAction::Append: repeatable flags
// =============================================================================

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};

#[derive(Parser, Debug)]
#[command(
    name = "site-mirror",
    version,
    about = "Incrementally mirror a website to a local directory",
    long_about = "site-mirror crawls everything below a root URL, saves each resource to disk \
                  and remembers per-resource metadata so the next run only downloads what changed."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mirror a site into a local directory
    ///
    /// Example: site-mirror mirror https://example.com/docs/ --parallel 4
    Mirror(MirrorArgs),

    /// Show the resources recorded in a metadata file
    ///
    /// Example: site-mirror status --json-path mirror.json --json
    Status {
        /// Metadata file written by a previous mirror run
        #[arg(long, default_value = "mirror.json")]
        json_path: PathBuf,

        /// Output records in JSON format instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct MirrorArgs {
    /// Root URL; only resources below its path are mirrored
    pub url: String,

    /// JSON config file (camelCase keys); flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory the mirrored files are written to
    #[arg(long)]
    pub local_path: Option<PathBuf>,

    /// Metadata file carried from one run to the next
    #[arg(long)]
    pub json_path: Option<PathBuf>,

    /// How many resources are fetched together
    #[arg(long)]
    pub parallel: Option<usize>,

    /// Never send If-Modified-Since / If-None-Match
    #[arg(long = "no-304")]
    pub no_304: bool,

    #[arg(long)]
    pub user_agent: Option<String>,

    /// Extra request header, "Name: value" (repeatable)
    #[arg(long = "header", action = ArgAction::Append)]
    pub headers: Vec<String>,

    /// Path below the root that is always fetched (repeatable)
    ///
    /// Replaces the default list (/robots.txt, /sitemap.xml) when given.
    #[arg(long = "additional-target", action = ArgAction::Append)]
    pub additional_targets: Vec<String>,

    /// Link rule "selector=attr,attr" (repeatable)
    ///
    /// Example: --html-link 'img=src,data-src'
    #[arg(long = "html-link", action = ArgAction::Append)]
    pub html_links: Vec<String>,

    /// Regex for references that stay remote (made protocol-relative)
    #[arg(long)]
    pub remote_match: Option<String>,

    /// Debug logging for this crate (RUST_LOG still wins)
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the run summary in JSON format instead of text
    #[arg(long)]
    pub json: bool,
}

impl MirrorArgs {
    // Builds the effective config: file (or defaults), then flags on top
    pub fn into_config(self) -> Result<MirrorConfig> {
        // The positional URL always wins over a "url" key in the file
        let mut config = match &self.config {
            Some(path) => MirrorConfig {
                url: self.url.clone(),
                ..MirrorConfig::from_file(path)?
            },
            None => MirrorConfig::new(self.url.clone()),
        };
        self.apply(&mut config)?;
        Ok(config)
    }

    fn apply(self, config: &mut MirrorConfig) -> Result<()> {
        if let Some(local_path) = self.local_path {
            config.local_path = local_path;
        }
        if let Some(json_path) = self.json_path {
            config.json_path = json_path;
        }
        if let Some(parallel) = self.parallel {
            config.parallel = parallel;
        }
        if self.no_304 {
            config.try_304 = false;
        }
        if let Some(user_agent) = self.user_agent {
            config.user_agent = user_agent;
        }
        for header in &self.headers {
            let (name, value) = parse_header(header)?;
            config.headers.insert(name, value);
        }
        if !self.additional_targets.is_empty() {
            config.additional_targets = self.additional_targets;
        }
        for rule in &self.html_links {
            let (selector, attributes) = parse_html_link(rule)?;
            config.html_links.insert(selector, attributes);
        }
        if let Some(remote_match) = self.remote_match {
            config.remote_match = remote_match;
        }
        config.verbose |= self.verbose;
        Ok(())
    }
}

// "X-Token: abc" -> ("X-Token", "abc")
fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| MirrorError::Config(format!("header '{raw}' is not 'Name: value'")))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

// "img=src,data-src" -> ("img", ["src", "data-src"])
fn parse_html_link(raw: &str) -> Result<(String, Vec<String>)> {
    let (selector, attributes) = raw.rsplit_once('=').ok_or_else(|| {
        MirrorError::Config(format!("html link '{raw}' is not 'selector=attr,attr'"))
    })?;
    let attributes: Vec<String> = attributes
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(String::from)
        .collect();
    if selector.trim().is_empty() || attributes.is_empty() {
        return Err(MirrorError::Config(format!(
            "html link '{raw}' needs a selector and at least one attribute"
        )));
    }
    Ok((selector.trim().to_string(), attributes))
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why Option<usize> for --parallel instead of a default_value_t?
//    - With a clap default we could not tell "user typed --parallel 2" apart
//      from "flag missing", and the flag would always overwrite the file
//
// 2. What does ArgAction::Append do?
//    - Each occurrence of the flag pushes one more value into the Vec
//    - --header 'A: 1' --header 'B: 2' -> vec!["A: 1", "B: 2"]
//
// 3. Why rsplit_once('=') for html links?
//    - Selectors may contain '=' themselves: meta[property='og:image']=content
//    - Splitting at the LAST '=' keeps the selector intact
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> MirrorArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Mirror(args) => args,
            other => panic!("expected mirror, got {other:?}"),
        }
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = parse(&[
            "site-mirror",
            "mirror",
            "https://example.com/docs/",
            "--parallel",
            "5",
            "--no-304",
            "--header",
            "X-Token: abc",
            "--html-link",
            "meta[property='og:image']=content",
            "--additional-target",
            "/feed.xml",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.url, "https://example.com/docs/");
        assert_eq!(config.parallel, 5);
        assert!(!config.try_304);
        assert_eq!(config.headers.get("X-Token").map(String::as_str), Some("abc"));
        assert_eq!(
            config.html_links.get("meta[property='og:image']"),
            Some(&vec!["content".to_string()])
        );
        assert_eq!(config.additional_targets, vec!["/feed.xml"]);
    }

    #[test]
    fn test_missing_flags_keep_defaults() {
        let config = parse(&["site-mirror", "mirror", "https://example.com/"])
            .into_config()
            .unwrap();
        assert_eq!(config.parallel, 2);
        assert!(config.try_304);
        assert_eq!(config.additional_targets, vec!["/robots.txt", "/sitemap.xml"]);
    }

    #[test]
    fn test_config_file_then_flags() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("mirror.config.json");
        std::fs::write(&file, r#"{ "parallel": 7, "localPath": "out", "try304": false }"#).unwrap();

        let config = parse(&[
            "site-mirror",
            "mirror",
            "https://example.com/",
            "--config",
            file.to_str().unwrap(),
            "--local-path",
            "elsewhere",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.parallel, 7);
        assert!(!config.try_304);
        assert_eq!(config.local_path, PathBuf::from("elsewhere"));
    }

    #[test]
    fn test_file_url_is_overridden() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("mirror.config.json");
        std::fs::write(&file, r#"{ "url": "https://old.example/" }"#).unwrap();

        let args = parse(&[
            "site-mirror",
            "mirror",
            "https://example.com/",
            "--config",
            file.to_str().unwrap(),
            "--json",
        ]);
        assert!(args.json);
        assert_eq!(args.into_config().unwrap().url, "https://example.com/");
    }

    #[test]
    fn test_bad_header_rejected() {
        let result = parse(&["site-mirror", "mirror", "https://example.com/", "--header", "nocolon"])
            .into_config();
        assert!(matches!(result, Err(MirrorError::Config(_))));
    }

    #[test]
    fn test_status_defaults() {
        let cli = Cli::try_parse_from(["site-mirror", "status"]).unwrap();
        match cli.command {
            Commands::Status { json_path, json } => {
                assert_eq!(json_path, PathBuf::from("mirror.json"));
                assert!(!json);
            }
            other => panic!("expected status, got {other:?}"),
        }
    }
}
