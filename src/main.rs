// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Build the effective config (file + flags) and set up logging
// 3. Dispatch to the subcommand handler
// 4. Exit with proper code (0 = clean run, 1 = some resources failed,
//    2 = fatal error)
//
// Rust concepts used:
// - async/await: the mirror run fetches many resources concurrently
// - anyhow::Result at the top, the typed MirrorError below it
// - match: Pattern matching to handle different subcommands
// =============================================================================

mod cli; // src/cli.rs - command-line parsing
mod config; // src/config.rs - options, defaults, validation
mod crawl; // src/crawl/ - link resolution, frontier, orchestrator
mod error; // src/error.rs - fatal errors
mod fetch; // src/fetch/ - conditional GET and local file mapping
mod scan; // src/scan/ - HTML and CSS link scanners
mod store; // src/store/ - metadata records and their JSON file

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use crawl::RunSummary;
use store::Record;

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Returns:
//   Ok(0) = run finished, nothing failed
//   Ok(1) = run finished, some resources answered 404/401/500
//   Err   = fatal error (exit code 2)
async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Mirror(args) => {
            // Read the flag before the args are consumed into a config
            let json = args.json;
            let config = args.into_config()?;
            init_logging(config.verbose);
            handle_mirror(config, json).await
        }
        Commands::Status { json_path, json } => {
            init_logging(false);
            handle_status(&json_path, json).await
        }
    }
}

// RUST_LOG wins; otherwise info, or debug for this crate with --verbose
fn init_logging(verbose: bool) {
    let fallback = if verbose { "site_mirror=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // a subscriber may already be installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

// Handles the 'mirror' subcommand
// Parameters:
//   config: the effective options (file + flags)
//   json: whether to print the summary as JSON
async fn handle_mirror(config: config::MirrorConfig, json: bool) -> Result<i32> {
    // Keep stdout clean for JSON consumers
    if !json {
        println!("🔍 Mirroring: {}", config.url);
        println!("📁 Into: {}", config.local_path.display());
    }

    // Run the whole pass; a fatal error propagates and becomes exit code 2
    let summary = crawl::run(config).await?;

    // Print the summary in the requested format
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    // Recorded failures still mean "something needs attention"
    if summary.failed > 0 {
        Ok(1)
    } else {
        Ok(0)
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("📊 Summary:");
    println!("   🌐 Fetched: {}", summary.fetched);
    println!("   ✅ Saved: {}", summary.saved);
    println!("   💤 Not modified: {}", summary.not_modified);
    println!("   ❌ Failed: {}", summary.failed);
    println!("   📋 Known resources: {}", summary.known);
}

// Handles the 'status' subcommand
async fn handle_status(json_path: &Path, json: bool) -> Result<i32> {
    // A missing file is simply an empty tree
    let tree = store::load(json_path).await?;

    if json {
        // One object per resource: its path plus every record field
        let rows: Vec<StatusRow> = tree
            .records()
            .into_iter()
            .map(|(path, record)| StatusRow { path, record })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if tree.is_empty() {
        println!("⚠️  No resources recorded in {}", json_path.display());
    } else {
        print_table(&tree.records());
    }
    Ok(0)
}

#[derive(serde::Serialize)]
struct StatusRow<'a> {
    path: String,
    #[serde(flatten)]
    record: &'a Record,
}

fn print_table(records: &[(String, &Record)]) {
    println!(
        "{:<50} {:>7} {:>6} {:>6} {:>5}  {}",
        "PATH", "VERSION", "STATUS", "ERRORS", "FILE", "LOCAL"
    );
    println!("{}", "=".repeat(105));

    for (path, record) in records {
        // Truncate long paths so the columns stay aligned
        let path_display = if path.chars().count() > 47 {
            format!("{}...", path.chars().take(47).collect::<String>())
        } else {
            path.clone()
        };
        let fileversion = record
            .fileversion
            .map_or_else(|| "-".to_string(), |v| v.to_string());

        println!(
            "{:<50} {:>7} {:>6} {:>6} {:>5}  {}",
            path_display, record.version, record.status, record.errors, fileversion, record.local
        );
    }

    println!();
    let failing = records.iter().filter(|(_, r)| r.errors > 0).count();
    println!("📊 Summary:");
    println!("   📋 Total: {}", records.len());
    println!("   ❌ Failing: {}", failing);
}
