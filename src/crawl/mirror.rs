// src/crawl/mirror.rs
// =============================================================================
// Runs one mirror pass over a site, breadth-first.
//
// How it works:
// 1. Load the previous run's metadata tree (empty on the first run)
// 2. Seed the frontier with the base path and the additional targets
// 3. Take up to `parallel` paths, fetch them together, merge each record
//    into the new tree as soon as its fetch finishes
// 4. Links found by the scanners land in the frontier and are picked up by
//    later rounds
// 5. A round that takes nothing ends the crawl; the new tree is persisted
//
// A fatal error in any fetch ends the run immediately. The new tree is then
// NOT written, so the previous metadata file stays as it was.
//
// Rust concepts:
// - FuturesUnordered: a set of futures polled together, yielding results in
//   completion order
// - `?` inside the loop: the first fatal error returns from the whole run
// =============================================================================

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tracing::{debug, info};

use super::frontier::{Frontier, LinkSink};
use super::resolve::Scope;
use crate::config::MirrorConfig;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::scan::Scanner;
use crate::store::{self, MetadataTree, Record};

/// Counts for one completed run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Fetch attempts that produced a record
    pub fetched: usize,
    /// 200 responses written to disk
    pub saved: usize,
    /// 304 responses
    pub not_modified: usize,
    /// 404 / 401 / 500 responses
    pub failed: usize,
    /// Records in the persisted tree
    pub known: usize,
}

impl RunSummary {
    fn observe(&mut self, record: &Record) {
        self.fetched += 1;
        match record.status {
            200 => self.saved += 1,
            304 => self.not_modified += 1,
            _ => self.failed += 1,
        }
    }
}

/// One mirror session: scope, frontier and fetcher for a single run
pub struct Mirror {
    config: MirrorConfig,
    scope: Scope,
    frontier: Frontier,
    fetcher: Fetcher,
}

impl Mirror {
    // Validates the config and prepares the session
    //
    // Nothing touches the network or the disk yet.
    pub fn new(config: MirrorConfig) -> Result<Self> {
        let remote_match = config.validate()?;
        let scope = Scope::from_root(&config.url)?;
        let scanner = Scanner::new(&config, remote_match)?;
        let fetcher = Fetcher::new(&config, scope.origin(), scanner)?;

        let mirror = Self {
            config,
            scope,
            frontier: Frontier::new(),
            fetcher,
        };
        mirror.seed();
        Ok(mirror)
    }

    // Base path first, then the additional targets (relative to the base)
    fn seed(&self) {
        let base = self.scope.base_path();
        self.frontier.enqueue(base);

        let sink = LinkSink::new(&self.scope, &self.frontier);
        for target in &self.config.additional_targets {
            sink.discover(base, target.trim_start_matches('/'));
        }
    }

    /// Runs the whole pass and persists the new metadata tree
    pub async fn run(self) -> Result<RunSummary> {
        let previous = store::load(&self.config.json_path).await?;
        info!(
            "mirroring {}{} into {} ({} known resources)",
            self.scope.origin(),
            self.scope.base_path(),
            self.config.local_path.display(),
            previous.len()
        );

        let (tree, mut summary) = self.drain(&previous).await?;
        summary.known = tree.len();

        store::save(&self.config.json_path, &tree).await?;
        Ok(summary)
    }

    // Fetches rounds of up to `parallel` paths until the frontier is empty
    async fn drain(&self, previous: &MetadataTree) -> Result<(MetadataTree, RunSummary)> {
        let mut tree = MetadataTree::new();
        let mut summary = RunSummary::default();
        let sink = LinkSink::new(&self.scope, &self.frontier);

        loop {
            // Take the next round; an empty round means the crawl is done
            let batch = self.frontier.take_batch(self.config.parallel);
            if batch.is_empty() {
                break;
            }
            debug!(
                "round of {} ({} pending, {} seen)",
                batch.len(),
                self.frontier.pending(),
                self.frontier.seen()
            );

            // Start every fetch of the round at once
            // Each one looks up its own previous record and reports links to the sink
            let mut in_flight: FuturesUnordered<_> = batch
                .into_iter()
                .map(|path| async move {
                    let record = self.fetcher.fetch(&path, previous.get(&path), sink).await?;
                    Ok::<_, crate::error::MirrorError>((path, record))
                })
                .collect();

            // Merge records as they complete; the first fatal error ends the run
            while let Some(outcome) = in_flight.next().await {
                let (path, record) = outcome?;
                summary.observe(&record);
                tree.set(&path, record);
            }

            // Pages that moved into a directory this round keep pointing at their file
            for (from, to) in self.fetcher.take_moves() {
                tree.relocate(&from, &to);
            }
        }

        Ok((tree, summary))
    }
}

/// Convenience: build the session and run it
pub async fn run(config: MirrorConfig) -> Result<RunSummary> {
    Mirror::new(config)?.run().await
}
