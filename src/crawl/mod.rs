// src/crawl/mod.rs
// =============================================================================
// This module drives a mirror run.
//
// Features:
// - Resolves every discovered link to a canonical path inside the crawl scope
// - Never admits the same path twice in one run
// - Fetches breadth-first, `parallel` resources per round
// - Carries metadata from the previous run into the next one
//
// Submodules:
// - resolve: link -> canonical in-scope path
// - frontier: pending paths, seen set, the handle scanners report links into
// - mirror: the orchestrator that ties fetcher, frontier and store together
// =============================================================================

mod frontier;
mod mirror;
mod resolve;

pub use frontier::LinkSink;
pub use mirror::{run, RunSummary};

#[cfg(test)]
pub use frontier::Frontier;
#[cfg(test)]
pub use resolve::Scope;
