// src/crawl/frontier.rs
// =============================================================================
// The crawl frontier: paths waiting to be fetched plus every path ever seen.
//
// How it works:
// 1. The crawl root goes in first, then the configured extra targets
// 2. Each drain round takes up to `parallel` paths from the front
// 3. Scanners push newly discovered paths to the back while a round runs
// 4. The seen set guarantees a path is admitted at most once per run
//
// The frontier is shared by all fetches of a round, so its state sits
// behind a mutex. The lock is never held across an .await.
//
// Rust concepts:
// - VecDeque: FIFO queue, push_back() + pop_front()
// - HashSet: O(1) "have we seen this path?" checks
// - Interior mutability: methods take &self, the Mutex hands out &mut inside
// =============================================================================

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use tracing::debug;

use super::resolve::{Resolution, Scope};

#[derive(Debug, Default)]
struct FrontierState {
    pending: VecDeque<String>,
    seen: HashSet<String>,
}

/// FIFO of pending paths with at-most-once admission
#[derive(Debug, Default)]
pub struct Frontier {
    state: Mutex<FrontierState>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    // Queues `path` unless it was seen before
    //
    // Returns: true if the path was newly added
    pub fn enqueue(&self, path: &str) -> bool {
        let mut state = self.state.lock();
        if !state.seen.insert(path.to_string()) {
            return false;
        }
        state.pending.push_back(path.to_string());
        true
    }

    /// Oldest pending path, if any
    pub fn dequeue(&self) -> Option<String> {
        self.state.lock().pending.pop_front()
    }

    /// Up to `limit` pending paths, oldest first
    pub fn take_batch(&self, limit: usize) -> Vec<String> {
        std::iter::from_fn(|| self.dequeue()).take(limit).collect()
    }

    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Number of paths admitted during this run
    pub fn seen(&self) -> usize {
        self.state.lock().seen.len()
    }
}

/// What scanners get to report links into: the scope to resolve against and
/// the frontier to push accepted paths to.
#[derive(Debug, Clone, Copy)]
pub struct LinkSink<'a> {
    scope: &'a Scope,
    frontier: &'a Frontier,
}

impl<'a> LinkSink<'a> {
    pub fn new(scope: &'a Scope, frontier: &'a Frontier) -> Self {
        Self { scope, frontier }
    }

    // Resolves `link` (found in `current`) and queues it if it is in scope
    //
    // Returns: the canonical path when it was newly queued
    pub fn discover(&self, current: &str, link: &str) -> Option<String> {
        let path = match self.scope.resolve(current, link) {
            Resolution::InScope(path) => path,
            Resolution::Malformed(reason) => {
                debug!("skipped link in {current}: {reason}");
                return None;
            }
            Resolution::External | Resolution::EscapesBase => return None,
        };
        if self.frontier.enqueue(&path) {
            debug!("queued: {path} (from {current})");
            Some(path)
        } else {
            None
        }
    }
}
