// src/fetch/mod.rs
// =============================================================================
// Retrieving resources and placing them on disk.
//
// Submodules:
// - http: the conditional-GET fetcher
// - local: resource path -> local file mapping
// =============================================================================

mod http;
mod local;

pub use http::Fetcher;
