// src/store/record.rs
// =============================================================================
// The per-resource metadata record and how it evolves from run to run.
//
// Every fetch attempt produces a new record derived from the previous run's
// record (if any):
// - version counts attempts, whatever the status
// - fileversion counts saved bodies, so it only moves on 200
// - errors counts consecutive 404/401/500 outcomes and resets on 200
//
// Rust concepts:
// - serde attributes: rename fields to the JSON names and skip empty options
// - #[serde(flatten)]: the cached headers sit next to the other fields in JSON
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One resource's bookkeeping, as stored in the metadata file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fileversion: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fileupdated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub errors: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    #[serde(flatten)]
    pub headers: CachedHeaders,
    /// File location relative to the mirror root
    #[serde(default)]
    pub local: String,
}

/// Response headers worth remembering between runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedHeaders {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(
        rename = "content-type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub content_type: Option<String>,
    #[serde(
        rename = "content-length",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub content_length: Option<String>,
    #[serde(
        rename = "cache-control",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cache_control: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl CachedHeaders {
    /// Lower-case header names that get copied from a response
    pub const NAMES: [&'static str; 5] = [
        "date",
        "content-type",
        "content-length",
        "cache-control",
        "etag",
    ];

    // Stores a header value by name. Names outside NAMES are ignored.
    pub fn set(&mut self, name: &str, value: &str) {
        let slot = match name {
            "date" => &mut self.date,
            "content-type" => &mut self.content_type,
            "content-length" => &mut self.content_length,
            "cache-control" => &mut self.cache_control,
            "etag" => &mut self.etag,
            _ => return,
        };
        *slot = Some(value.to_string());
    }
}

impl Record {
    // Starts the record for a new fetch attempt
    //
    // With a previous record: copy it, bump version, refresh `updated`.
    // Without one: version 1, `created` now, no errors yet.
    // Either way `local` and `status` describe this attempt.
    pub fn next_attempt(
        previous: Option<&Record>,
        local: String,
        status: u16,
        now: DateTime<Utc>,
    ) -> Record {
        let mut record = match previous {
            Some(previous) => Record {
                version: previous.version + 1,
                updated: Some(now),
                ..previous.clone()
            },
            None => Record {
                version: 1,
                created: Some(now),
                updated: None,
                fileversion: None,
                fileupdated: None,
                status,
                errors: 0,
                length: None,
                headers: CachedHeaders::default(),
                local: String::new(),
            },
        };
        record.local = local;
        record.status = status;
        record
    }

    /// The body was saved (200): new file version, error streak over
    pub fn mark_saved(&mut self, now: DateTime<Utc>, length: u64) {
        self.fileversion = Some(self.fileversion.unwrap_or(0) + 1);
        self.fileupdated = Some(now);
        self.length = Some(length);
        self.errors = 0;
    }

    /// A recorded failure (404/401/500): extend the error streak
    pub fn mark_failed(&mut self) {
        self.errors += 1;
    }
}
