// src/store/tree.rs
// =============================================================================
// A sparse trie of metadata records keyed by path segments.
//
// On the web a path can be a file and a directory at the same time:
// "/docs" may have content while "/docs/intro" has content too. So every node
// carries an optional record AND an optional set of children.
//
// JSON shape (kept compatible with existing metadata files):
//   node     = [record-or-null]              (no children)
//            | [record-or-null, {children}]  (children present)
//   children = { "/segment": node, ... }
// An empty tree is `[null]`.
// =============================================================================

use serde::de::{self, IgnoredAny, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use super::record::Record;

/// One trie node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    pub record: Option<Record>,
    pub children: Option<BTreeMap<String, Node>>,
}

/// All records of one run, addressed by resource path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataTree {
    root: Node,
}

// Splits "/site/a/" into the keys "/site", "/a", "/"
fn segment_keys(path: &str) -> impl Iterator<Item = String> + '_ {
    path.strip_prefix('/')
        .unwrap_or(path)
        .split('/')
        .map(|segment| format!("/{segment}"))
}

impl MetadataTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for `path`, or None if the path was never visited
    pub fn get(&self, path: &str) -> Option<&Record> {
        let mut node = &self.root;
        for key in segment_keys(path) {
            node = node.children.as_ref()?.get(&key)?;
        }
        node.record.as_ref()
    }

    /// Stores `record` at `path`, creating intermediate nodes as needed
    pub fn set(&mut self, path: &str, record: Record) {
        let mut node = &mut self.root;
        for key in segment_keys(path) {
            node = node
                .children
                .get_or_insert_with(BTreeMap::new)
                .entry(key)
                .or_default();
        }
        node.record = Some(record);
    }

    /// Number of records in the tree
    pub fn len(&self) -> usize {
        fn count(node: &Node) -> usize {
            let own = usize::from(node.record.is_some());
            let below: usize = node
                .children
                .iter()
                .flat_map(|children| children.values())
                .map(count)
                .sum();
            own + below
        }
        count(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Points records whose file was moved on disk at the new location
    //
    // `from` and `to` are relative to the mirror root, like Record::local.
    pub fn relocate(&mut self, from: &str, to: &str) {
        fn walk(node: &mut Node, from: &str, to: &str) {
            if let Some(record) = node.record.as_mut().filter(|r| r.local == from) {
                record.local = to.to_string();
            }
            for child in node.children.iter_mut().flat_map(|c| c.values_mut()) {
                walk(child, from, to);
            }
        }
        walk(&mut self.root, from, to);
    }

    /// Every (path, record) pair, ordered by path
    pub fn records(&self) -> Vec<(String, &Record)> {
        fn walk<'a>(node: &'a Node, path: &str, out: &mut Vec<(String, &'a Record)>) {
            if let Some(record) = &node.record {
                out.push((path.to_string(), record));
            }
            if let Some(children) = &node.children {
                for (key, child) in children {
                    // keys already carry their leading '/'
                    walk(child, &format!("{path}{key}"), out);
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.root, "", &mut out);
        out
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.children.is_some() { 2 } else { 1 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.record)?;
        if let Some(children) = &self.children {
            seq.serialize_element(children)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(NodeVisitor)
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a [record, children] array")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Node, A::Error> {
        let record = seq.next_element::<Option<Record>>()?.flatten();
        let children = seq.next_element::<BTreeMap<String, Node>>()?;
        if seq.next_element::<IgnoredAny>()?.is_some() {
            return Err(de::Error::invalid_length(3, &self));
        }
        Ok(Node { record, children })
    }
}
