//! Immutable configuration snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A point-in-time view of every configuration key/value pair.
///
/// Snapshots are never mutated after construction; the store replaces them
/// wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConfigSnapshot {
    values: BTreeMap<String, String>,
    version: String,
}

impl ConfigSnapshot {
    /// Create a snapshot with an explicit version marker.
    pub fn new(values: BTreeMap<String, String>, version: impl Into<String>) -> Self {
        Self {
            values,
            version: version.into(),
        }
    }

    /// Create a snapshot whose version is derived from its content.
    pub fn from_values(values: BTreeMap<String, String>) -> Self {
        let version = content_version(&values);
        Self { values, version }
    }

    /// The empty snapshot installed before the first successful fetch.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// True until a snapshot from the service (or disk cache) is installed.
    pub fn is_initial(&self) -> bool {
        self.version.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Entries under `prefix.`, with the prefix stripped.
    pub fn with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.values.iter().filter_map(move |(k, v)| {
            k.strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('.'))
                .map(|rest| (rest, v.as_str()))
        })
    }

    /// Keys whose values differ between `self` and `other` (added, removed or changed).
    pub fn changed_keys(&self, other: &ConfigSnapshot) -> Vec<String> {
        let mut changed: Vec<String> = self
            .values
            .iter()
            .filter(|(k, v)| other.values.get(*k) != Some(*v))
            .map(|(k, _)| k.clone())
            .collect();

        changed.extend(
            other
                .values
                .keys()
                .filter(|k| !self.values.contains_key(*k))
                .cloned(),
        );
        changed.sort();
        changed
    }

    /// Same key/value content, regardless of version marker.
    pub fn same_content(&self, other: &ConfigSnapshot) -> bool {
        self.values == other.values
    }
}

/// Deterministic version marker for services that do not supply one.
///
/// 64-bit FNV-1a over length-prefixed keys and values. Must stay stable
/// across toolchains: it is persisted in the snapshot cache and sent back
/// as `If-None-Match`.
pub fn content_version(values: &BTreeMap<String, String>) -> String {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET_BASIS;
    let mut write = |bytes: &[u8]| {
        for &byte in bytes {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(PRIME);
        }
    };
    for (key, value) in values {
        for part in [key, value] {
            write(&(part.len() as u64).to_le_bytes());
            write(part.as_bytes());
        }
    }
    format!("fnv-{:016x}", hash)
}
