//! Keys, records and record metadata.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::{Bins, Value};

/// Identifies a record: namespace, set and user key or digest.
///
/// Keys are passed by reference through every command and handed back
/// alongside results so callers can correlate responses with requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Key {
    /// Namespace.
    pub ns: String,
    /// Set name; empty for the null set.
    pub set: String,
    /// User key, if supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Value>,
    /// Record digest, once computed by the transport.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_bytes"
    )]
    pub digest: Option<Vec<u8>>,
}

impl Key {
    /// Create a key from a user key.
    pub fn new(ns: impl Into<String>, set: impl Into<String>, key: impl Into<Value>) -> Self {
        Self {
            ns: ns.into(),
            set: set.into(),
            key: Some(key.into()),
            digest: None,
        }
    }

    /// Create a key from a digest only.
    pub fn from_digest(ns: impl Into<String>, set: impl Into<String>, digest: Vec<u8>) -> Self {
        Self {
            ns: ns.into(),
            set: set.into(),
            key: None,
            digest: Some(digest),
        }
    }

    /// Copy of this key with a digest attached.
    pub fn with_digest(&self, digest: Vec<u8>) -> Self {
        let mut key = self.clone();
        key.digest = Some(digest);
        key
    }

    /// Whether two keys address the same record.
    ///
    /// Digests win when both sides carry one; otherwise namespace, set and
    /// user key must match.
    pub fn same_record(&self, other: &Key) -> bool {
        if self.ns != other.ns {
            return false;
        }
        if let (Some(a), Some(b)) = (&self.digest, &other.digest) {
            return a == b;
        }
        self.set == other.set && self.key.is_some() && self.key == other.key
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(k) => write!(f, "{}:{}:{}", self.ns, self.set, k),
            None => write!(f, "{}:{}:<digest>", self.ns, self.set),
        }
    }
}

/// Record metadata. Absent fields mean "server default".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Time-to-live in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    /// Record generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gen: Option<u32>,
}

impl Metadata {
    /// Metadata with only a TTL.
    pub fn ttl(ttl: u32) -> Self {
        Self {
            ttl: Some(ttl),
            gen: None,
        }
    }
}

/// A record as returned by read commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Key the record was requested with.
    pub key: Key,
    /// Bin values.
    #[serde(default)]
    pub bins: Bins,
    /// Metadata reported by the server.
    #[serde(default)]
    pub meta: Metadata,
}

impl Record {
    /// Create a record.
    pub fn new(key: Key, bins: Bins, meta: Metadata) -> Self {
        Self { key, bins, meta }
    }

    /// Value of a bin.
    pub fn bin(&self, name: &str) -> Option<&Value> {
        self.bins.get(name)
    }
}
