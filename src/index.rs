//! Secondary index descriptors.

use serde::{Deserialize, Serialize};

use crate::filter::IndexType;

/// Collection shape the index covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexCollectionType {
    /// Plain bin value.
    #[default]
    Default,
    /// Elements of a list bin.
    List,
    /// Keys of a map bin.
    MapKeys,
    /// Values of a map bin.
    MapValues,
}

/// Options for creating a secondary index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Namespace.
    pub ns: String,
    /// Set; `None` indexes the whole namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<String>,
    /// Indexed bin.
    pub bin: String,
    /// Index name.
    pub index: String,
    /// Collection shape.
    #[serde(default)]
    pub collection_type: IndexCollectionType,
}

impl IndexOptions {
    /// Options for an index over a plain bin.
    pub fn new(
        ns: impl Into<String>,
        set: Option<&str>,
        bin: impl Into<String>,
        index: impl Into<String>,
    ) -> Self {
        Self {
            ns: ns.into(),
            set: set.map(str::to_string),
            bin: bin.into(),
            index: index.into(),
            collection_type: IndexCollectionType::Default,
        }
    }

    /// Index list elements or map keys/values instead of the bin itself.
    pub fn collection(mut self, collection_type: IndexCollectionType) -> Self {
        self.collection_type = collection_type;
        self
    }
}

/// Info command reporting the build status of an index.
pub fn index_status_command(ns: &str, index: &str) -> String {
    format!("sindex/{}/{}", ns, index)
}

/// Whether an index status response reports a completed build.
///
/// Responses are `;`-separated `name=value` pairs; the index is ready
/// once `load_pct` reaches 100.
pub fn index_build_complete(response: &str) -> bool {
    response
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .any(|(name, value)| name.trim() == "load_pct" && value.trim() == "100")
}

/// Index types accepted by the typed creation helpers.
pub(crate) fn describe(index_type: IndexType) -> &'static str {
    match index_type {
        IndexType::Numeric => "integer",
        IndexType::String => "string",
        IndexType::Geo2dSphere => "geo2dsphere",
    }
}
