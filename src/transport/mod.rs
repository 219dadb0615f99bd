//! Transport boundary.
//!
//! The transport is the engine below this layer: cluster tending, wire
//! protocol, retries. This module only fixes its shape:
//!
//! - [`Transport`] - the async primitives the command layer dispatches to
//! - [`Request`] - one variant per native primitive, with normalized args
//! - [`Response`] - what a primitive completes with on success
//!
//! [`MemoryTransport`] is an in-process implementation for tests and for
//! running the command layer without a cluster.

mod eval;
mod memory;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::batch::BatchRecord;
use crate::codec::MsgPackCodec;
use crate::config::Host;
use crate::error::{AerospikeError, Result};
use crate::filter::IndexType;
use crate::index::IndexOptions;
use crate::info::InfoResponse;
use crate::key::{Key, Metadata, Record};
use crate::operations::Operation;
use crate::policy::{
    ApplyPolicy, BatchPolicy, IndexPolicy, InfoPolicy, OperatePolicy, QueryPolicy, ReadPolicy,
    RemovePolicy, UdfPolicy, WritePolicy,
};
use crate::query::QuerySpec;
use crate::udf::{UdfCall, UdfType};
use crate::value::{Bins, Value};

pub use memory::MemoryTransport;

/// Boxed future returned by transport primitives.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Completion of a transport primitive: a response or a non-OK status.
pub type TransportResult = std::result::Result<Response, AerospikeError>;

/// The execution engine this layer dispatches to.
///
/// Every primitive completes exactly once, asynchronously. The event-loop
/// hooks are process-wide; the command layer calls them only on the first
/// acquire and last release across all clients.
pub trait Transport: Send + Sync + 'static {
    /// Connect to the cluster; completes with the connection status.
    fn connect(&self) -> BoxFuture<'static, AerospikeError>;

    /// Close all cluster connections.
    fn close(&self);

    /// Execute one request.
    fn submit(&self, request: Request) -> BoxFuture<'static, TransportResult>;

    /// Register the process with the shared event loop.
    fn register_event_loop(&self);

    /// Deregister the process from the shared event loop.
    fn deregister_event_loop(&self);

    /// Live cluster health, queried on demand.
    fn is_connected(&self) -> bool;

    /// Current cluster members.
    fn nodes(&self) -> Vec<Host>;
}

/// A request for one native primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Request {
    /// Read all bins of a record.
    Get {
        /// Record key.
        key: Key,
        /// Policy overrides.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        policy: Option<ReadPolicy>,
    },
    /// Read selected bins of a record.
    Select {
        /// Record key.
        key: Key,
        /// Bins to read.
        bins: Vec<String>,
        /// Policy overrides.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        policy: Option<ReadPolicy>,
    },
    /// Check record existence.
    Exists {
        /// Record key.
        key: Key,
        /// Policy overrides.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        policy: Option<ReadPolicy>,
    },
    /// Write bins.
    Put {
        /// Record key.
        key: Key,
        /// Bins to write.
        bins: Bins,
        /// Record metadata.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meta: Option<Metadata>,
        /// Policy overrides.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        policy: Option<WritePolicy>,
    },
    /// Delete a record.
    Remove {
        /// Record key.
        key: Key,
        /// Policy overrides.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        policy: Option<RemovePolicy>,
    },
    /// Apply a list of operations to one record.
    Operate {
        /// Record key.
        key: Key,
        /// Operations, applied in order.
        ops: Vec<Operation>,
        /// Record metadata.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meta: Option<Metadata>,
        /// Policy overrides.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        policy: Option<OperatePolicy>,
    },
    /// Apply a record UDF.
    Apply {
        /// Record key.
        key: Key,
        /// Function to apply.
        udf: UdfCall,
        /// Policy overrides.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        policy: Option<ApplyPolicy>,
    },
    /// Read several records.
    BatchGet {
        /// Keys, in result order.
        keys: Vec<Key>,
        /// Policy overrides.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        policy: Option<BatchPolicy>,
    },
    /// Check existence of several records.
    BatchExists {
        /// Keys, in result order.
        keys: Vec<Key>,
        /// Policy overrides.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        policy: Option<BatchPolicy>,
    },
    /// Read selected bins of several records.
    BatchSelect {
        /// Keys, in result order.
        keys: Vec<Key>,
        /// Bins to read.
        bins: Vec<String>,
        /// Policy overrides.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        policy: Option<BatchPolicy>,
    },
    /// Run a secondary index query or scan.
    Query {
        /// Namespace.
        ns: String,
        /// Set; `None` for the whole namespace.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        set: Option<String>,
        /// Query definition.
        spec: QuerySpec,
        /// Policy overrides.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        policy: Option<QueryPolicy>,
    },
    /// Create a secondary index.
    IndexCreate {
        /// Index definition.
        options: IndexOptions,
        /// Value type indexed.
        index_type: IndexType,
        /// Policy overrides.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        policy: Option<IndexPolicy>,
    },
    /// Drop a secondary index.
    IndexRemove {
        /// Namespace.
        ns: String,
        /// Index name.
        index: String,
        /// Policy overrides.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        policy: Option<IndexPolicy>,
    },
    /// Register a UDF module.
    UdfRegister {
        /// Path of the module source.
        path: String,
        /// Module language.
        udf_type: UdfType,
        /// Policy overrides.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        policy: Option<UdfPolicy>,
    },
    /// Remove a UDF module.
    UdfRemove {
        /// Module file name.
        module: String,
        /// Policy overrides.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        policy: Option<UdfPolicy>,
    },
    /// Send an info request to one host or to every node.
    Info {
        /// Info command; `None` asks for the default info set.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request: Option<String>,
        /// Target host; `None` broadcasts to the cluster.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        host: Option<Host>,
        /// Policy overrides.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        policy: Option<InfoPolicy>,
    },
}

impl Request {
    /// Name of the native primitive serving this request.
    pub fn command_name(&self) -> &'static str {
        match self {
            Request::Get { .. } => "get_async",
            Request::Select { .. } => "select_async",
            Request::Exists { .. } => "exists_async",
            Request::Put { .. } => "put_async",
            Request::Remove { .. } => "remove_async",
            Request::Operate { .. } => "operate_async",
            Request::Apply { .. } => "apply_async",
            Request::BatchGet { .. } => "batchGet",
            Request::BatchExists { .. } => "batchExists",
            Request::BatchSelect { .. } => "batchSelect",
            Request::Query { .. } => "query",
            Request::IndexCreate { .. } => "indexCreate",
            Request::IndexRemove { .. } => "indexRemove",
            Request::UdfRegister { .. } => "udfRegister",
            Request::UdfRemove { .. } => "udfRemove",
            Request::Info { .. } => "info",
        }
    }

    /// Key addressed by single-record requests.
    pub fn key(&self) -> Option<&Key> {
        match self {
            Request::Get { key, .. }
            | Request::Select { key, .. }
            | Request::Exists { key, .. }
            | Request::Put { key, .. }
            | Request::Remove { key, .. }
            | Request::Operate { key, .. }
            | Request::Apply { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Wire encoding of this request.
    pub fn encode(&self) -> Result<Bytes> {
        MsgPackCodec::encode_bytes(self)
    }
}

/// Successful completion of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "response", rename_all = "snake_case")]
pub enum Response {
    /// Record content for get/select/operate.
    Record {
        /// Bins read (or returned by operations).
        bins: Bins,
        /// Record metadata.
        meta: Metadata,
    },
    /// Record exists, with its metadata.
    Exists {
        /// Record metadata.
        meta: Metadata,
    },
    /// Write acknowledged; carries the digest when the transport computed one.
    Written {
        /// Record digest.
        #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_bytes")]
        digest: Option<Vec<u8>>,
    },
    /// One entry per batch key.
    Batch {
        /// Per-key results.
        records: Vec<BatchRecord>,
    },
    /// Value returned by a UDF or aggregation.
    Value {
        /// Returned value.
        value: Value,
    },
    /// Records streamed by a query.
    Records {
        /// Matching records.
        records: Vec<Record>,
    },
    /// Responses to an info request, one per node asked.
    Info {
        /// Per-host responses.
        responses: Vec<InfoResponse>,
    },
    /// Completed with nothing to return.
    Done,
}

impl Response {
    /// Kind of response, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Response::Record { .. } => "record",
            Response::Exists { .. } => "exists",
            Response::Written { .. } => "written",
            Response::Batch { .. } => "batch",
            Response::Value { .. } => "value",
            Response::Records { .. } => "records",
            Response::Info { .. } => "info",
            Response::Done => "done",
        }
    }
}
