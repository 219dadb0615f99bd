//! # aerospike-command
//!
//! Client command layer for an Aerospike-style database driver.
//!
//! This crate sits between application code and a native [`Transport`]. It
//! turns high-level requests (get, put, operate, batch, query, UDF, large
//! list) into transport requests and routes every completion back to the
//! caller asynchronously.
//!
//! ## Architecture
//!
//! - **Encoding**: [`operations`] and [`filter`] build tagged, serializable
//!   descriptors; [`ldt`] translates large list calls into UDF invocations
//! - **Dispatch**: [`Client`] guards on the connection state and submits
//!   one [`transport::Request`] per command
//! - **Delivery**: results come back as futures, or through a
//!   [`callback::Callback`] invoked by the [`CallbackHandler`] on a
//!   spawned task, never synchronously
//! - **Lifecycle**: [`runtime::RuntimeContext`] counts connected clients
//!   and registers the transport's event loop once per process
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use aerospike_command::operations::{self, map, MapReturnType};
//! use aerospike_command::{bins, Client, Key, MemoryTransport, Value};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> aerospike_command::Result<()> {
//! let client = Client::builder()
//!     .transport(Arc::new(MemoryTransport::new()))
//!     .build();
//! client.connect().await?;
//!
//! let key = Key::new("test", "demo", "scores");
//! client.put(&key, bins! { "tags" => Value::List(vec![]) }, None, None).await?;
//!
//! let ops = vec![
//!     operations::list_append("tags", "blue"),
//!     map::put("best", "alice", 97, None),
//!     map::get_by_key("best", "alice", MapReturnType::Value),
//! ];
//! let record = client.operate(&key, ops, None, None).await?;
//! assert_eq!(record.bins["best"].as_int(), Some(97));
//!
//! client.close();
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod batch;
pub mod callback;
pub mod codec;
pub mod config;
pub mod error;
pub mod filter;
pub mod index;
pub mod info;
pub mod key;
pub mod ldt;
pub mod operations;
pub mod policy;
pub mod query;
pub mod runtime;
pub mod status;
pub mod transport;
pub mod udf;
pub mod value;

mod client;

pub use args::CallArg;
pub use batch::BatchRecord;
pub use callback::{callback, Callback, CallbackHandler, Release};
pub use client::{Client, ClientBuilder, DEFAULT_POLL_INTERVAL};
pub use config::{Config, Host};
pub use error::{AerospikeError, Error, Result};
pub use filter::{Filter, IndexType};
pub use index::IndexOptions;
pub use key::{Key, Metadata, Record};
pub use ldt::{LargeList, LdtArg};
pub use operations::Operation;
pub use query::{Query, QuerySpec};
pub use runtime::RuntimeContext;
pub use status::Status;
pub use transport::{MemoryTransport, Transport};
pub use udf::UdfCall;
pub use value::{Bins, GeoJson, Value};
