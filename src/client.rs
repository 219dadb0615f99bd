//! Client builder and command dispatch.
//!
//! The [`ClientBuilder`] collects configuration, the transport and the
//! runtime context. The [`Client`] it builds is the command façade; every
//! command follows the same path:
//!
//! 1. Normalize arguments (callback API only, see [`crate::args`])
//! 2. Check the connection; a disconnected client fails without touching
//!    the transport
//! 3. Submit the request and map the response, attaching the request key
//! 4. Deliver the result: as the future's output, or through the callback
//!    handler on a spawned task
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use aerospike_command::{bins, Client, Key, MemoryTransport};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> aerospike_command::Result<()> {
//! let client = Client::builder()
//!     .transport(Arc::new(MemoryTransport::new()))
//!     .build();
//! client.connect().await?;
//!
//! let key = Key::new("test", "demo", "user-1");
//! client.put(&key, bins! { "name" => "Ada", "visits" => 1 }, None, None).await?;
//! client.incr(&key, bins! { "visits" => 2 }, None, None).await?;
//!
//! let record = client.get(&key, None).await?;
//! assert_eq!(record.bins["visits"].as_int(), Some(3));
//! assert_eq!(record.key, key);
//!
//! client.close();
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::args::{normalize, CallArg, Normalized, METADATA_POLICY, POLICY_ONLY};
use crate::batch::{align, BatchRecord};
use crate::callback::{Callback, CallbackHandler, Release};
use crate::config::{Config, Host};
use crate::error::{AerospikeError, Error, Result};
use crate::filter::IndexType;
use crate::index::{describe, index_build_complete, index_status_command, IndexOptions};
use crate::info::InfoResponse;
use crate::key::{Key, Metadata, Record};
use crate::ldt::LargeList;
use crate::operations::{self, Operation};
use crate::policy::{
    ApplyPolicy, BatchPolicy, IndexPolicy, InfoPolicy, OperatePolicy, Policies, QueryPolicy,
    ReadPolicy, RemovePolicy, UdfPolicy, WritePolicy,
};
use crate::query::{Query, QuerySpec};
use crate::runtime::RuntimeContext;
use crate::transport::{MemoryTransport, Request, Response, Transport};
use crate::udf::{module_file_name, module_listed, UdfCall, UdfType};
use crate::value::{Bins, Value};

/// Default interval between polls of the `*_wait` helpers.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Info command listing registered UDF modules.
const UDF_LIST_COMMAND: &str = "udf-list";

/// Builder for configuring and creating a [`Client`].
pub struct ClientBuilder {
    config: Config,
    transport: Option<Arc<dyn Transport>>,
    runtime: Option<Arc<RuntimeContext>>,
    callback_handler: Option<CallbackHandler>,
}

impl ClientBuilder {
    /// Create a builder with the default configuration.
    pub fn new() -> Self {
        Self {
            config: Config::new(),
            transport: None,
            runtime: None,
            callback_handler: None,
        }
    }

    /// Use this configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Dispatch commands to this transport.
    ///
    /// Default: a fresh [`MemoryTransport`].
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Share this runtime context instead of the process-wide one.
    pub fn runtime(mut self, runtime: Arc<RuntimeContext>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Invoke callbacks with this convention instead of the runtime default.
    pub fn callback_handler(mut self, handler: CallbackHandler) -> Self {
        self.callback_handler = Some(handler);
        self
    }

    /// Build the client. The client starts disconnected.
    pub fn build(self) -> Client {
        let transport = self.transport.unwrap_or_else(|| {
            tracing::debug!("no transport configured, using in-memory transport");
            Arc::new(MemoryTransport::new())
        });
        Client {
            inner: Arc::new(ClientInner {
                config: self.config,
                transport,
                runtime: self.runtime.unwrap_or_else(RuntimeContext::global),
                callback_handler: self.callback_handler,
                connected: AtomicBool::new(false),
            }),
        }
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct ClientInner {
    config: Config,
    transport: Arc<dyn Transport>,
    runtime: Arc<RuntimeContext>,
    callback_handler: Option<CallbackHandler>,
    /// Cached connection state; not re-queried per command.
    connected: AtomicBool,
}

/// The command façade.
///
/// Cloning is cheap; clones share the connection state.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("hosts", &self.inner.config.hosts)
            .field("connected", &self.is_connected())
            .finish()
    }
}

fn or_default<P: Clone>(policy: Option<P>, default: &Option<P>) -> Option<P> {
    policy.or_else(|| default.clone())
}

fn unexpected(command: &'static str, response: Response) -> Error {
    Error::UnexpectedResponse {
        command,
        response: response.kind(),
    }
}

fn expect_done(command: &'static str, response: Response) -> Result<()> {
    match response {
        Response::Done => Ok(()),
        other => Err(unexpected(command, other)),
    }
}

/// One operation per bin, in bin order.
fn per_bin(bins: Bins, op: impl Fn(&str, Value) -> Operation) -> Vec<Operation> {
    bins.into_iter().map(|(bin, value)| op(&bin, value)).collect()
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Configuration the client was built with.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Runtime context the client counts itself in.
    pub fn runtime(&self) -> &Arc<RuntimeContext> {
        &self.inner.runtime
    }

    /// Callback convention used by the `*_with` commands.
    ///
    /// Read when a command is issued; a later change does not affect
    /// commands already in flight.
    pub fn callback_handler(&self) -> CallbackHandler {
        self.inner
            .callback_handler
            .unwrap_or_else(|| self.inner.runtime.callback_handler())
    }

    fn policies(&self) -> &Policies {
        &self.inner.config.policies
    }

    pub(crate) fn query_policy(&self, policy: Option<QueryPolicy>) -> Option<QueryPolicy> {
        or_default(policy, &self.policies().query)
    }

    // ---- lifecycle ----

    /// Connect to the cluster.
    ///
    /// Counts the client in the runtime context before delegating, so the
    /// first client to connect registers the event loop. The client is
    /// marked connected only when the transport reports `OK`.
    pub async fn connect(&self) -> Result<()> {
        self.inner.runtime.acquire(self.inner.transport.as_ref());

        let status = self.inner.transport.connect().await;
        if status.is_ok() {
            self.inner.connected.store(true, Ordering::Release);
            tracing::info!(hosts = ?self.inner.config.hosts, "client connected");
            Ok(())
        } else {
            tracing::warn!(%status, "client failed to connect");
            Err(Error::from_status(status))
        }
    }

    /// Connect, reporting the connected client to `callback`.
    ///
    /// # Errors
    ///
    /// Returns an error only when called outside a Tokio runtime.
    pub fn connect_with(&self, callback: Option<Callback<Client>>) -> Result<()> {
        let client = self.clone();
        let _release = self.callback_handler().deliver(
            async move {
                let connected = client.connect().await;
                connected.map(|()| client)
            },
            callback,
        )?;
        Ok(())
    }

    /// Close the cluster connection. No-op unless connected.
    ///
    /// The last client to close deregisters the event loop.
    pub fn close(&self) {
        if !self.inner.connected.swap(false, Ordering::AcqRel) {
            return;
        }
        self.inner.transport.close();
        self.inner.runtime.release(self.inner.transport.as_ref());
        tracing::info!("client closed");
    }

    /// Cached connection state.
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Live cluster health: connected and the transport still reports the
    /// cluster as reachable.
    pub fn is_cluster_healthy(&self) -> bool {
        self.is_connected() && self.inner.transport.is_connected()
    }

    /// Current cluster members.
    pub fn nodes(&self) -> Vec<Host> {
        self.inner.transport.nodes()
    }

    /// Guard and submit one request.
    pub(crate) async fn dispatch(&self, request: Request) -> Result<Response> {
        let command = request.command_name();
        if !self.is_connected() {
            tracing::warn!(command, "rejecting command, client not connected");
            // Even a rejected command completes on a later poll.
            tokio::task::yield_now().await;
            return Err(Error::not_connected());
        }

        match request.key() {
            Some(key) => tracing::debug!(command, %key, "dispatching"),
            None => tracing::debug!(command, "dispatching"),
        }
        self.inner
            .transport
            .submit(request)
            .await
            .map_err(|status| {
                tracing::debug!(command, %status, "command failed");
                Error::from_status(status)
            })
    }

    fn spawn_with<T, F, Fut>(&self, callback: Callback<T>, command: F) -> Result<Release>
    where
        T: Send + 'static,
        F: FnOnce(Client) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.callback_handler()
            .deliver(command(self.clone()), Some(callback))
    }

    // ---- record commands ----

    /// Read all bins of a record.
    pub async fn get(&self, key: &Key, policy: Option<ReadPolicy>) -> Result<Record> {
        let request = Request::Get {
            key: key.clone(),
            policy: or_default(policy, &self.policies().read),
        };
        self.record("get_async", key, request).await
    }

    /// Read selected bins of a record.
    pub async fn select<S: AsRef<str>>(
        &self,
        key: &Key,
        bins: &[S],
        policy: Option<ReadPolicy>,
    ) -> Result<Record> {
        let request = Request::Select {
            key: key.clone(),
            bins: bins.iter().map(|b| b.as_ref().to_string()).collect(),
            policy: or_default(policy, &self.policies().read),
        };
        self.record("select_async", key, request).await
    }

    /// Record metadata, or `None` if the record does not exist.
    pub async fn exists(&self, key: &Key, policy: Option<ReadPolicy>) -> Result<Option<Metadata>> {
        let request = Request::Exists {
            key: key.clone(),
            policy: or_default(policy, &self.policies().read),
        };
        match self.dispatch(request).await {
            Ok(Response::Exists { meta }) => Ok(Some(meta)),
            Ok(other) => Err(unexpected("exists_async", other)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write bins. Returns the key, with its digest when the transport
    /// computed one.
    pub async fn put(
        &self,
        key: &Key,
        bins: Bins,
        meta: Option<Metadata>,
        policy: Option<WritePolicy>,
    ) -> Result<Key> {
        let request = Request::Put {
            key: key.clone(),
            bins,
            meta,
            policy: or_default(policy, &self.policies().write),
        };
        match self.dispatch(request).await? {
            Response::Written {
                digest: Some(digest),
            } => Ok(key.with_digest(digest)),
            Response::Written { digest: None } | Response::Done => Ok(key.clone()),
            other => Err(unexpected("put_async", other)),
        }
    }

    /// Delete a record.
    pub async fn remove(&self, key: &Key, policy: Option<RemovePolicy>) -> Result<Key> {
        let request = Request::Remove {
            key: key.clone(),
            policy: or_default(policy, &self.policies().remove),
        };
        expect_done("remove_async", self.dispatch(request).await?)?;
        Ok(key.clone())
    }

    /// Apply operations to one record, in order.
    pub async fn operate(
        &self,
        key: &Key,
        ops: Vec<Operation>,
        meta: Option<Metadata>,
        policy: Option<OperatePolicy>,
    ) -> Result<Record> {
        let request = Request::Operate {
            key: key.clone(),
            ops,
            meta,
            policy: or_default(policy, &self.policies().operate),
        };
        self.record("operate_async", key, request).await
    }

    /// Apply a record UDF and return its result.
    pub async fn apply(&self, key: &Key, udf: UdfCall, policy: Option<ApplyPolicy>) -> Result<Value> {
        let request = Request::Apply {
            key: key.clone(),
            udf,
            policy: or_default(policy, &self.policies().apply),
        };
        match self.dispatch(request).await? {
            Response::Value { value } => Ok(value),
            other => Err(unexpected("apply_async", other)),
        }
    }

    /// Append each value to its bin.
    pub async fn append(
        &self,
        key: &Key,
        bins: Bins,
        meta: Option<Metadata>,
        policy: Option<OperatePolicy>,
    ) -> Result<Record> {
        let ops = per_bin(bins, |bin, v| operations::append(bin, v));
        self.operate(key, ops, meta, policy).await
    }

    /// Prepend each value to its bin.
    pub async fn prepend(
        &self,
        key: &Key,
        bins: Bins,
        meta: Option<Metadata>,
        policy: Option<OperatePolicy>,
    ) -> Result<Record> {
        let ops = per_bin(bins, |bin, v| operations::prepend(bin, v));
        self.operate(key, ops, meta, policy).await
    }

    /// Add each value to its integer bin.
    pub async fn incr(
        &self,
        key: &Key,
        bins: Bins,
        meta: Option<Metadata>,
        policy: Option<OperatePolicy>,
    ) -> Result<Record> {
        let ops = per_bin(bins, |bin, v| operations::incr(bin, v));
        self.operate(key, ops, meta, policy).await
    }

    /// Alias of [`Client::incr`].
    pub async fn add(
        &self,
        key: &Key,
        bins: Bins,
        meta: Option<Metadata>,
        policy: Option<OperatePolicy>,
    ) -> Result<Record> {
        self.incr(key, bins, meta, policy).await
    }

    async fn record(&self, command: &'static str, key: &Key, request: Request) -> Result<Record> {
        match self.dispatch(request).await? {
            Response::Record { bins, meta } => Ok(Record::new(key.clone(), bins, meta)),
            other => Err(unexpected(command, other)),
        }
    }

    // ---- record commands, callback API ----

    /// Callback form of [`Client::get`]. Accepts `[policy,] callback`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Type`] when no callback is supplied.
    pub fn get_with(&self, key: Key, args: Vec<CallArg<ReadPolicy, Record>>) -> Result<()> {
        let Normalized {
            policy, callback, ..
        } = normalize(args, POLICY_ONLY)?;
        let _release = self.spawn_with(callback, move |client| async move {
            client.get(&key, policy).await
        })?;
        Ok(())
    }

    /// Callback form of [`Client::select`]. Accepts `[policy,] callback`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Type`] when no callback is supplied.
    pub fn select_with(
        &self,
        key: Key,
        bins: Vec<String>,
        args: Vec<CallArg<ReadPolicy, Record>>,
    ) -> Result<()> {
        let Normalized {
            policy, callback, ..
        } = normalize(args, POLICY_ONLY)?;
        let _release = self.spawn_with(callback, move |client| async move {
            client.select(&key, &bins, policy).await
        })?;
        Ok(())
    }

    /// Callback form of [`Client::exists`]. Accepts `[policy,] callback`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Type`] when no callback is supplied.
    pub fn exists_with(
        &self,
        key: Key,
        args: Vec<CallArg<ReadPolicy, Option<Metadata>>>,
    ) -> Result<()> {
        let Normalized {
            policy, callback, ..
        } = normalize(args, POLICY_ONLY)?;
        let _release = self.spawn_with(callback, move |client| async move {
            client.exists(&key, policy).await
        })?;
        Ok(())
    }

    /// Callback form of [`Client::put`]. Accepts
    /// `[metadata,] [policy,] callback`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Type`] when no callback is supplied.
    pub fn put_with(&self, key: Key, bins: Bins, args: Vec<CallArg<WritePolicy, Key>>) -> Result<()> {
        let Normalized {
            meta,
            policy,
            callback,
        } = normalize(args, METADATA_POLICY)?;
        let _release = self.spawn_with(callback, move |client| async move {
            client.put(&key, bins, meta, policy).await
        })?;
        Ok(())
    }

    /// Callback form of [`Client::remove`]. Accepts `[policy,] callback`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Type`] when no callback is supplied.
    pub fn remove_with(&self, key: Key, args: Vec<CallArg<RemovePolicy, Key>>) -> Result<()> {
        let Normalized {
            policy, callback, ..
        } = normalize(args, POLICY_ONLY)?;
        let _release = self.spawn_with(callback, move |client| async move {
            client.remove(&key, policy).await
        })?;
        Ok(())
    }

    /// Callback form of [`Client::operate`]. Accepts
    /// `[metadata,] [policy,] callback`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Type`] when no callback is supplied.
    pub fn operate_with(
        &self,
        key: Key,
        ops: Vec<Operation>,
        args: Vec<CallArg<OperatePolicy, Record>>,
    ) -> Result<()> {
        let Normalized {
            meta,
            policy,
            callback,
        } = normalize(args, METADATA_POLICY)?;
        let _release = self.spawn_with(callback, move |client| async move {
            client.operate(&key, ops, meta, policy).await
        })?;
        Ok(())
    }

    /// Callback form of [`Client::apply`]. Accepts `[policy,] callback`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Type`] when no callback is supplied.
    pub fn apply_with(
        &self,
        key: Key,
        udf: UdfCall,
        args: Vec<CallArg<ApplyPolicy, Value>>,
    ) -> Result<()> {
        let Normalized {
            policy, callback, ..
        } = normalize(args, POLICY_ONLY)?;
        let _release = self.spawn_with(callback, move |client| async move {
            client.apply(&key, udf, policy).await
        })?;
        Ok(())
    }

    /// Callback form of [`Client::append`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Type`] when no callback is supplied.
    pub fn append_with(
        &self,
        key: Key,
        bins: Bins,
        args: Vec<CallArg<OperatePolicy, Record>>,
    ) -> Result<()> {
        let ops = per_bin(bins, |bin, v| operations::append(bin, v));
        self.operate_with(key, ops, args)
    }

    /// Callback form of [`Client::prepend`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Type`] when no callback is supplied.
    pub fn prepend_with(
        &self,
        key: Key,
        bins: Bins,
        args: Vec<CallArg<OperatePolicy, Record>>,
    ) -> Result<()> {
        let ops = per_bin(bins, |bin, v| operations::prepend(bin, v));
        self.operate_with(key, ops, args)
    }

    /// Callback form of [`Client::incr`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Type`] when no callback is supplied.
    pub fn incr_with(
        &self,
        key: Key,
        bins: Bins,
        args: Vec<CallArg<OperatePolicy, Record>>,
    ) -> Result<()> {
        let ops = per_bin(bins, |bin, v| operations::incr(bin, v));
        self.operate_with(key, ops, args)
    }

    /// Alias of [`Client::incr_with`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Type`] when no callback is supplied.
    pub fn add_with(
        &self,
        key: Key,
        bins: Bins,
        args: Vec<CallArg<OperatePolicy, Record>>,
    ) -> Result<()> {
        self.incr_with(key, bins, args)
    }

    // ---- batch ----

    /// Read several records. Result `i` belongs to `keys[i]`; missing
    /// records carry `ERR_RECORD_NOT_FOUND`.
    pub async fn batch_get(
        &self,
        keys: &[Key],
        policy: Option<BatchPolicy>,
    ) -> Result<Vec<BatchRecord>> {
        let request = Request::BatchGet {
            keys: keys.to_vec(),
            policy: or_default(policy, &self.policies().batch),
        };
        self.batch(keys, request).await
    }

    /// Check existence of several records, in key order.
    pub async fn batch_exists(
        &self,
        keys: &[Key],
        policy: Option<BatchPolicy>,
    ) -> Result<Vec<BatchRecord>> {
        let request = Request::BatchExists {
            keys: keys.to_vec(),
            policy: or_default(policy, &self.policies().batch),
        };
        self.batch(keys, request).await
    }

    /// Read selected bins of several records, in key order.
    pub async fn batch_select<S: AsRef<str>>(
        &self,
        keys: &[Key],
        bins: &[S],
        policy: Option<BatchPolicy>,
    ) -> Result<Vec<BatchRecord>> {
        let request = Request::BatchSelect {
            keys: keys.to_vec(),
            bins: bins.iter().map(|b| b.as_ref().to_string()).collect(),
            policy: or_default(policy, &self.policies().batch),
        };
        self.batch(keys, request).await
    }

    async fn batch(&self, keys: &[Key], request: Request) -> Result<Vec<BatchRecord>> {
        let command = request.command_name();
        match self.dispatch(request).await? {
            Response::Batch { records } => Ok(align(keys, records)),
            other => Err(unexpected(command, other)),
        }
    }

    /// Callback form of [`Client::batch_get`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Type`] when no callback is supplied.
    pub fn batch_get_with(
        &self,
        keys: Vec<Key>,
        args: Vec<CallArg<BatchPolicy, Vec<BatchRecord>>>,
    ) -> Result<()> {
        let Normalized {
            policy, callback, ..
        } = normalize(args, POLICY_ONLY)?;
        let _release = self.spawn_with(callback, move |client| async move {
            client.batch_get(&keys, policy).await
        })?;
        Ok(())
    }

    /// Callback form of [`Client::batch_exists`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Type`] when no callback is supplied.
    pub fn batch_exists_with(
        &self,
        keys: Vec<Key>,
        args: Vec<CallArg<BatchPolicy, Vec<BatchRecord>>>,
    ) -> Result<()> {
        let Normalized {
            policy, callback, ..
        } = normalize(args, POLICY_ONLY)?;
        let _release = self.spawn_with(callback, move |client| async move {
            client.batch_exists(&keys, policy).await
        })?;
        Ok(())
    }

    /// Callback form of [`Client::batch_select`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Type`] when no callback is supplied.
    pub fn batch_select_with(
        &self,
        keys: Vec<Key>,
        bins: Vec<String>,
        args: Vec<CallArg<BatchPolicy, Vec<BatchRecord>>>,
    ) -> Result<()> {
        let Normalized {
            policy, callback, ..
        } = normalize(args, POLICY_ONLY)?;
        let _release = self.spawn_with(callback, move |client| async move {
            client.batch_select(&keys, &bins, policy).await
        })?;
        Ok(())
    }

    // ---- query ----

    /// Start a query over `ns` (and `set`, if given).
    pub fn query(&self, ns: &str, set: Option<&str>, spec: QuerySpec) -> Query {
        Query::new(self.clone(), ns, set, spec)
    }

    // ---- secondary indexes ----

    /// Create a secondary index.
    pub async fn index_create(
        &self,
        options: IndexOptions,
        index_type: IndexType,
        policy: Option<IndexPolicy>,
    ) -> Result<()> {
        tracing::debug!(
            ns = %options.ns,
            index = %options.index,
            kind = describe(index_type),
            "creating index"
        );
        let request = Request::IndexCreate {
            options,
            index_type,
            policy,
        };
        expect_done("indexCreate", self.dispatch(request).await?)
    }

    /// Create an integer index.
    pub async fn create_integer_index(
        &self,
        options: IndexOptions,
        policy: Option<IndexPolicy>,
    ) -> Result<()> {
        self.index_create(options, IndexType::Numeric, policy).await
    }

    /// Create a string index.
    pub async fn create_string_index(
        &self,
        options: IndexOptions,
        policy: Option<IndexPolicy>,
    ) -> Result<()> {
        self.index_create(options, IndexType::String, policy).await
    }

    /// Create a geospatial index.
    pub async fn create_geo2dsphere_index(
        &self,
        options: IndexOptions,
        policy: Option<IndexPolicy>,
    ) -> Result<()> {
        self.index_create(options, IndexType::Geo2dSphere, policy)
            .await
    }

    /// Drop a secondary index.
    pub async fn index_remove(
        &self,
        ns: &str,
        index: &str,
        policy: Option<IndexPolicy>,
    ) -> Result<()> {
        let request = Request::IndexRemove {
            ns: ns.to_string(),
            index: index.to_string(),
            policy,
        };
        expect_done("indexRemove", self.dispatch(request).await?)
    }

    /// Wait until every node reports the index build as complete.
    pub async fn index_create_wait(
        &self,
        ns: &str,
        index: &str,
        poll_interval: Duration,
    ) -> Result<()> {
        let command = index_status_command(ns, index);
        loop {
            let responses = self.info(Some(&command), None, None).await?;
            let complete = !responses.is_empty()
                && responses.iter().all(|r| {
                    r.parse()
                        .get(&command)
                        .map_or(false, |status| index_build_complete(status))
                });
            if complete {
                return Ok(());
            }
            tracing::trace!(%command, "index build in progress");
            tokio::time::sleep(poll_interval).await;
        }
    }

    // ---- UDF modules ----

    /// Register a UDF module from a source file path.
    pub async fn udf_register(
        &self,
        path: &str,
        udf_type: Option<UdfType>,
        policy: Option<UdfPolicy>,
    ) -> Result<()> {
        let request = Request::UdfRegister {
            path: path.to_string(),
            udf_type: udf_type.unwrap_or_default(),
            policy,
        };
        expect_done("udfRegister", self.dispatch(request).await?)
    }

    /// Wait until every node lists the module.
    pub async fn udf_register_wait(&self, module: &str, poll_interval: Duration) -> Result<()> {
        let module = module_file_name(module);
        loop {
            let responses = self.info(Some(UDF_LIST_COMMAND), None, None).await?;
            let listed = !responses.is_empty()
                && responses.iter().all(|r| {
                    r.parse()
                        .get(UDF_LIST_COMMAND)
                        .map_or(false, |list| module_listed(list, module))
                });
            if listed {
                return Ok(());
            }
            tracing::trace!(module, "waiting for udf registration");
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Remove a registered UDF module.
    pub async fn udf_remove(&self, module: &str, policy: Option<UdfPolicy>) -> Result<()> {
        let request = Request::UdfRemove {
            module: module.to_string(),
            policy,
        };
        expect_done("udfRemove", self.dispatch(request).await?)
    }

    // ---- info ----

    /// Send an info request to `host`, or to every node when `None`.
    pub async fn info(
        &self,
        request: Option<&str>,
        host: Option<Host>,
        policy: Option<InfoPolicy>,
    ) -> Result<Vec<InfoResponse>> {
        let request = Request::Info {
            request: request.map(str::to_string),
            host,
            policy: or_default(policy, &self.policies().info),
        };
        match self.dispatch(request).await? {
            Response::Info { responses } => Ok(responses),
            other => Err(unexpected("info", other)),
        }
    }

    /// Callback form of [`Client::info`]: `on_info` runs once per node
    /// response, then `done` runs once.
    ///
    /// # Errors
    ///
    /// Returns an error only when called outside a Tokio runtime.
    pub fn info_with<F>(
        &self,
        request: Option<&str>,
        host: Option<Host>,
        policy: Option<InfoPolicy>,
        mut on_info: F,
        done: Option<Callback<()>>,
    ) -> Result<()>
    where
        F: FnMut(Option<AerospikeError>, Option<InfoResponse>) + Send + 'static,
    {
        let client = self.clone();
        let handler = self.callback_handler();
        let request = request.map(str::to_string);
        let _release = handler.deliver(
            async move {
                match client.info(request.as_deref(), host, policy).await {
                    Ok(responses) => {
                        for response in responses {
                            let (err, response) = handler.arguments(Ok(response));
                            on_info(err, response);
                        }
                        Ok(())
                    }
                    Err(e) => {
                        on_info(Some(e.to_status()), None);
                        Err(e)
                    }
                }
            },
            done,
        )?;
        Ok(())
    }

    // ---- large list ----

    /// Handle for the large list stored in `bin_name` of `key`.
    pub fn large_list(
        &self,
        key: Key,
        bin_name: &str,
        write_policy: Option<ApplyPolicy>,
        create_module: Option<&str>,
    ) -> LargeList {
        LargeList::new(self.clone(), key, bin_name, write_policy, create_module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bins;
    use crate::status::Status;

    fn client(transport: Arc<MemoryTransport>) -> Client {
        Client::builder()
            .transport(transport)
            .runtime(Arc::new(RuntimeContext::new()))
            .build()
    }

    #[test]
    fn test_builder_defaults() {
        let client = Client::builder()
            .runtime(Arc::new(RuntimeContext::new()))
            .build();
        assert!(!client.is_connected());
        assert_eq!(client.callback_handler(), CallbackHandler::Default);
        assert!(!client.config().hosts.is_empty());
    }

    #[test]
    fn test_handler_override_wins_over_runtime() {
        let runtime = Arc::new(RuntimeContext::new());
        let client = Client::builder()
            .runtime(runtime.clone())
            .callback_handler(CallbackHandler::Legacy)
            .build();
        runtime.set_callback_handler(CallbackHandler::Default);
        assert_eq!(client.callback_handler(), CallbackHandler::Legacy);
    }

    #[test]
    fn test_per_bin_builds_one_op_per_bin() {
        let ops = per_bin(bins! { "a" => 1, "b" => 2 }, |bin, v| operations::incr(bin, v));
        assert_eq!(ops, vec![operations::incr("a", 1), operations::incr("b", 2)]);
    }

    #[tokio::test]
    async fn test_connect_failure_keeps_client_disconnected() {
        let transport = Arc::new(
            MemoryTransport::new()
                .with_connect_status(AerospikeError::new(Status::ERR_TIMEOUT, "no seeds")),
        );
        let client = client(transport.clone());

        let err = client.connect().await.unwrap_err();
        assert_eq!(err.code(), Status::ERR_TIMEOUT);
        assert!(!client.is_connected());
        // The connect intent was still counted.
        assert_eq!(client.runtime().active_clients(), 1);
    }

    #[tokio::test]
    async fn test_close_when_disconnected_is_noop() {
        let transport = Arc::new(MemoryTransport::new());
        let client = client(transport.clone());
        client.close();
        assert_eq!(transport.deregistrations(), 0);
        assert_eq!(client.runtime().active_clients(), 0);
    }

    #[tokio::test]
    async fn test_cluster_health_queries_transport() {
        let transport = Arc::new(MemoryTransport::new());
        let client = client(transport.clone());
        assert!(!client.is_cluster_healthy());

        client.connect().await.unwrap();
        assert!(client.is_cluster_healthy());

        transport.close();
        assert!(client.is_connected(), "cached flag is not re-queried");
        assert!(!client.is_cluster_healthy());
    }

    #[tokio::test]
    async fn test_exists_maps_not_found_to_none() {
        let client = client(Arc::new(MemoryTransport::new()));
        client.connect().await.unwrap();

        let key = Key::new("test", "demo", 1);
        assert_eq!(client.exists(&key, None).await.unwrap(), None);

        client.put(&key, bins! { "a" => 1 }, None, None).await.unwrap();
        let meta = client.exists(&key, None).await.unwrap().unwrap();
        assert_eq!(meta.gen, Some(1));
    }

    #[tokio::test]
    async fn test_config_policies_fill_missing_policy() {
        let transport = Arc::new(MemoryTransport::new());
        let config = Config::new().policies(Policies {
            read: Some(ReadPolicy::new().timeout(250)),
            ..Policies::default()
        });
        let client = Client::builder()
            .config(config)
            .transport(transport.clone())
            .runtime(Arc::new(RuntimeContext::new()))
            .build();
        client.connect().await.unwrap();

        let key = Key::new("test", "demo", 1);
        let _ = client.get(&key, None).await;
        let _ = client.get(&key, Some(ReadPolicy::new().timeout(5))).await;

        let timeouts: Vec<_> = transport
            .requests()
            .into_iter()
            .filter_map(|r| match r {
                Request::Get { policy, .. } => policy.and_then(|p| p.timeout),
                _ => None,
            })
            .collect();
        assert_eq!(timeouts, vec![250, 5]);
    }
}
