//! In-process transport.
//!
//! [`MemoryTransport`] keeps records in memory and serves every [`Request`]
//! the command layer issues. Responses complete on a later poll, never
//! inside `submit`. It also records what it was asked to do, so tests can
//! inspect the request log and the event-loop registration counters.
//!
//! UDFs cannot run here; record and stream functions are registered as
//! Rust closures with [`MemoryTransport::register_function`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::eval::apply_ops;
use super::{BoxFuture, Request, Response, Transport, TransportResult};
use crate::batch::BatchRecord;
use crate::codec::MsgPackCodec;
use crate::config::{Host, DEFAULT_HOST, DEFAULT_PORT};
use crate::error::AerospikeError;
use crate::filter::{Filter, IndexType};
use crate::index::IndexOptions;
use crate::info::InfoResponse;
use crate::key::{Key, Metadata, Record};
use crate::policy::{ExistsPolicy, GenerationPolicy};
use crate::query::{QueryMode, QuerySpec};
use crate::status::Status;
use crate::udf::{module_file_name, UdfCall};
use crate::value::{Bins, Value};

/// A UDF implemented in Rust: mutates the record bins, returns a value.
///
/// Stream (aggregation) functions receive empty bins and the matching
/// records as a list in their first argument.
pub type UdfFunction =
    Arc<dyn Fn(&mut Bins, &[Value]) -> Result<Value, AerospikeError> + Send + Sync>;

type RecordId = (String, Vec<u8>);

#[derive(Debug, Clone)]
struct StoredRecord {
    key: Key,
    bins: Bins,
    gen: u32,
    ttl: u32,
}

impl StoredRecord {
    fn meta(&self) -> Metadata {
        Metadata {
            ttl: Some(self.ttl),
            gen: Some(self.gen),
        }
    }

    fn to_record(&self, select: &[String]) -> Record {
        let bins = if select.is_empty() {
            self.bins.clone()
        } else {
            select_bins(&self.bins, select)
        };
        Record::new(self.key.clone(), bins, self.meta())
    }
}

#[derive(Default)]
struct Store {
    records: BTreeMap<RecordId, StoredRecord>,
    indexes: BTreeMap<(String, String), (IndexOptions, IndexType)>,
    modules: BTreeSet<String>,
    functions: HashMap<(String, String), UdfFunction>,
    requests: Vec<Request>,
}

/// In-memory implementation of [`Transport`].
pub struct MemoryTransport {
    store: Mutex<Store>,
    nodes: Vec<Host>,
    connect_status: AerospikeError,
    reverse_batches: bool,
    connected: AtomicBool,
    registered: AtomicBool,
    registrations: AtomicUsize,
    deregistrations: AtomicUsize,
}

impl MemoryTransport {
    /// Single-node transport that connects successfully.
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
            nodes: vec![Host::new(DEFAULT_HOST, DEFAULT_PORT)],
            connect_status: AerospikeError::ok(),
            reverse_batches: false,
            connected: AtomicBool::new(false),
            registered: AtomicBool::new(false),
            registrations: AtomicUsize::new(0),
            deregistrations: AtomicUsize::new(0),
        }
    }

    /// Report these hosts as cluster members.
    pub fn with_nodes(mut self, nodes: Vec<Host>) -> Self {
        self.nodes = nodes;
        self
    }

    /// Complete `connect` with this status instead of `OK`.
    pub fn with_connect_status(mut self, status: AerospikeError) -> Self {
        self.connect_status = status;
        self
    }

    /// Answer batch requests in reverse order, as a cluster completing
    /// sub-requests out of order would.
    pub fn with_reversed_batches(mut self) -> Self {
        self.reverse_batches = true;
        self
    }

    /// Register a UDF implementation under `module.funcname`.
    pub fn register_function<F>(&self, module: &str, funcname: &str, f: F)
    where
        F: Fn(&mut Bins, &[Value]) -> Result<Value, AerospikeError> + Send + Sync + 'static,
    {
        self.lock()
            .functions
            .insert((module.to_string(), funcname.to_string()), Arc::new(f));
    }

    /// Requests submitted so far, oldest first.
    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    /// Number of requests submitted so far.
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Number of stored records.
    pub fn record_count(&self) -> usize {
        self.lock().records.len()
    }

    /// Times `register_event_loop` was called.
    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::Acquire)
    }

    /// Times `deregister_event_loop` was called.
    pub fn deregistrations(&self) -> usize {
        self.deregistrations.load(Ordering::Acquire)
    }

    /// Whether the event loop is currently registered.
    pub fn event_loop_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn execute(&self, request: &Request) -> TransportResult {
        let mut store = self.lock();
        store.requests.push(request.clone());

        match request {
            Request::Get { key, .. } => store.read(key, &[]),
            Request::Select { key, bins, .. } => store.read(key, bins),
            Request::Exists { key, .. } => {
                let record = store.find(key)?;
                Ok(Response::Exists { meta: record.meta() })
            }
            Request::Put {
                key,
                bins,
                meta,
                policy,
            } => {
                let exists = policy.as_ref().and_then(|p| p.exists);
                let gen_policy = policy.as_ref().and_then(|p| p.gen);
                store.put(key, bins, meta.unwrap_or_default(), exists, gen_policy)
            }
            Request::Remove { key, policy } => {
                let id = record_id(key)?;
                let record = store.records.get(&id).ok_or_else(|| not_found(key))?;
                if let Some(p) = policy {
                    check_generation(p.gen, p.generation, record.gen)?;
                }
                store.records.remove(&id);
                Ok(Response::Done)
            }
            Request::Operate {
                key,
                ops,
                meta,
                policy,
            } => {
                let gen_policy = policy.as_ref().and_then(|p| p.gen);
                store.operate(key, ops, meta.unwrap_or_default(), gen_policy)
            }
            Request::Apply { key, udf, .. } => store.apply(key, udf),
            Request::BatchGet { keys, .. } => Ok(self.batch(&store, keys, Some(&[][..]))),
            Request::BatchSelect { keys, bins, .. } => Ok(self.batch(&store, keys, Some(bins.as_slice()))),
            Request::BatchExists { keys, .. } => Ok(self.batch(&store, keys, None)),
            Request::Query { ns, set, spec, .. } => store.query(ns, set.as_deref(), spec),
            Request::IndexCreate {
                options,
                index_type,
                ..
            } => {
                let id = (options.ns.clone(), options.index.clone());
                if store.indexes.contains_key(&id) {
                    return Err(AerospikeError::new(
                        Status::ERR_INDEX_FOUND,
                        format!("index {} already exists", options.index),
                    ));
                }
                store.indexes.insert(id, (options.clone(), *index_type));
                Ok(Response::Done)
            }
            Request::IndexRemove { ns, index, .. } => {
                store
                    .indexes
                    .remove(&(ns.clone(), index.clone()))
                    .ok_or_else(|| {
                        AerospikeError::new(
                            Status::ERR_INDEX_NOT_FOUND,
                            format!("index {} not found", index),
                        )
                    })?;
                Ok(Response::Done)
            }
            Request::UdfRegister { path, .. } => {
                store.modules.insert(module_file_name(path).to_string());
                Ok(Response::Done)
            }
            Request::UdfRemove { module, .. } => {
                if !store.modules.remove(module) {
                    return Err(AerospikeError::new(
                        Status::ERR_UDF,
                        format!("module {} not registered", module),
                    ));
                }
                Ok(Response::Done)
            }
            Request::Info { request, host, .. } => {
                let targets = match host {
                    Some(host) if !self.nodes.contains(host) => {
                        return Err(AerospikeError::client(format!("unknown host {}", host)))
                    }
                    Some(host) => vec![host.clone()],
                    None => self.nodes.clone(),
                };
                let response = store.info(request.as_deref());
                Ok(Response::Info {
                    responses: targets
                        .into_iter()
                        .map(|host| InfoResponse {
                            host,
                            response: response.clone(),
                        })
                        .collect(),
                })
            }
        }
    }

    fn batch(&self, store: &Store, keys: &[Key], select: Option<&[String]>) -> Response {
        let mut records: Vec<BatchRecord> = keys
            .iter()
            .filter_map(|key| {
                let record = store.find(key).ok()?;
                let bins = select.map(|select| record.to_record(select).bins);
                Some(BatchRecord::found(key.clone(), bins, record.meta()))
            })
            .collect();
        if self.reverse_batches {
            records.reverse();
        }
        Response::Batch { records }
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemoryTransport {
    fn connect(&self) -> BoxFuture<'static, AerospikeError> {
        let status = self.connect_status.clone();
        if status.is_ok() {
            self.connected.store(true, Ordering::Release);
        }
        Box::pin(async move {
            tokio::task::yield_now().await;
            status
        })
    }

    fn close(&self) {
        self.connected.store(false, Ordering::Release);
    }

    fn submit(&self, request: Request) -> BoxFuture<'static, TransportResult> {
        let result = self.execute(&request);
        tracing::trace!(
            command = request.command_name(),
            ok = result.is_ok(),
            "memory transport served request"
        );
        Box::pin(async move {
            tokio::task::yield_now().await;
            result
        })
    }

    fn register_event_loop(&self) {
        self.registrations.fetch_add(1, Ordering::AcqRel);
        self.registered.store(true, Ordering::Release);
    }

    fn deregister_event_loop(&self) {
        self.deregistrations.fetch_add(1, Ordering::AcqRel);
        self.registered.store(false, Ordering::Release);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn nodes(&self) -> Vec<Host> {
        self.nodes.clone()
    }
}

impl Store {
    fn find(&self, key: &Key) -> Result<&StoredRecord, AerospikeError> {
        self.records
            .get(&record_id(key)?)
            .ok_or_else(|| not_found(key))
    }

    fn read(&self, key: &Key, select: &[String]) -> TransportResult {
        let record = self.find(key)?.to_record(select);
        Ok(Response::Record {
            bins: record.bins,
            meta: record.meta,
        })
    }

    fn put(
        &mut self,
        key: &Key,
        bins: &Bins,
        meta: Metadata,
        exists: Option<ExistsPolicy>,
        gen_policy: Option<GenerationPolicy>,
    ) -> TransportResult {
        let id = record_id(key)?;
        let current = self.records.get(&id);
        let previous = current.map(|r| (r.gen, r.ttl));

        match (exists, current.is_some()) {
            (Some(ExistsPolicy::Create), true) => {
                return Err(AerospikeError::new(
                    Status::ERR_RECORD_EXISTS,
                    format!("record {} already exists", key),
                ))
            }
            (Some(ExistsPolicy::Update), false) | (Some(ExistsPolicy::Replace), false) => {
                return Err(not_found(key))
            }
            _ => {}
        }
        if let (Some(record), Some(expected)) = (current, meta.gen) {
            check_generation(gen_policy, Some(expected), record.gen)?;
        }

        let replace = matches!(
            exists,
            Some(ExistsPolicy::Replace) | Some(ExistsPolicy::CreateOrReplace)
        );
        let mut merged = match current {
            Some(record) if !replace => record.bins.clone(),
            _ => Bins::new(),
        };
        for (name, value) in bins {
            if value.is_nil() {
                merged.remove(name);
            } else {
                merged.insert(name.clone(), value.clone());
            }
        }

        self.commit(id, key, previous, merged, meta.ttl);
        Ok(Response::Written { digest: None })
    }

    fn operate(
        &mut self,
        key: &Key,
        ops: &[crate::operations::Operation],
        meta: Metadata,
        gen_policy: Option<GenerationPolicy>,
    ) -> TransportResult {
        let id = record_id(key)?;
        let current = self.records.get(&id);
        let writes = ops.iter().any(|op| op.is_write());

        if current.is_none() && !writes {
            return Err(not_found(key));
        }
        if let (Some(record), Some(expected)) = (current, meta.gen) {
            check_generation(gen_policy, Some(expected), record.gen)?;
        }

        let previous = current.map(|r| (r.gen, r.ttl));
        let mut bins = current.map(|r| r.bins.clone()).unwrap_or_default();
        let outcome = apply_ops(&mut bins, ops)?;

        let (gen, ttl) = if writes || outcome.ttl.is_some() {
            self.commit(id, key, previous, bins, outcome.ttl.or(meta.ttl))
        } else {
            previous.unwrap_or_default()
        };
        Ok(Response::Record {
            bins: outcome.results,
            meta: Metadata {
                ttl: Some(ttl),
                gen: Some(gen),
            },
        })
    }

    fn apply(&mut self, key: &Key, udf: &UdfCall) -> TransportResult {
        let function = self.function(udf)?;
        let id = record_id(key)?;
        let current = self.records.get(&id);
        let previous = current.map(|r| (r.gen, r.ttl));
        let before = current.map(|r| r.bins.clone()).unwrap_or_default();

        let mut bins = before.clone();
        let value = function(&mut bins, &udf.args)?;
        if bins != before {
            self.commit(id, key, previous, bins, None);
        }
        Ok(Response::Value { value })
    }

    fn query(&mut self, ns: &str, set: Option<&str>, spec: &QuerySpec) -> TransportResult {
        for filter in &spec.filters {
            self.check_index(ns, filter)?;
        }

        let matches: Vec<RecordId> = self
            .records
            .iter()
            .filter(|(_, r)| r.key.ns == ns && set.map_or(true, |s| r.key.set == s))
            .filter(|(_, r)| {
                spec.filters
                    .iter()
                    .all(|f| r.bins.get(&f.bin).map_or(false, |v| f.matches(v)))
            })
            .map(|(id, _)| id.clone())
            .collect();

        match &spec.mode {
            QueryMode::Foreach => Ok(Response::Records {
                records: matches
                    .iter()
                    .filter_map(|id| self.records.get(id))
                    .map(|r| r.to_record(&spec.select))
                    .collect(),
            }),
            QueryMode::Aggregate(udf) => {
                let function = self.function(udf)?;
                let stream = matches
                    .iter()
                    .filter_map(|id| self.records.get(id))
                    .map(|r| Value::Map(r.to_record(&spec.select).bins))
                    .collect();
                let mut args = vec![Value::List(stream)];
                args.extend(udf.args.iter().cloned());
                let value = function(&mut Bins::new(), &args)?;
                Ok(Response::Value { value })
            }
            QueryMode::Background(udf) => {
                let function = self.function(udf)?;
                for id in matches {
                    if let Some(record) = self.records.get_mut(&id) {
                        function(&mut record.bins, &udf.args)?;
                        record.gen += 1;
                    }
                }
                Ok(Response::Done)
            }
        }
    }

    fn check_index(&self, ns: &str, filter: &Filter) -> Result<(), AerospikeError> {
        let indexed = self.indexes.values().any(|(options, index_type)| {
            options.ns == ns && options.bin == filter.bin && *index_type == filter.index_type
        });
        if indexed {
            Ok(())
        } else {
            Err(AerospikeError::new(
                Status::ERR_INDEX_NOT_FOUND,
                format!("no index on bin {}", filter.bin),
            ))
        }
    }

    fn function(&self, udf: &UdfCall) -> Result<UdfFunction, AerospikeError> {
        self.functions
            .get(&(udf.module.clone(), udf.funcname.clone()))
            .cloned()
            .ok_or_else(|| {
                AerospikeError::new(
                    Status::ERR_UDF,
                    format!("function not found: {}.{}", udf.module, udf.funcname),
                )
            })
    }

    /// Store bins as a new generation; an empty record is deleted.
    fn commit(
        &mut self,
        id: RecordId,
        key: &Key,
        previous: Option<(u32, u32)>,
        bins: Bins,
        ttl: Option<u32>,
    ) -> (u32, u32) {
        let (gen, old_ttl) = previous.unwrap_or_default();
        let (gen, ttl) = (gen + 1, ttl.unwrap_or(old_ttl));
        if bins.is_empty() {
            self.records.remove(&id);
        } else {
            let key = self
                .records
                .get(&id)
                .map(|r| r.key.clone())
                .unwrap_or_else(|| key.clone());
            self.records.insert(id, StoredRecord { key, bins, gen, ttl });
        }
        (gen, ttl)
    }

    fn info(&self, request: Option<&str>) -> String {
        let Some(request) = request else {
            return format!(
                "node\tBB9000000000000\nbuild\t{}\nstatistics\tobjects={}",
                env!("CARGO_PKG_VERSION"),
                self.records.len()
            );
        };

        let value = if let Some(path) = request.strip_prefix("sindex/") {
            let found = path
                .split_once('/')
                .and_then(|(ns, name)| self.indexes.get(&(ns.to_string(), name.to_string())));
            match found {
                Some((options, _)) => {
                    let keys = self
                        .records
                        .values()
                        .filter(|r| r.key.ns == options.ns && r.bins.contains_key(&options.bin))
                        .count();
                    format!("keys={};load_pct=100;state=RW", keys)
                }
                None => "FAIL:201:NO INDEX".to_string(),
            }
        } else {
            match request {
                "udf-list" => self
                    .modules
                    .iter()
                    .map(|m| format!("filename={},hash=0,type=LUA", m))
                    .collect::<Vec<_>>()
                    .join(";"),
                "namespaces" => self
                    .records
                    .values()
                    .map(|r| r.key.ns.as_str())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect::<Vec<_>>()
                    .join(";"),
                "statistics" => format!("objects={}", self.records.len()),
                _ => String::new(),
            }
        };
        format!("{}\t{}", request, value)
    }
}

/// Identity of the record a key addresses.
fn record_id(key: &Key) -> Result<RecordId, AerospikeError> {
    let ident = match (&key.key, &key.digest) {
        (Some(user_key), _) => MsgPackCodec::encode(&(&key.set, user_key))
            .map_err(|e| AerospikeError::client(e.to_string()))?,
        (None, Some(digest)) => digest.clone(),
        (None, None) => {
            return Err(AerospikeError::new(
                Status::ERR_PARAM,
                "key has neither a user key nor a digest",
            ))
        }
    };
    Ok((key.ns.clone(), ident))
}

fn not_found(key: &Key) -> AerospikeError {
    AerospikeError::new(
        Status::ERR_RECORD_NOT_FOUND,
        format!("record {} not found", key),
    )
}

fn check_generation(
    policy: Option<GenerationPolicy>,
    expected: Option<u32>,
    actual: u32,
) -> Result<(), AerospikeError> {
    let ok = match (policy, expected) {
        (Some(GenerationPolicy::Eq), Some(expected)) => actual == expected,
        (Some(GenerationPolicy::Gt), Some(expected)) => expected > actual,
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(AerospikeError::new(
            Status::ERR_RECORD_GENERATION,
            format!("generation {} does not satisfy {:?}", actual, policy),
        ))
    }
}

fn select_bins(bins: &Bins, select: &[String]) -> Bins {
    select
        .iter()
        .filter_map(|name| bins.get(name).map(|v| (name.clone(), v.clone())))
        .collect()
}
