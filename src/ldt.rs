//! Large list (LDT) command builder.
//!
//! A large list lives in a single bin and is manipulated only through the
//! server-side `llist` UDF module. Each [`LargeList`] operation checks its
//! argument count, splices an embedded filter descriptor into positional
//! arguments and dispatches one `apply` command:
//!
//! ```text
//! find(value, filter, cb)
//!   -> apply(key, llist.find, [bin, value, filter.module, filter.funcname, filter.args, create_module])
//! ```
//!
//! Argument errors are delivered through the callback like any other
//! failure, never raised at the call site.

use std::panic::Location;

use crate::callback::Callback;
use crate::client::Client;
use crate::error::{AerospikeError, Error, Result};
use crate::key::Key;
use crate::policy::ApplyPolicy;
use crate::status::Status;
use crate::udf::UdfCall;
use crate::value::Value;

/// Server-side module implementing large lists.
pub const LLIST_MODULE: &str = "llist";

/// One positional argument of a large list operation.
pub enum LdtArg {
    /// A plain value.
    Value(Value),
    /// Filter function descriptor, expanded into three positional slots.
    Filter(UdfCall),
    /// Completion callback; must be last.
    Callback(Callback<Value>),
}

impl LdtArg {
    /// Wrap a value.
    pub fn value(value: impl Into<Value>) -> Self {
        LdtArg::Value(value.into())
    }

    /// Wrap a closure as the callback argument.
    pub fn callback<F>(f: F) -> Self
    where
        F: FnOnce(Option<AerospikeError>, Option<Value>) + Send + 'static,
    {
        LdtArg::Callback(Box::new(f))
    }
}

impl From<Value> for LdtArg {
    fn from(value: Value) -> Self {
        LdtArg::Value(value)
    }
}

impl From<UdfCall> for LdtArg {
    fn from(udf: UdfCall) -> Self {
        LdtArg::Filter(udf)
    }
}

impl std::fmt::Debug for LdtArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LdtArg::Value(v) => f.debug_tuple("Value").field(v).finish(),
            LdtArg::Filter(udf) => f.debug_tuple("Filter").field(udf).finish(),
            LdtArg::Callback(_) => f.write_str("Callback"),
        }
    }
}

/// Shape of one large list operation.
struct LdtOp {
    name: &'static str,
    /// Accepted argument counts, callback included.
    arities: &'static [usize],
    /// Position of the optional filter descriptor.
    udf_position: Option<usize>,
    /// Server function, and its bulk variant for list arguments.
    funcname: &'static str,
    bulk_funcname: Option<&'static str>,
}

const fn op(name: &'static str, arities: &'static [usize], funcname: &'static str) -> LdtOp {
    LdtOp {
        name,
        arities,
        udf_position: None,
        funcname,
        bulk_funcname: None,
    }
}

const ADD: LdtOp = LdtOp {
    bulk_funcname: Some("add_all"),
    ..op("add", &[2], "add")
};
const UPDATE: LdtOp = LdtOp {
    bulk_funcname: Some("update_all"),
    ..op("update", &[2], "update")
};
const REMOVE: LdtOp = LdtOp {
    bulk_funcname: Some("remove_all"),
    ..op("remove", &[2], "remove")
};
const REMOVE_RANGE: LdtOp = op("remove_range", &[3], "remove_range");
const FIND: LdtOp = LdtOp {
    udf_position: Some(1),
    ..op("find", &[2, 3], "find")
};
const FIND_RANGE: LdtOp = LdtOp {
    udf_position: Some(2),
    ..op("find_range", &[3, 4], "range")
};
const FILTER: LdtOp = LdtOp {
    udf_position: Some(0),
    ..op("filter", &[2], "filter")
};
const SCAN: LdtOp = op("scan", &[1], "scan");
const DESTROY: LdtOp = op("destroy", &[1], "destroy");
const SIZE: LdtOp = op("size", &[1], "size");
const GET_CONFIG: LdtOp = op("get_config", &[1], "config");

/// Handle for a large list stored in one bin of one record.
///
/// Built by [`Client::large_list`]. Every operation takes its positional
/// arguments followed by a callback receiving the UDF's result.
#[derive(Debug, Clone)]
pub struct LargeList {
    client: Client,
    key: Key,
    bin_name: String,
    write_policy: Option<ApplyPolicy>,
    create_module: Option<String>,
}

impl LargeList {
    pub(crate) fn new(
        client: Client,
        key: Key,
        bin_name: &str,
        write_policy: Option<ApplyPolicy>,
        create_module: Option<&str>,
    ) -> Self {
        Self {
            client,
            key,
            bin_name: bin_name.to_string(),
            write_policy,
            create_module: create_module.map(str::to_string),
        }
    }

    /// Record holding the list.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Bin holding the list.
    pub fn bin_name(&self) -> &str {
        &self.bin_name
    }

    /// Add a value, or every element of a list value: `(value, cb)`.
    #[track_caller]
    pub fn add(&self, args: Vec<LdtArg>) -> Result<()> {
        self.execute(&ADD, args, Location::caller())
    }

    /// Update a value, or every element of a list value: `(value, cb)`.
    #[track_caller]
    pub fn update(&self, args: Vec<LdtArg>) -> Result<()> {
        self.execute(&UPDATE, args, Location::caller())
    }

    /// Remove a value, or every element of a list value: `(value, cb)`.
    #[track_caller]
    pub fn remove(&self, args: Vec<LdtArg>) -> Result<()> {
        self.execute(&REMOVE, args, Location::caller())
    }

    /// Remove values in `[min, max]`: `(min, max, cb)`.
    #[track_caller]
    pub fn remove_range(&self, args: Vec<LdtArg>) -> Result<()> {
        self.execute(&REMOVE_RANGE, args, Location::caller())
    }

    /// Find values equal to `value`: `(value, [filter,] cb)`.
    #[track_caller]
    pub fn find(&self, args: Vec<LdtArg>) -> Result<()> {
        self.execute(&FIND, args, Location::caller())
    }

    /// Find values in `[min, max]`: `(min, max, [filter,] cb)`.
    #[track_caller]
    pub fn find_range(&self, args: Vec<LdtArg>) -> Result<()> {
        self.execute(&FIND_RANGE, args, Location::caller())
    }

    /// Values accepted by a filter function: `(filter, cb)`.
    #[track_caller]
    pub fn filter(&self, args: Vec<LdtArg>) -> Result<()> {
        self.execute(&FILTER, args, Location::caller())
    }

    /// Every value: `(cb)`.
    #[track_caller]
    pub fn scan(&self, args: Vec<LdtArg>) -> Result<()> {
        self.execute(&SCAN, args, Location::caller())
    }

    /// Delete the list: `(cb)`.
    #[track_caller]
    pub fn destroy(&self, args: Vec<LdtArg>) -> Result<()> {
        self.execute(&DESTROY, args, Location::caller())
    }

    /// Number of values: `(cb)`.
    #[track_caller]
    pub fn size(&self, args: Vec<LdtArg>) -> Result<()> {
        self.execute(&SIZE, args, Location::caller())
    }

    /// List configuration: `(cb)`.
    #[track_caller]
    pub fn get_config(&self, args: Vec<LdtArg>) -> Result<()> {
        self.execute(&GET_CONFIG, args, Location::caller())
    }

    fn execute(&self, op: &LdtOp, mut args: Vec<LdtArg>, caller: &Location<'_>) -> Result<()> {
        let handler = self.client.callback_handler();
        let count = args.len();

        let callback = match args.pop() {
            Some(LdtArg::Callback(cb)) => cb,
            _ => {
                let status = param_error(op, caller, "callback argument must be a function");
                tracing::error!(op = op.name, %status, "large list call without callback");
                return Ok(());
            }
        };

        if !op.arities.contains(&count) {
            let status = param_error(
                op,
                caller,
                &format!(
                    "invalid argument count {}, expected {:?}",
                    count, op.arities
                ),
            );
            let _release =
                handler.deliver(async move { Err(Error::Client(status)) }, Some(callback))?;
            return Ok(());
        }

        let call = match self.command(op, args) {
            Ok(call) => call,
            Err(message) => {
                let status = param_error(op, caller, &message);
                let _release =
                    handler.deliver(async move { Err(Error::Client(status)) }, Some(callback))?;
                return Ok(());
            }
        };

        tracing::debug!(
            op = op.name,
            funcname = %call.funcname,
            key = %self.key,
            bin = %self.bin_name,
            "large list command"
        );
        let client = self.client.clone();
        let key = self.key.clone();
        let policy = self.write_policy.clone();
        let _release = handler.deliver(
            async move { client.apply(&key, call, policy).await },
            Some(callback),
        )?;
        Ok(())
    }

    /// Build the UDF invocation for validated positional arguments.
    fn command(&self, op: &LdtOp, args: Vec<LdtArg>) -> std::result::Result<UdfCall, String> {
        let funcname = match (op.bulk_funcname, args.first()) {
            (Some(bulk), Some(LdtArg::Value(Value::List(_)))) => bulk,
            _ => op.funcname,
        };

        let mut positional = Vec::with_capacity(args.len() + 4);
        positional.push(Value::from(self.bin_name.as_str()));
        for (position, arg) in args.into_iter().enumerate() {
            let at_udf = op.udf_position == Some(position);
            match arg {
                LdtArg::Filter(udf) if at_udf => positional.extend(udf.into_triple()),
                LdtArg::Value(_) if at_udf => {
                    return Err(format!("expected filter arguments at position {}", position))
                }
                LdtArg::Value(value) => positional.push(value),
                LdtArg::Filter(_) => {
                    return Err(format!("unexpected filter arguments at position {}", position))
                }
                LdtArg::Callback(_) => {
                    return Err(format!("unexpected callback at position {}", position))
                }
            }
        }
        positional.push(
            self.create_module
                .as_deref()
                .map_or(Value::Nil, Value::from),
        );

        Ok(UdfCall::new(LLIST_MODULE, funcname, positional))
    }
}

fn param_error(op: &LdtOp, caller: &Location<'_>, message: &str) -> AerospikeError {
    AerospikeError::new(Status::ERR_PARAM, message).at(op.name, caller)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::list;
    use crate::runtime::RuntimeContext;
    use crate::transport::MemoryTransport;

    fn large_list(create_module: Option<&str>) -> LargeList {
        let client = Client::builder()
            .transport(Arc::new(MemoryTransport::new()))
            .runtime(Arc::new(RuntimeContext::new()))
            .build();
        client.large_list(Key::new("test", "demo", "ldt"), "items", None, create_module)
    }

    #[test]
    fn test_single_find_shape() {
        let ldt = large_list(None);
        let call = ldt.command(&FIND, vec![LdtArg::value(5)]).unwrap();
        assert_eq!(call.module, "llist");
        assert_eq!(call.funcname, "find");
        assert_eq!(Value::List(call.args), list!["items", 5, Value::Nil]);
    }

    #[test]
    fn test_filtered_find_splices_triple() {
        let ldt = large_list(Some("settings"));
        let filter = UdfCall::new("filters", "gt", vec![Value::from(10)]);
        let call = ldt
            .command(&FIND, vec![LdtArg::value(5), filter.into()])
            .unwrap();
        assert_eq!(
            Value::List(call.args),
            list!["items", 5, "filters", "gt", list![10], "settings"]
        );
    }

    #[test]
    fn test_find_range_splices_at_position_two() {
        let ldt = large_list(None);
        let filter = UdfCall::new("filters", "even", vec![]);
        let call = ldt
            .command(
                &FIND_RANGE,
                vec![LdtArg::value(1), LdtArg::value(9), filter.into()],
            )
            .unwrap();
        assert_eq!(call.funcname, "range");
        assert_eq!(
            Value::List(call.args),
            list!["items", 1, 9, "filters", "even", Value::List(vec![]), Value::Nil]
        );
    }

    #[test]
    fn test_bulk_variant_for_list_values() {
        let ldt = large_list(None);
        let single = ldt.command(&ADD, vec![LdtArg::value(1)]).unwrap();
        let bulk = ldt
            .command(&ADD, vec![LdtArg::Value(list![1, 2, 3])])
            .unwrap();
        assert_eq!(single.funcname, "add");
        assert_eq!(bulk.funcname, "add_all");

        let bulk = ldt
            .command(&REMOVE, vec![LdtArg::Value(list![1])])
            .unwrap();
        assert_eq!(bulk.funcname, "remove_all");
    }

    #[test]
    fn test_filter_outside_udf_position_is_rejected() {
        let ldt = large_list(None);
        let filter = UdfCall::new("filters", "gt", vec![]);
        assert!(ldt.command(&ADD, vec![filter.into()]).is_err());
        assert!(ldt
            .command(&FIND, vec![LdtArg::value(1), LdtArg::value(2)])
            .is_err());
    }

    #[test]
    fn test_missing_callback_is_dropped() {
        let ldt = large_list(None);
        // No runtime needed: nothing is dispatched.
        assert!(ldt.size(vec![]).is_ok());
        assert!(ldt.add(vec![LdtArg::value(1)]).is_ok());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_wrong_arity_reaches_callback_with_location() {
        let ldt = large_list(None);
        let (tx, rx) = tokio::sync::oneshot::channel();

        ldt.find(vec![
            LdtArg::value(1),
            LdtArg::value(2),
            LdtArg::value(3),
            LdtArg::callback(move |err, value| {
                let _ = tx.send((err, value));
            }),
        ])
        .unwrap();

        let (err, value) = rx.await.unwrap();
        let err = err.unwrap();
        assert_eq!(err.code, Status::ERR_PARAM);
        assert!(err.message.starts_with("invalid argument count 4"));
        assert_eq!(err.func.as_deref(), Some("find"));
        assert_eq!(err.file.as_deref(), Some(file!()));
        assert!(value.is_none());
    }
}
