//! Secondary index queries and scans.
//!
//! [`Client::query`] returns a [`Query`] handle. The handle only collects
//! the definition; nothing is sent until one of the executing methods runs:
//!
//! - [`Query::results`] - collect matching records
//! - [`Query::foreach_with`] - stream records to a callback
//! - [`Query::apply`] - run a stream UDF and return its aggregate
//! - [`Query::background`] - apply a record UDF to every match on the server

use serde::{Deserialize, Serialize};

use crate::callback::Callback;
use crate::client::Client;
use crate::error::{AerospikeError, Error, Result};
use crate::filter::Filter;
use crate::key::Record;
use crate::policy::QueryPolicy;
use crate::transport::{Request, Response};
use crate::udf::UdfCall;
use crate::value::Value;

/// What the server does with matching records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "udf", rename_all = "snake_case")]
pub enum QueryMode {
    /// Return every matching record.
    #[default]
    Foreach,
    /// Feed matches through a stream UDF and return its result.
    Aggregate(UdfCall),
    /// Apply a record UDF to every match; return nothing.
    Background(UdfCall),
}

/// Query definition sent to the transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Index predicates; empty means a full scan.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
    /// Bins to return; empty means all bins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub select: Vec<String>,
    /// Execution mode.
    #[serde(default)]
    pub mode: QueryMode,
}

impl QuerySpec {
    /// Empty definition: scan everything, return all bins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Restrict the returned bins.
    pub fn select<S: AsRef<str>>(mut self, bins: &[S]) -> Self {
        self.select = bins.iter().map(|b| b.as_ref().to_string()).collect();
        self
    }
}

/// Handle for building and running a query.
#[derive(Clone)]
pub struct Query {
    client: Client,
    ns: String,
    set: Option<String>,
    spec: QuerySpec,
    policy: Option<QueryPolicy>,
}

impl Query {
    pub(crate) fn new(client: Client, ns: &str, set: Option<&str>, spec: QuerySpec) -> Self {
        Self {
            client,
            ns: ns.to_string(),
            set: set.map(str::to_string),
            spec,
            policy: None,
        }
    }

    /// Namespace queried.
    pub fn ns(&self) -> &str {
        &self.ns
    }

    /// Set queried, if any.
    pub fn set(&self) -> Option<&str> {
        self.set.as_deref()
    }

    /// Current definition.
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    /// Restrict the returned bins.
    pub fn select<S: AsRef<str>>(mut self, bins: &[S]) -> Self {
        self.spec = self.spec.select(bins);
        self
    }

    /// Add an index predicate.
    pub fn where_(mut self, filter: Filter) -> Self {
        self.spec.filters.push(filter);
        self
    }

    /// Override the query policy.
    pub fn policy(mut self, policy: QueryPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Collect every matching record.
    pub async fn results(self) -> Result<Vec<Record>> {
        let mut spec = self.spec.clone();
        spec.mode = QueryMode::Foreach;
        match self.run(spec).await? {
            Response::Records { records } => Ok(records),
            other => Err(unexpected(other)),
        }
    }

    /// Run a stream UDF over the matches and return its result.
    pub async fn apply(self, udf: UdfCall) -> Result<Value> {
        let mut spec = self.spec.clone();
        spec.mode = QueryMode::Aggregate(udf);
        match self.run(spec).await? {
            Response::Value { value } => Ok(value),
            other => Err(unexpected(other)),
        }
    }

    /// Apply a record UDF to every match on the server.
    pub async fn background(self, udf: UdfCall) -> Result<()> {
        let mut spec = self.spec.clone();
        spec.mode = QueryMode::Background(udf);
        match self.run(spec).await? {
            Response::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Stream matching records to `on_record`, then report completion to
    /// `done`.
    ///
    /// On failure `on_record` receives the error once and is not called
    /// again.
    ///
    /// # Errors
    ///
    /// Returns an error only when called outside a Tokio runtime.
    pub fn foreach_with<F>(self, mut on_record: F, done: Option<Callback<()>>) -> Result<()>
    where
        F: FnMut(Option<AerospikeError>, Option<Record>) + Send + 'static,
    {
        let handler = self.client.callback_handler();
        let stream = async move {
            match self.results().await {
                Ok(records) => {
                    for record in records {
                        let (err, record) = handler.arguments(Ok(record));
                        on_record(err, record);
                    }
                    Ok(())
                }
                Err(e) => {
                    on_record(Some(e.to_status()), None);
                    Err(e)
                }
            }
        };
        let _release = handler.deliver(stream, done)?;
        Ok(())
    }

    async fn run(&self, spec: QuerySpec) -> Result<Response> {
        tracing::debug!(
            ns = %self.ns,
            set = ?self.set,
            filters = spec.filters.len(),
            "running query"
        );
        self.client
            .dispatch(Request::Query {
                ns: self.ns.clone(),
                set: self.set.clone(),
                spec,
                policy: self.client.query_policy(self.policy.clone()),
            })
            .await
    }
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("ns", &self.ns)
            .field("set", &self.set)
            .field("spec", &self.spec)
            .finish()
    }
}

fn unexpected(response: Response) -> Error {
    Error::UnexpectedResponse {
        command: "query",
        response: response.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter;

    #[test]
    fn test_spec_builder() {
        let spec = QuerySpec::new()
            .filter(filter::range("age", 18, 30))
            .select(&["name", "age"]);
        assert_eq!(spec.filters.len(), 1);
        assert_eq!(spec.select, vec!["name", "age"]);
        assert_eq!(spec.mode, QueryMode::Foreach);
    }

    #[test]
    fn test_mode_encoding() {
        let foreach = serde_json::to_value(QueryMode::Foreach).unwrap();
        assert_eq!(foreach["mode"], "foreach");

        let aggregate =
            serde_json::to_value(QueryMode::Aggregate(UdfCall::new("stats", "sum", vec![])))
                .unwrap();
        assert_eq!(aggregate["mode"], "aggregate");
        assert_eq!(aggregate["udf"]["funcname"], "sum");
    }

    #[test]
    fn test_empty_spec_is_sparse() {
        let json = serde_json::to_value(QuerySpec::new()).unwrap();
        assert!(json.get("filters").is_none());
        assert!(json.get("select").is_none());
    }
}
