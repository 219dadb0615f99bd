//! Callback delivery.
//!
//! Every command produces a `Result`. The callback API turns that result
//! into the `(error, value)` pair an application callback expects, using
//! one of two conventions:
//!
//! - [`CallbackHandler::Default`] - error-first: `(None, Some(value))` on
//!   success, `(Some(error), None)` on failure
//! - [`CallbackHandler::Legacy`] - the raw status always comes first, `OK`
//!   on success: `(Some(ok), Some(value))` or `(Some(error), None)`
//!
//! Callbacks are always invoked from a spawned task, never from inside the
//! call that registered them. [`CallbackHandler::deliver`] hands back a
//! [`Release`] guard; the task holds the command until the guard is
//! dropped, which the issuing call does as it returns. This holds on
//! multi-thread runtimes too, where the task may start on another worker.
//!
//! # Example
//!
//! ```
//! use aerospike_command::callback::{callback, CallbackHandler};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (tx, rx) = tokio::sync::oneshot::channel();
//! let cb = callback(move |err, value: Option<i64>| {
//!     let _ = tx.send((err.is_none(), value));
//! });
//!
//! let release = CallbackHandler::Default
//!     .deliver(async { Ok(42) }, Some(cb))
//!     .unwrap();
//! drop(release);
//!
//! assert_eq!(rx.await.unwrap(), (true, Some(42)));
//! # }
//! ```

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::{AerospikeError, Error, Result};

/// Application callback: `(error, value)`.
pub type Callback<T> = Box<dyn FnOnce(Option<AerospikeError>, Option<T>) + Send + 'static>;

/// Box a closure as a [`Callback`].
pub fn callback<T, F>(f: F) -> Callback<T>
where
    F: FnOnce(Option<AerospikeError>, Option<T>) + Send + 'static,
{
    Box::new(f)
}

/// Holds a delivered command back until dropped.
#[must_use = "the command does not start until the guard is dropped"]
#[derive(Debug)]
pub struct Release(Option<oneshot::Sender<()>>);

impl Drop for Release {
    fn drop(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

/// Convention used to invoke application callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackHandler {
    /// Error-first; the error is `None` on success.
    #[default]
    Default,
    /// Raw status first, `OK` included.
    Legacy,
}

impl CallbackHandler {
    /// Callback arguments for a command result.
    pub fn arguments<T>(self, result: Result<T>) -> (Option<AerospikeError>, Option<T>) {
        match (self, result) {
            (CallbackHandler::Default, Ok(value)) => (None, Some(value)),
            (CallbackHandler::Legacy, Ok(value)) => (Some(AerospikeError::ok()), Some(value)),
            (_, Err(e)) => (Some(e.to_status()), None),
        }
    }

    /// Invoke `callback` with a result. No-op without a callback.
    pub fn invoke<T>(self, callback: Option<Callback<T>>, result: Result<T>) {
        let Some(callback) = callback else {
            if let Err(e) = result {
                tracing::error!(error = %e, "command failed with no callback to report to");
            }
            return;
        };
        let (err, value) = self.arguments(result);
        callback(err, value);
    }

    /// Run `command` on a new task and deliver its result to `callback`.
    ///
    /// The task waits for the returned [`Release`] to be dropped before it
    /// polls `command`. Keep the guard alive until the issuing call returns.
    ///
    /// # Errors
    ///
    /// Returns an error when called outside a Tokio runtime; the command is
    /// not run and the callback is dropped.
    pub fn deliver<T, F>(self, command: F, callback: Option<Callback<T>>) -> Result<Release>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Client(AerospikeError::client(e.to_string())))?;

        let (tx, released) = oneshot::channel();
        runtime.spawn(async move {
            // A dropped sender releases too.
            let _ = released.await;
            // Let the issuing call unwind before anything user-visible runs.
            tokio::task::yield_now().await;
            let result = command.await;
            self.invoke(callback, result);
        });
        Ok(Release(Some(tx)))
    }
}
