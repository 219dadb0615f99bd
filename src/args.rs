//! Call-shape normalization for the callback API.
//!
//! The `*_with` commands take their optional trailing arguments as a list of
//! [`CallArg`]s ending in the callback, e.g. `put_with(key, bins, args)`
//! accepts any of
//!
//! ```text
//! [cb]
//! [metadata, cb]
//! [metadata, policy, cb]
//! [absent, policy, cb]
//! ```
//!
//! [`normalize`] resolves the list right to left: trailing absent slots are
//! dropped, the last remaining slot must be the callback, and the slots
//! before it are matched in order against the command's [`Slot`] shape.

use crate::callback::Callback;
use crate::error::{Error, Result};
use crate::key::Metadata;

/// Message of the error raised when no callback can be identified.
pub const CALLBACK_REQUIRED_MESSAGE: &str = "callback argument must be a function";

/// One optional argument of a callback-style call.
pub enum CallArg<P, T> {
    /// Placeholder for an argument not supplied.
    Absent,
    /// Record metadata.
    Metadata(Metadata),
    /// Policy override.
    Policy(P),
    /// Completion callback.
    Callback(Callback<T>),
}

impl<P, T> CallArg<P, T> {
    /// Wrap a closure as the callback argument.
    pub fn callback<F>(f: F) -> Self
    where
        F: FnOnce(Option<crate::error::AerospikeError>, Option<T>) + Send + 'static,
    {
        CallArg::Callback(Box::new(f))
    }

    fn describe(&self) -> &'static str {
        match self {
            CallArg::Absent => "absent",
            CallArg::Metadata(_) => "metadata",
            CallArg::Policy(_) => "policy",
            CallArg::Callback(_) => "callback",
        }
    }
}

impl<P, T> std::fmt::Debug for CallArg<P, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}

/// Optional positions a command accepts before its callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Record metadata.
    Metadata,
    /// Policy override.
    Policy,
}

/// Shape of `get`, `select`, `exists`, `remove`, `apply` and batch commands.
pub const POLICY_ONLY: &[Slot] = &[Slot::Policy];

/// Shape of `put`, `operate` and the operate shortcuts.
pub const METADATA_POLICY: &[Slot] = &[Slot::Metadata, Slot::Policy];

/// Normalized optional arguments.
pub struct Normalized<P, T> {
    /// Metadata, if supplied.
    pub meta: Option<Metadata>,
    /// Policy, if supplied.
    pub policy: Option<P>,
    /// The callback.
    pub callback: Callback<T>,
}

/// Resolve a callback-style argument list against a shape.
///
/// # Errors
///
/// Returns [`Error::Type`] when the last supplied argument is not a
/// callback, or when an argument does not fit the remaining shape. This is
/// raised synchronously since no callback is available to receive it.
pub fn normalize<P, T>(mut args: Vec<CallArg<P, T>>, shape: &[Slot]) -> Result<Normalized<P, T>> {
    while matches!(args.last(), Some(CallArg::Absent)) {
        args.pop();
    }

    let callback = match args.pop() {
        Some(CallArg::Callback(cb)) => cb,
        Some(other) => {
            return Err(Error::Type(format!(
                "{}, got {}",
                CALLBACK_REQUIRED_MESSAGE,
                other.describe()
            )))
        }
        None => return Err(Error::Type(CALLBACK_REQUIRED_MESSAGE.to_string())),
    };

    let mut meta = None;
    let mut policy = None;
    let mut slots = shape.iter();

    for arg in args {
        let unexpected = || Error::Type(format!("unexpected {} argument", arg.describe()));
        let wanted = match &arg {
            CallArg::Absent => None,
            CallArg::Metadata(_) => Some(Slot::Metadata),
            CallArg::Policy(_) => Some(Slot::Policy),
            CallArg::Callback(_) => return Err(unexpected()),
        };
        let fits = match wanted {
            None => slots.next().is_some(),
            Some(wanted) => slots.by_ref().any(|slot| *slot == wanted),
        };
        if !fits {
            return Err(unexpected());
        }

        match arg {
            CallArg::Metadata(m) => meta = Some(m),
            CallArg::Policy(p) => policy = Some(p),
            CallArg::Absent | CallArg::Callback(_) => {}
        }
    }

    Ok(Normalized {
        meta,
        policy,
        callback,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::WritePolicy;

    type Args = Vec<CallArg<WritePolicy, ()>>;

    fn cb() -> CallArg<WritePolicy, ()> {
        CallArg::callback(|_, _| {})
    }

    #[test]
    fn test_callback_only() {
        let n = normalize(vec![cb()], METADATA_POLICY).unwrap();
        assert!(n.meta.is_none());
        assert!(n.policy.is_none());
    }

    #[test]
    fn test_full_shape() {
        let args: Args = vec![
            CallArg::Metadata(Metadata::ttl(60)),
            CallArg::Policy(WritePolicy::new().timeout(10)),
            cb(),
        ];
        let n = normalize(args, METADATA_POLICY).unwrap();
        assert_eq!(n.meta.unwrap().ttl, Some(60));
        assert_eq!(n.policy.unwrap().timeout, Some(10));
    }

    #[test]
    fn test_policy_may_skip_metadata() {
        let args: Args = vec![CallArg::Policy(WritePolicy::new()), cb()];
        let n = normalize(args, METADATA_POLICY).unwrap();
        assert!(n.meta.is_none());
        assert!(n.policy.is_some());
    }

    #[test]
    fn test_trailing_absent_is_dropped() {
        let args: Args = vec![cb(), CallArg::Absent, CallArg::Absent];
        assert!(normalize(args, METADATA_POLICY).is_ok());
    }

    #[test]
    fn test_missing_callback_is_type_error() {
        let args: Args = vec![CallArg::Metadata(Metadata::default())];
        match normalize(args, METADATA_POLICY) {
            Err(Error::Type(msg)) => assert!(msg.starts_with(CALLBACK_REQUIRED_MESSAGE)),
            _ => panic!("expected TypeError"),
        }

        let empty: Args = vec![];
        assert!(matches!(normalize(empty, POLICY_ONLY), Err(Error::Type(_))));
    }

    #[test]
    fn test_argument_out_of_shape_is_type_error() {
        let args: Args = vec![CallArg::Metadata(Metadata::default()), cb()];
        assert!(matches!(normalize(args, POLICY_ONLY), Err(Error::Type(_))));

        let args: Args = vec![
            CallArg::Policy(WritePolicy::new()),
            CallArg::Metadata(Metadata::default()),
            cb(),
        ];
        assert!(matches!(normalize(args, METADATA_POLICY), Err(Error::Type(_))));
    }

    #[test]
    fn test_callback_before_last_is_type_error() {
        let args: Args = vec![cb(), CallArg::Policy(WritePolicy::new())];
        assert!(matches!(normalize(args, METADATA_POLICY), Err(Error::Type(_))));
    }
}
