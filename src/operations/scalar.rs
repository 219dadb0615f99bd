//! Whole-bin operations.

use serde::{Deserialize, Serialize};

use super::Operation;
use crate::value::Value;

/// Scalar operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScalarOpKind {
    /// Read a bin (or the whole record when the bin is empty).
    Read,
    /// Replace a bin value.
    Write,
    /// Add to an integer bin.
    Incr,
    /// Append to a string or blob bin.
    Append,
    /// Prepend to a string or blob bin.
    Prepend,
    /// Reset the record TTL.
    Touch,
}

/// Descriptor for a scalar operation.
///
/// Exactly one of `value` / `ttl` is set, depending on the kind; `read`
/// carries neither.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarOperation {
    /// Operation kind.
    pub op: ScalarOpKind,
    /// Target bin.
    pub bin: String,
    /// Operand for write/incr/append/prepend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// New TTL for touch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
}

fn with_value(op: ScalarOpKind, bin: &str, value: Value) -> Operation {
    Operation::Scalar(ScalarOperation {
        op,
        bin: bin.to_string(),
        value: Some(value),
        ttl: None,
    })
}

/// Read a bin.
pub fn read(bin: &str) -> Operation {
    Operation::Scalar(ScalarOperation {
        op: ScalarOpKind::Read,
        bin: bin.to_string(),
        value: None,
        ttl: None,
    })
}

/// Write a bin.
pub fn write(bin: &str, value: impl Into<Value>) -> Operation {
    with_value(ScalarOpKind::Write, bin, value.into())
}

/// Increment an integer bin.
pub fn incr(bin: &str, value: impl Into<Value>) -> Operation {
    with_value(ScalarOpKind::Incr, bin, value.into())
}

/// Alias of [`incr`].
pub fn add(bin: &str, value: impl Into<Value>) -> Operation {
    incr(bin, value)
}

/// Append to a string or blob bin.
pub fn append(bin: &str, value: impl Into<Value>) -> Operation {
    with_value(ScalarOpKind::Append, bin, value.into())
}

/// Prepend to a string or blob bin.
pub fn prepend(bin: &str, value: impl Into<Value>) -> Operation {
    with_value(ScalarOpKind::Prepend, bin, value.into())
}

/// Reset the record TTL. The bin is ignored by the server.
pub fn touch(bin: &str, ttl: u32) -> Operation {
    Operation::Scalar(ScalarOperation {
        op: ScalarOpKind::Touch,
        bin: bin.to_string(),
        value: None,
        ttl: Some(ttl),
    })
}
