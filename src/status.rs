//! Status codes reported by the transport engine.
//!
//! Codes follow the server's numbering: `0` is success, positive values are
//! server-reported failures and negative values are raised on the client
//! side (inside this layer or inside the transport).

use std::fmt;

use serde::{Deserialize, Serialize};

/// A status code as reported by the transport.
///
/// This is a newtype rather than an enum because the transport may report
/// codes this crate does not know by name; those must pass through intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(pub i32);

impl Status {
    /// Generic client-side failure.
    pub const ERR_CLIENT: Status = Status(-1);
    /// Invalid parameter supplied by the caller.
    pub const ERR_PARAM: Status = Status(-2);
    /// Operation succeeded.
    pub const OK: Status = Status(0);
    /// Unknown server failure.
    pub const ERR_SERVER: Status = Status(1);
    /// Record does not exist.
    pub const ERR_RECORD_NOT_FOUND: Status = Status(2);
    /// Generation check failed.
    pub const ERR_RECORD_GENERATION: Status = Status(3);
    /// Server rejected a request parameter.
    pub const ERR_REQUEST_INVALID: Status = Status(4);
    /// Record already exists.
    pub const ERR_RECORD_EXISTS: Status = Status(5);
    /// Server timed out the request.
    pub const ERR_TIMEOUT: Status = Status(9);
    /// Bin type does not support the operation.
    pub const ERR_BIN_INCOMPATIBLE_TYPE: Status = Status(12);
    /// Collection element does not exist.
    pub const ERR_ELEMENT_NOT_FOUND: Status = Status(23);
    /// Collection element already exists.
    pub const ERR_ELEMENT_EXISTS: Status = Status(24);
    /// User-defined function failed.
    pub const ERR_UDF: Status = Status(100);
    /// Secondary index already exists.
    pub const ERR_INDEX_FOUND: Status = Status(200);
    /// Secondary index does not exist.
    pub const ERR_INDEX_NOT_FOUND: Status = Status(201);

    /// Whether this code signals success.
    #[inline]
    pub fn is_ok(self) -> bool {
        self == Status::OK
    }

    /// Symbolic name for known codes.
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Status::ERR_CLIENT => "AEROSPIKE_ERR_CLIENT",
            Status::ERR_PARAM => "AEROSPIKE_ERR_PARAM",
            Status::OK => "AEROSPIKE_OK",
            Status::ERR_SERVER => "AEROSPIKE_ERR_SERVER",
            Status::ERR_RECORD_NOT_FOUND => "AEROSPIKE_ERR_RECORD_NOT_FOUND",
            Status::ERR_RECORD_GENERATION => "AEROSPIKE_ERR_RECORD_GENERATION",
            Status::ERR_REQUEST_INVALID => "AEROSPIKE_ERR_REQUEST_INVALID",
            Status::ERR_RECORD_EXISTS => "AEROSPIKE_ERR_RECORD_EXISTS",
            Status::ERR_TIMEOUT => "AEROSPIKE_ERR_TIMEOUT",
            Status::ERR_BIN_INCOMPATIBLE_TYPE => "AEROSPIKE_ERR_BIN_INCOMPATIBLE_TYPE",
            Status::ERR_ELEMENT_NOT_FOUND => "AEROSPIKE_ERR_FAIL_ELEMENT_NOT_FOUND",
            Status::ERR_ELEMENT_EXISTS => "AEROSPIKE_ERR_FAIL_ELEMENT_EXISTS",
            Status::ERR_UDF => "AEROSPIKE_ERR_UDF",
            Status::ERR_INDEX_FOUND => "AEROSPIKE_ERR_INDEX_FOUND",
            Status::ERR_INDEX_NOT_FOUND => "AEROSPIKE_ERR_INDEX_NOT_FOUND",
            _ => return None,
        };
        Some(name)
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::OK
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "status {}", self.0),
        }
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Status(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_is_zero() {
        assert_eq!(Status::OK.0, 0);
        assert!(Status::OK.is_ok());
        assert!(!Status::ERR_CLIENT.is_ok());
    }

    #[test]
    fn test_display_known_and_unknown() {
        assert_eq!(Status::ERR_CLIENT.to_string(), "AEROSPIKE_ERR_CLIENT (-1)");
        assert_eq!(Status(4242).to_string(), "status 4242");
    }

    #[test]
    fn test_serializes_as_plain_integer() {
        let json = serde_json::to_string(&Status::ERR_RECORD_NOT_FOUND).unwrap();
        assert_eq!(json, "2");
    }
}
