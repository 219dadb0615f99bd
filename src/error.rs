//! Error types for aerospike-command.

use std::panic::Location;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::status::Status;

/// Default message for errors generated inside this layer.
pub const CLIENT_ERROR_MESSAGE: &str = "Client Error";

/// Message for commands issued while the client is disconnected.
pub const NOT_CONNECTED_MESSAGE: &str = "Not connected.";

/// Structured status value as reported by the transport.
///
/// This is what callbacks receive. `func`, `file` and `line` locate where
/// the failure was raised: inside the transport for server errors, at the
/// caller for errors synthesized by this layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Error)]
#[error("{message} [{code}]")]
pub struct AerospikeError {
    /// Status code.
    pub code: Status,
    /// Human-readable description.
    pub message: String,
    /// Function that raised the error, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub func: Option<String>,
    /// Source file that raised the error, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Source line that raised the error, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl AerospikeError {
    /// Create a status with the given code and message.
    pub fn new(code: Status, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            func: None,
            file: None,
            line: None,
        }
    }

    /// The raw success status.
    pub fn ok() -> Self {
        Self::new(Status::OK, "")
    }

    /// A client-side error with the default code.
    pub fn client(message: impl Into<String>) -> Self {
        Self::new(Status::ERR_CLIENT, message)
    }

    /// Attach the location of a caller.
    pub fn at(mut self, func: &str, location: &Location<'_>) -> Self {
        self.func = Some(func.to_string());
        self.file = Some(location.file().to_string());
        self.line = Some(location.line());
        self
    }

    /// Whether this status signals success.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.code.is_ok()
    }
}

/// Main error type for all command-layer operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Error generated inside this layer (not connected, bad arity, ...).
    #[error("Client error: {0}")]
    Client(AerospikeError),

    /// Non-OK status reported by the transport.
    #[error("Server error: {0}")]
    Server(AerospikeError),

    /// Malformed call shape, e.g. no callback could be identified.
    #[error("TypeError: {0}")]
    Type(String),

    /// Filter value kind has no matching index type.
    #[error("Unsupported filter value for bin '{bin}': {kind}")]
    InvalidFilterValue {
        /// Bin the filter was built for.
        bin: String,
        /// Kind of the rejected value.
        kind: &'static str,
    },

    /// GeoJSON text that does not parse.
    #[error("Invalid GeoJSON: {0}")]
    InvalidGeoJson(String),

    /// Transport answered with a response shape the command cannot use.
    #[error("Unexpected response to {command}: {response}")]
    UnexpectedResponse {
        /// Native command name.
        command: &'static str,
        /// Kind of response received.
        response: &'static str,
    },

    /// JSON serialization/deserialization error (configuration).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// I/O error (configuration files, UDF sources).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The not-connected error raised by the connection guard.
    pub fn not_connected() -> Self {
        Error::Client(AerospikeError::client(NOT_CONNECTED_MESSAGE))
    }

    /// Wrap a transport status. Success codes never reach here.
    pub fn from_status(status: AerospikeError) -> Self {
        if status.code == Status::ERR_CLIENT || status.code == Status::ERR_PARAM {
            Error::Client(status)
        } else {
            Error::Server(status)
        }
    }

    /// Status code carried by this error.
    pub fn code(&self) -> Status {
        match self {
            Error::Client(status) | Error::Server(status) => status.code,
            Error::Type(_)
            | Error::InvalidFilterValue { .. }
            | Error::InvalidGeoJson(_)
            | Error::Json(_) => Status::ERR_PARAM,
            _ => Status::ERR_CLIENT,
        }
    }

    /// Convert into the structured value delivered to callbacks.
    pub fn to_status(&self) -> AerospikeError {
        match self {
            Error::Client(status) | Error::Server(status) => status.clone(),
            other => AerospikeError::new(other.code(), other.to_string()),
        }
    }

    /// Whether the server reported that the record does not exist.
    pub fn is_not_found(&self) -> bool {
        self.code() == Status::ERR_RECORD_NOT_FOUND
    }
}

impl From<AerospikeError> for Error {
    fn from(status: AerospikeError) -> Self {
        Error::from_status(status)
    }
}

/// Result type alias using Error.
pub type Result<T> = std::result::Result<T, Error>;
