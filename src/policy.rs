//! Per-command policies.
//!
//! A policy is a sparse override set: every field is optional and an absent
//! field means "inherit the global default". Absent fields are omitted from
//! the encoded request so the transport applies its own defaults.

use serde::{Deserialize, Serialize};

/// How the user key is stored alongside the digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyPolicy {
    /// Send only the digest.
    Digest,
    /// Send and store the user key.
    Send,
}

/// Retry behaviour for failed transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetryPolicy {
    /// Do not retry.
    None,
    /// Retry once.
    Once,
}

/// Generation check applied to writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationPolicy {
    /// Ignore generation.
    Ignore,
    /// Write only if generations match.
    Eq,
    /// Write only if the expected generation is greater.
    Gt,
}

/// Record-existence requirement applied to writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExistsPolicy {
    /// Write regardless.
    Ignore,
    /// Only create.
    Create,
    /// Only update.
    Update,
    /// Only replace.
    Replace,
    /// Create or replace.
    CreateOrReplace,
}

/// Which replica serves reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplicaPolicy {
    /// Master only.
    Master,
    /// Any replica.
    Any,
}

/// Read consistency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsistencyLevel {
    /// Read one replica.
    One,
    /// Read all replicas.
    All,
}

/// Write commit level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommitLevel {
    /// Wait for all replicas.
    All,
    /// Wait for the master only.
    Master,
}

macro_rules! policy {
    ($(#[$meta:meta])* $name:ident { $($(#[$fmeta:meta])* $field:ident: $ty:ty,)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            /// Total transaction timeout in milliseconds.
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub timeout: Option<u32>,
            $(
                $(#[$fmeta])*
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
        }

        impl $name {
            /// Empty override set.
            pub fn new() -> Self {
                Self::default()
            }

            /// Override the timeout.
            pub fn timeout(mut self, ms: u32) -> Self {
                self.timeout = Some(ms);
                self
            }
        }
    };
}

policy!(
    /// Policy for read commands (`get`, `select`, `exists`).
    ReadPolicy {
        /// Key storage mode.
        key: KeyPolicy,
        /// Replica selection.
        replica: ReplicaPolicy,
        /// Consistency level.
        consistency_level: ConsistencyLevel,
        /// Retry behaviour.
        retry: RetryPolicy,
    }
);

policy!(
    /// Policy for `put`.
    WritePolicy {
        /// Key storage mode.
        key: KeyPolicy,
        /// Generation check.
        gen: GenerationPolicy,
        /// Existence requirement.
        exists: ExistsPolicy,
        /// Commit level.
        commit_level: CommitLevel,
        /// Retry behaviour.
        retry: RetryPolicy,
    }
);

policy!(
    /// Policy for `remove`.
    RemovePolicy {
        /// Expected generation when `gen` is `Eq`.
        generation: u32,
        /// Key storage mode.
        key: KeyPolicy,
        /// Generation check.
        gen: GenerationPolicy,
        /// Commit level.
        commit_level: CommitLevel,
        /// Retry behaviour.
        retry: RetryPolicy,
    }
);

policy!(
    /// Policy for `operate` and its shortcuts.
    OperatePolicy {
        /// Key storage mode.
        key: KeyPolicy,
        /// Generation check.
        gen: GenerationPolicy,
        /// Replica selection.
        replica: ReplicaPolicy,
        /// Consistency level.
        consistency_level: ConsistencyLevel,
        /// Commit level.
        commit_level: CommitLevel,
        /// Retry behaviour.
        retry: RetryPolicy,
    }
);

policy!(
    /// Policy for record UDF application.
    ApplyPolicy {
        /// Key storage mode.
        key: KeyPolicy,
        /// Commit level.
        commit_level: CommitLevel,
    }
);

policy!(
    /// Policy for batch reads.
    BatchPolicy {
        /// Run batch sub-requests concurrently on the server.
        concurrent: bool,
    }
);

policy!(
    /// Policy for info requests.
    InfoPolicy {
        /// Send the request verbatim without appending a newline.
        send_as_is: bool,
        /// Verify response length bounds.
        check_bounds: bool,
    }
);

policy!(
    /// Policy for queries.
    QueryPolicy {}
);

policy!(
    /// Policy for UDF module registration and removal.
    UdfPolicy {}
);

policy!(
    /// Policy for secondary index management.
    IndexPolicy {}
);

/// Default policies per command family, used when a command carries no
/// policy of its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policies {
    /// Defaults for reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read: Option<ReadPolicy>,
    /// Defaults for writes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write: Option<WritePolicy>,
    /// Defaults for removes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove: Option<RemovePolicy>,
    /// Defaults for operate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operate: Option<OperatePolicy>,
    /// Defaults for UDF application.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply: Option<ApplyPolicy>,
    /// Defaults for batch reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<BatchPolicy>,
    /// Defaults for info requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<InfoPolicy>,
    /// Defaults for queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryPolicy>,
}
