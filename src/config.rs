//! Client configuration.
//!
//! [`Config`] is a plain carrier: it copies the recognized fields and
//! ignores everything else. Hosts may be given as a list of `{addr, port}`
//! objects or as a `host[:port][,host[:port]...]` string.
//!
//! # Example
//!
//! ```
//! use aerospike_command::config::Config;
//!
//! let config = Config::from_json(r#"{
//!     "hosts": "10.0.0.1:3100,10.0.0.2",
//!     "connTimeoutMs": 500,
//!     "unknown": true
//! }"#).unwrap();
//!
//! assert_eq!(config.hosts.len(), 2);
//! assert_eq!(config.hosts[1].port, 3000);
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;
use crate::policy::Policies;

/// Environment variable consulted when no hosts are configured.
pub const HOSTS_ENV_VAR: &str = "AEROSPIKE_HOSTS";

/// Host used when neither the configuration nor the environment name one.
pub const DEFAULT_HOST: &str = "localhost";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// A seed host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Host {
    /// Address or host name.
    pub addr: String,
    /// Port.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Host {
    /// Create a host.
    pub fn new(addr: impl Into<String>, port: u16) -> Self {
        Self {
            addr: addr.into(),
            port,
        }
    }

    /// Parse a comma-separated `host[:port]` list.
    ///
    /// Empty entries are skipped; a missing port means [`DEFAULT_PORT`].
    /// Entries whose port does not parse are dropped with a warning.
    pub fn parse_list(list: &str) -> Vec<Host> {
        list.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| match entry.rsplit_once(':') {
                Some((addr, port)) => match port.parse() {
                    Ok(port) => Some(Host::new(addr, port)),
                    Err(e) => {
                        tracing::warn!(entry, error = %e, "skipping host with invalid port");
                        None
                    }
                },
                None => Some(Host::new(entry, DEFAULT_PORT)),
            })
            .collect()
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

/// Transport log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Logging disabled.
    Off,
    /// Errors only.
    Error,
    /// Warnings and above.
    Warn,
    /// Informational and above.
    Info,
    /// Debug and above.
    Debug,
    /// Everything.
    Trace,
}

/// Transport logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<LogLevel>,
    /// File descriptor to log to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<i32>,
}

/// Shared-memory cluster tending configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedMemoryConfig {
    /// Shared memory segment key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<i32>,
    /// Maximum cluster nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_nodes: Option<u32>,
    /// Maximum namespaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_namespaces: Option<u32>,
    /// Seconds before another process takes over tending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub takeover_threshold_sec: Option<u32>,
}

/// Client configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// User name for authenticated clusters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Password for authenticated clusters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Seed hosts.
    #[serde(default, deserialize_with = "deserialize_hosts")]
    pub hosts: Vec<Host>,
    /// Default policies.
    #[serde(default)]
    pub policies: Policies,
    /// Transport logging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<LogConfig>,
    /// Initial connection timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conn_timeout_ms: Option<u32>,
    /// Cluster tend interval in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tender_interval: Option<u32>,
    /// Shared-memory tending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_memory: Option<SharedMemoryConfig>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HostsSpec {
    List(Vec<Host>),
    Text(String),
}

fn deserialize_hosts<'de, D>(deserializer: D) -> std::result::Result<Vec<Host>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match HostsSpec::deserialize(deserializer)? {
        HostsSpec::List(hosts) => hosts,
        HostsSpec::Text(text) => Host::parse_list(&text),
    })
}

impl Config {
    /// Configuration with default hosts.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.apply_default_hosts();
        config
    }

    /// Parse a JSON configuration, ignoring unrecognized fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid JSON or a recognized field
    /// has the wrong shape.
    pub fn from_json(text: &str) -> Result<Self> {
        let mut config: Config = serde_json::from_str(text)?;
        config.apply_default_hosts();
        Ok(config)
    }

    /// Replace the seed hosts with a parsed host list.
    pub fn hosts(mut self, list: &str) -> Self {
        self.hosts = Host::parse_list(list);
        self
    }

    /// Set credentials.
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Set default policies.
    pub fn policies(mut self, policies: Policies) -> Self {
        self.policies = policies;
        self
    }

    /// Fill in hosts from the environment, then localhost, when none are set.
    fn apply_default_hosts(&mut self) {
        if !self.hosts.is_empty() {
            return;
        }
        self.hosts = std::env::var(HOSTS_ENV_VAR)
            .ok()
            .map(|list| Host::parse_list(&list))
            .filter(|hosts| !hosts.is_empty())
            .unwrap_or_else(|| vec![Host::new(DEFAULT_HOST, DEFAULT_PORT)]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::KeyPolicy;

    #[test]
    fn test_parse_list() {
        let hosts = Host::parse_list("a:3100, b ,,");
        assert_eq!(hosts, vec![Host::new("a", 3100), Host::new("b", 3000)]);
    }

    #[test]
    fn test_parse_list_drops_invalid_ports() {
        let hosts = Host::parse_list("db:abc, c:70000, ok:3001");
        assert_eq!(hosts, vec![Host::new("ok", 3001)]);

        let config = Config::new().hosts("db:abc");
        assert!(config.hosts.is_empty());
    }

    #[test]
    fn test_hosts_as_list() {
        let config =
            Config::from_json(r#"{"hosts": [{"addr": "x", "port": 4000}, {"addr": "y"}]}"#)
                .unwrap();
        assert_eq!(config.hosts, vec![Host::new("x", 4000), Host::new("y", 3000)]);
    }

    #[test]
    fn test_recognized_fields_are_copied() {
        let config = Config::from_json(
            r#"{
                "user": "admin",
                "password": "secret",
                "hosts": "db1",
                "policies": {"read": {"key": "SEND"}},
                "log": {"level": "debug"},
                "connTimeoutMs": 250,
                "tenderInterval": 1000,
                "sharedMemory": {"key": 42, "maxNodes": 16},
                "somethingElse": [1, 2, 3]
            }"#,
        )
        .unwrap();

        assert_eq!(config.user.as_deref(), Some("admin"));
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert_eq!(config.conn_timeout_ms, Some(250));
        assert_eq!(config.tender_interval, Some(1000));
        assert_eq!(config.log.unwrap().level, Some(LogLevel::Debug));
        assert_eq!(config.shared_memory.unwrap().max_nodes, Some(16));
        assert_eq!(
            config.policies.read.unwrap().key,
            Some(KeyPolicy::Send)
        );
    }

    #[test]
    fn test_default_hosts_are_never_empty() {
        // Either the environment or localhost supplies at least one host.
        let config = Config::new();
        assert!(!config.hosts.is_empty());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(Config::from_json("{hosts:").is_err());
    }

    #[test]
    fn test_builder_setters() {
        let config = Config::new().hosts("h1:1,h2:2").credentials("u", "p");
        assert_eq!(config.hosts.len(), 2);
        assert_eq!(config.user.as_deref(), Some("u"));
    }
}
