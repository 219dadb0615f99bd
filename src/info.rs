//! Info protocol responses.
//!
//! An info response is a sequence of lines `command<TAB>value`. Values are
//! often themselves `;`-separated `name=value` lists.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::Host;

/// Response of one node to an info request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoResponse {
    /// Node that answered.
    pub host: Host,
    /// Raw response text.
    pub response: String,
}

impl InfoResponse {
    /// Parse the response into `command -> value`.
    pub fn parse(&self) -> BTreeMap<String, String> {
        parse_info(&self.response)
    }
}

/// Parse raw info text into `command -> value`.
///
/// Lines without a tab map the whole line to an empty value.
pub fn parse_info(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once('\t') {
            Some((command, value)) => (command.to_string(), value.to_string()),
            None => (line.to_string(), String::new()),
        })
        .collect()
}

/// Split a `name=value;name=value` list.
pub fn parse_pairs(value: &str) -> BTreeMap<String, String> {
    value
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}
