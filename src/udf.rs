//! User-defined function descriptors.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Invocation of a function in a registered UDF module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UdfCall {
    /// Module name (file name without extension).
    pub module: String,
    /// Function name.
    pub funcname: String,
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Value>,
}

impl UdfCall {
    /// Create an invocation.
    pub fn new(module: impl Into<String>, funcname: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            module: module.into(),
            funcname: funcname.into(),
            args,
        }
    }

    /// Expand into the three positional slots `module, funcname, args`.
    pub fn into_triple(self) -> [Value; 3] {
        [
            Value::String(self.module),
            Value::String(self.funcname),
            Value::List(self.args),
        ]
    }
}

/// Language of a UDF module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UdfType {
    /// Lua source.
    #[default]
    Lua,
}

/// Server-side file name of a module registered from `path`.
pub fn module_file_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

/// Whether a `udf-list` info value names `module`.
///
/// The value is a `;`-separated list of entries such as
/// `filename=agg.lua,hash=...,type=LUA`.
pub fn module_listed(udf_list: &str, module: &str) -> bool {
    udf_list
        .split(';')
        .flat_map(|entry| entry.split(','))
        .filter_map(|field| field.split_once('='))
        .any(|(name, value)| name.trim() == "filename" && value.trim() == module)
}
