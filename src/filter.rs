//! Secondary index predicates for queries.
//!
//! The index type a predicate targets is inferred from the value kind:
//! strings target `STRING` indexes, integers `NUMERIC` and GeoJSON
//! `GEO2DSPHERE`. Any other kind is rejected when the filter is built,
//! before a command is issued.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::{GeoJson, Value};

/// Secondary index value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexType {
    /// Integer index.
    Numeric,
    /// String index.
    String,
    /// Geospatial index.
    #[serde(rename = "GEO2DSPHERE")]
    Geo2dSphere,
}

/// Predicate kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Predicate {
    /// Equality, or geo containment for `GEO2DSPHERE`.
    Equal,
    /// Inclusive range, or geo region for `GEO2DSPHERE`.
    Range,
}

/// Value kinds accepted by [`equal`].
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// String value.
    String(String),
    /// Integer value.
    Integer(i64),
    /// Floating-point value; targets the numeric index like integers.
    Float(f64),
    /// Geo value.
    Geo(GeoJson),
    /// Any other value; always rejected.
    Other(Value),
}

impl From<Value> for FilterValue {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => FilterValue::String(s),
            Value::Int(i) => FilterValue::Integer(i),
            Value::Float(x) => FilterValue::Float(x),
            Value::GeoJson(g) => FilterValue::Geo(g),
            other => FilterValue::Other(other),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::String(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::String(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        FilterValue::Integer(v)
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        FilterValue::Integer(v as i64)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        FilterValue::Float(v)
    }
}

impl From<GeoJson> for FilterValue {
    fn from(v: GeoJson) -> Self {
        FilterValue::Geo(v)
    }
}

/// A query predicate on one bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Predicate kind.
    pub predicate: Predicate,
    /// Bin the predicate applies to.
    pub bin: String,
    /// Index type the predicate targets.
    #[serde(rename = "type")]
    pub index_type: IndexType,
    /// Operand for `EQUAL` and geo predicates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val: Option<Value>,
    /// Lower bound for numeric `RANGE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    /// Upper bound for numeric `RANGE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

impl Filter {
    /// Whether a bin value satisfies this predicate.
    ///
    /// Geo predicates only match identical GeoJSON text; real region
    /// containment is evaluated by the server.
    pub fn matches(&self, value: &Value) -> bool {
        match (self.predicate, self.index_type) {
            (Predicate::Equal, IndexType::String) => self.val.as_ref() == Some(value),
            (Predicate::Equal, IndexType::Numeric) => match (&self.val, value) {
                (Some(Value::Int(a)), Value::Int(b)) => a == b,
                (Some(a), b) => matches!((a.as_f64(), b.as_f64()), (Some(x), Some(y)) if x == y),
                _ => false,
            },
            (Predicate::Range, IndexType::Numeric) => match (value.as_int(), self.min, self.max) {
                (Some(v), Some(min), Some(max)) => min <= v && v <= max,
                _ => false,
            },
            (_, IndexType::Geo2dSphere) => match (&self.val, value) {
                (Some(Value::String(a)), Value::GeoJson(b)) => a == b.as_str(),
                (Some(a), b) => a == b,
                _ => false,
            },
            _ => false,
        }
    }
}

/// Equality predicate; the index type follows the value kind.
///
/// # Errors
///
/// Returns [`Error::InvalidFilterValue`] for values that are neither
/// strings nor numbers.
pub fn equal(bin: &str, value: impl Into<FilterValue>) -> Result<Filter> {
    let (index_type, val) = match value.into() {
        FilterValue::String(s) => (IndexType::String, Value::String(s)),
        FilterValue::Integer(i) => (IndexType::Numeric, Value::Int(i)),
        FilterValue::Float(x) => (IndexType::Numeric, Value::Float(x)),
        FilterValue::Geo(_) => {
            return Err(Error::InvalidFilterValue {
                bin: bin.to_string(),
                kind: "geojson (use geo_within or geo_contains)",
            })
        }
        FilterValue::Other(v) => {
            return Err(Error::InvalidFilterValue {
                bin: bin.to_string(),
                kind: v.kind(),
            })
        }
    };
    Ok(Filter {
        predicate: Predicate::Equal,
        bin: bin.to_string(),
        index_type,
        val: Some(val),
        min: None,
        max: None,
    })
}

/// Inclusive numeric range predicate.
pub fn range(bin: &str, min: i64, max: i64) -> Filter {
    Filter {
        predicate: Predicate::Range,
        bin: bin.to_string(),
        index_type: IndexType::Numeric,
        val: None,
        min: Some(min),
        max: Some(max),
    }
}

/// Geo argument: a validated document or a plain JSON object.
#[derive(Debug, Clone, PartialEq)]
pub enum GeoArg {
    /// Validated GeoJSON.
    GeoJson(GeoJson),
    /// JSON object serialized to text on use.
    Json(serde_json::Value),
}

impl From<GeoJson> for GeoArg {
    fn from(v: GeoJson) -> Self {
        GeoArg::GeoJson(v)
    }
}

impl From<serde_json::Value> for GeoArg {
    fn from(v: serde_json::Value) -> Self {
        GeoArg::Json(v)
    }
}

fn geo_filter(predicate: Predicate, bin: &str, geo: GeoArg) -> Result<Filter> {
    let geo = match geo {
        GeoArg::GeoJson(g) => g,
        GeoArg::Json(obj) => GeoJson::from_json(&obj)?,
    };
    Ok(Filter {
        predicate,
        bin: bin.to_string(),
        index_type: IndexType::Geo2dSphere,
        val: Some(Value::String(geo.as_str().to_string())),
        min: None,
        max: None,
    })
}

/// Points in `bin` that lie within the region `geo`.
pub fn geo_within(bin: &str, geo: impl Into<GeoArg>) -> Result<Filter> {
    geo_filter(Predicate::Range, bin, geo.into())
}

/// Regions in `bin` that contain the point `geo`.
pub fn geo_contains(bin: &str, geo: impl Into<GeoArg>) -> Result<Filter> {
    geo_filter(Predicate::Equal, bin, geo.into())
}
