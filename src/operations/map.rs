//! Map CDT operations.
//!
//! Index and rank arguments accept negative values (offset from the end,
//! or from the highest rank); they are not range-checked here. Removal
//! builders take an optional [`MapReturnType`] (server default: no result),
//! retrieval builders take it as a required argument.
//!
//! Range bounds use [`Value::Nil`] for "unbounded".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Operation;
use crate::value::Value;

/// Map operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MapOpKind {
    /// Set the map order / write mode.
    SetPolicy,
    /// Write one entry.
    Put,
    /// Write several entries.
    PutItems,
    /// Add to a numeric entry.
    Increment,
    /// Subtract from a numeric entry.
    Decrement,
    /// Remove all entries.
    Clear,
    /// Remove the entry with a key.
    RemoveByKey,
    /// Remove the entries with any of the keys.
    RemoveByKeyList,
    /// Remove entries with keys in `[begin, end)`.
    RemoveByKeyRange,
    /// Remove entries with a value.
    RemoveByValue,
    /// Remove entries with any of the values.
    RemoveByValueList,
    /// Remove entries with values in `[begin, end)`.
    RemoveByValueRange,
    /// Remove the entry at an index.
    RemoveByIndex,
    /// Remove `count` entries from an index.
    RemoveByIndexRange,
    /// Remove the entry with a rank.
    RemoveByRank,
    /// Remove `count` entries from a rank.
    RemoveByRankRange,
    /// Return the entry count.
    Size,
    /// Get the entry with a key.
    GetByKey,
    /// Get entries with keys in `[begin, end)`.
    GetByKeyRange,
    /// Get entries with a value.
    GetByValue,
    /// Get entries with values in `[begin, end)`.
    GetByValueRange,
    /// Get the entry at an index.
    GetByIndex,
    /// Get `count` entries from an index.
    GetByIndexRange,
    /// Get the entry with a rank.
    GetByRank,
    /// Get `count` entries from a rank.
    GetByRankRange,
}

impl MapOpKind {
    /// Whether the operation modifies the bin.
    pub fn is_write(self) -> bool {
        !matches!(
            self,
            MapOpKind::Size
                | MapOpKind::GetByKey
                | MapOpKind::GetByKeyRange
                | MapOpKind::GetByValue
                | MapOpKind::GetByValueRange
                | MapOpKind::GetByIndex
                | MapOpKind::GetByIndexRange
                | MapOpKind::GetByRank
                | MapOpKind::GetByRankRange
        )
    }
}

/// What a map read or removal returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MapReturnType {
    /// Nothing.
    None,
    /// Key index order.
    Index,
    /// Reverse key index order.
    ReverseIndex,
    /// Value order.
    Rank,
    /// Reverse value order.
    ReverseRank,
    /// Element count.
    Count,
    /// Keys.
    Key,
    /// Values.
    Value,
    /// Key/value pairs.
    KeyValue,
}

/// Map ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MapOrder {
    /// No ordering.
    Unordered,
    /// Ordered by key.
    KeyOrdered,
    /// Ordered by key and value.
    KeyValueOrdered,
}

/// How map writes treat existing entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MapWriteMode {
    /// Create or update.
    Update,
    /// Update existing entries only.
    UpdateOnly,
    /// Create new entries only.
    CreateOnly,
}

/// Map policy. Absent fields use the server defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapPolicy {
    /// Map ordering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<MapOrder>,
    /// Write mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_mode: Option<MapWriteMode>,
}

impl MapPolicy {
    /// Policy with both fields set.
    pub fn new(order: MapOrder, write_mode: MapWriteMode) -> Self {
        Self {
            order: Some(order),
            write_mode: Some(write_mode),
        }
    }
}

/// Descriptor for a map operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapOperation {
    /// Operation kind.
    pub op: MapOpKind,
    /// Target bin.
    pub bin: String,
    /// Map key (or key list for `RemoveByKeyList`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Value>,
    /// Map value, item map, value list or increment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Range start (inclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin: Option<Value>,
    /// Range end (exclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Value>,
    /// Index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    /// Rank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<i64>,
    /// Element count for range operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    /// Requested result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<MapReturnType>,
    /// Map policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<MapPolicy>,
}

impl MapOperation {
    fn new(op: MapOpKind, bin: &str) -> Self {
        Self {
            op,
            bin: bin.to_string(),
            key: None,
            value: None,
            begin: None,
            end: None,
            index: None,
            rank: None,
            count: None,
            return_type: None,
            policy: None,
        }
    }

    fn with_key(mut self, key: Value) -> Self {
        self.key = Some(key);
        self
    }

    fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    fn with_range(mut self, begin: Value, end: Value) -> Self {
        self.begin = Some(begin);
        self.end = Some(end);
        self
    }

    fn with_index(mut self, index: i64, count: Option<i64>) -> Self {
        self.index = Some(index);
        self.count = count;
        self
    }

    fn with_rank(mut self, rank: i64, count: Option<i64>) -> Self {
        self.rank = Some(rank);
        self.count = count;
        self
    }

    fn returning(mut self, return_type: Option<MapReturnType>) -> Self {
        self.return_type = return_type;
        self
    }

    fn with_policy(mut self, policy: Option<MapPolicy>) -> Self {
        self.policy = policy;
        self
    }

    fn build(self) -> Operation {
        Operation::Map(self)
    }
}

/// Set the map policy of a bin.
pub fn set_policy(bin: &str, policy: MapPolicy) -> Operation {
    MapOperation::new(MapOpKind::SetPolicy, bin)
        .with_policy(Some(policy))
        .build()
}

/// Write one entry.
pub fn put(
    bin: &str,
    key: impl Into<Value>,
    value: impl Into<Value>,
    policy: Option<MapPolicy>,
) -> Operation {
    MapOperation::new(MapOpKind::Put, bin)
        .with_key(key.into())
        .with_value(value.into())
        .with_policy(policy)
        .build()
}

/// Write several entries.
pub fn put_items(bin: &str, items: BTreeMap<String, Value>, policy: Option<MapPolicy>) -> Operation {
    MapOperation::new(MapOpKind::PutItems, bin)
        .with_value(Value::Map(items))
        .with_policy(policy)
        .build()
}

/// Add `incr` to the entry at `key`.
pub fn increment(
    bin: &str,
    key: impl Into<Value>,
    incr: impl Into<Value>,
    policy: Option<MapPolicy>,
) -> Operation {
    MapOperation::new(MapOpKind::Increment, bin)
        .with_key(key.into())
        .with_value(incr.into())
        .with_policy(policy)
        .build()
}

/// Subtract `decr` from the entry at `key`.
pub fn decrement(
    bin: &str,
    key: impl Into<Value>,
    decr: impl Into<Value>,
    policy: Option<MapPolicy>,
) -> Operation {
    MapOperation::new(MapOpKind::Decrement, bin)
        .with_key(key.into())
        .with_value(decr.into())
        .with_policy(policy)
        .build()
}

/// Remove all entries.
pub fn clear(bin: &str) -> Operation {
    MapOperation::new(MapOpKind::Clear, bin).build()
}

/// Remove the entry with `key`.
pub fn remove_by_key(
    bin: &str,
    key: impl Into<Value>,
    return_type: Option<MapReturnType>,
) -> Operation {
    MapOperation::new(MapOpKind::RemoveByKey, bin)
        .with_key(key.into())
        .returning(return_type)
        .build()
}

/// Remove the entries with any of `keys`.
pub fn remove_by_key_list(
    bin: &str,
    keys: Vec<Value>,
    return_type: Option<MapReturnType>,
) -> Operation {
    MapOperation::new(MapOpKind::RemoveByKeyList, bin)
        .with_key(Value::List(keys))
        .returning(return_type)
        .build()
}

/// Remove entries with keys in `[begin, end)`.
pub fn remove_by_key_range(
    bin: &str,
    begin: impl Into<Value>,
    end: impl Into<Value>,
    return_type: Option<MapReturnType>,
) -> Operation {
    MapOperation::new(MapOpKind::RemoveByKeyRange, bin)
        .with_range(begin.into(), end.into())
        .returning(return_type)
        .build()
}

/// Remove entries whose value equals `value`.
pub fn remove_by_value(
    bin: &str,
    value: impl Into<Value>,
    return_type: Option<MapReturnType>,
) -> Operation {
    MapOperation::new(MapOpKind::RemoveByValue, bin)
        .with_value(value.into())
        .returning(return_type)
        .build()
}

/// Remove entries whose value is any of `values`.
pub fn remove_by_value_list(
    bin: &str,
    values: Vec<Value>,
    return_type: Option<MapReturnType>,
) -> Operation {
    MapOperation::new(MapOpKind::RemoveByValueList, bin)
        .with_value(Value::List(values))
        .returning(return_type)
        .build()
}

/// Remove entries with values in `[begin, end)`.
pub fn remove_by_value_range(
    bin: &str,
    begin: impl Into<Value>,
    end: impl Into<Value>,
    return_type: Option<MapReturnType>,
) -> Operation {
    MapOperation::new(MapOpKind::RemoveByValueRange, bin)
        .with_range(begin.into(), end.into())
        .returning(return_type)
        .build()
}

/// Remove the entry at `index`.
pub fn remove_by_index(bin: &str, index: i64, return_type: Option<MapReturnType>) -> Operation {
    MapOperation::new(MapOpKind::RemoveByIndex, bin)
        .with_index(index, None)
        .returning(return_type)
        .build()
}

/// Remove `count` entries from `index` (all remaining if `None`).
pub fn remove_by_index_range(
    bin: &str,
    index: i64,
    count: Option<i64>,
    return_type: Option<MapReturnType>,
) -> Operation {
    MapOperation::new(MapOpKind::RemoveByIndexRange, bin)
        .with_index(index, count)
        .returning(return_type)
        .build()
}

/// Remove the entry with `rank`.
pub fn remove_by_rank(bin: &str, rank: i64, return_type: Option<MapReturnType>) -> Operation {
    MapOperation::new(MapOpKind::RemoveByRank, bin)
        .with_rank(rank, None)
        .returning(return_type)
        .build()
}

/// Remove `count` entries from `rank` (all remaining if `None`).
pub fn remove_by_rank_range(
    bin: &str,
    rank: i64,
    count: Option<i64>,
    return_type: Option<MapReturnType>,
) -> Operation {
    MapOperation::new(MapOpKind::RemoveByRankRange, bin)
        .with_rank(rank, count)
        .returning(return_type)
        .build()
}

/// Return the number of entries.
pub fn size(bin: &str) -> Operation {
    MapOperation::new(MapOpKind::Size, bin).build()
}

/// Get the entry with `key`.
pub fn get_by_key(bin: &str, key: impl Into<Value>, return_type: MapReturnType) -> Operation {
    MapOperation::new(MapOpKind::GetByKey, bin)
        .with_key(key.into())
        .returning(Some(return_type))
        .build()
}

/// Get entries with keys in `[begin, end)`.
pub fn get_by_key_range(
    bin: &str,
    begin: impl Into<Value>,
    end: impl Into<Value>,
    return_type: MapReturnType,
) -> Operation {
    MapOperation::new(MapOpKind::GetByKeyRange, bin)
        .with_range(begin.into(), end.into())
        .returning(Some(return_type))
        .build()
}

/// Get entries whose value equals `value`.
pub fn get_by_value(bin: &str, value: impl Into<Value>, return_type: MapReturnType) -> Operation {
    MapOperation::new(MapOpKind::GetByValue, bin)
        .with_value(value.into())
        .returning(Some(return_type))
        .build()
}

/// Get entries with values in `[begin, end)`.
pub fn get_by_value_range(
    bin: &str,
    begin: impl Into<Value>,
    end: impl Into<Value>,
    return_type: MapReturnType,
) -> Operation {
    MapOperation::new(MapOpKind::GetByValueRange, bin)
        .with_range(begin.into(), end.into())
        .returning(Some(return_type))
        .build()
}

/// Get the entry at `index`.
pub fn get_by_index(bin: &str, index: i64, return_type: MapReturnType) -> Operation {
    MapOperation::new(MapOpKind::GetByIndex, bin)
        .with_index(index, None)
        .returning(Some(return_type))
        .build()
}

/// Get `count` entries from `index` (all remaining if `None`).
pub fn get_by_index_range(
    bin: &str,
    index: i64,
    count: Option<i64>,
    return_type: MapReturnType,
) -> Operation {
    MapOperation::new(MapOpKind::GetByIndexRange, bin)
        .with_index(index, count)
        .returning(Some(return_type))
        .build()
}

/// Get the entry with `rank`.
pub fn get_by_rank(bin: &str, rank: i64, return_type: MapReturnType) -> Operation {
    MapOperation::new(MapOpKind::GetByRank, bin)
        .with_rank(rank, None)
        .returning(Some(return_type))
        .build()
}

/// Get `count` entries from `rank` (all remaining if `None`).
pub fn get_by_rank_range(
    bin: &str,
    rank: i64,
    count: Option<i64>,
    return_type: MapReturnType,
) -> Operation {
    MapOperation::new(MapOpKind::GetByRankRange, bin)
        .with_rank(rank, count)
        .returning(Some(return_type))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_op(op: Operation) -> MapOperation {
        match op {
            Operation::Map(m) => m,
            other => panic!("expected map op, got {:?}", other),
        }
    }

    #[test]
    fn test_put_without_policy_is_sparse() {
        let json = serde_json::to_value(put("m", "k", 1, None)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"family": "map", "op": "PUT", "bin": "m", "key": "k", "value": 1})
        );
    }

    #[test]
    fn test_put_with_policy() {
        let policy = MapPolicy::new(MapOrder::KeyOrdered, MapWriteMode::CreateOnly);
        let op = map_op(put("m", "k", 1, Some(policy)));
        assert_eq!(op.policy, Some(policy));

        let json = serde_json::to_value(set_policy("m", policy)).unwrap();
        assert_eq!(json["policy"]["order"], "KEY_ORDERED");
        assert_eq!(json["policy"]["write_mode"], "CREATE_ONLY");
    }

    #[test]
    fn test_removal_return_type_is_optional() {
        let op = map_op(remove_by_key("m", "k", None));
        assert!(op.return_type.is_none());

        let op = map_op(remove_by_key("m", "k", Some(MapReturnType::Value)));
        assert_eq!(op.return_type, Some(MapReturnType::Value));
    }

    #[test]
    fn test_negative_rank_and_index_pass_through() {
        let op = map_op(get_by_rank_range("m", -3, None, MapReturnType::Key));
        assert_eq!(op.rank, Some(-3));
        assert!(op.count.is_none());
        assert!(op.index.is_none());

        let op = map_op(remove_by_index_range("m", -1, Some(1), None));
        assert_eq!((op.index, op.count), (Some(-1), Some(1)));
    }

    #[test]
    fn test_ranges_allow_open_bounds() {
        let op = map_op(get_by_key_range("m", "a", Value::Nil, MapReturnType::Count));
        assert_eq!(op.begin, Some(Value::from("a")));
        assert_eq!(op.end, Some(Value::Nil));
    }

    #[test]
    fn test_list_arguments() {
        let op = map_op(remove_by_key_list("m", vec!["a".into(), "b".into()], None));
        assert_eq!(op.key.unwrap().as_list().unwrap().len(), 2);

        let op = map_op(remove_by_value_list("m", vec![1.into()], None));
        assert_eq!(op.op, MapOpKind::RemoveByValueList);
    }

    #[test]
    fn test_increment_decrement() {
        let op = map_op(increment("m", "k", 5, None));
        assert_eq!(op.value, Some(Value::Int(5)));
        assert_eq!(map_op(decrement("m", "k", 2, None)).op, MapOpKind::Decrement);
    }

    #[test]
    fn test_read_kinds() {
        assert!(!MapOpKind::GetByValue.is_write());
        assert!(!MapOpKind::Size.is_write());
        assert!(MapOpKind::RemoveByRank.is_write());
        assert!(MapOpKind::PutItems.is_write());
    }
}
