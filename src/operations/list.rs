//! List CDT operations.

use serde::{Deserialize, Serialize};

use super::Operation;
use crate::value::Value;

/// List operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListOpKind {
    /// Append one value.
    Append,
    /// Append several values.
    AppendItems,
    /// Insert one value at an index.
    Insert,
    /// Insert several values at an index.
    InsertItems,
    /// Remove and return the value at an index.
    Pop,
    /// Remove and return a range of values.
    PopRange,
    /// Remove the value at an index.
    Remove,
    /// Remove a range of values.
    RemoveRange,
    /// Remove all values.
    Clear,
    /// Replace the value at an index.
    Set,
    /// Keep only a range of values.
    Trim,
    /// Return the value at an index.
    Get,
    /// Return a range of values.
    GetRange,
    /// Return the element count.
    Size,
}

impl ListOpKind {
    /// Whether the operation modifies the bin.
    pub fn is_write(self) -> bool {
        !matches!(
            self,
            ListOpKind::Get | ListOpKind::GetRange | ListOpKind::Size
        )
    }
}

/// Descriptor for a list operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListOperation {
    /// Operation kind.
    pub op: ListOpKind,
    /// Target bin.
    pub bin: String,
    /// Start index; negative counts from the end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    /// Element count for range operations; absent means "to the end".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    /// Operand value (a list for the `*_items` kinds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ListOperation {
    fn new(op: ListOpKind, bin: &str) -> Self {
        Self {
            op,
            bin: bin.to_string(),
            index: None,
            count: None,
            value: None,
        }
    }

    fn index(mut self, index: i64) -> Self {
        self.index = Some(index);
        self
    }

    fn count(mut self, count: Option<i64>) -> Self {
        self.count = count;
        self
    }

    fn value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

/// Append a value to the list.
pub fn list_append(bin: &str, value: impl Into<Value>) -> Operation {
    ListOperation::new(ListOpKind::Append, bin)
        .value(value.into())
        .into()
}

/// Append several values to the list.
pub fn list_append_items(bin: &str, items: Vec<Value>) -> Operation {
    ListOperation::new(ListOpKind::AppendItems, bin)
        .value(Value::List(items))
        .into()
}

/// Insert a value at `index`.
pub fn list_insert(bin: &str, index: i64, value: impl Into<Value>) -> Operation {
    ListOperation::new(ListOpKind::Insert, bin)
        .index(index)
        .value(value.into())
        .into()
}

/// Insert several values at `index`.
pub fn list_insert_items(bin: &str, index: i64, items: Vec<Value>) -> Operation {
    ListOperation::new(ListOpKind::InsertItems, bin)
        .index(index)
        .value(Value::List(items))
        .into()
}

/// Remove and return the value at `index`.
pub fn list_pop(bin: &str, index: i64) -> Operation {
    ListOperation::new(ListOpKind::Pop, bin).index(index).into()
}

/// Remove and return `count` values from `index` (all remaining if `None`).
pub fn list_pop_range(bin: &str, index: i64, count: Option<i64>) -> Operation {
    ListOperation::new(ListOpKind::PopRange, bin)
        .index(index)
        .count(count)
        .into()
}

/// Remove the value at `index`.
pub fn list_remove(bin: &str, index: i64) -> Operation {
    ListOperation::new(ListOpKind::Remove, bin).index(index).into()
}

/// Remove `count` values from `index` (all remaining if `None`).
pub fn list_remove_range(bin: &str, index: i64, count: Option<i64>) -> Operation {
    ListOperation::new(ListOpKind::RemoveRange, bin)
        .index(index)
        .count(count)
        .into()
}

/// Remove all values.
pub fn list_clear(bin: &str) -> Operation {
    ListOperation::new(ListOpKind::Clear, bin).into()
}

/// Replace the value at `index`.
pub fn list_set(bin: &str, index: i64, value: impl Into<Value>) -> Operation {
    ListOperation::new(ListOpKind::Set, bin)
        .index(index)
        .value(value.into())
        .into()
}

/// Keep only `count` values starting at `index`.
pub fn list_trim(bin: &str, index: i64, count: i64) -> Operation {
    ListOperation::new(ListOpKind::Trim, bin)
        .index(index)
        .count(Some(count))
        .into()
}

/// Return the value at `index`.
pub fn list_get(bin: &str, index: i64) -> Operation {
    ListOperation::new(ListOpKind::Get, bin).index(index).into()
}

/// Return `count` values from `index` (all remaining if `None`).
pub fn list_get_range(bin: &str, index: i64, count: Option<i64>) -> Operation {
    ListOperation::new(ListOpKind::GetRange, bin)
        .index(index)
        .count(count)
        .into()
}

/// Return the number of elements.
pub fn list_size(bin: &str) -> Operation {
    ListOperation::new(ListOpKind::Size, bin).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_op(op: Operation) -> ListOperation {
        match op {
            Operation::List(l) => l,
            other => panic!("expected list op, got {:?}", other),
        }
    }

    #[test]
    fn test_optional_count_is_omitted() {
        let json = serde_json::to_value(list_get_range("l", 2, None)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"family": "list", "op": "GET_RANGE", "bin": "l", "index": 2})
        );

        let op = list_op(list_get_range("l", 2, Some(3)));
        assert_eq!(op.count, Some(3));
    }

    #[test]
    fn test_negative_index_passes_through() {
        let op = list_op(list_pop("l", -1));
        assert_eq!(op.index, Some(-1));
    }

    #[test]
    fn test_items_are_wrapped_in_a_list() {
        let op = list_op(list_append_items("l", vec![Value::from(1), Value::from(2)]));
        assert_eq!(op.op, ListOpKind::AppendItems);
        assert_eq!(op.value.unwrap().as_list().unwrap().len(), 2);

        let op = list_op(list_insert_items("l", 0, vec![Value::from("a")]));
        assert_eq!(op.index, Some(0));
    }

    #[test]
    fn test_trim_requires_count() {
        let op = list_op(list_trim("l", 1, 2));
        assert_eq!((op.index, op.count), (Some(1), Some(2)));
    }

    #[test]
    fn test_read_kinds() {
        assert!(!ListOpKind::Size.is_write());
        assert!(!ListOpKind::GetRange.is_write());
        assert!(ListOpKind::Set.is_write());
        assert!(ListOpKind::Clear.is_write());
    }
}
