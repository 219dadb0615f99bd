//! Operation descriptors for `operate`.
//!
//! Builders are pure functions returning an [`Operation`]:
//!
//! - scalar builders at the module root: [`read`], [`write`], [`incr`],
//!   [`append`], [`prepend`], [`touch`]
//! - list builders at the module root: [`list_append`] ... [`list_size`]
//! - map builders in [`map`]: [`map::put`], [`map::get_by_key`], ...
//!
//! Optional arguments that are not supplied are left out of the descriptor
//! so the transport applies its own defaults. Index, rank and count
//! arguments are passed through unvalidated; negative values count from
//! the end and bounds are checked by the server.
//!
//! # Example
//!
//! ```
//! use aerospike_command::operations::{self, map, MapReturnType};
//!
//! let ops = vec![
//!     operations::incr("count", 1),
//!     operations::read("count"),
//!     map::get_by_rank_range("scores", -3, None, MapReturnType::KeyValue),
//! ];
//! assert_eq!(ops.len(), 3);
//! ```

mod list;
pub mod map;
mod scalar;

use serde::{Deserialize, Serialize};

pub use list::{
    list_append, list_append_items, list_clear, list_get, list_get_range, list_insert,
    list_insert_items, list_pop, list_pop_range, list_remove, list_remove_range, list_set,
    list_size, list_trim, ListOpKind, ListOperation,
};
pub use map::{MapOpKind, MapOperation, MapOrder, MapPolicy, MapReturnType, MapWriteMode};
pub use scalar::{add, append, incr, prepend, read, touch, write, ScalarOpKind, ScalarOperation};

/// An operation on one bin of a record.
///
/// The `family` discriminant tells the transport which serializer to route
/// the descriptor to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "lowercase")]
pub enum Operation {
    /// Whole-bin operation.
    Scalar(ScalarOperation),
    /// List CDT operation.
    List(ListOperation),
    /// Map CDT operation.
    Map(MapOperation),
}

impl Operation {
    /// Bin this operation targets.
    pub fn bin(&self) -> &str {
        match self {
            Operation::Scalar(op) => &op.bin,
            Operation::List(op) => &op.bin,
            Operation::Map(op) => &op.bin,
        }
    }

    /// Whether this is a complex data type operation.
    pub fn is_cdt(&self) -> bool {
        !matches!(self, Operation::Scalar(_))
    }

    /// Whether this operation modifies the record.
    pub fn is_write(&self) -> bool {
        match self {
            Operation::Scalar(op) => op.op != ScalarOpKind::Read,
            Operation::List(op) => op.op.is_write(),
            Operation::Map(op) => op.op.is_write(),
        }
    }
}

impl From<ScalarOperation> for Operation {
    fn from(op: ScalarOperation) -> Self {
        Operation::Scalar(op)
    }
}

impl From<ListOperation> for Operation {
    fn from(op: ListOperation) -> Self {
        Operation::List(op)
    }
}

impl From<MapOperation> for Operation {
    fn from(op: MapOperation) -> Self {
        Operation::Map(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MsgPackCodec;

    #[test]
    fn test_builders_are_deterministic() {
        assert_eq!(incr("x", 5), incr("x", 5));
        assert_eq!(
            map::remove_by_key_range("m", "a", "c", Some(MapReturnType::Count)),
            map::remove_by_key_range("m", "a", "c", Some(MapReturnType::Count))
        );
    }

    #[test]
    fn test_family_discriminant_on_the_wire() {
        let json = serde_json::to_value(incr("x", 5)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"family": "scalar", "op": "INCR", "bin": "x", "value": 5})
        );

        let json = serde_json::to_value(list_size("l")).unwrap();
        assert_eq!(json["family"], "list");
        assert_eq!(json["op"], "SIZE");
    }

    #[test]
    fn test_msgpack_encoding_is_stable() {
        let a = MsgPackCodec::encode(&vec![incr("x", 5), read("x")]).unwrap();
        let b = MsgPackCodec::encode(&vec![incr("x", 5), read("x")]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_classification() {
        assert!(!read("a").is_write());
        assert!(write("a", 1).is_write());
        assert!(list_get("l", 0).is_cdt());
        assert!(!list_get("l", 0).is_write());
        assert!(map::clear("m").is_write());
        assert_eq!(map::size("m").bin(), "m");
    }
}
