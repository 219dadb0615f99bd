//! Codec module - request encoding for the transport boundary.
//!
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (`to_vec_named`)
//!
//! Every [`Request`](crate::transport::Request) has a canonical msgpack
//! encoding. Two requests that encode to the same bytes are the same
//! request as far as the transport is concerned; this is how operation
//! shortcuts are checked against their explicit `operate` form.
//!
//! # Example
//!
//! ```
//! use aerospike_command::codec::MsgPackCodec;
//! use aerospike_command::operations;
//!
//! let encoded = MsgPackCodec::encode(&operations::incr("x", 5)).unwrap();
//! let decoded: aerospike_command::Operation = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, operations::incr("x", 5));
//! ```

mod msgpack;

pub use msgpack::MsgPackCodec;
