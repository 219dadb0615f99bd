//! MsgPack codec using `rmp-serde`.
//!
//! Always `to_vec_named`, never `to_vec`: descriptors are sparse structs
//! and the transport looks fields up by name. Positional encoding would make
//! an omitted optional field shift every field after it.

use bytes::Bytes;

use crate::error::Result;

/// MessagePack codec for descriptors and requests.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes (struct-as-map).
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Encode a value into a shareable buffer.
    #[inline]
    pub fn encode_bytes<T: serde::Serialize>(value: &T) -> Result<Bytes> {
        Self::encode(value).map(Bytes::from)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
