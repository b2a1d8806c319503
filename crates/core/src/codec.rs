//! Payload codecs
//!
//! All bytes written by a store pass through a codec. The codec owns the byte
//! layout of a [`StoreRecord`](crate::StoreRecord); the store only relies on
//! the three logical fields round-tripping.
//!
//! Decoders must be self-describing: records are first decoded into an
//! untyped [`RawPayload`](crate::RawPayload) so that old-schema data can be
//! handed to a migrator.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Payload codec trait.
///
/// # Thread Safety
///
/// Codecs must be `Send + Sync` because encoding and decoding run on the
/// blocking worker pool.
pub trait PayloadCodec: Send + Sync + 'static {
    /// Encode a value for storage.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode a value read from storage.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;

    /// Unique codec identifier, used in log output.
    fn codec_id(&self) -> &'static str;
}

/// Codec errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The value could not be encoded.
    #[error("Encode error (codec={codec_id}): {detail}")]
    Encode {
        /// Human-readable error description
        detail: String,
        /// Codec ID that attempted the encode
        codec_id: &'static str,
    },

    /// The bytes could not be decoded.
    ///
    /// Carries the data length so callers can tell an empty or truncated
    /// file apart from malformed content.
    #[error("Decode error (codec={codec_id}, data_len={data_len}): {detail}")]
    Decode {
        /// Human-readable error description
        detail: String,
        /// Codec ID that attempted the decode
        codec_id: &'static str,
        /// Length of the data that failed to decode
        data_len: usize,
    },
}

impl CodecError {
    /// Create an encode error.
    pub fn encode(detail: impl Into<String>, codec_id: &'static str) -> Self {
        CodecError::Encode {
            detail: detail.into(),
            codec_id,
        }
    }

    /// Create a decode error with full diagnostic context.
    pub fn decode(detail: impl Into<String>, codec_id: &'static str, data_len: usize) -> Self {
        CodecError::Decode {
            detail: detail.into(),
            codec_id,
            data_len,
        }
    }

    /// The codec message without the diagnostic prefix.
    pub fn detail(&self) -> &str {
        match self {
            CodecError::Encode { detail, .. } | CodecError::Decode { detail, .. } => detail,
        }
    }
}

/// JSON codec (the default).
///
/// Pretty output keeps store files readable and diffable by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonCodec {
    pretty: bool,
}

impl JsonCodec {
    /// Indented output.
    pub fn pretty() -> Self {
        JsonCodec { pretty: true }
    }

    /// Single-line output.
    pub fn compact() -> Self {
        JsonCodec { pretty: false }
    }

    /// Whether output is indented.
    pub fn is_pretty(&self) -> bool {
        self.pretty
    }
}

impl Default for JsonCodec {
    fn default() -> Self {
        JsonCodec::pretty()
    }
}

impl PayloadCodec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        let result = if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };
        result.map_err(|e| CodecError::encode(e.to_string(), self.codec_id()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes)
            .map_err(|e| CodecError::decode(e.to_string(), self.codec_id(), bytes.len()))
    }

    fn codec_id(&self) -> &'static str {
        "json"
    }
}

/// MessagePack codec.
///
/// Struct fields are written by name so records stay self-describing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MsgpackCodec;

impl PayloadCodec for MsgpackCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        rmp_serde::to_vec_named(value).map_err(|e| CodecError::encode(e.to_string(), self.codec_id()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        rmp_serde::from_slice(bytes)
            .map_err(|e| CodecError::decode(e.to_string(), self.codec_id(), bytes.len()))
    }

    fn codec_id(&self) -> &'static str {
        "msgpack"
    }
}
