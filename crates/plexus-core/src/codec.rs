//! Payload codecs.
//!
//! A [`Codec`] turns the typed values a service exchanges into the raw bytes
//! carried in a frame's `data` field. Each service is bound to one codec
//! instance; the same codec may implement `Codec<T>` for many `T`.
//!
//! [`ProtobufCodec`] covers endpoints whose services speak protocol buffers.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::CodecError;

/// Converts `T` to and from payload bytes.
pub trait Codec<T>: Send + Sync + 'static {
    /// Encode a value into payload bytes.
    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode payload bytes into a value.
    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// JSON via `serde_json`, for any serde type.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl<T> Codec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// UTF-8 text.
#[derive(Clone, Copy, Debug, Default)]
pub struct StringCodec;

impl Codec<String> for StringCodec {
    fn encode(&self, value: &String) -> Result<Vec<u8>, CodecError> {
        Ok(value.as_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, CodecError> {
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

/// Raw bytes, unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesCodec;

impl Codec<Vec<u8>> for BytesCodec {
    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>, CodecError> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(bytes.to_vec())
    }
}

/// Protocol buffers via `prost`, for any generated message type.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProtobufCodec;

impl<T> Codec<T> for ProtobufCodec
where
    T: prost::Message + Default,
{
    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(value.encode_to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(T::decode(bytes)?)
    }
}
