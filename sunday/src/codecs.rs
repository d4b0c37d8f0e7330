//! Media-type codec registries.
//!
//! Encoders and decoders are registered against a [`MediaType`] and located
//! with wildcard-aware [`MediaType::compatible`] matching; the first
//! registration wins. Codec implementations are object safe and mediate
//! bodies through [`serde_json::Value`], which the registries bridge to
//! typed values with serde.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::error::BoxError;
use crate::error::RequestEncodingError;
use crate::error::ResponseDecodingError;
use crate::media_type::MediaType;
use crate::query_encoder::WwwFormUrlEncoder;

/// Codec-level failure, wrapped by the registries into
/// `serialization_failed` / `deserialization_failed` faults that carry the
/// content type.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The codec cannot translate values of this kind.
    #[error("translation of {kind} values is not supported")]
    TranslationNotSupported {
        /// JSON kind of the offending value.
        kind: &'static str,
    },

    /// JSON (de)serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// CBOR (de)serialization failure.
    #[error("cbor: {0}")]
    Cbor(#[source] BoxError),

    /// Text payload was not valid UTF-8.
    #[error("invalid UTF-8 text payload")]
    InvalidText(#[from] std::str::Utf8Error),
}

/// JSON kind name of a value, used in codec diagnostics.
pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Encodes a dynamic value into a wire body.
pub trait MediaTypeEncoder: Send + Sync + std::fmt::Debug {
    /// Encode the value, or fail with the codec-level cause.
    fn encode_value(&self, value: &Value) -> Result<Bytes, CodecError>;
}

/// Decodes a wire body into a dynamic value.
pub trait MediaTypeDecoder: Send + Sync + std::fmt::Debug {
    /// Decode the body, or fail with the codec-level cause.
    fn decode_value(&self, data: &[u8]) -> Result<Value, CodecError>;
}

/// `application/json` codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl MediaTypeEncoder for JsonCodec {
    fn encode_value(&self, value: &Value) -> Result<Bytes, CodecError> {
        Ok(Bytes::from(serde_json::to_vec(value)?))
    }
}

impl MediaTypeDecoder for JsonCodec {
    fn decode_value(&self, data: &[u8]) -> Result<Value, CodecError> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// `application/cbor` codec, transcoding through the dynamic value form.
#[derive(Debug, Clone, Copy, Default)]
pub struct CborCodec;

impl MediaTypeEncoder for CborCodec {
    fn encode_value(&self, value: &Value) -> Result<Bytes, CodecError> {
        let mut buffer = Vec::new();
        ciborium::ser::into_writer(value, &mut buffer)
            .map_err(|e| CodecError::Cbor(Box::new(e)))?;
        Ok(Bytes::from(buffer))
    }
}

impl MediaTypeDecoder for CborCodec {
    fn decode_value(&self, data: &[u8]) -> Result<Value, CodecError> {
        ciborium::de::from_reader(data).map_err(|e| CodecError::Cbor(Box::new(e)))
    }
}

/// `text/*` codec carrying UTF-8 strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl MediaTypeEncoder for TextCodec {
    fn encode_value(&self, value: &Value) -> Result<Bytes, CodecError> {
        match value {
            Value::String(text) => Ok(Bytes::from(text.clone().into_bytes())),
            other => Err(CodecError::TranslationNotSupported {
                kind: kind_of(other),
            }),
        }
    }
}

impl MediaTypeDecoder for TextCodec {
    fn decode_value(&self, data: &[u8]) -> Result<Value, CodecError> {
        Ok(Value::String(std::str::from_utf8(data)?.to_string()))
    }
}

/// `application/octet-stream` codec carrying raw bytes.
///
/// Byte bodies surface as arrays of integers on the dynamic-value side, so
/// `Vec<u8>` round-trips through the registry helpers.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl MediaTypeEncoder for BinaryCodec {
    fn encode_value(&self, value: &Value) -> Result<Bytes, CodecError> {
        match value {
            Value::Array(items) => {
                let mut bytes = Vec::with_capacity(items.len());
                for item in items {
                    let byte = item
                        .as_u64()
                        .filter(|b| *b <= u8::MAX as u64)
                        .ok_or(CodecError::TranslationNotSupported {
                            kind: kind_of(item),
                        })?;
                    bytes.push(byte as u8);
                }
                Ok(Bytes::from(bytes))
            }
            Value::String(text) => Ok(Bytes::from(text.clone().into_bytes())),
            other => Err(CodecError::TranslationNotSupported {
                kind: kind_of(other),
            }),
        }
    }
}

impl MediaTypeDecoder for BinaryCodec {
    fn decode_value(&self, data: &[u8]) -> Result<Value, CodecError> {
        Ok(Value::Array(data.iter().map(|b| Value::from(*b)).collect()))
    }
}

impl MediaTypeEncoder for WwwFormUrlEncoder {
    fn encode_value(&self, value: &Value) -> Result<Bytes, CodecError> {
        Ok(Bytes::from(self.encode(value)?.into_bytes()))
    }
}

/// Immutable encoder registry.
#[derive(Clone, Default)]
pub struct MediaTypeEncoders {
    entries: Arc<Vec<(MediaType, Arc<dyn MediaTypeEncoder>)>>,
}

impl MediaTypeEncoders {
    /// Start building a registry.
    pub fn builder() -> MediaTypeEncodersBuilder {
        MediaTypeEncodersBuilder::default()
    }

    /// Registry with the standard codecs registered.
    pub fn default_registry() -> Self {
        Self::builder().register_defaults().build()
    }

    /// Locate the first compatible encoder.
    pub fn find(
        &self,
        media_type: &MediaType,
    ) -> Result<Arc<dyn MediaTypeEncoder>, RequestEncodingError> {
        self.entries
            .iter()
            .find(|(registered, _)| registered.compatible(media_type))
            .map(|(_, encoder)| encoder.clone())
            .ok_or_else(|| RequestEncodingError::UnsupportedContentType(media_type.clone()))
    }

    /// Whether any encoder is registered for the media type.
    pub fn supports(&self, media_type: &MediaType) -> bool {
        self.entries
            .iter()
            .any(|(registered, _)| registered.compatible(media_type))
    }

    /// Encode a typed value for the media type.
    pub fn encode<T: Serialize>(
        &self,
        media_type: &MediaType,
        value: &T,
    ) -> Result<Bytes, RequestEncodingError> {
        let encoder = self.find(media_type)?;
        let value = serde_json::to_value(value).map_err(|e| {
            RequestEncodingError::SerializationFailed {
                content_type: media_type.clone(),
                source: Box::new(e),
            }
        })?;
        self.encode_dynamic(media_type, &encoder, &value)
    }

    pub(crate) fn encode_dynamic(
        &self,
        media_type: &MediaType,
        encoder: &Arc<dyn MediaTypeEncoder>,
        value: &Value,
    ) -> Result<Bytes, RequestEncodingError> {
        encoder
            .encode_value(value)
            .map_err(|e| RequestEncodingError::SerializationFailed {
                content_type: media_type.clone(),
                source: Box::new(e),
            })
    }
}

/// Builder for [`MediaTypeEncoders`].
#[derive(Default)]
pub struct MediaTypeEncodersBuilder {
    entries: Vec<(MediaType, Arc<dyn MediaTypeEncoder>)>,
}

impl MediaTypeEncodersBuilder {
    /// Register an encoder for a media type. Earlier registrations win.
    pub fn register(mut self, media_type: MediaType, encoder: Arc<dyn MediaTypeEncoder>) -> Self {
        self.entries.push((media_type, encoder));
        self
    }

    /// Register the standard codecs: JSON, CBOR, form-urlencoded, text and
    /// octet-stream.
    pub fn register_defaults(self) -> Self {
        self.register(MediaType::json(), Arc::new(JsonCodec))
            .register(MediaType::cbor(), Arc::new(CborCodec))
            .register(
                MediaType::www_form_url_encoded(),
                Arc::new(WwwFormUrlEncoder::default()),
            )
            .register(MediaType::any_text(), Arc::new(TextCodec))
            .register(MediaType::octet_stream(), Arc::new(BinaryCodec))
    }

    /// Seal the registry.
    pub fn build(self) -> MediaTypeEncoders {
        MediaTypeEncoders {
            entries: Arc::new(self.entries),
        }
    }
}

/// Immutable decoder registry.
#[derive(Clone, Default)]
pub struct MediaTypeDecoders {
    entries: Arc<Vec<(MediaType, Arc<dyn MediaTypeDecoder>)>>,
}

impl MediaTypeDecoders {
    /// Start building a registry.
    pub fn builder() -> MediaTypeDecodersBuilder {
        MediaTypeDecodersBuilder::default()
    }

    /// Registry with the standard codecs registered.
    pub fn default_registry() -> Self {
        Self::builder().register_defaults().build()
    }

    /// Locate the first compatible decoder.
    pub fn find(
        &self,
        media_type: &MediaType,
    ) -> Result<Arc<dyn MediaTypeDecoder>, ResponseDecodingError> {
        self.entries
            .iter()
            .find(|(registered, _)| registered.compatible(media_type))
            .map(|(_, decoder)| decoder.clone())
            .ok_or_else(|| ResponseDecodingError::UnsupportedContentType(media_type.clone()))
    }

    /// Whether any decoder is registered for the media type.
    pub fn supports(&self, media_type: &MediaType) -> bool {
        self.entries
            .iter()
            .any(|(registered, _)| registered.compatible(media_type))
    }

    /// Decode a typed value from a wire body.
    pub fn decode<T: DeserializeOwned>(
        &self,
        media_type: &MediaType,
        data: &[u8],
    ) -> Result<T, ResponseDecodingError> {
        let value = self.decode_dynamic(media_type, data)?;
        serde_json::from_value(value).map_err(|e| ResponseDecodingError::DeserializationFailed {
            content_type: media_type.clone(),
            source: Box::new(e),
        })
    }

    /// Decode into the dynamic value form.
    pub(crate) fn decode_dynamic(
        &self,
        media_type: &MediaType,
        data: &[u8],
    ) -> Result<Value, ResponseDecodingError> {
        let decoder = self.find(media_type)?;
        decoder
            .decode_value(data)
            .map_err(|e| ResponseDecodingError::DeserializationFailed {
                content_type: media_type.clone(),
                source: Box::new(e),
            })
    }
}

/// Builder for [`MediaTypeDecoders`].
#[derive(Default)]
pub struct MediaTypeDecodersBuilder {
    entries: Vec<(MediaType, Arc<dyn MediaTypeDecoder>)>,
}

impl MediaTypeDecodersBuilder {
    /// Register a decoder for a media type. Earlier registrations win.
    pub fn register(mut self, media_type: MediaType, decoder: Arc<dyn MediaTypeDecoder>) -> Self {
        self.entries.push((media_type, decoder));
        self
    }

    /// Register the standard codecs: JSON (plus `problem+json`), CBOR (plus
    /// `problem+cbor`), text and octet-stream.
    pub fn register_defaults(self) -> Self {
        self.register(MediaType::json(), Arc::new(JsonCodec))
            .register(MediaType::problem_json(), Arc::new(JsonCodec))
            .register(MediaType::cbor(), Arc::new(CborCodec))
            .register(MediaType::problem_cbor(), Arc::new(CborCodec))
            .register(MediaType::any_text(), Arc::new(TextCodec))
            .register(MediaType::octet_stream(), Arc::new(BinaryCodec))
    }

    /// Seal the registry.
    pub fn build(self) -> MediaTypeDecoders {
        MediaTypeDecoders {
            entries: Arc::new(self.entries),
        }
    }
}

#[cfg(test)]
#[path = "codecs.test.rs"]
mod tests;
