//! Error types for the sunday framework.
//!
//! Every fault surfaced by the request/response pipeline and the SSE engine
//! is a variant of [`SundayError`]. Encoding and decoding faults carry their
//! own sub-taxonomies so callers can match on the failing stage without
//! string inspection.

use crate::media_type::MediaType;
use crate::problem::ProblemType;
use bytes::Bytes;
use http::StatusCode;
use thiserror::Error;

/// Result type alias using SundayError.
pub type Result<T> = std::result::Result<T, SundayError>;

/// Source error type carried by serialization/deserialization failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur when using the sunday framework.
#[derive(Debug, Error)]
pub enum SundayError {
    /// Building the outgoing request failed.
    #[error("request encoding failed: {0}")]
    RequestEncoding(#[from] RequestEncodingError),

    /// Decoding the response body failed.
    #[error("response decoding failed: {0}")]
    ResponseDecoding(#[from] ResponseDecodingError),

    /// The response status was outside the session's accepted set.
    ///
    /// The undecoded body is retained for diagnostics.
    #[error("response validation failed: unacceptable status code {status}")]
    ResponseValidation {
        /// Status code the server returned.
        status: StatusCode,
        /// Raw response body.
        data: Bytes,
    },

    /// A URL could not be assembled from its components.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The transport produced a response the pipeline cannot interpret.
    #[error("invalid HTTP response: {0}")]
    InvalidHttpResponse(String),

    /// The response body was empty but a value was expected.
    #[error("unexpected empty response")]
    UnexpectedEmptyResponse,

    /// A no-content response carried a body anyway.
    #[error("unexpected data response")]
    UnexpectedDataResponse,

    /// Server-sent events failure.
    #[error("server-sent events failure: {0}")]
    Sse(#[from] SseError),

    /// The server answered with an RFC 7807 problem document.
    #[error("{0}")]
    Problem(Box<dyn ProblemType>),

    /// A refreshing token adapter failed to obtain a new token.
    ///
    /// All callers waiting on the same refresh observe the same message.
    #[error("token refresh failed: {0}")]
    TokenRefreshFailed(String),

    /// The session was closed while requests were still being issued.
    #[error("session is closed")]
    SessionClosed,

    /// Transport-level failure without a known HTTP status.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl SundayError {
    /// Wrap a typed problem document as an error.
    pub fn problem(problem: impl ProblemType) -> Self {
        SundayError::Problem(Box::new(problem))
    }

    /// Downcast a carried problem to a concrete registered subtype.
    pub fn problem_as<T: ProblemType>(&self) -> Option<&T> {
        match self {
            SundayError::Problem(p) => p.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }
}

/// Faults raised while assembling an outgoing request.
#[derive(Debug, Error)]
pub enum RequestEncodingError {
    /// No encoder is registered for the requested content type.
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(MediaType),

    /// None of the requested content types has a registered encoder.
    #[error("no supported content types in {0:?}")]
    NoSupportedContentTypes(Vec<MediaType>),

    /// None of the requested accept types has a registered decoder.
    #[error("no supported accept types in {0:?}")]
    NoSupportedAcceptTypes(Vec<MediaType>),

    /// The body encoder rejected the value.
    #[error("serialization failed for {content_type}: {source}")]
    SerializationFailed {
        /// Content type whose encoder failed.
        content_type: MediaType,
        /// Underlying codec failure.
        source: BoxError,
    },

    /// A template variable had no value in the parameter map or defaults.
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    /// A parameter value could not be converted to a path segment.
    #[error("unsupported parameter type for '{name}': {kind}")]
    UnsupportedParameterType {
        /// Template variable name.
        name: String,
        /// JSON kind of the offending value.
        kind: &'static str,
    },

    /// A header value could not be encoded onto the wire.
    #[error("invalid header value for '{0}'")]
    InvalidHeaderValue(String),
}

/// Faults raised while decoding a response.
#[derive(Debug, Error)]
pub enum ResponseDecodingError {
    /// The `Content-Type` header was missing or unparseable.
    #[error("invalid content type: {0:?}")]
    InvalidContentType(String),

    /// No decoder is registered for the response content type.
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(MediaType),

    /// The response carried no data where some was required.
    #[error("no response data")]
    NoData,

    /// The decoder rejected the response body.
    #[error("deserialization failed for {content_type}: {source}")]
    DeserializationFailed {
        /// Content type whose decoder failed.
        content_type: MediaType,
        /// Underlying codec failure.
        source: BoxError,
    },

    /// Decoding produced no value.
    #[error("missing value in response")]
    MissingValue,
}

/// Failures specific to the server-sent events engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SseError {
    /// No event or comment arrived within the configured inactivity window.
    #[error("no events received within the timeout interval")]
    EventTimeout,

    /// The tracked last event id cannot be emitted as a request header.
    #[error("invalid last event id")]
    InvalidLastEventId,

    /// The request stream factory produced no stream.
    #[error("request stream factory returned no stream")]
    RequestStreamEmpty,
}
