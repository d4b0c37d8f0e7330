//! RFC 7807 problem documents.
//!
//! Error responses decode into [`Problem`] values. Concrete problem types
//! registered in a [`ProblemRegistry`] decode their extra members into
//! native fields; unregistered types collect them into the generic
//! `parameters` bag.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Map;
use serde_json::Value;
use url::Url;

use crate::error::ResponseDecodingError;
use crate::media_type::MediaType;

/// A decoded problem document of any registered kind.
///
/// Implemented by the generic [`Problem`] and by concrete registered
/// subtypes; [`ProblemType::as_any`] lets callers catch subtypes by
/// downcasting.
pub trait ProblemType: std::error::Error + Send + Sync + 'static {
    /// The problem `type` URI identifying this kind.
    fn type_uri(&self) -> &str;

    /// Downcasting support for concrete registered subtypes.
    fn as_any(&self) -> &dyn Any;
}

/// Generic RFC 7807 problem document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    /// Problem type URI; `about:blank` when the server supplied none.
    #[serde(rename = "type", default = "Problem::default_type")]
    pub type_: Url,

    /// Short human-readable summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// HTTP status code of the response carrying the problem.
    #[serde(default)]
    pub status: u16,

    /// Human-readable explanation specific to this occurrence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// URI identifying this specific occurrence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<Url>,

    /// Extension members the document carried beyond the standard fields.
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
}

impl Problem {
    fn default_type() -> Url {
        #[allow(clippy::expect_used)]
        Url::parse("about:blank").expect("about:blank is a valid URI")
    }

    /// Generic problem derived from a bare status code.
    pub fn from_status(status: StatusCode) -> Self {
        Problem {
            type_: Self::default_type(),
            title: status.canonical_reason().map(str::to_string),
            status: status.as_u16(),
            detail: None,
            instance: None,
            parameters: Map::new(),
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "problem ({}): status {}", self.type_, self.status)?;
        if let Some(title) = &self.title {
            write!(f, ", {title}")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Problem {}

impl ProblemType for Problem {
    fn type_uri(&self) -> &str {
        self.type_.as_str()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

type DecodeProblem =
    dyn Fn(&Value) -> Result<Box<dyn ProblemType>, ResponseDecodingError> + Send + Sync;

/// Registry mapping problem `type` URIs to concrete decoders.
#[derive(Clone, Default)]
pub struct ProblemRegistry {
    decoders: HashMap<String, Arc<DecodeProblem>>,
}

impl ProblemRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a concrete problem type for a `type` URI.
    ///
    /// The type decodes the full document, consuming known members into its
    /// native fields.
    pub fn register<T: ProblemType + DeserializeOwned>(&mut self, type_uri: &str) {
        self.decoders.insert(
            type_uri.to_string(),
            Arc::new(|value| {
                serde_json::from_value::<T>(value.clone())
                    .map(|problem| Box::new(problem) as Box<dyn ProblemType>)
                    .map_err(|e| ResponseDecodingError::DeserializationFailed {
                        content_type: MediaType::problem_json(),
                        source: Box::new(e),
                    })
            }),
        );
    }

    /// Whether a decoder is registered for the `type` URI.
    pub fn contains(&self, type_uri: &str) -> bool {
        self.decoders.contains_key(type_uri)
    }

    /// Decode a problem document, dispatching to the registered concrete
    /// type when the document's `type` is known.
    pub fn decode(&self, value: &Value) -> Result<Box<dyn ProblemType>, ResponseDecodingError> {
        if let Some(type_uri) = value.get("type").and_then(Value::as_str)
            && let Some(decoder) = self.decoders.get(type_uri)
        {
            return decoder(value);
        }
        serde_json::from_value::<Problem>(value.clone())
            .map(|problem| Box::new(problem) as Box<dyn ProblemType>)
            .map_err(|e| ResponseDecodingError::DeserializationFailed {
                content_type: MediaType::problem_json(),
                source: Box::new(e),
            })
    }
}

impl fmt::Debug for ProblemRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProblemRegistry")
            .field("types", &self.decoders.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
#[path = "problem.test.rs"]
mod tests;
