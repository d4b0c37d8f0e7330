//! Transport-level requests and the per-call request specification.

use bytes::Bytes;
use http::HeaderMap;
use http::HeaderName;
use http::HeaderValue;
use http::Method;
use serde_json::Map;
use serde_json::Value;
use url::Url;

use crate::media_type::MediaType;

/// A fully framed request ready for dispatch, and the unit of work request
/// adapters transform.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute request URL.
    pub url: Url,
    /// Request headers, multi-valued.
    pub headers: HeaderMap,
    /// Encoded body, if any.
    pub body: Option<Bytes>,
}

impl HttpRequest {
    /// Create a bodiless request.
    pub fn new(method: Method, url: Url) -> Self {
        HttpRequest {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Hostname of the request URL, if it has one.
    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    /// Return a copy with the header set, replacing any existing values.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Logical description of a single REST call.
///
/// Collected by the builder methods and turned into an [`HttpRequest`] by the
/// request factory. Content and accept types default to JSON.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) path_params: Map<String, Value>,
    pub(crate) query_params: Map<String, Value>,
    pub(crate) body: Option<Value>,
    pub(crate) content_types: Vec<MediaType>,
    pub(crate) accept_types: Vec<MediaType>,
    pub(crate) headers: Map<String, Value>,
}

impl RequestSpec {
    /// Describe a call with an explicit method.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        RequestSpec {
            method,
            path: path.into(),
            path_params: Map::new(),
            query_params: Map::new(),
            body: None,
            content_types: vec![MediaType::json()],
            accept_types: vec![MediaType::json()],
            headers: Map::new(),
        }
    }

    /// Describe a GET call.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Describe a POST call.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Describe a PUT call.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Describe a PATCH call.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// Describe a DELETE call.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Bind one path template variable.
    pub fn path_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.path_params.insert(name.to_string(), value.into());
        self
    }

    /// Bind all path template variables from an object.
    pub fn path_params(mut self, params: Map<String, Value>) -> Self {
        self.path_params.extend(params);
        self
    }

    /// Add one query parameter.
    pub fn query_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.query_params.insert(name.to_string(), value.into());
        self
    }

    /// Add all query parameters from an object.
    pub fn query_params(mut self, params: Map<String, Value>) -> Self {
        self.query_params.extend(params);
        self
    }

    /// Attach a body value.
    ///
    /// Typed values convert with [`serde_json::to_value`]; the negotiated
    /// content-type encoder frames the body on the wire.
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Replace the acceptable body content types, in preference order.
    pub fn content_types(mut self, content_types: Vec<MediaType>) -> Self {
        self.content_types = content_types;
        self
    }

    /// Replace the acceptable response types, in preference order.
    pub fn accept_types(mut self, accept_types: Vec<MediaType>) -> Self {
        self.accept_types = accept_types;
        self
    }

    /// Add an extra header parameter.
    ///
    /// Arrays expand to repeated header entries; `null` drops the header.
    pub fn header(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }
}
