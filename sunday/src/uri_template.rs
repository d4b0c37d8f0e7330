//! URI templates with `{var}` placeholder expansion.
//!
//! Templates carry a default parameter map and per-kind value converters.
//! Expansion resolves each placeholder, in order, from the call parameters
//! first and the defaults second, percent-encoding the result per RFC 3986
//! path rules.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;
use percent_encoding::utf8_percent_encode;
use serde_json::Map;
use serde_json::Value;
use url::Url;

use crate::codecs::kind_of;
use crate::error::RequestEncodingError;
use crate::error::Result;
use crate::error::SundayError;

/// Characters allowed unencoded in an expanded path segment (RFC 3986
/// `pchar` minus percent escapes).
const PATH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b':')
    .remove(b'@');

/// Runtime kind of a parameter value, used to key custom converters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl ValueKind {
    /// Kind of a dynamic value.
    pub fn of(value: &Value) -> ValueKind {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }
}

type Converter = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// A URI format string with `{var}` placeholders.
#[derive(Clone, Default)]
pub struct UriTemplate {
    format: String,
    defaults: Map<String, Value>,
    converters: HashMap<ValueKind, Converter>,
}

impl UriTemplate {
    /// Create a template from its format string.
    pub fn new(format: impl Into<String>) -> Self {
        UriTemplate {
            format: format.into(),
            defaults: Map::new(),
            converters: HashMap::new(),
        }
    }

    /// Add a default value for a template variable.
    ///
    /// Per-call parameters override defaults.
    pub fn with_default(mut self, name: &str, value: Value) -> Self {
        self.defaults.insert(name.to_string(), value);
        self
    }

    /// Register a converter for parameter values of the given kind.
    ///
    /// Converters take precedence over the built-in scalar conversions. A
    /// converter returning `None` falls through to the built-ins.
    pub fn with_converter(
        mut self,
        kind: ValueKind,
        converter: impl Fn(&Value) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.converters.insert(kind, Arc::new(converter));
        self
    }

    /// Format string the template was created from.
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Complete the template against a relative path and parameters,
    /// producing a concrete URL.
    pub fn complete(&self, relative: &str, parameters: &Map<String, Value>) -> Result<Url> {
        let template = join_paths(&self.format, relative);
        let expanded = self.expand(&template, parameters)?;
        Url::parse(&expanded).map_err(|e| SundayError::InvalidUrl(format!("{expanded}: {e}")))
    }

    /// Expand every `{var}` occurrence in order.
    pub fn expand(
        &self,
        template: &str,
        parameters: &Map<String, Value>,
    ) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else {
                // Unterminated placeholder, kept literally.
                out.push_str(&rest[start..]);
                return Ok(out);
            };
            let name = &after[..end];
            let value = parameters
                .get(name)
                .or_else(|| self.defaults.get(name))
                .ok_or_else(|| RequestEncodingError::MissingParameter(name.to_string()))?;
            let text = self.convert(name, value)?;
            out.extend(utf8_percent_encode(&text, PATH_ENCODE_SET));
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        Ok(out)
    }

    fn convert(&self, name: &str, value: &Value) -> Result<String> {
        if let Some(converter) = self.converters.get(&ValueKind::of(value))
            && let Some(text) = converter(value)
        {
            return Ok(text);
        }
        match value {
            Value::String(text) => Ok(text.clone()),
            Value::Number(number) => Ok(number.to_string()),
            Value::Bool(flag) => Ok(flag.to_string()),
            other => Err(RequestEncodingError::UnsupportedParameterType {
                name: name.to_string(),
                kind: kind_of(other),
            }
            .into()),
        }
    }
}

impl From<&str> for UriTemplate {
    fn from(format: &str) -> Self {
        UriTemplate::new(format)
    }
}

impl From<String> for UriTemplate {
    fn from(format: String) -> Self {
        UriTemplate::new(format)
    }
}

impl fmt::Debug for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UriTemplate")
            .field("format", &self.format)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

/// Join a base and a relative path without duplicating or dropping the
/// separating slash.
fn join_paths(base: &str, relative: &str) -> String {
    if relative.is_empty() {
        return base.to_string();
    }
    if base.is_empty() {
        return relative.to_string();
    }
    match (base.ends_with('/'), relative.starts_with('/')) {
        (true, true) => format!("{}{}", base, &relative[1..]),
        (false, false) => format!("{base}/{relative}"),
        _ => format!("{base}{relative}"),
    }
}

#[cfg(test)]
#[path = "uri_template.test.rs"]
mod tests;
