//! Header parameter encoding.
//!
//! Each header key maps to zero or more values: arrays expand to repeated
//! header entries, scalars coerce through their lossless string form, and
//! `null` values are silently dropped.

use http::HeaderMap;
use http::HeaderName;
use http::HeaderValue;
use serde_json::Value;

use crate::error::RequestEncodingError;

/// Encode a full header parameter map, appending multi-valued entries.
pub fn encode_headers(
    headers: &serde_json::Map<String, Value>,
) -> Result<HeaderMap, RequestEncodingError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name: HeaderName = name
            .parse()
            .map_err(|_| RequestEncodingError::InvalidHeaderValue(name.clone()))?;
        for header_value in encode_header_values(name, value)? {
            map.append(header_name.clone(), header_value);
        }
    }
    Ok(map)
}

/// Encode a single header parameter into its wire values.
pub fn encode_header_values(
    name: &str,
    value: &Value,
) -> Result<Vec<HeaderValue>, RequestEncodingError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.extend(encode_header_values(name, item)?);
            }
            Ok(values)
        }
        scalar => {
            let text = coerce_scalar(name, scalar)?;
            let header_value = HeaderValue::from_str(&text)
                .map_err(|_| RequestEncodingError::InvalidHeaderValue(name.to_string()))?;
            Ok(vec![header_value])
        }
    }
}

fn coerce_scalar(name: &str, value: &Value) -> Result<String, RequestEncodingError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        _ => Err(RequestEncodingError::InvalidHeaderValue(name.to_string())),
    }
}

#[cfg(test)]
#[path = "headers.test.rs"]
mod tests;
