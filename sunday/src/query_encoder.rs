//! `application/x-www-form-urlencoded` encoding of query parameters.

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;
use percent_encoding::utf8_percent_encode;
use serde_json::Value;

use crate::codecs::CodecError;
use crate::codecs::kind_of;

/// Characters passed through unencoded in keys and values, beyond
/// alphanumerics: the RFC 3986 unreserved marks plus `!'()` and the
/// flattening brackets.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'!')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'[')
    .remove(b']');

/// How array values are flattened into keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayEncoding {
    /// `a[]=1&a[]=2`
    #[default]
    Bracketed,
    /// `a=1&a=2`
    Unbracketed,
}

/// How boolean values are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoolEncoding {
    /// `1` / `0`
    #[default]
    Numeric,
    /// `true` / `false`
    Literal,
}

/// How date values (RFC 3339 strings) are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateEncoding {
    /// ISO 8601 with fractional seconds truncated to milliseconds.
    #[default]
    Iso8601,
    /// Seconds since the epoch as a float with millisecond precision.
    SecondsSince1970,
    /// Whole milliseconds since the epoch.
    MillisecondsSince1970,
}

/// Encoder for `www-form-urlencoded` query strings.
///
/// The top-level value must be an object. Nested objects flatten to
/// `key[subkey]=value`, arrays follow the configured [`ArrayEncoding`], and
/// `null` produces the bare key (a value-less flag). String values that parse
/// as RFC 3339 timestamps are treated as dates and re-rendered per the
/// configured [`DateEncoding`].
#[derive(Debug, Clone, Default)]
pub struct WwwFormUrlEncoder {
    array_encoding: ArrayEncoding,
    bool_encoding: BoolEncoding,
    date_encoding: DateEncoding,
}

impl WwwFormUrlEncoder {
    /// Create an encoder with explicit shapes.
    pub fn new(
        array_encoding: ArrayEncoding,
        bool_encoding: BoolEncoding,
        date_encoding: DateEncoding,
    ) -> Self {
        WwwFormUrlEncoder {
            array_encoding,
            bool_encoding,
            date_encoding,
        }
    }

    /// Encode a top-level object into a query string.
    pub fn encode(&self, value: &Value) -> Result<String, CodecError> {
        let Value::Object(map) = value else {
            return Err(CodecError::TranslationNotSupported {
                kind: kind_of(value),
            });
        };

        let mut pairs = Vec::new();
        for (key, entry) in map {
            self.flatten(key.clone(), entry, &mut pairs)?;
        }

        Ok(pairs
            .into_iter()
            .map(|(key, value)| {
                let key = utf8_percent_encode(&key, QUERY_ENCODE_SET).to_string();
                match value {
                    Some(value) => {
                        let value = utf8_percent_encode(&value, QUERY_ENCODE_SET).to_string();
                        format!("{key}={value}")
                    }
                    None => key,
                }
            })
            .collect::<Vec<_>>()
            .join("&"))
    }

    fn flatten(
        &self,
        key: String,
        value: &Value,
        out: &mut Vec<(String, Option<String>)>,
    ) -> Result<(), CodecError> {
        match value {
            Value::Null => out.push((key, None)),
            Value::Object(map) => {
                for (subkey, entry) in map {
                    self.flatten(format!("{key}[{subkey}]"), entry, out)?;
                }
            }
            Value::Array(items) => {
                for item in items {
                    let item_key = match self.array_encoding {
                        ArrayEncoding::Bracketed => format!("{key}[]"),
                        ArrayEncoding::Unbracketed => key.clone(),
                    };
                    self.flatten(item_key, item, out)?;
                }
            }
            Value::Bool(flag) => out.push((key, Some(self.encode_bool(*flag)))),
            Value::Number(number) => out.push((key, Some(number.to_string()))),
            Value::String(text) => out.push((key, Some(self.encode_string(text)))),
        }
        Ok(())
    }

    fn encode_bool(&self, flag: bool) -> String {
        match self.bool_encoding {
            BoolEncoding::Numeric => if flag { "1" } else { "0" }.to_string(),
            BoolEncoding::Literal => flag.to_string(),
        }
    }

    fn encode_string(&self, text: &str) -> String {
        match DateTime::parse_from_rfc3339(text) {
            Ok(date) => self.encode_date(date.with_timezone(&Utc)),
            Err(_) => text.to_string(),
        }
    }

    fn encode_date(&self, date: DateTime<Utc>) -> String {
        match self.date_encoding {
            DateEncoding::Iso8601 => date.to_rfc3339_opts(SecondsFormat::Millis, true),
            DateEncoding::SecondsSince1970 => {
                format!("{:.3}", date.timestamp_millis() as f64 / 1000.0)
            }
            DateEncoding::MillisecondsSince1970 => date.timestamp_millis().to_string(),
        }
    }
}

#[cfg(test)]
#[path = "query_encoder.test.rs"]
mod tests;
