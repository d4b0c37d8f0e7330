//! Parsed representation of IANA media types.
//!
//! A [`MediaType`] is held in canonical form: type, tree, subtype and suffix
//! are lowercased at construction, parameter names are lowercased and kept
//! sorted, parameter values preserve their case. Equality is therefore
//! canonical equality, and [`MediaType::compatible`] provides the
//! wildcard-aware matching used for codec lookup and content negotiation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Failure to parse a media type from its textual form.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaTypeError {
    /// The string is not `type/subtype [;name=value]*`.
    #[error("invalid media type format: {0:?}")]
    InvalidFormat(String),

    /// The top-level type is not a registered IANA type.
    #[error("unknown media type: {0:?}")]
    UnknownType(String),
}

/// Top-level media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Application,
    Audio,
    Example,
    Font,
    Image,
    Message,
    Model,
    Multipart,
    Text,
    Video,
    /// Wildcard type, rendered as `*`.
    Any,
}

impl Type {
    fn as_str(self) -> &'static str {
        match self {
            Type::Application => "application",
            Type::Audio => "audio",
            Type::Example => "example",
            Type::Font => "font",
            Type::Image => "image",
            Type::Message => "message",
            Type::Model => "model",
            Type::Multipart => "multipart",
            Type::Text => "text",
            Type::Video => "video",
            Type::Any => "*",
        }
    }

    fn parse(s: &str) -> Option<Type> {
        match s.to_ascii_lowercase().as_str() {
            "application" => Some(Type::Application),
            "audio" => Some(Type::Audio),
            "example" => Some(Type::Example),
            "font" => Some(Type::Font),
            "image" => Some(Type::Image),
            "message" => Some(Type::Message),
            "model" => Some(Type::Model),
            "multipart" => Some(Type::Multipart),
            "text" => Some(Type::Text),
            "video" => Some(Type::Video),
            "*" | "any" => Some(Type::Any),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration tree of the subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tree {
    /// Standard tree, no prefix.
    #[default]
    Standard,
    /// Vendor tree, `vnd.` prefix.
    Vendor,
    /// Personal tree, `prs.` prefix.
    Personal,
    /// Unregistered tree, `x.` prefix.
    Unregistered,
    /// Obsolete experimental tree, `x-` prefix.
    Obsolete,
}

impl Tree {
    fn prefix(self) -> &'static str {
        match self {
            Tree::Standard => "",
            Tree::Vendor => "vnd.",
            Tree::Personal => "prs.",
            Tree::Unregistered => "x.",
            Tree::Obsolete => "x-",
        }
    }

    /// Split a tree prefix off the front of a lowercased subtype.
    fn strip(subtype: &str) -> (Tree, &str) {
        for tree in [Tree::Vendor, Tree::Personal, Tree::Unregistered, Tree::Obsolete] {
            if let Some(rest) = subtype.strip_prefix(tree.prefix()) {
                return (tree, rest);
            }
        }
        (Tree::Standard, subtype)
    }
}

/// Structured-syntax suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suffix {
    Xml,
    Json,
    Ber,
    Der,
    FastInfoSet,
    Wbxml,
    Zip,
    Cbor,
}

impl Suffix {
    fn as_str(self) -> &'static str {
        match self {
            Suffix::Xml => "xml",
            Suffix::Json => "json",
            Suffix::Ber => "ber",
            Suffix::Der => "der",
            Suffix::FastInfoSet => "fastinfoset",
            Suffix::Wbxml => "wbxml",
            Suffix::Zip => "zip",
            Suffix::Cbor => "cbor",
        }
    }

    fn parse(s: &str) -> Option<Suffix> {
        match s.to_ascii_lowercase().as_str() {
            "xml" => Some(Suffix::Xml),
            "json" => Some(Suffix::Json),
            "ber" => Some(Suffix::Ber),
            "der" => Some(Suffix::Der),
            "fastinfoset" => Some(Suffix::FastInfoSet),
            "wbxml" => Some(Suffix::Wbxml),
            "zip" => Some(Suffix::Zip),
            "cbor" => Some(Suffix::Cbor),
            _ => None,
        }
    }
}

impl fmt::Display for Suffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed IANA media type in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType {
    type_: Type,
    tree: Tree,
    subtype: String,
    suffix: Option<Suffix>,
    parameters: BTreeMap<String, String>,
}

impl MediaType {
    /// Create a media type in the standard tree with no suffix.
    pub fn new(type_: Type, subtype: &str) -> Self {
        Self::from_parts(type_, Tree::Standard, subtype, None)
    }

    /// Create a media type from its individual parts.
    pub fn from_parts(type_: Type, tree: Tree, subtype: &str, suffix: Option<Suffix>) -> Self {
        MediaType {
            type_,
            tree,
            subtype: subtype.to_ascii_lowercase(),
            suffix,
            parameters: BTreeMap::new(),
        }
    }

    /// Return a copy with the given parameter set.
    ///
    /// Parameter names are case-insensitive; values keep their case.
    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.parameters
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Top-level type.
    pub fn type_(&self) -> Type {
        self.type_
    }

    /// Registration tree.
    pub fn tree(&self) -> Tree {
        self.tree
    }

    /// Subtype without tree prefix or suffix, lowercased.
    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    /// Structured-syntax suffix, if any.
    pub fn suffix(&self) -> Option<Suffix> {
        self.suffix
    }

    /// Look up a parameter value by case-insensitive name.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Wildcard-aware compatibility (`~=`).
    ///
    /// Types match when equal or either is `*`; subtypes match when equal or
    /// either is `*`; trees and suffixes must match exactly (suffixes may
    /// both be absent). Parameters present on both sides must agree
    /// case-insensitively; one-sided parameters are ignored.
    pub fn compatible(&self, other: &MediaType) -> bool {
        if self.type_ != other.type_ && self.type_ != Type::Any && other.type_ != Type::Any {
            return false;
        }
        if self.tree != other.tree {
            return false;
        }
        if self.subtype != other.subtype && self.subtype != "*" && other.subtype != "*" {
            return false;
        }
        if self.suffix != other.suffix {
            return false;
        }
        self.parameters.iter().all(|(name, value)| {
            match other.parameters.get(name) {
                Some(other_value) => value.eq_ignore_ascii_case(other_value),
                None => true,
            }
        })
    }

    // Standard types used throughout the framework.

    /// `text/plain`
    pub fn plain() -> Self {
        Self::new(Type::Text, "plain")
    }

    /// `text/html`
    pub fn html() -> Self {
        Self::new(Type::Text, "html")
    }

    /// `text/*`
    pub fn any_text() -> Self {
        Self::new(Type::Text, "*")
    }

    /// `application/json`
    pub fn json() -> Self {
        Self::new(Type::Application, "json")
    }

    /// `application/cbor`
    pub fn cbor() -> Self {
        Self::new(Type::Application, "cbor")
    }

    /// `application/octet-stream`
    pub fn octet_stream() -> Self {
        Self::new(Type::Application, "octet-stream")
    }

    /// `application/x-www-form-urlencoded`
    pub fn www_form_url_encoded() -> Self {
        Self::from_parts(Type::Application, Tree::Obsolete, "www-form-urlencoded", None)
    }

    /// `text/event-stream`
    pub fn event_stream() -> Self {
        Self::new(Type::Text, "event-stream")
    }

    /// `application/problem+json`
    pub fn problem_json() -> Self {
        Self::from_parts(Type::Application, Tree::Standard, "problem", Some(Suffix::Json))
    }

    /// `application/problem+cbor`
    pub fn problem_cbor() -> Self {
        Self::from_parts(Type::Application, Tree::Standard, "problem", Some(Suffix::Cbor))
    }

    /// `*/*`
    pub fn any() -> Self {
        Self::new(Type::Any, "*")
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}{}", self.type_, self.tree.prefix(), self.subtype)?;
        if let Some(suffix) = self.suffix {
            write!(f, "+{suffix}")?;
        }
        for (name, value) in &self.parameters {
            write!(f, ";{name}={value}")?;
        }
        Ok(())
    }
}

impl FromStr for MediaType {
    type Err = MediaTypeError;

    /// Parse the textual form, case-insensitively for everything except
    /// parameter values.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut sections = s.split(';');
        let full_type = sections
            .next()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| MediaTypeError::InvalidFormat(s.to_string()))?;

        let (type_part, subtype_part) = full_type
            .split_once('/')
            .ok_or_else(|| MediaTypeError::InvalidFormat(s.to_string()))?;

        let type_ = Type::parse(type_part.trim())
            .ok_or_else(|| MediaTypeError::UnknownType(type_part.trim().to_string()))?;

        let subtype_part = subtype_part.trim().to_ascii_lowercase();
        if subtype_part.is_empty() {
            return Err(MediaTypeError::InvalidFormat(s.to_string()));
        }
        let (tree, rest) = Tree::strip(&subtype_part);

        let (subtype, suffix) = match rest.rsplit_once('+') {
            Some((base, candidate)) => match Suffix::parse(candidate) {
                Some(suffix) if !base.is_empty() => (base, Some(suffix)),
                _ => (rest, None),
            },
            None => (rest, None),
        };

        let mut media_type = MediaType::from_parts(type_, tree, subtype, suffix);
        for section in sections {
            let section = section.trim();
            if section.is_empty() {
                continue;
            }
            let (name, value) = section
                .split_once('=')
                .ok_or_else(|| MediaTypeError::InvalidFormat(s.to_string()))?;
            media_type = media_type.with_parameter(name.trim(), value.trim());
        }

        Ok(media_type)
    }
}

#[cfg(test)]
#[path = "media_type.test.rs"]
mod tests;
