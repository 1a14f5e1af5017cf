//! Directory entry types
//!
//! Entries returned by searches, their attribute values, and search requests.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single attribute value.
///
/// Directory attributes are either text or opaque binary (e.g. `objectGUID`,
/// `objectSid`). Decoders that only care about text can use [`as_text`].
///
/// [`as_text`]: AttributeValue::as_text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A UTF-8 text value.
    Text(String),
    /// Binary data.
    Binary(Vec<u8>),
}

impl AttributeValue {
    /// Get as text if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            AttributeValue::Binary(_) => None,
        }
    }

    /// Check if this is a binary value.
    pub fn is_binary(&self) -> bool {
        matches!(self, AttributeValue::Binary(_))
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Text(s)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Text(s.to_string())
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(b: Vec<u8>) -> Self {
        AttributeValue::Binary(b)
    }
}

/// One attribute of an entry with all of its values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryAttribute {
    pub name: String,
    pub values: Vec<AttributeValue>,
}

/// A raw directory record produced by a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Distinguished name.
    pub dn: String,
    /// Attributes in the order the server returned them.
    pub attributes: Vec<EntryAttribute>,
}

impl Entry {
    /// Create an entry with no attributes.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: Vec::new(),
        }
    }

    /// Add an attribute using builder pattern.
    pub fn with_attribute<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<AttributeValue>,
    {
        self.attributes.push(EntryAttribute {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Get an attribute by name (case-insensitive, as in LDAP).
    pub fn attribute(&self, name: &str) -> Option<&EntryAttribute> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// All values of an attribute; empty when absent.
    pub fn values(&self, name: &str) -> &[AttributeValue] {
        self.attribute(name).map_or(&[], |a| a.values.as_slice())
    }

    /// First value of an attribute.
    pub fn first_value(&self, name: &str) -> Option<&AttributeValue> {
        self.values(name).first()
    }

    /// First text value of an attribute, or an empty string.
    pub fn text(&self, name: &str) -> &str {
        self.first_value(name)
            .and_then(AttributeValue::as_text)
            .unwrap_or("")
    }

    /// All text values of an attribute, skipping binary values.
    pub fn texts(&self, name: &str) -> Vec<&str> {
        self.values(name)
            .iter()
            .filter_map(AttributeValue::as_text)
            .collect()
    }
}

/// Search scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Only the base entry.
    Base,
    /// Immediate children of the base.
    OneLevel,
    /// The base and its whole subtree.
    #[default]
    Subtree,
}

/// Parameters of a search primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base_dn: String,
    pub scope: Scope,
    pub filter: String,
    /// Attributes to return; empty means all user attributes.
    pub attributes: Vec<String>,
    /// Server-side time limit; zero means no limit.
    pub time_limit: Duration,
}

impl SearchRequest {
    /// Create a subtree search with no attribute selection and no time limit.
    pub fn new(base_dn: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            base_dn: base_dn.into(),
            scope: Scope::Subtree,
            filter: filter.into(),
            attributes: Vec::new(),
            time_limit: Duration::ZERO,
        }
    }

    /// Set the scope.
    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Set the attributes to return.
    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the time limit.
    #[must_use]
    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = time_limit;
        self
    }
}
