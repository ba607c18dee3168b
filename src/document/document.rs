//! Document type and builder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::field_value::FieldValue;

/// A document to be indexed.
///
/// Holds the caller-supplied identifier and the fields in insertion order.
/// The same field name may appear more than once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    id: String,
    fields: Vec<(String, FieldValue)>,
}

impl Document {
    /// Create an empty document with the given identifier.
    pub fn new<S: Into<String>>(id: S) -> Self {
        Document {
            id: id.into(),
            fields: Vec::new(),
        }
    }

    /// Start building a document with the given identifier.
    pub fn builder<S: Into<String>>(id: S) -> DocumentBuilder {
        DocumentBuilder {
            document: Document::new(id),
        }
    }

    /// The document identifier as supplied by the caller.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The fields in insertion order.
    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    /// Append a field.
    pub fn add_field<S: Into<String>>(&mut self, name: S, value: FieldValue) {
        self.fields.push((name.into(), value));
    }

    /// First value stored under `name`, if any.
    pub fn get_field(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field_name, _)| field_name == name)
            .map(|(_, value)| value)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Fluent builder for [`Document`].
#[derive(Debug)]
pub struct DocumentBuilder {
    document: Document,
}

impl DocumentBuilder {
    /// Add a field with an arbitrary value.
    pub fn add_field<S: Into<String>, V: Into<FieldValue>>(mut self, name: S, value: V) -> Self {
        self.document.add_field(name, value.into());
        self
    }

    /// Add a text field.
    pub fn add_text<S: Into<String>, T: Into<String>>(self, name: S, value: T) -> Self {
        self.add_field(name, FieldValue::Text(value.into()))
    }

    /// Add an integer field.
    pub fn add_integer<S: Into<String>>(self, name: S, value: i64) -> Self {
        self.add_field(name, FieldValue::Integer(value))
    }

    /// Add a float field.
    pub fn add_float<S: Into<String>>(self, name: S, value: f64) -> Self {
        self.add_field(name, FieldValue::Float(value))
    }

    /// Add a boolean field.
    pub fn add_boolean<S: Into<String>>(self, name: S, value: bool) -> Self {
        self.add_field(name, FieldValue::Boolean(value))
    }

    /// Add a datetime field.
    pub fn add_datetime<S: Into<String>>(self, name: S, value: DateTime<Utc>) -> Self {
        self.add_field(name, FieldValue::DateTime(value))
    }

    /// Add a binary field.
    pub fn add_bytes<S: Into<String>>(self, name: S, value: Vec<u8>) -> Self {
        self.add_field(name, FieldValue::Bytes(value))
    }

    /// Add an array field.
    pub fn add_array<S: Into<String>>(self, name: S, values: Vec<FieldValue>) -> Self {
        self.add_field(name, FieldValue::Array(values))
    }

    /// Add an explicit null field.
    pub fn add_null<S: Into<String>>(self, name: S) -> Self {
        self.add_field(name, FieldValue::Null)
    }

    /// Finish building.
    pub fn build(self) -> Document {
        self.document
    }
}
