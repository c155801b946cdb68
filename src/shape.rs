//! Shape descriptors: which fields of a mapping should be coerced to what.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{Result, UtilsError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Boolean,
    Number,
    String,
    Array,
    Date,
}

impl FieldType {
    pub const ALL: [FieldType; 5] = [
        FieldType::Boolean,
        FieldType::Number,
        FieldType::String,
        FieldType::Array,
        FieldType::Date,
    ];
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Boolean => "boolean",
            FieldType::Number => "number",
            FieldType::String => "string",
            FieldType::Array => "array",
            FieldType::Date => "date",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for FieldType {
    type Err = UtilsError;
    fn from_str(s: &str) -> Result<FieldType> {
        FieldType::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| UtilsError::Shape {
                path: String::new(),
                message: format!("unknown field type '{}'", s),
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShapeEntry {
    Field(FieldType),
    Nested(Shape),
}

/// Ordered field name to descriptor mapping. Nested shapes describe fields
/// that are themselves mappings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shape {
    fields: IndexMap<String, ShapeEntry>,
}

impl Shape {
    pub fn new() -> Self {
        Self { fields: IndexMap::new() }
    }
    pub fn field(mut self, key: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(key.into(), ShapeEntry::Field(field_type));
        self
    }
    pub fn nested(mut self, key: impl Into<String>, shape: Shape) -> Self {
        self.fields.insert(key.into(), ShapeEntry::Nested(shape));
        self
    }
    pub fn get(&self, key: &str) -> Option<&ShapeEntry> {
        self.fields.get(key)
    }
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ShapeEntry)> {
        self.fields.iter()
    }
    pub fn len(&self) -> usize {
        self.fields.len()
    }
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Reads a descriptor such as `{"page": "number", "filter": {"from": "date"}}`.
    ///
    /// Strings must name one of the five field types and objects nest; any
    /// other JSON value is rejected with the dotted path of the offending field.
    pub fn from_json(value: &serde_json::Value) -> Result<Shape> {
        let shape = Self::from_json_at(value, "")?;
        debug!(fields = shape.len(), "parsed shape descriptor");
        Ok(shape)
    }

    pub fn from_json_str(s: &str) -> Result<Shape> {
        let value: serde_json::Value = serde_json::from_str(s)?;
        Self::from_json(&value)
    }

    fn from_json_at(value: &serde_json::Value, path: &str) -> Result<Shape> {
        let object = value.as_object().ok_or_else(|| UtilsError::Shape {
            path: path.to_string(),
            message: "expected an object of field descriptors".to_string(),
        })?;
        let mut shape = Shape::new();
        for (key, descriptor) in object {
            let field_path = if path.is_empty() { key.clone() } else { format!("{}.{}", path, key) };
            let entry = match descriptor {
                serde_json::Value::String(tag) => {
                    let field_type = tag.parse::<FieldType>().map_err(|_| UtilsError::Shape {
                        path: field_path.clone(),
                        message: format!("unknown field type '{}'", tag),
                    })?;
                    ShapeEntry::Field(field_type)
                }
                serde_json::Value::Object(_) => ShapeEntry::Nested(Self::from_json_at(descriptor, &field_path)?),
                other => {
                    return Err(UtilsError::Shape {
                        path: field_path,
                        message: format!("expected a field type or an object, found {}", other),
                    });
                }
            };
            shape.fields.insert(key.clone(), entry);
        }
        Ok(shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_descriptor() {
        let shape = Shape::from_json_str(r#"{"page":"number","filter":{"from":"date","tags":"array"}}"#).unwrap();
        let expected = Shape::new()
            .field("page", FieldType::Number)
            .nested("filter", Shape::new().field("from", FieldType::Date).field("tags", FieldType::Array));
        assert_eq!(shape, expected);
    }

    #[test]
    fn rejects_unknown_tag_with_path() {
        let err = Shape::from_json_str(r#"{"filter":{"from":"datetime"}}"#).unwrap_err();
        match err {
            UtilsError::Shape { path, message } => {
                assert_eq!(path, "filter.from");
                assert!(message.contains("datetime"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rejects_non_object_root_and_bad_descriptors() {
        assert!(matches!(Shape::from_json_str(r#"["number"]"#), Err(UtilsError::Shape { .. })));
        assert!(matches!(Shape::from_json_str(r#"{"a":1}"#), Err(UtilsError::Shape { path, .. }) if path == "a"));
        assert!(matches!(Shape::from_json_str("{"), Err(UtilsError::Json(_))));
    }

    #[test]
    fn field_type_names_round_trip() {
        for field_type in FieldType::ALL {
            assert_eq!(field_type.name().parse::<FieldType>().unwrap(), field_type);
        }
    }
}
