//! Built-in field/type schema for request bodies.

use serde_json::{Map, Value};
use std::fmt;

use crate::validation::validator::{TypeCheck, Violation};

/// JSON value types a field can be required to have.
///
/// `Shape` and `ArrayOf` nest, so a schema can describe objects inside
/// objects and the element type of arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Any,
    /// An object whose fields follow a nested schema.
    Shape(ParameterSchema),
    /// An array whose every element has the given type.
    ArrayOf(Box<JsonType>),
}

impl JsonType {
    /// An array of `element`.
    pub fn array_of(element: JsonType) -> Self {
        JsonType::ArrayOf(Box::new(element))
    }

    /// True when `value` conforms, nested shapes and elements included.
    pub fn matches(&self, value: &Value) -> bool {
        let mut violations = Vec::new();
        self.check_value("", value, &mut violations);
        violations.is_empty()
    }

    fn matches_kind(&self, value: &Value) -> bool {
        match self {
            JsonType::String => value.is_string(),
            JsonType::Number => value.is_number(),
            JsonType::Integer => value.is_i64() || value.is_u64(),
            JsonType::Boolean => value.is_boolean(),
            JsonType::Object | JsonType::Shape(_) => value.is_object(),
            JsonType::Array | JsonType::ArrayOf(_) => value.is_array(),
            JsonType::Any => !value.is_null(),
        }
    }

    /// Push a violation for `field` and for every nested field that does not conform.
    fn check_value(&self, field: &str, value: &Value, out: &mut Vec<Violation>) {
        if !self.matches_kind(value) {
            out.push(Violation {
                field: field.to_string(),
                expected: self.to_string(),
                found: JsonType::describe(value).to_string(),
            });
            return;
        }
        match (self, value) {
            (JsonType::Shape(schema), Value::Object(map)) => schema.check_fields(field, map, out),
            (JsonType::ArrayOf(element), Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    element.check_value(&format!("{}[{}]", field, i), item, out);
                }
            }
            _ => {}
        }
    }

    /// Name of the type of an actual value.
    fn describe(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(n) if n.is_f64() => "number",
            Value::Number(_) => "integer",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonType::String => f.write_str("string"),
            JsonType::Number => f.write_str("number"),
            JsonType::Integer => f.write_str("integer"),
            JsonType::Boolean => f.write_str("boolean"),
            JsonType::Object | JsonType::Shape(_) => f.write_str("object"),
            JsonType::Array => f.write_str("array"),
            JsonType::ArrayOf(element) => write!(f, "array<{}>", element),
            JsonType::Any => f.write_str("any"),
        }
    }
}

/// A single expected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub ty: JsonType,
    pub optional: bool,
}

/// Field name → expected type. Unlisted fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSchema {
    fields: Vec<(String, Parameter)>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// A required field.
    pub fn field(self, name: impl Into<String>, ty: JsonType) -> Self {
        self.parameter(name, Parameter { ty, optional: false })
    }

    /// A field that may be absent (or null).
    pub fn optional_field(self, name: impl Into<String>, ty: JsonType) -> Self {
        self.parameter(name, Parameter { ty, optional: true })
    }

    pub fn parameter(mut self, name: impl Into<String>, parameter: Parameter) -> Self {
        let name = name.into();
        self.fields.retain(|(existing, _)| existing != &name);
        self.fields.push((name, parameter));
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field paths are dotted below `parent` (`user.name`), or bare at the top level.
    fn check_fields(&self, parent: &str, body: &Map<String, Value>, out: &mut Vec<Violation>) {
        for (name, parameter) in &self.fields {
            let field = if parent.is_empty() {
                name.clone()
            } else {
                format!("{}.{}", parent, name)
            };
            match body.get(name) {
                None | Some(Value::Null) if parameter.optional => {}
                None => out.push(Violation {
                    field,
                    expected: parameter.ty.to_string(),
                    found: "missing".to_string(),
                }),
                Some(value) => parameter.ty.check_value(&field, value, out),
            }
        }
    }
}

impl TypeCheck for ParameterSchema {
    fn check(&self, body: &Map<String, Value>) -> Result<(), Vec<Violation>> {
        let mut violations = Vec::new();
        self.check_fields("", body, &mut violations);

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}
