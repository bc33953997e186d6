//! Keyword-based schema validation over value trees.
//!
//! A schema is itself written as a [`Value`] object using four keywords:
//!
//! | keyword | meaning |
//! |---------|---------|
//! | `type` | expected tag name (`"int64"`, `"object"`, …) |
//! | `properties` | object of named sub-schemas |
//! | `items` | sub-schema applied to every array element |
//! | `required` | array of property names that must be present |
//!
//! [`Schema::validate`] reports every violation with its dotted path.
//! [`Schema::adjust`] widens numeric values losslessly toward a pinned
//! `type` (e.g. `Int32 -> Int64`, `Float32 -> Float64`) and reports a
//! violation where no lossless widening exists.

use crate::error::ValueError;
use crate::value::{Value, ValueType};
use weft_types::ErrorCode;

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Dotted path to the offending value (empty string for the root).
    pub path: String,
    /// Human-readable reason.
    pub reason: String,
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.reason)
        } else {
            write!(f, "{}: {}", self.path, self.reason)
        }
    }
}

/// Error compiling a schema description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The schema description itself is malformed.
    #[error("invalid schema: {0}")]
    Invalid(String),
}

impl ErrorCode for SchemaError {
    fn code(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "SCHEMA_INVALID",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// A compiled schema.
///
/// # Example
///
/// ```
/// use weft_value::{Schema, Value};
///
/// let spec = Value::from_json(
///     r#"{
///         "type": "object",
///         "properties": {
///             "name": { "type": "string" },
///             "port": { "type": "int64" }
///         },
///         "required": ["name"]
///     }"#,
/// )
/// .unwrap();
/// let schema = Schema::compile(&spec).unwrap();
///
/// let mut ok = Value::object();
/// ok.set_path("name", Value::from("weft")).unwrap();
/// ok.set_path("port", Value::from(8001i64)).unwrap();
/// assert!(schema.validate(&ok).is_ok());
///
/// let missing = Value::object();
/// assert!(schema.validate(&missing).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Schema {
    ty: Option<ValueType>,
    properties: Vec<(String, Schema)>,
    items: Option<Box<Schema>>,
    required: Vec<String>,
}

impl Schema {
    /// Compiles a schema description.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Invalid`] when the description is not an
    /// object, names an unknown type, or uses a keyword with the wrong
    /// shape.
    pub fn compile(spec: &Value) -> Result<Self, SchemaError> {
        let Some(map) = spec.as_object() else {
            return Err(SchemaError::Invalid(format!(
                "schema must be an object, found {}",
                spec.value_type()
            )));
        };

        let mut schema = Schema::default();

        if let Some(ty) = map.get("type") {
            let name = ty
                .get_string()
                .map_err(|_| SchemaError::Invalid("'type' must be a string".into()))?;
            schema.ty = Some(
                ValueType::from_str_opt(name)
                    .ok_or_else(|| SchemaError::Invalid(format!("unknown type '{name}'")))?,
            );
        }

        if let Some(props) = map.get("properties") {
            let Some(props) = props.as_object() else {
                return Err(SchemaError::Invalid("'properties' must be an object".into()));
            };
            for (name, sub) in props.iter() {
                schema
                    .properties
                    .push((name.to_string(), Schema::compile(sub)?));
            }
        }

        if let Some(items) = map.get("items") {
            schema.items = Some(Box::new(Schema::compile(items)?));
        }

        if let Some(required) = map.get("required") {
            let Some(required) = required.as_array() else {
                return Err(SchemaError::Invalid("'required' must be an array".into()));
            };
            for entry in required {
                let name = entry
                    .get_string()
                    .map_err(|_| SchemaError::Invalid("'required' entries must be strings".into()))?;
                schema.required.push(name.to_string());
            }
        }

        Ok(schema)
    }

    /// Validates `value`, collecting every violation.
    pub fn validate(&self, value: &Value) -> Result<(), Vec<SchemaViolation>> {
        let mut violations = Vec::new();
        self.check(value, "", &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// Widens `value` in place toward pinned types where lossless, and
    /// reports where it is not.
    pub fn adjust(&self, value: &mut Value) -> Result<(), Vec<SchemaViolation>> {
        let mut violations = Vec::new();
        self.fixup(value, "", &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    fn check(&self, value: &Value, path: &str, out: &mut Vec<SchemaViolation>) {
        if let Some(ty) = self.ty {
            if value.value_type() != ty {
                out.push(SchemaViolation {
                    path: path.to_string(),
                    reason: format!("expected {ty}, found {}", value.value_type()),
                });
                return;
            }
        }

        for name in &self.required {
            let present = value
                .as_object()
                .is_some_and(|map| map.contains_key(name));
            if !present {
                out.push(SchemaViolation {
                    path: path.to_string(),
                    reason: format!("missing required property '{name}'"),
                });
            }
        }

        if let Some(map) = value.as_object() {
            for (name, sub) in &self.properties {
                if let Some(child) = map.get(name) {
                    sub.check(child, &join(path, name), out);
                }
            }
        }

        if let (Some(items), Some(elements)) = (&self.items, value.as_array()) {
            for (i, element) in elements.iter().enumerate() {
                items.check(element, &join(path, &i.to_string()), out);
            }
        }
    }

    fn fixup(&self, value: &mut Value, path: &str, out: &mut Vec<SchemaViolation>) {
        if let Some(ty) = self.ty {
            if value.value_type() != ty {
                match widen(value, ty) {
                    Some(widened) => *value = widened,
                    None => {
                        out.push(SchemaViolation {
                            path: path.to_string(),
                            reason: format!(
                                "cannot losslessly adjust {} to {ty}",
                                value.value_type()
                            ),
                        });
                        return;
                    }
                }
            }
        }

        if let Some(map) = value.as_object_mut() {
            for (name, sub) in &self.properties {
                if let Some(child) = map.get_mut(name) {
                    sub.fixup(child, &join(path, name), out);
                }
            }
        }

        if let Some(items) = &self.items {
            if let Some(elements) = value.as_array_mut() {
                for (i, element) in elements.iter_mut().enumerate() {
                    items.fixup(element, &join(path, &i.to_string()), out);
                }
            }
        }
    }
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}.{segment}")
    }
}

/// Lossless widening toward `target`, reusing the getter rules.
fn widen(value: &Value, target: ValueType) -> Option<Value> {
    let widened: Result<Value, ValueError> = match target {
        ValueType::Int16 => value.get_int16().map(Value::Int16),
        ValueType::Int32 => value.get_int32().map(Value::Int32),
        ValueType::Int64 => value.get_int64().map(Value::Int64),
        ValueType::UInt16 => value.get_uint16().map(Value::UInt16),
        ValueType::UInt32 => value.get_uint32().map(Value::UInt32),
        ValueType::UInt64 => value.get_uint64().map(Value::UInt64),
        ValueType::Float32 => value.get_float32().map(Value::Float32),
        ValueType::Float64 => value.get_float64().map(Value::Float64),
        _ => return None,
    };
    widened.ok()
}
