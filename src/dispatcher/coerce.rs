//! Shape-guided coercion of raw request input.
//!
//! Raw input arrives as an untyped JSON object. Before it reaches a typed
//! executor it is checked against the capability's input shape: required
//! fields must be present and non-null, and scalar values are converted
//! leniently where the intent is unambiguous (`"5"` for an integer field,
//! `"true"` for a boolean). Fields not declared by the shape are dropped.

use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::capabilities::schema::{FieldShape, ItemShape, ShapeDescriptor, TypeTag};

/// Raw input does not fit the declared input shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field `{field}`: {reason}")]
pub struct InputValidationError {
    /// Dotted path of the offending field, e.g. `articles[1].title`.
    pub field: String,
    pub reason: String,
}

impl InputValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Coerce `raw` into `shape`.
pub fn coerce_input(
    raw: &Map<String, Value>,
    shape: &ShapeDescriptor,
) -> Result<Map<String, Value>, InputValidationError> {
    coerce_record(raw, shape, "")
}

fn coerce_record(
    raw: &Map<String, Value>,
    shape: &ShapeDescriptor,
    prefix: &str,
) -> Result<Map<String, Value>, InputValidationError> {
    let mut out = Map::new();
    for (name, field) in shape.fields() {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };

        match raw.get(name) {
            None if field.required => {
                return Err(InputValidationError::new(path, "field required"));
            }
            None => {}
            Some(Value::Null) if field.required => {
                return Err(InputValidationError::new(path, "field may not be null"));
            }
            Some(Value::Null) => {
                out.insert(name.clone(), Value::Null);
            }
            Some(value) => {
                out.insert(name.clone(), coerce_field(value, field, &path)?);
            }
        }
    }
    Ok(out)
}

fn coerce_field(value: &Value, field: &FieldShape, path: &str) -> Result<Value, InputValidationError> {
    match field.type_tag {
        TypeTag::Array => {
            let items = value
                .as_array()
                .ok_or_else(|| mismatch(path, TypeTag::Array, value))?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let item_path = format!("{}[{}]", path, i);
                    match &field.items {
                        Some(ItemShape::Scalar { type_tag }) => coerce_scalar(item, *type_tag, &item_path),
                        Some(ItemShape::Record(nested)) => {
                            let record = item
                                .as_object()
                                .ok_or_else(|| mismatch(&item_path, TypeTag::Object, item))?;
                            coerce_record(record, nested, &item_path).map(Value::Object)
                        }
                        None => Ok(item.clone()),
                    }
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        tag => coerce_scalar(value, tag, path),
    }
}

fn coerce_scalar(value: &Value, tag: TypeTag, path: &str) -> Result<Value, InputValidationError> {
    let coerced = match (tag, value) {
        (TypeTag::String, Value::String(_)) => Some(value.clone()),

        (TypeTag::Integer, Value::Number(n)) => integral(n).map(Value::from),
        (TypeTag::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),

        (TypeTag::Number, Value::Number(_)) => Some(value.clone()),
        (TypeTag::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),

        (TypeTag::Boolean, Value::Bool(_)) => Some(value.clone()),
        (TypeTag::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        (TypeTag::Boolean, Value::Number(n)) => match n.as_i64() {
            Some(0) => Some(Value::Bool(false)),
            Some(1) => Some(Value::Bool(true)),
            _ => None,
        },

        (TypeTag::Object, Value::Object(_)) => Some(value.clone()),
        (TypeTag::Array, Value::Array(_)) => Some(value.clone()),
        _ => None,
    };
    coerced.ok_or_else(|| mismatch(path, tag, value))
}

/// Integer value of a JSON number, accepting floats without a fraction.
fn integral(n: &Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    n.as_f64()
        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
        .map(|f| f as i64)
}

fn mismatch(path: &str, expected: TypeTag, got: &Value) -> InputValidationError {
    let got = match got {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    InputValidationError::new(path, format!("expected {}, got {}", expected, got))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::schema::{shape_from_fields, Describe, FieldSpec};
    use serde_json::json;

    struct Recipient;

    impl Describe for Recipient {
        fn fields() -> Vec<FieldSpec> {
            vec![
                FieldSpec::new("address", TypeTag::String),
                FieldSpec::new("priority", TypeTag::Integer).optional(),
            ]
        }
    }

    fn shape() -> ShapeDescriptor {
        shape_from_fields(vec![
            FieldSpec::new("count", TypeTag::Integer),
            FieldSpec::new("ratio", TypeTag::Number).optional(),
            FieldSpec::new("urgent", TypeTag::Boolean).optional(),
            FieldSpec::list("labels", TypeTag::String).optional(),
            FieldSpec::records::<Recipient>("recipients").optional(),
        ])
    }

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_lenient_scalars() {
        let out = coerce_input(
            &obj(json!({"count": "5", "ratio": "0.5", "urgent": "TRUE", "ignored": 1})),
            &shape(),
        )
        .unwrap();
        assert_eq!(Value::Object(out), json!({"count": 5, "ratio": 0.5, "urgent": true}));
    }

    #[test]
    fn test_missing_required_field() {
        let err = coerce_input(&obj(json!({"ratio": 1})), &shape()).unwrap_err();
        assert_eq!(err.field, "count");
        assert_eq!(err.reason, "field required");
    }

    #[test]
    fn test_null_required_field() {
        let err = coerce_input(&obj(json!({"count": null})), &shape()).unwrap_err();
        assert_eq!(err.field, "count");
    }

    #[test]
    fn test_type_mismatch() {
        let err = coerce_input(&obj(json!({"count": 1.5})), &shape()).unwrap_err();
        assert_eq!(err.reason, "expected integer, got number");

        let err = coerce_input(&obj(json!({"count": 1, "labels": "x"})), &shape()).unwrap_err();
        assert_eq!(err.field, "labels");

        let err = coerce_input(&obj(json!({"count": 1, "labels": ["a", 2]})), &shape()).unwrap_err();
        assert_eq!(err.field, "labels[1]");
    }

    #[test]
    fn test_nested_records_are_coerced() {
        let out = coerce_input(
            &obj(json!({
                "count": 2.0,
                "recipients": [{"address": "a@b", "priority": "3"}, {"address": "c@d"}]
            })),
            &shape(),
        )
        .unwrap();
        assert_eq!(out["count"], json!(2));
        assert_eq!(out["recipients"][0]["priority"], json!(3));
        assert!(out["recipients"][1].get("priority").is_none());

        let err = coerce_input(
            &obj(json!({"count": 1, "recipients": [{"priority": 1}]})),
            &shape(),
        )
        .unwrap_err();
        assert_eq!(err.field, "recipients[0].address");
    }
}
