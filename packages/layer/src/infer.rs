//! Column type inference over `GeoJSON` property values.

use carto_import_models::{AttributeValue, SemanticType};
use serde_json::Value;

/// Infers the type of a single non-null JSON value.
///
/// Returns `None` for `null`.
#[must_use]
pub fn value_type(value: &Value) -> Option<SemanticType> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some(SemanticType::Boolean),
        Value::Number(number) => Some(number.as_i64().map_or(SemanticType::Float, |i| {
            if i32::try_from(i).is_ok() {
                SemanticType::Integer
            } else {
                SemanticType::LongInteger
            }
        })),
        Value::String(_) | Value::Array(_) | Value::Object(_) => Some(SemanticType::Text),
    }
}

/// Combines the type seen so far for a column with the type of a new value.
///
/// Numeric types widen `Integer -> LongInteger -> Float`; any other
/// disagreement falls back to text.
#[must_use]
pub fn merge(current: SemanticType, next: SemanticType) -> SemanticType {
    use SemanticType::{Float, Integer, LongInteger, Text};

    match (current, next) {
        (Integer, Integer) => Integer,
        (Integer | LongInteger, Integer | LongInteger) => LongInteger,
        (Integer | LongInteger | Float, Integer | LongInteger | Float) => Float,
        _ if current == next => current,
        _ => Text,
    }
}

/// Tracks the inferred type of one column across all features.
#[derive(Debug, Default, Clone, Copy)]
pub struct ColumnType(Option<SemanticType>);

impl ColumnType {
    /// Feeds one value into the inference.
    pub fn observe(&mut self, value: &Value) {
        if let Some(next) = value_type(value) {
            self.0 = Some(self.0.map_or(next, |current| merge(current, next)));
        }
    }

    /// The inferred type. A column that only ever held `null` is text.
    #[must_use]
    pub fn resolve(self) -> SemanticType {
        self.0.unwrap_or(SemanticType::Text)
    }
}

/// Converts a JSON property value into an attribute of a column of type
/// `column`.
#[must_use]
pub fn to_attribute(value: Option<&Value>, column: SemanticType) -> AttributeValue {
    let Some(value) = value else {
        return AttributeValue::Null;
    };

    match (value, column) {
        (Value::Null, _) => AttributeValue::Null,
        (Value::Bool(b), SemanticType::Boolean) => AttributeValue::Boolean(*b),
        (Value::Number(number), SemanticType::Integer | SemanticType::LongInteger | SemanticType::Float) => {
            number.as_i64().map_or_else(
                || number.as_f64().map_or(AttributeValue::Null, AttributeValue::Float),
                AttributeValue::Integer,
            )
        }
        (Value::String(text), _) => AttributeValue::Text(text.clone()),
        (other, _) => AttributeValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn infer(values: &[Value]) -> SemanticType {
        let mut column = ColumnType::default();
        for value in values {
            column.observe(value);
        }
        column.resolve()
    }

    #[test]
    fn single_kinds() {
        assert_eq!(infer(&[json!(true)]), SemanticType::Boolean);
        assert_eq!(infer(&[json!(42)]), SemanticType::Integer);
        assert_eq!(infer(&[json!(3_000_000_000_i64)]), SemanticType::LongInteger);
        assert_eq!(infer(&[json!(-3_000_000_000_i64)]), SemanticType::LongInteger);
        assert_eq!(infer(&[json!(1.5)]), SemanticType::Float);
        assert_eq!(infer(&[json!("x")]), SemanticType::Text);
        assert_eq!(infer(&[json!([1, 2])]), SemanticType::Text);
        assert_eq!(infer(&[json!({"a": 1})]), SemanticType::Text);
    }

    #[test]
    fn numbers_widen() {
        assert_eq!(infer(&[json!(1), json!(2.5)]), SemanticType::Float);
        assert_eq!(
            infer(&[json!(1), json!(5_000_000_000_i64)]),
            SemanticType::LongInteger
        );
        assert_eq!(
            infer(&[json!(5_000_000_000_i64), json!(0.5), json!(1)]),
            SemanticType::Float
        );
    }

    #[test]
    fn conflicts_become_text() {
        assert_eq!(infer(&[json!(1), json!("one")]), SemanticType::Text);
        assert_eq!(infer(&[json!(true), json!(1)]), SemanticType::Text);
    }

    #[test]
    fn nulls_do_not_affect_inference() {
        assert_eq!(infer(&[Value::Null, json!(7), Value::Null]), SemanticType::Integer);
        assert_eq!(infer(&[Value::Null, Value::Null]), SemanticType::Text);
        assert_eq!(infer(&[]), SemanticType::Text);
    }

    #[test]
    fn attributes_follow_column_type() {
        assert_eq!(
            to_attribute(Some(&json!(3)), SemanticType::Float),
            AttributeValue::Integer(3)
        );
        assert_eq!(
            to_attribute(Some(&json!(2.5)), SemanticType::Float),
            AttributeValue::Float(2.5)
        );
        assert_eq!(
            to_attribute(Some(&json!(true)), SemanticType::Text),
            AttributeValue::Text("true".to_string())
        );
        assert_eq!(
            to_attribute(Some(&json!(12)), SemanticType::Text),
            AttributeValue::Text("12".to_string())
        );
        assert_eq!(
            to_attribute(Some(&json!({"a": [1]})), SemanticType::Text),
            AttributeValue::Text(r#"{"a":[1]}"#.to_string())
        );
        assert_eq!(
            to_attribute(Some(&json!("")), SemanticType::Text),
            AttributeValue::Text(String::new())
        );
        assert_eq!(to_attribute(None, SemanticType::Integer), AttributeValue::Null);
        assert_eq!(
            to_attribute(Some(&Value::Null), SemanticType::Boolean),
            AttributeValue::Null
        );
    }
}
