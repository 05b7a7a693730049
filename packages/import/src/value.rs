//! Scalar attribute values to SQL literals.

use carto_import_models::AttributeValue;

/// How text values are turned into single-quoted literals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextQuoting {
    /// Wrap in single quotes as-is. Text containing `'` produces
    /// malformed SQL.
    #[default]
    Verbatim,
    /// Wrap in single quotes, doubling embedded single quotes.
    Escaped,
}

/// Formats an attribute value as a SQL literal.
///
/// `is_numeric` is the type of the value's column: numeric columns get
/// bare decimal literals, everything else is quoted text. Booleans always
/// become `TRUE`/`FALSE` and nulls always become `NULL`.
#[must_use]
pub fn format_value(value: &AttributeValue, is_numeric: bool, quoting: TextQuoting) -> String {
    match value {
        AttributeValue::Null => "NULL".to_string(),
        AttributeValue::Boolean(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        AttributeValue::Integer(i) if is_numeric => i.to_string(),
        AttributeValue::Float(f) if is_numeric => format_number(*f),
        AttributeValue::Text(text) if is_numeric => text
            .trim()
            .parse::<f64>()
            .map_or_else(|_| quote_text(text, quoting), format_number),
        AttributeValue::Integer(i) => quote_text(&i.to_string(), quoting),
        AttributeValue::Float(f) => quote_text(&f.to_string(), quoting),
        AttributeValue::Text(text) => quote_text(text, quoting),
    }
}

/// Formats a number as a SQL numeric literal. Integral values have no
/// fractional part (`3.0` becomes `3`); non-finite values become `NULL`.
#[must_use]
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return "NULL".to_string();
    }
    // `Display` for f64 already omits a `.0` on integral values.
    value.to_string()
}

fn quote_text(text: &str, quoting: TextQuoting) -> String {
    match quoting {
        TextQuoting::Verbatim => format!("'{text}'"),
        TextQuoting::Escaped => format!("'{}'", text.replace('\'', "''")),
    }
}
