//! The type catalog: dynamic values and the fixed set of value types.
//!
//! Every declared option or positional carries a [`ValueType`] that turns a
//! raw command-line token into a [`Value`] or fails with a
//! [`ConversionError`]. Typed access on top of these dynamic values lives in
//! [`Kind`](crate::Kind).

use std::collections::HashSet;
use std::fmt;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::error::{ConversionError, DeclarationError};

/// Separator used by the list and map types.
pub const LIST_SEPARATOR: char = ',';

/// Separator between a map key and its value.
pub const MAP_ASSIGN: char = '=';

/// A converted command-line value.
///
/// # Examples
///
/// ```
/// use argflags_core::Value;
///
/// let v = Value::List(vec![Value::Int(1), Value::Int(3)]);
/// assert_eq!(v.to_string(), "1,3");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    /// Label of the selected choice variant.
    Choice(String),
    List(Vec<Value>),
    /// Key/value pairs in the order they were written.
    Map(Vec<(Value, Value)>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::Str(s) | Value::Choice(s) => f.write_str(s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{LIST_SEPARATOR}")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Map(entries) => {
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{LIST_SEPARATOR}")?;
                    }
                    write!(f, "{key}{MAP_ASSIGN}{value}")?;
                }
                Ok(())
            }
        }
    }
}

// Maps serialize as objects keyed by the display form of the key, so JSON
// output stays valid for integer and boolean keys.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Double(d) => serializer.serialize_f64(*d),
            Value::Str(s) | Value::Choice(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(&key.to_string(), value)?;
                }
                map.end()
            }
        }
    }
}

/// Ordered set of labels accepted by a choice type.
///
/// Labels must be unique; [`ChoiceDomain::new`] rejects a domain in which
/// two variants render identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceDomain {
    labels: Vec<String>,
}

impl ChoiceDomain {
    /// Builds a domain from variant labels.
    ///
    /// # Errors
    ///
    /// Returns [`DeclarationError::DuplicateChoice`] when a label repeats.
    ///
    /// # Examples
    ///
    /// ```
    /// use argflags_core::ChoiceDomain;
    ///
    /// assert!(ChoiceDomain::new(["json", "yaml"]).is_ok());
    /// assert!(ChoiceDomain::new(["json", "json"]).is_err());
    /// ```
    pub fn new<I, S>(labels: I) -> Result<Self, DeclarationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        let mut seen = HashSet::new();
        for label in &labels {
            if !seen.insert(label.as_str()) {
                return Err(DeclarationError::DuplicateChoice(label.clone()));
            }
        }
        Ok(Self { labels })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// Value type of a declared option or positional.
///
/// # Examples
///
/// ```
/// use argflags_core::{Value, ValueType};
///
/// let ints = ValueType::List(Box::new(ValueType::Int));
/// let value = ints.convert("1,3,5", "flag -ints").unwrap();
/// assert_eq!(value, Value::List(vec![Value::Int(1), Value::Int(3), Value::Int(5)]));
///
/// assert!(ValueType::Int.convert("ten", "flag -count").is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    /// Boolean. With `parameter: false` the flag is a bare switch.
    Bool { parameter: bool },
    Str,
    Int,
    Double,
    Choice(ChoiceDomain),
    /// Comma-separated list of the element type.
    List(Box<ValueType>),
    /// Comma-separated `key=value` pairs.
    Map(Box<ValueType>, Box<ValueType>),
}

impl ValueType {
    /// Plain boolean switch that takes no parameter.
    pub const SWITCH: ValueType = ValueType::Bool { parameter: false };

    /// Returns `false` only for a bare boolean switch.
    pub fn has_parameter(&self) -> bool {
        !matches!(self, ValueType::Bool { parameter: false })
    }

    /// Human-readable constraint text used in usage output.
    pub fn describe(&self) -> String {
        match self {
            ValueType::Choice(domain) => {
                format!("Value should be one of [{}]", domain.labels().join(", "))
            }
            other => other.short_name(),
        }
    }

    fn short_name(&self) -> String {
        match self {
            ValueType::Bool { .. } => "Boolean".to_string(),
            ValueType::Str => "String".to_string(),
            ValueType::Int => "Int".to_string(),
            ValueType::Double => "Double".to_string(),
            ValueType::Choice(domain) => format!("Choice [{}]", domain.labels().join(", ")),
            ValueType::List(elem) => format!("List<{}>", elem.short_name()),
            ValueType::Map(key, value) => {
                format!("Map<{}, {}>", key.short_name(), value.short_name())
            }
        }
    }

    fn expected(&self) -> String {
        match self {
            ValueType::Bool { .. } => "a boolean".to_string(),
            ValueType::Str => "a string".to_string(),
            ValueType::Int => "an integer".to_string(),
            ValueType::Double => "a double".to_string(),
            ValueType::Choice(domain) => format!("one of [{}]", domain.labels().join(", ")),
            ValueType::List(elem) => format!("a comma-separated list of {}", elem.short_name()),
            ValueType::Map(key, value) => format!(
                "comma-separated key=value pairs of {} to {}",
                key.short_name(),
                value.short_name()
            ),
        }
    }

    /// Converts a token into a value of this type.
    ///
    /// `field` names the flag or argument in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] when the token does not fit the type.
    pub fn convert(&self, token: &str, field: &str) -> Result<Value, ConversionError> {
        match self {
            ValueType::Bool { .. } => Ok(Value::Bool(token != "false")),
            ValueType::Str => Ok(Value::Str(token.to_string())),
            ValueType::Int => token
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| ConversionError::new(field, self.expected(), token)),
            ValueType::Double => token
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|_| ConversionError::new(field, self.expected(), token)),
            ValueType::Choice(domain) => {
                if domain.contains(token) {
                    Ok(Value::Choice(token.to_string()))
                } else {
                    Err(ConversionError::new(field, self.expected(), token))
                }
            }
            ValueType::List(elem) => convert_list(elem, token, field),
            ValueType::Map(key, value) => self.convert_map(key, value, token, field),
        }
    }

    fn convert_map(
        &self,
        key_type: &ValueType,
        value_type: &ValueType,
        token: &str,
        field: &str,
    ) -> Result<Value, ConversionError> {
        if token.is_empty() {
            return Ok(Value::Map(Vec::new()));
        }

        // A piece without `=` continues the previous value: `a=1,2,b=3`
        // yields `a -> "1,2"` and `b -> "3"`.
        let mut raw: Vec<(String, String)> = Vec::new();
        for piece in token.split(LIST_SEPARATOR).map(str::trim) {
            match piece.split_once(MAP_ASSIGN) {
                Some((key, value)) => raw.push((key.trim().to_string(), value.trim().to_string())),
                None => match raw.last_mut() {
                    Some((_, value)) => {
                        value.push(LIST_SEPARATOR);
                        value.push_str(piece);
                    }
                    None => return Err(ConversionError::new(field, self.expected(), token)),
                },
            }
        }

        let mut entries: Vec<(Value, Value)> = Vec::with_capacity(raw.len());
        for (key, value) in raw {
            let key = key_type.convert(&key, field)?;
            if entries.iter().any(|(existing, _)| *existing == key) {
                return Err(ConversionError::new(
                    field,
                    format!("{} with distinct keys", self.expected()),
                    token,
                ));
            }
            entries.push((key, value_type.convert(&value, field)?));
        }
        Ok(Value::Map(entries))
    }
}

fn convert_list(elem: &ValueType, token: &str, field: &str) -> Result<Value, ConversionError> {
    if token.is_empty() {
        return Ok(Value::List(Vec::new()));
    }
    token
        .split(LIST_SEPARATOR)
        .map(|piece| elem.convert(piece.trim(), field))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::List)
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Value {
        Value::List(values.iter().copied().map(Value::Int).collect())
    }

    #[test]
    fn test_bool_only_false_literal_is_false() {
        let t = ValueType::SWITCH;
        assert_eq!(t.convert("false", "f").unwrap(), Value::Bool(false));
        assert_eq!(t.convert("true", "f").unwrap(), Value::Bool(true));
        assert_eq!(t.convert("no", "f").unwrap(), Value::Bool(true));
        assert_eq!(t.convert("FALSE", "f").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_has_parameter() {
        assert!(!ValueType::SWITCH.has_parameter());
        assert!(ValueType::Bool { parameter: true }.has_parameter());
        assert!(ValueType::Int.has_parameter());
    }

    #[test]
    fn test_numeric_failure_names_kind_and_token() {
        let err = ValueType::Int.convert("1.5", "flag -count").unwrap_err();
        assert_eq!(err.expected, "an integer");
        assert_eq!(err.token, "1.5");
        assert_eq!(err.field, "flag -count");

        let err = ValueType::Double.convert("abc", "flag -ratio").unwrap_err();
        assert_eq!(err.expected, "a double");
        assert_eq!(ValueType::Double.convert("0.25", "x").unwrap(), Value::Double(0.25));
    }

    #[test]
    fn test_choice_lists_valid_labels_on_failure() {
        let t = ValueType::Choice(ChoiceDomain::new(["json", "yaml"]).unwrap());
        assert_eq!(t.convert("yaml", "f").unwrap(), Value::Choice("yaml".into()));
        let err = t.convert("toml", "flag -format").unwrap_err();
        assert!(err.to_string().contains("one of [json, yaml]"));
    }

    #[test]
    fn test_choice_domain_rejects_duplicate_labels() {
        let err = ChoiceDomain::new(["a", "b", "a"]).unwrap_err();
        assert_eq!(err, DeclarationError::DuplicateChoice("a".into()));
    }

    #[test]
    fn test_list_trims_and_converts_elements() {
        let t = ValueType::List(Box::new(ValueType::Int));
        assert_eq!(t.convert("1, 3 ,5", "f").unwrap(), ints(&[1, 3, 5]));
        assert_eq!(t.convert("", "f").unwrap(), Value::List(vec![]));
        assert!(t.convert("1,x", "f").is_err());
    }

    #[test]
    fn test_map_rejoins_continuation_pieces() {
        let t = ValueType::Map(
            Box::new(ValueType::Str),
            Box::new(ValueType::List(Box::new(ValueType::Int))),
        );
        let value = t.convert("a=1,3,5,b=2,4", "f").unwrap();
        assert_eq!(
            value,
            Value::Map(vec![
                (Value::Str("a".into()), ints(&[1, 3, 5])),
                (Value::Str("b".into()), ints(&[2, 4])),
            ])
        );
    }

    #[test]
    fn test_map_without_leading_key_fails() {
        let t = ValueType::Map(Box::new(ValueType::Str), Box::new(ValueType::Str));
        let err = t.convert("1,a=2", "flag -entries").unwrap_err();
        assert_eq!(err.token, "1,a=2");
        assert_eq!(t.convert("", "f").unwrap(), Value::Map(vec![]));
    }

    #[test]
    fn test_map_rejects_repeated_key() {
        let t = ValueType::Map(Box::new(ValueType::Str), Box::new(ValueType::Int));
        let err = t.convert("a=1,b=2,a=3", "flag -limits").unwrap_err();
        assert_eq!(err.field, "flag -limits");
        assert_eq!(err.token, "a=1,b=2,a=3");
        assert!(err.expected.ends_with("with distinct keys"));

        let t = ValueType::Map(Box::new(ValueType::Int), Box::new(ValueType::Str));
        assert!(t.convert("1=x,01=y", "f").is_err());
    }

    #[test]
    fn test_map_converts_keys() {
        let t = ValueType::Map(Box::new(ValueType::Int), Box::new(ValueType::Str));
        assert!(t.convert("x=1", "f").is_err());
        assert_eq!(
            t.convert("1=x", "f").unwrap(),
            Value::Map(vec![(Value::Int(1), Value::Str("x".into()))])
        );
    }

    #[test]
    fn test_describe() {
        assert_eq!(ValueType::Int.describe(), "Int");
        let t = ValueType::Map(
            Box::new(ValueType::Str),
            Box::new(ValueType::List(Box::new(ValueType::Int))),
        );
        assert_eq!(t.describe(), "Map<String, List<Int>>");
    }

    #[test]
    fn test_value_serializes_map_as_object() {
        let v = Value::Map(vec![(Value::Int(1), ints(&[2, 3]))]);
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"{"1":[2,3]}"#);
    }
}
