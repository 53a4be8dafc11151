//! Typed views over the type catalog.
//!
//! A [`Kind<T>`] pairs an engine-level [`ValueType`] with the functions that
//! move between the dynamic [`Value`] stored in a cell and the caller's `T`.
//! Flags declared with a `Kind<T>` hand back `T` from their accessors.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::DeclarationError;
use crate::types::{ChoiceDomain, Value, ValueType};

type Decode<T> = Arc<dyn Fn(&Value) -> Option<T> + Send + Sync>;
type Encode<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;

/// Typed value kind.
///
/// # Examples
///
/// ```
/// use argflags_core::{Kind, Value};
///
/// let kind = Kind::list(Kind::int());
/// let value = kind.value_type().convert("1,2", "flag -ids").unwrap();
/// assert_eq!(kind.decode(&value), Some(vec![1, 2]));
/// assert_eq!(kind.encode(&vec![7]), Value::List(vec![Value::Int(7)]));
/// ```
pub struct Kind<T> {
    value_type: ValueType,
    decode: Decode<T>,
    encode: Encode<T>,
}

impl<T> Clone for Kind<T> {
    fn clone(&self) -> Self {
        Self {
            value_type: self.value_type.clone(),
            decode: Arc::clone(&self.decode),
            encode: Arc::clone(&self.encode),
        }
    }
}

impl<T> fmt::Debug for Kind<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kind")
            .field("value_type", &self.value_type)
            .finish_non_exhaustive()
    }
}

impl<T: 'static> Kind<T> {
    fn from_parts(
        value_type: ValueType,
        decode: impl Fn(&Value) -> Option<T> + Send + Sync + 'static,
        encode: impl Fn(&T) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            value_type,
            decode: Arc::new(decode),
            encode: Arc::new(encode),
        }
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    /// Reads a `T` back out of a stored value.
    pub fn decode(&self, value: &Value) -> Option<T> {
        (self.decode)(value)
    }

    pub fn encode(&self, value: &T) -> Value {
        (self.encode)(value)
    }

    /// Kind for a cell that accumulates several `T` (repeated or delimited
    /// options, multi-token positionals).
    ///
    /// Unlike [`Kind::list`] the element type stays the engine-level type,
    /// because the cell converts each token individually. A single stored
    /// value decodes as a one-element vector.
    pub fn collect(self) -> Kind<Vec<T>> {
        let element = self.clone();
        let value_type = self.value_type.clone();
        Kind::<Vec<T>>::from_parts(
            value_type,
            move |value| match value {
                Value::List(_) => decode_list(&self, value),
                single => self.decode(single).map(|v| vec![v]),
            },
            move |items: &Vec<T>| Value::List(items.iter().map(|i| element.encode(i)).collect()),
        )
    }
}

fn decode_list<T: 'static>(element: &Kind<T>, value: &Value) -> Option<Vec<T>> {
    match value {
        Value::List(items) => items.iter().map(|item| element.decode(item)).collect(),
        _ => None,
    }
}

impl Kind<bool> {
    /// Bare switch: `-debug` sets true, no parameter is consumed.
    pub fn boolean() -> Self {
        Self::bool_with(false)
    }

    /// Boolean that consumes a parameter: `-debug false`.
    pub fn boolean_value() -> Self {
        Self::bool_with(true)
    }

    fn bool_with(parameter: bool) -> Self {
        Self::from_parts(
            ValueType::Bool { parameter },
            |value| match value {
                Value::Bool(b) => Some(*b),
                _ => None,
            },
            |b| Value::Bool(*b),
        )
    }
}

impl Kind<String> {
    pub fn string() -> Self {
        Self::from_parts(
            ValueType::Str,
            |value| match value {
                Value::Str(s) => Some(s.clone()),
                _ => None,
            },
            |s| Value::Str(s.clone()),
        )
    }
}

impl Kind<i64> {
    pub fn int() -> Self {
        Self::from_parts(
            ValueType::Int,
            |value| match value {
                Value::Int(i) => Some(*i),
                _ => None,
            },
            |i| Value::Int(*i),
        )
    }
}

impl Kind<f64> {
    pub fn double() -> Self {
        Self::from_parts(
            ValueType::Double,
            |value| match value {
                Value::Double(d) => Some(*d),
                _ => None,
            },
            |d| Value::Double(*d),
        )
    }
}

impl Kind<Value> {
    /// Untyped kind: the accessor returns the stored [`Value`] as is.
    pub fn dynamic(value_type: ValueType) -> Self {
        Self::from_parts(value_type, |value| Some(value.clone()), |value| value.clone())
    }
}

impl<T: Clone + Send + Sync + 'static> Kind<T> {
    /// Enumerated choice over `variants`, rendered through `label`.
    ///
    /// # Errors
    ///
    /// Returns [`DeclarationError::DuplicateChoice`] when two variants share a
    /// label.
    ///
    /// # Examples
    ///
    /// ```
    /// use argflags_core::Kind;
    ///
    /// #[derive(Clone, Debug, PartialEq)]
    /// enum Format { Json, Yaml }
    ///
    /// let kind = Kind::choice([Format::Json, Format::Yaml], |f| match f {
    ///     Format::Json => "json".to_string(),
    ///     Format::Yaml => "yaml".to_string(),
    /// })
    /// .unwrap();
    /// let value = kind.value_type().convert("yaml", "flag -format").unwrap();
    /// assert_eq!(kind.decode(&value), Some(Format::Yaml));
    /// ```
    pub fn choice<I, F>(variants: I, label: F) -> Result<Self, DeclarationError>
    where
        I: IntoIterator<Item = T>,
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        let variants: Vec<(String, T)> = variants.into_iter().map(|v| (label(&v), v)).collect();
        let domain = ChoiceDomain::new(variants.iter().map(|(l, _)| l.clone()))?;
        Ok(Self::from_parts(
            ValueType::Choice(domain),
            move |value| match value {
                Value::Choice(selected) => variants
                    .iter()
                    .find(|(l, _)| l == selected)
                    .map(|(_, v)| v.clone()),
                _ => None,
            },
            move |v| Value::Choice(label(v)),
        ))
    }

    /// Choice rendered through `Display`.
    pub fn choice_display<I>(variants: I) -> Result<Self, DeclarationError>
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        Self::choice(variants, |v| v.to_string())
    }
}

impl<E: 'static> Kind<Vec<E>> {
    /// Comma-separated list of `element` in a single token.
    pub fn list(element: Kind<E>) -> Self {
        let value_type = ValueType::List(Box::new(element.value_type.clone()));
        let encoder = element.clone();
        Self::from_parts(
            value_type,
            move |value| decode_list(&element, value),
            move |items: &Vec<E>| Value::List(items.iter().map(|i| encoder.encode(i)).collect()),
        )
    }
}

impl<K, V> Kind<IndexMap<K, V>>
where
    K: Hash + Eq + 'static,
    V: 'static,
{
    /// Comma-separated `key=value` pairs, kept in written order.
    pub fn map(key: Kind<K>, value: Kind<V>) -> Self {
        let value_type = ValueType::Map(
            Box::new(key.value_type.clone()),
            Box::new(value.value_type.clone()),
        );
        let (key_enc, value_enc) = (key.clone(), value.clone());
        Self::from_parts(
            value_type,
            move |stored| match stored {
                Value::Map(entries) => entries
                    .iter()
                    .map(|(k, v)| Some((key.decode(k)?, value.decode(v)?)))
                    .collect(),
                _ => None,
            },
            move |map: &IndexMap<K, V>| {
                Value::Map(
                    map.iter()
                        .map(|(k, v)| (key_enc.encode(k), value_enc.encode(v)))
                        .collect(),
                )
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_decodes_in_written_order() {
        let kind = Kind::map(Kind::string(), Kind::list(Kind::int()));
        let value = kind
            .value_type()
            .convert("a=1,3,5,b=2,4", "flag -entries")
            .unwrap();
        let map = kind.decode(&value).unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(map["a"], vec![1, 3, 5]);
        assert_eq!(map["b"], vec![2, 4]);
    }

    #[test]
    fn test_choice_display_rejects_duplicates() {
        assert!(Kind::choice_display(["x".to_string(), "x".to_string()]).is_err());
    }

    #[test]
    fn test_collect_keeps_element_type() {
        let kind = Kind::int().collect();
        assert_eq!(kind.value_type(), &ValueType::Int);
        let stored = Value::List(vec![Value::Int(4), Value::Int(5)]);
        assert_eq!(kind.decode(&stored), Some(vec![4, 5]));
    }

    #[test]
    fn test_decode_rejects_mismatched_value() {
        assert_eq!(Kind::int().decode(&Value::Str("1".into())), None);
        assert_eq!(Kind::boolean().decode(&Value::Bool(true)), Some(true));
    }
}
