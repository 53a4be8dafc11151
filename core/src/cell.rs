//! Value cells: the mutable half of a declaration.
//!
//! A [`ValueCell`] owns the values parsed for one [`Descriptor`] together
//! with their [`Origin`]. Cells start out [`Origin::Undefined`]; a parse pass
//! moves them to [`Origin::Unset`] and from there to
//! [`Origin::SetByUser`] or [`Origin::SetDefault`]. [`ValueCell::redefine`]
//! reaches [`Origin::Redefined`] from any state.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::descriptor::{Arity, Descriptor, Role};
use crate::error::ParseError;
use crate::types::Value;

/// Provenance of a cell's current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// No parse pass has run yet.
    Undefined,
    /// A pass is running, or finished without a value or default.
    Unset,
    SetByUser,
    SetDefault,
    /// Replaced explicitly through [`ValueCell::redefine`].
    Redefined,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Origin::Undefined => "undefined",
            Origin::Unset => "unset",
            Origin::SetByUser => "set_by_user",
            Origin::SetDefault => "set_default",
            Origin::Redefined => "redefined",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Single(Option<Value>),
    Multi(Vec<Value>),
}

/// Saved cell contents, used to roll a failed pass back.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CellState {
    slot: Slot,
    origin: Origin,
}

impl CellState {
    fn empty(descriptor: &Descriptor, origin: Origin) -> Self {
        let slot = if descriptor.is_multi() {
            Slot::Multi(Vec::new())
        } else {
            Slot::Single(None)
        };
        Self { slot, origin }
    }
}

/// Mutable value holder bound to one descriptor.
#[derive(Debug)]
pub struct ValueCell {
    descriptor: Arc<Descriptor>,
    state: Mutex<CellState>,
}

impl ValueCell {
    pub fn new(descriptor: Arc<Descriptor>) -> Self {
        let state = CellState::empty(&descriptor, Origin::Undefined);
        Self {
            descriptor,
            state: Mutex::new(state),
        }
    }

    pub fn descriptor(&self) -> &Arc<Descriptor> {
        &self.descriptor
    }

    pub fn origin(&self) -> Origin {
        self.state.lock().origin
    }

    /// Current value; `None` before the first pass or when nothing was set.
    ///
    /// Multi-valued cells report their values as a [`Value::List`].
    pub fn value(&self) -> Option<Value> {
        let state = self.state.lock();
        match (&state.slot, state.origin) {
            (_, Origin::Undefined | Origin::Unset) => None,
            (Slot::Single(value), _) => value.clone(),
            (Slot::Multi(items), _) => Some(Value::List(items.clone())),
        }
    }

    /// Replaces the value outright, marking it [`Origin::Redefined`].
    pub fn redefine(&self, value: Value) {
        let mut state = self.state.lock();
        state.slot = match (&state.slot, value) {
            (Slot::Single(_), value) => Slot::Single(Some(value)),
            (Slot::Multi(_), Value::List(items)) => Slot::Multi(items),
            (Slot::Multi(_), value) => Slot::Multi(vec![value]),
        };
        state.origin = Origin::Redefined;
    }

    pub(crate) fn begin_pass(&self) {
        *self.state.lock() = CellState::empty(&self.descriptor, Origin::Unset);
    }

    pub(crate) fn snapshot(&self) -> CellState {
        self.state.lock().clone()
    }

    pub(crate) fn restore(&self, saved: CellState) {
        *self.state.lock() = saved;
    }

    /// Converts `token` and stores it according to the descriptor's role.
    ///
    /// Returns `true` on the first successful assignment of the pass.
    pub(crate) fn assign(&self, token: &str) -> Result<bool, ParseError> {
        let descriptor = &self.descriptor;
        let value_type = descriptor.value_type();
        let field = descriptor.field();

        let mut state = self.state.lock();
        match &mut state.slot {
            Slot::Single(current) => {
                if let Some(existing) = current {
                    return Err(ParseError::MultipleValues {
                        name: descriptor.display_name(),
                        existing: existing.to_string(),
                        incoming: token.to_string(),
                    });
                }
                *current = Some(value_type.convert(token, &field)?);
            }
            Slot::Multi(items) => {
                let delimiter = match descriptor.role() {
                    Role::Option(multiplicity) => multiplicity.delimiter(),
                    Role::Argument(_) => None,
                };
                match delimiter {
                    // Same as a list: the empty token carries no pieces.
                    Some(_) if token.is_empty() => {}
                    Some(delimiter) => {
                        let pieces = token
                            .split(delimiter)
                            .map(|piece| value_type.convert(piece, &field))
                            .collect::<Result<Vec<_>, _>>()?;
                        items.extend(pieces);
                    }
                    None => items.push(value_type.convert(token, &field)?),
                }
            }
        }

        let first = state.origin != Origin::SetByUser;
        state.origin = Origin::SetByUser;
        Ok(first)
    }

    /// Applies the default to an unset cell and enforces requiredness.
    pub(crate) fn finalize(&self) -> Result<(), ParseError> {
        let descriptor = &self.descriptor;
        let mut state = self.state.lock();

        if state.origin == Origin::Unset {
            if let Some(default) = descriptor.default() {
                state.slot = match (&state.slot, default) {
                    (Slot::Multi(_), Value::List(items)) => Slot::Multi(items.clone()),
                    (Slot::Multi(_), value) => Slot::Multi(vec![value.clone()]),
                    (Slot::Single(_), value) => Slot::Single(Some(value.clone())),
                };
                state.origin = Origin::SetDefault;
            }
        }

        if let (Role::Argument(Arity::Exact(expected)), Slot::Multi(items)) =
            (descriptor.role(), &state.slot)
        {
            if state.origin == Origin::SetByUser && items.len() < expected {
                return Err(ParseError::NotEnoughValues {
                    name: descriptor.field(),
                    expected,
                    got: items.len(),
                });
            }
        }

        if descriptor.is_required() && !descriptor.is_hidden() && state.origin != Origin::SetByUser
        {
            return Err(ParseError::RequiredMissing(descriptor.field()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Multiplicity;
    use crate::types::ValueType;

    fn cell(descriptor: Descriptor, name: &str) -> ValueCell {
        descriptor.bind(name).unwrap();
        ValueCell::new(Arc::new(descriptor))
    }

    #[test]
    fn test_undefined_until_first_pass() {
        let c = cell(
            Descriptor::option(ValueType::Int).with_default(Value::Int(3)),
            "n",
        );
        assert_eq!(c.origin(), Origin::Undefined);
        assert_eq!(c.value(), None);

        c.begin_pass();
        assert_eq!(c.origin(), Origin::Unset);
        c.finalize().unwrap();
        assert_eq!(c.origin(), Origin::SetDefault);
        assert_eq!(c.value(), Some(Value::Int(3)));
    }

    #[test]
    fn test_single_cell_rejects_second_value() {
        let c = cell(Descriptor::option(ValueType::Str), "name");
        c.begin_pass();
        assert!(c.assign("a").unwrap());
        let err = c.assign("b").unwrap_err();
        assert_eq!(
            err,
            ParseError::MultipleValues {
                name: "-name".into(),
                existing: "a".into(),
                incoming: "b".into(),
            }
        );
    }

    #[test]
    fn test_delimited_cell_accumulates_pieces() {
        let c = cell(
            Descriptor::option(ValueType::Int).with_multiplicity(Multiplicity::Delimited(':')),
            "ports",
        );
        c.begin_pass();
        assert!(c.assign("80:443").unwrap());
        assert!(!c.assign("8080").unwrap());
        assert_eq!(
            c.value(),
            Some(Value::List(vec![
                Value::Int(80),
                Value::Int(443),
                Value::Int(8080)
            ]))
        );
    }

    #[test]
    fn test_empty_delimited_token_is_empty_list() {
        let c = cell(
            Descriptor::option(ValueType::Int).with_multiplicity(Multiplicity::Delimited(',')),
            "ports",
        );
        c.begin_pass();
        assert!(c.assign("").unwrap());
        c.finalize().unwrap();
        assert_eq!(c.origin(), Origin::SetByUser);
        assert_eq!(c.value(), Some(Value::List(Vec::new())));
    }

    #[test]
    fn test_failed_delimited_assignment_keeps_previous_pieces() {
        let c = cell(
            Descriptor::option(ValueType::Int).with_multiplicity(Multiplicity::RepeatedDelimited(',')),
            "ids",
        );
        c.begin_pass();
        c.assign("1").unwrap();
        assert!(c.assign("2,x").is_err());
        assert_eq!(c.value(), Some(Value::List(vec![Value::Int(1)])));
    }

    #[test]
    fn test_required_without_value_fails_finalize() {
        let c = cell(Descriptor::option(ValueType::Str).required(), "token");
        c.begin_pass();
        assert_eq!(
            c.finalize(),
            Err(ParseError::RequiredMissing("flag -token".into()))
        );
    }

    #[test]
    fn test_exact_arity_short_of_values() {
        let c = cell(
            Descriptor::argument(ValueType::Str).with_arity(Arity::Exact(2)),
            "pair",
        );
        c.begin_pass();
        c.assign("left").unwrap();
        assert!(matches!(
            c.finalize(),
            Err(ParseError::NotEnoughValues {
                expected: 2,
                got: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_origin_labels_match_serde() {
        for origin in [Origin::Undefined, Origin::SetByUser, Origin::Redefined] {
            let json = serde_json::to_string(&origin).unwrap();
            assert_eq!(json, format!("\"{origin}\""));
        }
    }

    #[test]
    fn test_redefine_from_any_state_and_restore() {
        let c = cell(Descriptor::option(ValueType::Int), "n");
        let saved = c.snapshot();
        c.redefine(Value::Int(9));
        assert_eq!(c.origin(), Origin::Redefined);
        assert_eq!(c.value(), Some(Value::Int(9)));
        c.restore(saved);
        assert_eq!(c.origin(), Origin::Undefined);
    }
}
