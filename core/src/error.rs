//! Error types for declarations and parse passes.
//!
//! Two families are kept apart:
//!
//! - [`ParseError`] describes bad user input. It is captured into the single
//!   [`ParseOutcome::Error`](crate::ParseOutcome::Error) of a pass and never
//!   raised on its own.
//! - [`DeclarationError`] describes a mistake in the declaring code (bad
//!   names, ordering violations, re-parsing). It is returned immediately from
//!   the declaration or parse entry point.

use thiserror::Error;

/// A token could not be coerced to its declared type.
///
/// The `Display` form names the field, the expected kind and the offending
/// token, e.g. `flag -count is expected to be an integer, got "ten"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} is expected to be {expected}, got \"{token}\"")]
pub struct ConversionError {
    /// Human-readable field name (`flag -count`, `argument input`).
    pub field: String,
    /// Description of the expected kind (`an integer`, `one of [a, b]`).
    pub expected: String,
    /// The token as it appeared on the command line.
    pub token: String,
}

impl ConversionError {
    pub fn new(
        field: impl Into<String>,
        expected: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
            token: token.into(),
        }
    }
}

/// Recoverable, user-input-driven failures of a parse pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Token could not be converted to the declared type.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    /// An option needing a parameter reached the end of input.
    #[error("No value passed for flag -{0}")]
    ValueRequired(String),
    /// Second value for a single-valued, non-delimited cell.
    #[error("Flag {name} got multiple values: {existing} and {incoming}")]
    MultipleValues {
        name: String,
        existing: String,
        incoming: String,
    },
    /// Unrecognized option token while undefined flags are disallowed.
    #[error("Unknown flag {0}")]
    UnknownFlag(String),
    /// Positional token with no remaining positional slot.
    #[error("Too many arguments: no positional slot left for \"{0}\"")]
    TooManyArguments(String),
    /// A required option or positional never received a value.
    #[error("Value for {0} should always be provided")]
    RequiredMissing(String),
    /// A positional with an exact count received fewer tokens than declared.
    #[error("Not enough values for {name}: expected {expected}, got {got}")]
    NotEnoughValues {
        name: String,
        expected: usize,
        got: usize,
    },
}

/// Programming errors in the declaring code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    /// Name is empty or contains characters outside `[A-Za-z0-9_.-]`.
    #[error("invalid flag name: {0:?}")]
    InvalidName(String),
    /// A descriptor's name was already bound.
    #[error("descriptor is already bound to name {bound:?}, cannot rebind to {requested:?}")]
    AlreadyBound { bound: String, requested: String },
    /// A descriptor reached the engine without a bound name.
    #[error("descriptor has no name bound")]
    Unbound,
    /// Two descriptors share a name in one engine table.
    #[error("duplicate flag name: {0}")]
    DuplicateName(String),
    /// A required positional was declared after an optional or defaulted one.
    #[error("required argument {name} cannot follow optional argument {previous}")]
    ArgumentOrder { name: String, previous: String },
    /// A positional was declared after an unbounded one.
    #[error("argument {name} cannot follow unbounded argument {previous}")]
    AfterUnbounded { name: String, previous: String },
    /// A descriptor was marked required and also given a default.
    #[error("flag {0} cannot be required and have a default")]
    RequiredWithDefault(String),
    /// A positional that consumes no tokens was marked required.
    #[error("argument {0} takes no values and cannot be required")]
    RequiredWithoutValues(String),
    /// Two choice variants render to the same label.
    #[error("choice label {0:?} is used by more than one variant")]
    DuplicateChoice(String),
    /// The default value could not be represented in the declared type.
    #[error("default for {name} is not valid: {reason}")]
    InvalidDefault { name: String, reason: String },
    /// The engine already ran its single parse pass.
    #[error("parser already ran its parse pass; reset before declaring or parsing again")]
    AlreadyParsed,
}

/// Convenience alias for declaration results.
pub type Result<T> = std::result::Result<T, DeclarationError>;
