//! Static metadata for one declared option or positional argument.
//!
//! A [`Descriptor`] is assembled with builder methods while still owned, then
//! shared behind an `Arc`. From that point on only its name can change, and
//! only once: [`Descriptor::bind`] assigns it and every later attempt fails.

use std::sync::{LazyLock, OnceLock};

use regex::Regex;

use crate::error::{DeclarationError, Result};
use crate::types::{Value, ValueType};

/// Prefix that introduces an option token.
pub const OPTION_PREFIX: &str = "-";

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$").expect("static regex must compile")
});

/// How many values an option accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Multiplicity {
    /// One value; a second one is an error.
    #[default]
    Single,
    /// Each token is split on the delimiter and every piece is kept.
    Delimited(char),
    /// Every occurrence contributes one value.
    Repeated,
    /// Every occurrence is split on the delimiter.
    RepeatedDelimited(char),
}

impl Multiplicity {
    pub fn delimiter(self) -> Option<char> {
        match self {
            Multiplicity::Delimited(d) | Multiplicity::RepeatedDelimited(d) => Some(d),
            Multiplicity::Single | Multiplicity::Repeated => None,
        }
    }
}

/// How many tokens a positional argument consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    /// Absorbs every remaining positional token.
    Unbounded,
}

impl Default for Arity {
    fn default() -> Self {
        Arity::Exact(1)
    }
}

/// Whether a descriptor is an option or a positional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Option(Multiplicity),
    Argument(Arity),
}

/// Metadata for a declared option or positional argument.
///
/// # Examples
///
/// ```
/// use argflags_core::{Descriptor, Value, ValueType};
///
/// let descriptor = Descriptor::option(ValueType::Int)
///     .with_description("Worker count")
///     .with_default(Value::Int(4));
/// assert!(descriptor.name().is_none());
///
/// descriptor.bind("workers").unwrap();
/// assert_eq!(descriptor.name(), Some("workers"));
/// assert!(descriptor.bind("threads").is_err());
/// ```
#[derive(Debug)]
pub struct Descriptor {
    name: OnceLock<String>,
    role: Role,
    value_type: ValueType,
    description: String,
    default: Option<Value>,
    required: bool,
    deprecation: Option<String>,
    hidden: bool,
}

impl Descriptor {
    fn new(role: Role, value_type: ValueType) -> Self {
        Self {
            name: OnceLock::new(),
            role,
            value_type,
            description: String::new(),
            default: None,
            required: false,
            deprecation: None,
            hidden: false,
        }
    }

    /// Unnamed single-valued option.
    pub fn option(value_type: ValueType) -> Self {
        Self::new(Role::Option(Multiplicity::Single), value_type)
    }

    /// Unnamed positional consuming exactly one token.
    pub fn argument(value_type: ValueType) -> Self {
        Self::new(Role::Argument(Arity::Exact(1)), value_type)
    }

    /// Implicit collector for tokens nothing else claims.
    pub(crate) fn collector(name: &str) -> Self {
        let descriptor = Self {
            hidden: true,
            ..Self::new(Role::Argument(Arity::Unbounded), ValueType::Str)
        };
        let _ = descriptor.name.set(name.to_string());
        descriptor
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn deprecated(mut self, note: impl Into<String>) -> Self {
        self.deprecation = Some(note.into());
        self
    }

    /// Sets the multiplicity of an option. Has no effect on positionals.
    pub fn with_multiplicity(mut self, multiplicity: Multiplicity) -> Self {
        if let Role::Option(_) = self.role {
            self.role = Role::Option(multiplicity);
        }
        self
    }

    /// Sets the arity of a positional. Has no effect on options.
    pub fn with_arity(mut self, arity: Arity) -> Self {
        if let Role::Argument(_) = self.role {
            self.role = Role::Argument(arity);
        }
        self
    }

    /// Assigns the name. Succeeds once.
    ///
    /// # Errors
    ///
    /// [`DeclarationError::InvalidName`] for names outside
    /// `[A-Za-z0-9][A-Za-z0-9_.-]*`, [`DeclarationError::AlreadyBound`] when
    /// a name is already set.
    pub fn bind(&self, name: &str) -> Result<()> {
        if !NAME_RE.is_match(name) {
            return Err(DeclarationError::InvalidName(name.to_string()));
        }
        if let Some(bound) = self.name.get() {
            return Err(DeclarationError::AlreadyBound {
                bound: bound.clone(),
                requested: name.to_string(),
            });
        }
        self.name
            .set(name.to_string())
            .map_err(|requested| DeclarationError::AlreadyBound {
                bound: self.name.get().cloned().unwrap_or_default(),
                requested,
            })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.get().map(String::as_str)
    }

    pub(crate) fn bound_name(&self) -> Result<&str> {
        self.name().ok_or(DeclarationError::Unbound)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_option(&self) -> bool {
        matches!(self.role, Role::Option(_))
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn deprecation(&self) -> Option<&str> {
        self.deprecation.as_deref()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// `true` when the cell accumulates several values.
    pub fn is_multi(&self) -> bool {
        match self.role {
            Role::Option(multiplicity) => multiplicity != Multiplicity::Single,
            Role::Argument(arity) => arity != Arity::Exact(1),
        }
    }

    /// Name as written on the command line (`-name` for options).
    pub fn display_name(&self) -> String {
        let name = self.name().unwrap_or("<unbound>");
        if self.is_option() {
            format!("{OPTION_PREFIX}{name}")
        } else {
            name.to_string()
        }
    }

    /// Name used in error messages (`flag -name`, `argument name`).
    pub fn field(&self) -> String {
        if self.is_option() {
            format!("flag {}", self.display_name())
        } else {
            format!("argument {}", self.display_name())
        }
    }

    /// Checks a bound descriptor for contradictions.
    pub fn validate(&self) -> Result<()> {
        let name = self.bound_name()?;
        if self.required && self.default.is_some() {
            return Err(DeclarationError::RequiredWithDefault(name.to_string()));
        }
        if self.required && self.role == Role::Argument(Arity::Exact(0)) {
            return Err(DeclarationError::RequiredWithoutValues(name.to_string()));
        }
        if let Some(default) = &self.default {
            if self.is_multi() && !matches!(default, Value::List(_)) {
                return Err(DeclarationError::InvalidDefault {
                    name: name.to_string(),
                    reason: "multi-valued defaults must be lists".to_string(),
                });
            }
        }
        Ok(())
    }
}
