//! Typed flag handles and the two-phase declaration builder.
//!
//! A [`Declaration`] describes a flag without naming it. Binding it to a
//! registry under a name yields a [`Flag`], the handle read after parsing.
//!
//! Reads go through an atomically swapped source: normally the value cell,
//! or a constant while [`Flag::with_value`] runs. Readers on other threads
//! observe either source, never a mix.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use argflags_core::{Arity, Descriptor, Kind, Multiplicity, Origin, ValueCell};

use crate::error::{FlagError, Result};

/// Registry-side bookkeeping for one declared cell.
#[derive(Debug)]
pub(crate) struct Binding {
    cell: Arc<ValueCell>,
    registered: AtomicBool,
}

impl Binding {
    pub(crate) fn new(cell: Arc<ValueCell>) -> Arc<Self> {
        Arc::new(Self {
            cell,
            registered: AtomicBool::new(false),
        })
    }

    pub(crate) fn cell(&self) -> &Arc<ValueCell> {
        &self.cell
    }

    pub(crate) fn name(&self) -> &str {
        self.cell.descriptor().name().unwrap_or_default()
    }

    /// Marks the flag as populated by a successful pass. Idempotent.
    pub(crate) fn mark_registered(&self) -> Result<()> {
        if self.cell.origin() == Origin::Undefined {
            return Err(FlagError::NotParsed(self.name().to_string()));
        }
        self.registered.store(true, Ordering::Release);
        Ok(())
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }
}

enum Source<T> {
    Cell,
    Constant(T),
}

/// Handle to a declared flag, yielding `T`.
///
/// Clones share the cell and any active override.
pub struct Flag<T> {
    binding: Arc<Binding>,
    kind: Kind<T>,
    source: Arc<ArcSwap<Source<T>>>,
}

impl<T> Clone for Flag<T> {
    fn clone(&self) -> Self {
        Self {
            binding: Arc::clone(&self.binding),
            kind: self.kind.clone(),
            source: Arc::clone(&self.source),
        }
    }
}

impl<T> fmt::Debug for Flag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flag")
            .field("name", &self.binding.name())
            .field("origin", &self.binding.cell().origin())
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + Sync + 'static> Flag<T> {
    pub(crate) fn new(binding: Arc<Binding>, kind: Kind<T>) -> Self {
        Self {
            binding,
            kind,
            source: Arc::new(ArcSwap::from_pointee(Source::Cell)),
        }
    }

    pub fn name(&self) -> &str {
        self.binding.name()
    }

    pub fn description(&self) -> &str {
        self.binding.cell().descriptor().description()
    }

    pub fn descriptor(&self) -> &Descriptor {
        self.binding.cell().descriptor()
    }

    /// [`Origin::Redefined`] while a scoped override is active.
    pub fn origin(&self) -> Origin {
        match &**self.source.load() {
            Source::Constant(_) => Origin::Redefined,
            Source::Cell => self.binding.cell().origin(),
        }
    }

    /// Current value, `None` before parsing or when nothing was set.
    pub fn get(&self) -> Option<T> {
        match &**self.source.load() {
            Source::Constant(value) => Some(value.clone()),
            Source::Cell => self
                .binding
                .cell()
                .value()
                .and_then(|value| self.kind.decode(&value)),
        }
    }

    /// Current value.
    ///
    /// # Errors
    ///
    /// [`FlagError::NotParsed`] before any pass populated the flag,
    /// [`FlagError::NoValue`] when the pass left it empty.
    pub fn value(&self) -> Result<T> {
        if let Some(value) = self.get() {
            return Ok(value);
        }
        let name = self.name().to_string();
        match self.origin() {
            Origin::Undefined => Err(FlagError::NotParsed(name)),
            _ => Err(FlagError::NoValue(name)),
        }
    }

    /// `true` once a successful pass of the owning registry populated it.
    pub fn is_registered(&self) -> bool {
        self.binding.is_registered()
    }

    /// Replaces the value until the next pass, with origin
    /// [`Origin::Redefined`].
    pub fn redefine(&self, value: T) {
        self.binding.cell().redefine(self.kind.encode(&value));
    }

    /// Runs `action` while the flag reads as `value`.
    ///
    /// The previous source is restored when `action` returns or unwinds.
    ///
    /// # Examples
    ///
    /// ```
    /// use argflags::{FlagRegistry, Kind};
    ///
    /// let registry = FlagRegistry::new("tool");
    /// let retries = registry.optional("retries", "Retry count", Kind::int(), 3).unwrap();
    /// registry.parse::<&str>(&[]).unwrap();
    ///
    /// let seen = retries.with_value(10, || retries.value().unwrap());
    /// assert_eq!(seen, 10);
    /// assert_eq!(retries.value().unwrap(), 3);
    /// ```
    pub fn with_value<R>(&self, value: T, action: impl FnOnce() -> R) -> R {
        let previous = self.source.swap(Arc::new(Source::Constant(value)));
        let source = &self.source;
        let _restore = scopeguard::guard(previous, |previous| source.store(previous));
        action()
    }
}

/// Unnamed flag declaration, bound later through
/// [`FlagRegistry::bind`](crate::FlagRegistry::bind) or
/// [`GlobalFlag::declare_in`](crate::GlobalFlag::declare_in).
///
/// Set the default after [`multiple`](Declaration::multiple) or
/// [`arity`](Declaration::arity), since those change the value type to a
/// vector.
///
/// # Examples
///
/// ```
/// use argflags::{Declaration, FlagRegistry, Kind, Multiplicity};
///
/// let registry = FlagRegistry::new("tool");
/// let tags = registry
///     .bind(
///         "tag",
///         Declaration::option(Kind::string())
///             .description("Tags to apply")
///             .multiple(Multiplicity::Repeated)
///             .default(vec!["base".to_string()]),
///     )
///     .unwrap();
/// registry.parse(&["-tag", "a", "-tag", "b"]).unwrap();
/// assert_eq!(tags.value().unwrap(), vec!["a", "b"]);
/// ```
pub struct Declaration<T> {
    descriptor: Descriptor,
    kind: Kind<T>,
}

impl<T: Clone + Send + Sync + 'static> Declaration<T> {
    /// Single-valued option.
    pub fn option(kind: Kind<T>) -> Self {
        Self {
            descriptor: Descriptor::option(kind.value_type().clone()),
            kind,
        }
    }

    /// Positional consuming one token.
    pub fn argument(kind: Kind<T>) -> Self {
        Self {
            descriptor: Descriptor::argument(kind.value_type().clone()),
            kind,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.descriptor = self.descriptor.with_description(description);
        self
    }

    pub fn default(mut self, value: T) -> Self {
        let encoded = self.kind.encode(&value);
        self.descriptor = self.descriptor.with_default(encoded);
        self
    }

    pub fn required(mut self) -> Self {
        self.descriptor = self.descriptor.required();
        self
    }

    pub fn deprecated(mut self, note: impl Into<String>) -> Self {
        self.descriptor = self.descriptor.deprecated(note);
        self
    }

    /// Accumulates several values. On a positional this means
    /// [`Arity::Unbounded`].
    pub fn multiple(self, multiplicity: Multiplicity) -> Declaration<Vec<T>> {
        let descriptor = if self.descriptor.is_option() {
            self.descriptor.with_multiplicity(multiplicity)
        } else {
            self.descriptor.with_arity(Arity::Unbounded)
        };
        Declaration {
            descriptor,
            kind: self.kind.collect(),
        }
    }

    /// Positional consuming `arity` tokens. On an option this means
    /// [`Multiplicity::Repeated`].
    pub fn arity(self, arity: Arity) -> Declaration<Vec<T>> {
        let descriptor = if self.descriptor.is_option() {
            self.descriptor.with_multiplicity(Multiplicity::Repeated)
        } else {
            self.descriptor.with_arity(arity)
        };
        Declaration {
            descriptor,
            kind: self.kind.collect(),
        }
    }

    pub(crate) fn into_parts(self) -> (Descriptor, Kind<T>) {
        (self.descriptor, self.kind)
    }
}
