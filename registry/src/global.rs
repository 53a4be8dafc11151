//! Process-wide global flags.
//!
//! A [`GlobalFlag`] registers itself into a [`GlobalRegistry`] when it is
//! constructed, normally the [`GlobalRegistry::shared`] instance. Its value
//! stays empty until some [`FlagRegistry`](crate::FlagRegistry) with global
//! merging enabled runs a pass; that pass declares the global cells next to
//! its own and folds matching environment entries into the tokens.
//!
//! Entries are never removed automatically. [`GlobalRegistry::clear`] exists
//! for tests.

use std::ops::Deref;
use std::sync::{Arc, LazyLock};

use argflags_core::{Kind, ValueCell};
use indexmap::IndexMap;
use indexmap::map::Entry;
use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::debug;

use crate::error::{FlagError, Result};
use crate::flag::{Binding, Declaration, Flag};

static SHARED: LazyLock<Arc<GlobalRegistry>> = LazyLock::new(|| Arc::new(GlobalRegistry::new()));

/// Table of global flags, keyed by name.
#[derive(Debug, Default)]
pub struct GlobalRegistry {
    flags: RwLock<IndexMap<String, Arc<Binding>>>,
    /// Held for the whole of every pass that merges these flags.
    passes: Mutex<()>,
}

impl GlobalRegistry {
    /// Private table, independent of the process-wide one.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide table. Created on first use.
    pub fn shared() -> Arc<Self> {
        Arc::clone(&SHARED)
    }

    fn insert(&self, binding: Arc<Binding>) -> Result<()> {
        let name = binding.name().to_string();
        match self.flags.write().entry(name) {
            Entry::Occupied(entry) => Err(FlagError::Duplicate(entry.key().clone())),
            Entry::Vacant(entry) => {
                debug!(flag = %entry.key(), "registered global flag");
                entry.insert(binding);
                Ok(())
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.flags.read().contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.flags.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.flags.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.read().is_empty()
    }

    /// Drops every entry. Existing [`GlobalFlag`] handles keep their cells
    /// but are no longer merged.
    pub fn clear(&self) {
        self.flags.write().clear();
    }

    pub(crate) fn bindings(&self) -> Vec<Arc<Binding>> {
        self.flags.read().values().cloned().collect()
    }

    /// Serializes passes of every registry merging this table, since they
    /// all write the same global cells.
    pub(crate) fn lock_passes(&self) -> MutexGuard<'_, ()> {
        self.passes.lock()
    }
}

/// Flag shared by every registry that merges globals.
///
/// Reads and overrides behave as on [`Flag`], which it dereferences to.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use argflags::{FlagRegistry, GlobalFlag, GlobalRegistry, Kind};
///
/// let globals = Arc::new(GlobalRegistry::new());
/// let region = GlobalFlag::with_default_in(&globals, "region", "Deploy region", Kind::string(), "eu".to_string()).unwrap();
/// assert!(region.get().is_none());
///
/// let registry = FlagRegistry::builder("deploy").globals(Arc::clone(&globals)).build();
/// registry.parse(&["-region", "us"]).unwrap();
/// assert_eq!(region.value().unwrap(), "us");
/// ```
pub struct GlobalFlag<T>(Flag<T>);

impl<T: Clone + Send + Sync + 'static> GlobalFlag<T> {
    /// Registers an optional global flag in the process-wide table.
    ///
    /// # Errors
    ///
    /// [`FlagError::Duplicate`] when the name is taken.
    pub fn new(name: &str, description: &str, kind: Kind<T>) -> Result<Self> {
        Self::declare_in(
            &GlobalRegistry::shared(),
            name,
            Declaration::option(kind).description(description),
        )
    }

    /// Like [`GlobalFlag::new`] with a default value.
    pub fn with_default(name: &str, description: &str, kind: Kind<T>, default: T) -> Result<Self> {
        Self::with_default_in(&GlobalRegistry::shared(), name, description, kind, default)
    }

    pub fn with_default_in(
        registry: &GlobalRegistry,
        name: &str,
        description: &str,
        kind: Kind<T>,
        default: T,
    ) -> Result<Self> {
        Self::declare_in(
            registry,
            name,
            Declaration::option(kind).description(description).default(default),
        )
    }

    /// Registers a declared option in `registry`.
    ///
    /// # Errors
    ///
    /// [`FlagError::GlobalArgument`] for positional declarations,
    /// [`FlagError::Declaration`] for invalid names or contradictory
    /// settings, [`FlagError::Duplicate`] when the name is taken.
    pub fn declare_in(
        registry: &GlobalRegistry,
        name: &str,
        declaration: Declaration<T>,
    ) -> Result<Self> {
        let (descriptor, kind) = declaration.into_parts();
        if !descriptor.is_option() {
            return Err(FlagError::GlobalArgument(name.to_string()));
        }
        descriptor.bind(name)?;
        descriptor.validate()?;
        let binding = Binding::new(Arc::new(ValueCell::new(Arc::new(descriptor))));
        registry.insert(Arc::clone(&binding))?;
        Ok(Self(Flag::new(binding, kind)))
    }
}

impl<T> Deref for GlobalFlag<T> {
    type Target = Flag<T>;

    fn deref(&self) -> &Flag<T> {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argflags_core::Origin;

    #[test]
    fn test_duplicate_global_rejected() {
        let registry = GlobalRegistry::new();
        GlobalFlag::declare_in(&registry, "zone", Declaration::option(Kind::string())).unwrap();
        let err = GlobalFlag::declare_in(&registry, "zone", Declaration::option(Kind::int()))
            .err()
            .unwrap();
        assert!(matches!(err, FlagError::Duplicate(name) if name == "zone"));
        assert_eq!(registry.names(), vec!["zone"]);
    }

    #[test]
    fn test_global_empty_before_any_pass() {
        let registry = GlobalRegistry::new();
        let flag = GlobalFlag::with_default_in(&registry, "level", "Level", Kind::int(), 2).unwrap();
        assert_eq!(flag.get(), None);
        assert_eq!(flag.origin(), Origin::Undefined);
        assert!(matches!(flag.value(), Err(FlagError::NotParsed(_))));
    }

    #[test]
    fn test_positional_global_rejected() {
        let registry = GlobalRegistry::new();
        let result = GlobalFlag::declare_in(&registry, "input", Declaration::argument(Kind::string()));
        assert!(matches!(result, Err(FlagError::GlobalArgument(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_registration_keeps_one_winner() {
        let registry = Arc::new(GlobalRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    GlobalFlag::declare_in(&registry, "race", Declaration::option(Kind::boolean())).is_ok()
                })
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_shared_instance_is_process_wide() {
        let name = "argflags-global-shared-test";
        let _flag = GlobalFlag::new(name, "Shared", Kind::string()).unwrap();
        assert!(GlobalRegistry::shared().contains(name));
        assert!(GlobalFlag::new(name, "Again", Kind::string()).is_err());
    }
}
