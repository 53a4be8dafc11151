//! Typed flag registry on top of `argflags-core`.
//!
//! - [`FlagRegistry`] declares flags, runs one parse pass and routes `-help`.
//! - [`Flag`] is the typed handle read after parsing, with scoped
//!   overrides through [`Flag::with_value`].
//! - [`GlobalFlag`] lives in a process-wide [`GlobalRegistry`] and is filled
//!   by any registry that merges globals, optionally from environment
//!   variables.
//! - [`RegistryConfig`] holds the settings, loadable from YAML.
//!
//! # Example
//!
//! ```
//! use argflags::{FlagRegistry, Kind};
//!
//! let registry = FlagRegistry::new("convert");
//! let ints = registry.optional("ints", "Numbers", Kind::list(Kind::int()), vec![]).unwrap();
//! let debug = registry.optional("debug", "Verbose output", Kind::boolean(), false).unwrap();
//!
//! registry.parse(&["-ints", "1,3,5", "-debug"]).unwrap();
//! assert_eq!(ints.value().unwrap(), vec![1, 3, 5]);
//! assert!(debug.value().unwrap());
//! ```

mod config;
mod error;
mod flag;
mod global;
mod registry;

pub use config::RegistryConfig;
pub use error::{FlagError, Result};
pub use flag::{Declaration, Flag};
pub use global::{GlobalFlag, GlobalRegistry};
pub use registry::{FlagRegistry, HelpHandler, RegistryBuilder};

pub use argflags_core::{
    Arity, DeclarationError, EnvSource, Kind, Multiplicity, Origin, ParseError, ParseOutcome,
    ParserSettings, ProcessEnv, Value, ValueType,
};
