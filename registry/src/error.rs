//! Error types for the flag registry.
//!
//! Declaration mistakes and bad input from the engine are wrapped as is;
//! the registry adds the failures of its own accessors and config files.

use argflags_core::{DeclarationError, ParseError};
use thiserror::Error;

/// Errors raised by registries, flag handles and config loading.
#[derive(Debug, Error)]
pub enum FlagError {
    /// Two declarations, ordinary or global, share a name.
    #[error("flag {0} is already declared")]
    Duplicate(String),

    /// A flag was read or marked registered before any pass produced a value.
    #[error("flag {0} was accessed before parsing")]
    NotParsed(String),

    /// The pass ran but left the flag without a value or default.
    #[error("flag {0} has no value")]
    NoValue(String),

    /// Global flags are options; positionals cannot be shared.
    #[error("global flag {0} must be an option")]
    GlobalArgument(String),

    #[error(transparent)]
    Declaration(#[from] DeclarationError),

    /// A parse pass ended in an error outcome.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Config file I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Config file YAML failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Convenience alias for results with [`FlagError`].
pub type Result<T> = std::result::Result<T, FlagError>;
