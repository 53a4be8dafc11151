//! Declarative command-line flag parsing engine.
//!
//! This crate holds the parts of flag parsing with real state in them:
//!
//! - [`ValueType`] / [`Value`] — the type catalog turning tokens into values.
//! - [`Kind`] — typed views pairing a catalog type with decode/encode.
//! - [`Descriptor`] — static metadata of one option or positional.
//! - [`ValueCell`] — the value and [`Origin`] bound to a descriptor.
//! - [`ArgParser`] — the tokenizing engine running one parse pass and
//!   reporting a [`ParseOutcome`].
//!
//! Declaring code builds a descriptor, binds its name, and hands it to the
//! engine, which returns the cell to read after parsing. The `argflags`
//! crate wraps this in a typed, thread-safe registry.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use argflags_core::*;
//!
//! let mut parser = ArgParser::new(ParserSettings::new("resize"));
//!
//! let width = Descriptor::option(ValueType::Int)
//!     .with_description("Target width")
//!     .required();
//! width.bind("width").unwrap();
//! let width = parser.declare(Arc::new(width)).unwrap();
//!
//! let input = Descriptor::argument(ValueType::Str).with_description("Image to resize");
//! input.bind("input").unwrap();
//! let input = parser.declare(Arc::new(input)).unwrap();
//!
//! let outcome = parser.parse(&["-width", "640", "cat.png"], None).unwrap();
//! assert!(outcome.is_ok());
//! assert_eq!(width.value(), Some(Value::Int(640)));
//! assert_eq!(input.value(), Some(Value::Str("cat.png".into())));
//! ```

mod cell;
mod descriptor;
mod env;
mod error;
mod kind;
mod parser;
mod queue;
mod types;
mod usage;

pub use cell::{Origin, ValueCell};
pub use descriptor::{Arity, Descriptor, Multiplicity, OPTION_PREFIX, Role};
pub use env::{EnvSource, ProcessEnv};
pub use error::{ConversionError, DeclarationError, ParseError, Result};
pub use kind::Kind;
pub use parser::{ArgParser, END_OF_OPTIONS, GlobalMerge, HELP_FLAG, ParseOutcome, ParserSettings};
pub use types::{ChoiceDomain, LIST_SEPARATOR, MAP_ASSIGN, Value, ValueType};
