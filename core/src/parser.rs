//! The tokenizing parser engine.
//!
//! An [`ArgParser`] holds the option and positional tables built from
//! declared descriptors and runs exactly one parse pass over a token list.
//! The pass recognizes three token shapes:
//!
//! - `-name` for switches and `-name value` for options with a parameter;
//! - the bare terminator `--`, after which every token is positional;
//! - anything else, which fills the next positional slot.
//!
//! `-help` short-circuits into rendered usage text. When global flags are
//! merged, matching entries of the external environment are appended to the
//! token list as `-name value` pairs before tokenizing.
//!
//! A pass ends in exactly one [`ParseOutcome`]. Only
//! [`ParseOutcome::Ok`] leaves values behind: on `Error` or `Help` every
//! cell is rolled back to what it held before the pass.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cell::ValueCell;
use crate::descriptor::{Arity, Descriptor, OPTION_PREFIX, Role};
use crate::env::EnvSource;
use crate::error::{DeclarationError, ParseError, Result};
use crate::queue::ArgumentQueue;
use crate::types::{Value, ValueType};
use crate::usage::{self, EnvHint};

/// Option name that requests usage text.
pub const HELP_FLAG: &str = "help";

/// Token that ends option processing.
pub const END_OF_OPTIONS: &str = "--";

const UNDEFINED_COLLECTOR: &str = "<undefined>";

/// Settings for one parser engine.
///
/// # Examples
///
/// ```
/// use argflags_core::ParserSettings;
///
/// let settings = ParserSettings::new("tool").allow_undefined(true);
/// assert_eq!(settings.program, "tool");
/// assert!(settings.allow_undefined);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserSettings {
    /// Program name shown in the usage header.
    pub program: String,
    /// Absorb unrecognized options and surplus positionals instead of failing.
    pub allow_undefined: bool,
}

impl ParserSettings {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            allow_undefined: false,
        }
    }

    pub fn allow_undefined(mut self, allow: bool) -> Self {
        self.allow_undefined = allow;
        self
    }
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self::new("program")
    }
}

/// Result of a parse pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Ok,
    Error(ParseError),
    /// `-help` was given; carries the rendered usage text.
    Help(String),
}

impl ParseOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ParseOutcome::Ok)
    }

    pub fn error(&self) -> Option<&ParseError> {
        match self {
            ParseOutcome::Error(err) => Some(err),
            _ => None,
        }
    }

    pub fn help(&self) -> Option<&str> {
        match self {
            ParseOutcome::Help(text) => Some(text),
            _ => None,
        }
    }
}

/// Global flags to fold into a pass.
pub struct GlobalMerge<'a> {
    /// Cells of the registered global flags.
    pub cells: Vec<Arc<ValueCell>>,
    /// Environment to enumerate.
    pub env: &'a dyn EnvSource,
    /// Prefix an environment key carries in front of the flag name.
    pub env_prefix: &'a str,
}

enum Interrupt {
    Help(String),
    Error(ParseError),
}

impl From<ParseError> for Interrupt {
    fn from(err: ParseError) -> Self {
        Interrupt::Error(err)
    }
}

/// Parser engine for one declare/parse cycle.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use argflags_core::{ArgParser, Descriptor, Origin, ParseOutcome, ParserSettings, Value, ValueType};
///
/// let mut parser = ArgParser::new(ParserSettings::new("tool"));
/// let count = Descriptor::option(ValueType::Int).with_default(Value::Int(1));
/// count.bind("count").unwrap();
/// let count = parser.declare(Arc::new(count)).unwrap();
///
/// let outcome = parser.parse(&["-count", "8"], None).unwrap();
/// assert_eq!(outcome, ParseOutcome::Ok);
/// assert_eq!(count.value(), Some(Value::Int(8)));
/// assert_eq!(count.origin(), Origin::SetByUser);
/// ```
#[derive(Debug)]
pub struct ArgParser {
    settings: ParserSettings,
    options: IndexMap<String, Arc<ValueCell>>,
    arguments: IndexMap<String, Arc<ValueCell>>,
    help: Descriptor,
    globals: HashSet<String>,
    env_prefix: String,
    parsed: bool,
    warnings: Vec<String>,
}

impl ArgParser {
    pub fn new(settings: ParserSettings) -> Self {
        let help = Descriptor::option(ValueType::SWITCH).with_description("Usage info");
        let _ = help.bind(HELP_FLAG);
        Self {
            settings,
            options: IndexMap::new(),
            arguments: IndexMap::new(),
            help,
            globals: HashSet::new(),
            env_prefix: String::new(),
            parsed: false,
            warnings: Vec::new(),
        }
    }

    pub fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    pub fn is_parsed(&self) -> bool {
        self.parsed
    }

    /// Adds a bound descriptor to the option or positional table.
    ///
    /// # Errors
    ///
    /// Fails when the pass already ran, the descriptor is unbound or
    /// self-contradictory, its name is taken, or a required positional would
    /// follow an optional one.
    pub fn declare(&mut self, descriptor: Arc<Descriptor>) -> Result<Arc<ValueCell>> {
        if self.parsed {
            return Err(DeclarationError::AlreadyParsed);
        }
        descriptor.validate()?;
        let name = descriptor.bound_name()?.to_string();
        if name == HELP_FLAG || self.options.contains_key(&name) || self.arguments.contains_key(&name) {
            return Err(DeclarationError::DuplicateName(name));
        }

        let cell = Arc::new(ValueCell::new(Arc::clone(&descriptor)));
        match descriptor.role() {
            Role::Option(_) => {
                self.options.insert(name, Arc::clone(&cell));
            }
            Role::Argument(_) => {
                self.check_argument_order(&name, &descriptor)?;
                self.arguments.insert(name, Arc::clone(&cell));
            }
        }
        Ok(cell)
    }

    fn check_argument_order(&self, name: &str, descriptor: &Descriptor) -> Result<()> {
        for previous in self.arguments.values().map(|cell| cell.descriptor()) {
            let previous_name = previous.bound_name()?.to_string();
            if previous.role() == Role::Argument(Arity::Unbounded) {
                return Err(DeclarationError::AfterUnbounded {
                    name: name.to_string(),
                    previous: previous_name,
                });
            }
            if previous.role() == Role::Argument(Arity::Exact(0)) {
                continue;
            }
            let relaxed = previous.default().is_some() || !previous.is_required();
            if relaxed && descriptor.is_required() {
                return Err(DeclarationError::ArgumentOrder {
                    name: name.to_string(),
                    previous: previous_name,
                });
            }
        }
        Ok(())
    }

    /// Cell of a declared option or positional.
    pub fn cell(&self, name: &str) -> Option<&Arc<ValueCell>> {
        self.options.get(name).or_else(|| self.arguments.get(name))
    }

    /// Deprecation warnings raised by the last pass.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Tokens absorbed by the implicit collector when undefined flags are
    /// allowed.
    pub fn undefined(&self) -> Vec<String> {
        match self.arguments.get(UNDEFINED_COLLECTOR).and_then(|cell| cell.value()) {
            Some(Value::List(items)) => items.iter().map(ToString::to_string).collect(),
            _ => Vec::new(),
        }
    }

    /// Renders usage text for everything declared so far.
    pub fn usage(&self) -> String {
        self.render_usage(&[], &self.env_prefix)
    }

    /// Renders usage text as a pass merging `globals` would show it.
    ///
    /// Global cells already merged by a pass are listed once.
    pub fn usage_with_globals(&self, globals: &[Arc<ValueCell>], env_prefix: &str) -> String {
        self.render_usage(globals, env_prefix)
    }

    fn render_usage(&self, pending: &[Arc<ValueCell>], env_prefix: &str) -> String {
        let pending: Vec<&Descriptor> = pending
            .iter()
            .map(|cell| &**cell.descriptor())
            .filter(|d| d.name().is_some_and(|name| !self.options.contains_key(name)))
            .collect();
        let arguments: Vec<&Descriptor> = self
            .arguments
            .values()
            .map(|cell| &**cell.descriptor())
            .collect();
        let options: Vec<&Descriptor> = self
            .options
            .values()
            .map(|cell| &**cell.descriptor())
            .chain(pending.iter().copied())
            .chain(std::iter::once(&self.help))
            .collect();
        let is_global = |name: &str| {
            self.globals.contains(name) || pending.iter().any(|d| d.name() == Some(name))
        };
        let hint = EnvHint {
            prefix: env_prefix,
            is_global: &is_global,
        };
        let env = (!self.globals.is_empty() || !pending.is_empty()).then_some(&hint);
        usage::render(&self.settings.program, &arguments, &options, env)
    }

    /// Runs the single parse pass of this engine.
    ///
    /// # Errors
    ///
    /// Returns [`DeclarationError::AlreadyParsed`] on a second call, and
    /// [`DeclarationError::DuplicateName`] when a merged global flag clashes
    /// with a declared name. Bad input is reported through the returned
    /// [`ParseOutcome`], never as `Err`.
    pub fn parse<S: AsRef<str>>(
        &mut self,
        tokens: &[S],
        globals: Option<GlobalMerge<'_>>,
    ) -> Result<ParseOutcome> {
        if self.parsed {
            return Err(DeclarationError::AlreadyParsed);
        }
        self.parsed = true;

        let mut tokens: Vec<String> = tokens.iter().map(|t| t.as_ref().to_string()).collect();
        if self.settings.allow_undefined {
            let collector = Arc::new(Descriptor::collector(UNDEFINED_COLLECTOR));
            self.arguments.insert(
                UNDEFINED_COLLECTOR.to_string(),
                Arc::new(ValueCell::new(collector)),
            );
        }
        if let Some(merge) = globals {
            let synthesized = self.merge_globals(merge)?;
            let at = tokens
                .iter()
                .position(|t| t == END_OF_OPTIONS)
                .unwrap_or(tokens.len());
            tokens.splice(at..at, synthesized);
        }

        debug!(
            program = %self.settings.program,
            tokens = tokens.len(),
            options = self.options.len(),
            arguments = self.arguments.len(),
            "starting parse pass"
        );

        let cells: Vec<Arc<ValueCell>> = self
            .options
            .values()
            .chain(self.arguments.values())
            .cloned()
            .collect();
        let saved: Vec<_> = cells.iter().map(|cell| cell.snapshot()).collect();
        self.warnings.clear();
        for cell in &cells {
            cell.begin_pass();
        }

        let result = self.run(&tokens).and_then(|()| {
            cells
                .iter()
                .try_for_each(|cell| cell.finalize().map_err(Interrupt::from))
        });

        let interrupt = match result {
            Ok(()) => return Ok(ParseOutcome::Ok),
            Err(interrupt) => interrupt,
        };
        for (cell, state) in cells.iter().zip(saved) {
            cell.restore(state);
        }
        self.warnings.clear();
        Ok(match interrupt {
            Interrupt::Help(text) => ParseOutcome::Help(text),
            Interrupt::Error(err) => {
                debug!(error = %err, "parse pass failed");
                ParseOutcome::Error(err)
            }
        })
    }

    fn merge_globals(&mut self, merge: GlobalMerge<'_>) -> Result<Vec<String>> {
        for cell in merge.cells {
            let name = cell.descriptor().bound_name()?.to_string();
            if name == HELP_FLAG || self.options.contains_key(&name) || self.arguments.contains_key(&name) {
                return Err(DeclarationError::DuplicateName(name));
            }
            self.options.insert(name.clone(), cell);
            self.globals.insert(name);
        }
        self.env_prefix = merge.env_prefix.to_string();

        let mut entries = merge.env.entries();
        entries.sort();

        let mut tokens = Vec::new();
        for (key, value) in entries {
            let Some(name) = key.strip_prefix(merge.env_prefix) else {
                continue;
            };
            if !self.globals.contains(name) {
                continue;
            }
            let takes_value = self
                .options
                .get(name)
                .is_some_and(|cell| cell.descriptor().value_type().has_parameter());
            debug!(flag = %name, "folding global flag from environment");
            if takes_value {
                tokens.push(format!("{OPTION_PREFIX}{name}"));
                tokens.push(value);
            } else if value != "false" {
                tokens.push(format!("{OPTION_PREFIX}{name}"));
            }
        }
        Ok(tokens)
    }

    fn run(&mut self, tokens: &[String]) -> std::result::Result<(), Interrupt> {
        let mut queue = ArgumentQueue::new(self.arguments.iter().filter_map(|(name, cell)| {
            match cell.descriptor().role() {
                Role::Argument(arity) => Some((name.as_str(), arity)),
                Role::Option(_) => None,
            }
        }));
        let mut treat_as_option = true;
        let mut index = 0;

        while let Some(token) = tokens.get(index) {
            index += 1;

            if treat_as_option && token.starts_with(OPTION_PREFIX) {
                if token == END_OF_OPTIONS {
                    treat_as_option = false;
                    continue;
                }
                let name = &token[OPTION_PREFIX.len()..];
                if name == HELP_FLAG {
                    return Err(Interrupt::Help(self.usage()));
                }
                if let Some(cell) = self.options.get(name).cloned() {
                    if cell.descriptor().value_type().has_parameter() {
                        let value = tokens
                            .get(index)
                            .ok_or_else(|| ParseError::ValueRequired(name.to_string()))?;
                        index += 1;
                        self.assign(&cell, value)?;
                    } else {
                        self.assign(&cell, "true")?;
                    }
                    continue;
                }
                // Unknown option: it may still be a positional value.
                let Some(argument) = queue.pop() else {
                    return Err(ParseError::UnknownFlag(token.clone()).into());
                };
                self.assign_argument(&argument, token)?;
                continue;
            }

            let Some(argument) = queue.pop() else {
                return Err(ParseError::TooManyArguments(token.clone()).into());
            };
            self.assign_argument(&argument, token)?;
        }
        Ok(())
    }

    fn assign_argument(&mut self, name: &str, token: &str) -> std::result::Result<(), ParseError> {
        match self.arguments.get(name).cloned() {
            Some(cell) => self.assign(&cell, token),
            None => Err(ParseError::TooManyArguments(token.to_string())),
        }
    }

    fn assign(&mut self, cell: &ValueCell, token: &str) -> std::result::Result<(), ParseError> {
        let first = cell.assign(token)?;
        let descriptor = cell.descriptor();
        if let (true, Some(note)) = (first, descriptor.deprecation()) {
            let flag = descriptor.display_name();
            warn!(flag = %flag, note = %note, "deprecated flag used");
            self.warnings.push(format!("{flag} is deprecated: {note}"));
        }
        Ok(())
    }
}
