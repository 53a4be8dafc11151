//! The flag registry: typed declarations over one parser engine.
//!
//! A [`FlagRegistry`] owns an [`ArgParser`] and a table of the flags
//! declared through it. Declarations, passes, resets and scoped overrides
//! are serialized by one reentrant lock per registry, so an override action
//! may itself parse or read through the same registry.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use argflags_core::{
    ArgParser, Arity, DeclarationError, EnvSource, GlobalMerge, Kind, Multiplicity, ParseOutcome,
    ProcessEnv,
};
use indexmap::IndexMap;
use parking_lot::ReentrantMutex;
use tracing::debug;

use crate::config::RegistryConfig;
use crate::error::{FlagError, Result};
use crate::flag::{Binding, Declaration, Flag};
use crate::global::GlobalRegistry;

/// Receives usage text when a pass is asked for `-help`.
pub type HelpHandler = Arc<dyn Fn(&str) + Send + Sync>;

struct RegistryState {
    parser: ArgParser,
    flags: IndexMap<String, Arc<Binding>>,
}

impl RegistryState {
    fn new(config: &RegistryConfig) -> Self {
        Self {
            parser: ArgParser::new(config.parser.clone()),
            flags: IndexMap::new(),
        }
    }
}

/// Builder for [`FlagRegistry`].
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use std::sync::Arc;
/// use argflags::{FlagRegistry, GlobalRegistry};
///
/// let env: HashMap<String, String> = HashMap::new();
/// let registry = FlagRegistry::builder("deploy")
///     .allow_undefined(true)
///     .env_prefix("DEPLOY_")
///     .env(env)
///     .globals(Arc::new(GlobalRegistry::new()))
///     .on_help(|text| eprint!("{text}"))
///     .build();
/// assert!(registry.config().parser.allow_undefined);
/// ```
pub struct RegistryBuilder {
    config: RegistryConfig,
    env: Arc<dyn EnvSource>,
    globals: Option<Arc<GlobalRegistry>>,
    on_help: HelpHandler,
}

impl RegistryBuilder {
    fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            env: Arc::new(ProcessEnv),
            globals: None,
            on_help: Arc::new(|text| print!("{text}")),
        }
    }

    pub fn allow_undefined(mut self, allow: bool) -> Self {
        self.config.parser.allow_undefined = allow;
        self
    }

    pub fn merge_globals(mut self, merge: bool) -> Self {
        self.config.merge_globals = merge;
        self
    }

    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.env_prefix = prefix.into();
        self
    }

    /// Environment enumerated for global flags. Defaults to [`ProcessEnv`].
    pub fn env(mut self, env: impl EnvSource + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    /// Global table to merge. Defaults to [`GlobalRegistry::shared`].
    pub fn globals(mut self, globals: Arc<GlobalRegistry>) -> Self {
        self.globals = Some(globals);
        self
    }

    /// Channel for usage text. Defaults to stdout.
    pub fn on_help(mut self, handler: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_help = Arc::new(handler);
        self
    }

    /// Replaces every setting with `config`.
    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> FlagRegistry {
        let state = RegistryState::new(&self.config);
        FlagRegistry {
            globals: self.globals.unwrap_or_else(GlobalRegistry::shared),
            env: self.env,
            on_help: self.on_help,
            state: ReentrantMutex::new(RefCell::new(state)),
            config: self.config,
        }
    }
}

/// Declares flags, runs parse passes and hands out typed [`Flag`] handles.
///
/// # Examples
///
/// ```
/// use argflags::{FlagRegistry, Kind, Origin};
///
/// let registry = FlagRegistry::new("resize");
/// let width = registry.required("width", "Target width", Kind::int()).unwrap();
/// let quality = registry.optional("quality", "JPEG quality", Kind::int(), 90).unwrap();
/// let input = registry.argument("input", "Image to resize", Kind::string()).unwrap();
///
/// registry.parse(&["-width", "640", "cat.png"]).unwrap();
/// assert_eq!(width.value().unwrap(), 640);
/// assert_eq!(quality.value().unwrap(), 90);
/// assert_eq!(quality.origin(), Origin::SetDefault);
/// assert_eq!(input.value().unwrap(), "cat.png");
/// ```
pub struct FlagRegistry {
    config: RegistryConfig,
    globals: Arc<GlobalRegistry>,
    env: Arc<dyn EnvSource>,
    on_help: HelpHandler,
    state: ReentrantMutex<RefCell<RegistryState>>,
}

impl fmt::Debug for FlagRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagRegistry")
            .field("config", &self.config)
            .field("flags", &self.names())
            .finish_non_exhaustive()
    }
}

impl FlagRegistry {
    pub fn new(program: impl Into<String>) -> Self {
        Self::builder(program).build()
    }

    pub fn builder(program: impl Into<String>) -> RegistryBuilder {
        RegistryBuilder::new(RegistryConfig::new(program))
    }

    pub fn from_config(config: RegistryConfig) -> Self {
        RegistryBuilder::new(config).build()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn globals(&self) -> &Arc<GlobalRegistry> {
        &self.globals
    }

    /// Binds `declaration` under `name`.
    ///
    /// # Errors
    ///
    /// [`FlagError::Duplicate`] when the name is declared here, or is a
    /// global flag while merging is enabled. [`FlagError::Declaration`] for
    /// invalid names, contradictory settings, positional ordering violations
    /// and declarations after a pass.
    pub fn bind<T: Clone + Send + Sync + 'static>(
        &self,
        name: &str,
        declaration: Declaration<T>,
    ) -> Result<Flag<T>> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if state.flags.contains_key(name) || (self.config.merge_globals && self.globals.contains(name)) {
            return Err(FlagError::Duplicate(name.to_string()));
        }

        let (descriptor, kind) = declaration.into_parts();
        descriptor.bind(name)?;
        let cell = state
            .parser
            .declare(Arc::new(descriptor))
            .map_err(|err| match err {
                DeclarationError::DuplicateName(name) => FlagError::Duplicate(name),
                other => other.into(),
            })?;
        let binding = Binding::new(cell);
        state.flags.insert(name.to_string(), Arc::clone(&binding));
        debug!(flag = %name, "declared flag");
        Ok(Flag::new(binding, kind))
    }

    /// Option that must be given on the command line.
    pub fn required<T: Clone + Send + Sync + 'static>(
        &self,
        name: &str,
        description: &str,
        kind: Kind<T>,
    ) -> Result<Flag<T>> {
        self.bind(name, Declaration::option(kind).description(description).required())
    }

    /// Option falling back to `default`.
    pub fn optional<T: Clone + Send + Sync + 'static>(
        &self,
        name: &str,
        description: &str,
        kind: Kind<T>,
        default: T,
    ) -> Result<Flag<T>> {
        self.bind(name, Declaration::option(kind).description(description).default(default))
    }

    /// Option without a default; reads `None` when not given.
    pub fn nullable<T: Clone + Send + Sync + 'static>(
        &self,
        name: &str,
        description: &str,
        kind: Kind<T>,
    ) -> Result<Flag<T>> {
        self.bind(name, Declaration::option(kind).description(description))
    }

    /// Multi-valued option falling back to `default`.
    ///
    /// # Examples
    ///
    /// ```
    /// use argflags::{FlagRegistry, Kind, Multiplicity};
    ///
    /// let registry = FlagRegistry::new("tool");
    /// let ports = registry
    ///     .optional_multi("port", "Ports", Kind::int(), Multiplicity::Delimited(':'), vec![80])
    ///     .unwrap();
    /// registry.parse(&["-port", "80:443"]).unwrap();
    /// assert_eq!(ports.value().unwrap(), vec![80, 443]);
    /// ```
    pub fn optional_multi<T: Clone + Send + Sync + 'static>(
        &self,
        name: &str,
        description: &str,
        kind: Kind<T>,
        multiplicity: Multiplicity,
        default: Vec<T>,
    ) -> Result<Flag<Vec<T>>> {
        self.bind(
            name,
            Declaration::option(kind)
                .description(description)
                .multiple(multiplicity)
                .default(default),
        )
    }

    /// Required positional consuming one token.
    pub fn argument<T: Clone + Send + Sync + 'static>(
        &self,
        name: &str,
        description: &str,
        kind: Kind<T>,
    ) -> Result<Flag<T>> {
        self.bind(name, Declaration::argument(kind).description(description).required())
    }

    /// Positional falling back to `default`.
    pub fn optional_argument<T: Clone + Send + Sync + 'static>(
        &self,
        name: &str,
        description: &str,
        kind: Kind<T>,
        default: T,
    ) -> Result<Flag<T>> {
        self.bind(name, Declaration::argument(kind).description(description).default(default))
    }

    /// Positional consuming `arity` tokens; optional when unbounded or when
    /// it takes none.
    pub fn arguments<T: Clone + Send + Sync + 'static>(
        &self,
        name: &str,
        description: &str,
        kind: Kind<T>,
        arity: Arity,
    ) -> Result<Flag<Vec<T>>> {
        let declaration = Declaration::argument(kind).description(description).arity(arity);
        match arity {
            Arity::Exact(0) | Arity::Unbounded => self.bind(name, declaration),
            Arity::Exact(_) => self.bind(name, declaration.required()),
        }
    }

    /// Runs one pass over `tokens`.
    ///
    /// Usage text from `-help` goes to the help handler and counts as
    /// success.
    ///
    /// # Errors
    ///
    /// [`FlagError::Parse`] carrying the reason when the input is bad,
    /// [`FlagError::Declaration`] when this registry already parsed or a
    /// global flag clashes with a declared name.
    pub fn parse<S: AsRef<str>>(&self, tokens: &[S]) -> Result<()> {
        match self.parse_result(tokens)? {
            ParseOutcome::Ok => Ok(()),
            ParseOutcome::Error(err) => Err(FlagError::Parse(err)),
            ParseOutcome::Help(text) => {
                (self.on_help)(&text);
                Ok(())
            }
        }
    }

    /// Runs one pass and returns its outcome as data.
    ///
    /// # Errors
    ///
    /// Only for programming mistakes, as in [`FlagRegistry::parse`]; bad
    /// input is reported as [`ParseOutcome::Error`].
    pub fn parse_result<S: AsRef<str>>(&self, tokens: &[S]) -> Result<ParseOutcome> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let _passes = self
            .config
            .merge_globals
            .then(|| self.globals.lock_passes());

        let merged = if self.config.merge_globals {
            self.globals.bindings()
        } else {
            Vec::new()
        };
        let globals = self.config.merge_globals.then(|| GlobalMerge {
            cells: merged.iter().map(|binding| Arc::clone(binding.cell())).collect(),
            env: self.env.as_ref(),
            env_prefix: &self.config.env_prefix,
        });
        let outcome = state.parser.parse(tokens, globals)?;

        if outcome.is_ok() {
            for binding in state.flags.values().chain(&merged) {
                binding.mark_registered()?;
            }
        }
        Ok(outcome)
    }

    /// Runs `action` while `flag` reads as `value`, holding this registry's
    /// lock so no pass or reset interleaves.
    pub fn with_override<T, R>(&self, flag: &Flag<T>, value: T, action: impl FnOnce() -> R) -> R
    where
        T: Clone + Send + Sync + 'static,
    {
        let _guard = self.state.lock();
        flag.with_value(value, action)
    }

    /// Discards every declared flag and starts a fresh engine.
    ///
    /// Existing handles keep their last values but are no longer parsed.
    pub fn reset(&self) {
        let guard = self.state.lock();
        let dropped = guard.borrow().flags.len();
        *guard.borrow_mut() = RegistryState::new(&self.config);
        debug!(program = %self.config.parser.program, dropped, "registry reset");
    }

    /// Usage text for everything declared, as `-help` would print it.
    ///
    /// Includes the global flags when merging is enabled, whether or not a
    /// pass has run.
    pub fn usage(&self) -> String {
        let guard = self.state.lock();
        let state = guard.borrow();
        if !self.config.merge_globals {
            return state.parser.usage();
        }
        let cells: Vec<_> = self
            .globals
            .bindings()
            .iter()
            .map(|binding| Arc::clone(binding.cell()))
            .collect();
        state
            .parser
            .usage_with_globals(&cells, &self.config.env_prefix)
    }

    /// Tokens absorbed by the implicit collector in the last pass.
    pub fn undefined(&self) -> Vec<String> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.parser.undefined()
    }

    /// Deprecation warnings raised by the last pass.
    pub fn warnings(&self) -> Vec<String> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.parser.warnings().to_vec()
    }

    /// Declared names in declaration order.
    pub fn names(&self) -> Vec<String> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.flags.keys().cloned().collect()
    }

    pub fn is_parsed(&self) -> bool {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.parser.is_parsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argflags_core::{Origin, ParseError};

    fn isolated(program: &str) -> FlagRegistry {
        FlagRegistry::builder(program)
            .globals(Arc::new(GlobalRegistry::new()))
            .env(Vec::<(String, String)>::new())
            .build()
    }

    #[test]
    fn test_duplicate_regardless_of_order() {
        let registry = isolated("tool");
        registry.optional("x", "", Kind::int(), 1).unwrap();
        assert!(matches!(
            registry.required("x", "", Kind::int()),
            Err(FlagError::Duplicate(name)) if name == "x"
        ));

        let registry = isolated("tool");
        registry.required("x", "", Kind::int()).unwrap();
        assert!(matches!(
            registry.optional("x", "", Kind::string(), String::new()),
            Err(FlagError::Duplicate(_))
        ));
    }

    #[test]
    fn test_help_name_is_reserved() {
        let registry = isolated("tool");
        assert!(matches!(
            registry.nullable("help", "", Kind::boolean()),
            Err(FlagError::Duplicate(name)) if name == "help"
        ));
    }

    #[test]
    fn test_parse_marks_flags_registered() {
        let registry = isolated("tool");
        let n = registry.nullable("n", "", Kind::int()).unwrap();
        assert!(!n.is_registered());
        registry.parse(&["-n", "4"]).unwrap();
        assert!(n.is_registered());
        assert!(registry.is_parsed());
    }

    #[test]
    fn test_failed_parse_leaves_flags_unregistered() {
        let registry = isolated("tool");
        let n = registry.nullable("n", "", Kind::int()).unwrap();
        let err = registry.parse(&["-n", "four"]).unwrap_err();
        assert!(matches!(err, FlagError::Parse(ParseError::Conversion(_))));
        assert!(!n.is_registered());
        assert_eq!(n.origin(), Origin::Undefined);
    }

    #[test]
    fn test_second_parse_requires_reset() {
        let registry = isolated("tool");
        registry.parse::<&str>(&[]).unwrap();
        assert!(matches!(
            registry.parse::<&str>(&[]),
            Err(FlagError::Declaration(DeclarationError::AlreadyParsed))
        ));

        registry.reset();
        assert!(registry.names().is_empty());
        let n = registry.optional("n", "", Kind::int(), 2).unwrap();
        registry.parse(&["-n", "3"]).unwrap();
        assert_eq!(n.value().unwrap(), 3);
    }

    #[test]
    fn test_override_may_reenter_registry() {
        let registry = isolated("tool");
        let n = registry.optional("n", "", Kind::int(), 2).unwrap();
        let seen = registry.with_override(&n, 9, || {
            registry.parse::<&str>(&[]).unwrap();
            n.value().unwrap()
        });
        assert_eq!(seen, 9);
        assert_eq!(n.value().unwrap(), 2);
    }

    #[test]
    fn test_none_arity_positional_is_optional() {
        let registry = isolated("tool");
        let marker = registry
            .arguments("marker", "", Kind::string(), Arity::Exact(0))
            .unwrap();
        let input = registry.argument("input", "", Kind::string()).unwrap();
        registry.parse(&["in.txt"]).unwrap();
        assert_eq!(marker.get(), None);
        assert_eq!(marker.origin(), Origin::Unset);
        assert_eq!(input.value().unwrap(), "in.txt");

        let registry = isolated("tool");
        let required = Declaration::argument(Kind::string())
            .arity(Arity::Exact(0))
            .required();
        assert!(matches!(
            registry.bind("marker", required),
            Err(FlagError::Declaration(DeclarationError::RequiredWithoutValues(_)))
        ));
    }

    #[test]
    fn test_usage_shows_globals_before_any_pass() {
        let globals = Arc::new(GlobalRegistry::new());
        crate::GlobalFlag::declare_in(
            &globals,
            "zone",
            Declaration::option(Kind::string()).description("Zone"),
        )
        .unwrap();
        let registry = FlagRegistry::builder("tool")
            .globals(Arc::clone(&globals))
            .env_prefix("TOOL_")
            .env(Vec::<(String, String)>::new())
            .on_help(|_| {})
            .build();
        registry.nullable("n", "Count", Kind::int()).unwrap();

        let before = registry.usage();
        assert!(before.contains("-zone -> Zone (optional) { String } [env: TOOL_zone]"));
        let outcome = registry.parse_result(&["-help"]).unwrap();
        assert_eq!(outcome.help(), Some(before.as_str()));

        let separate = FlagRegistry::builder("tool")
            .globals(globals)
            .merge_globals(false)
            .build();
        assert!(!separate.usage().contains("-zone"));
    }

    #[test]
    fn test_local_name_clashing_with_global() {
        let globals = Arc::new(GlobalRegistry::new());
        crate::GlobalFlag::declare_in(&globals, "zone", Declaration::option(Kind::string())).unwrap();

        let merging = FlagRegistry::builder("tool").globals(Arc::clone(&globals)).build();
        assert!(matches!(
            merging.nullable("zone", "", Kind::string()),
            Err(FlagError::Duplicate(_))
        ));

        let separate = FlagRegistry::builder("tool")
            .globals(globals)
            .merge_globals(false)
            .build();
        assert!(separate.nullable("zone", "", Kind::string()).is_ok());
    }
}
