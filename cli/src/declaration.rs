//! Declaration files: flags described as data.
//!
//! A declaration file is YAML (or JSON, chosen by the `.json` extension)
//! carrying the registry settings next to the option, positional and global
//! declarations:
//!
//! ```yaml
//! program: deploy
//! env_prefix: DEPLOY_
//! options:
//!   - name: replicas
//!     type: int
//!     description: Replica count
//!     default: 1
//!   - name: tag
//!     type: string
//!     multiple: repeated
//!   - name: limits
//!     type: { map: [string, { list: int }] }
//! arguments:
//!   - name: service
//!     type: string
//!   - name: extra
//!     type: string
//!     variadic: true
//! globals:
//!   - name: region
//!     type: { choice: [eu, us] }
//!     default: eu
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use argflags::{
    Arity, Declaration, Flag, FlagRegistry, GlobalFlag, GlobalRegistry, Kind, Multiplicity, Origin,
    RegistryConfig, Value, ValueType,
};
use argflags_core::{ChoiceDomain, LIST_SEPARATOR, MAP_ASSIGN};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Value type of a declared flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeSpec {
    /// Boolean set by the bare flag.
    Switch,
    /// Boolean consuming a parameter.
    Bool,
    #[serde(rename = "string")]
    Str,
    Int,
    Double,
    Choice(Vec<String>),
    List(Box<TypeSpec>),
    Map(Box<TypeSpec>, Box<TypeSpec>),
}

impl TypeSpec {
    pub fn value_type(&self) -> Result<ValueType, String> {
        Ok(match self {
            TypeSpec::Switch => ValueType::SWITCH,
            TypeSpec::Bool => ValueType::Bool { parameter: true },
            TypeSpec::Str => ValueType::Str,
            TypeSpec::Int => ValueType::Int,
            TypeSpec::Double => ValueType::Double,
            TypeSpec::Choice(labels) => {
                ValueType::Choice(ChoiceDomain::new(labels.iter().cloned()).map_err(|e| e.to_string())?)
            }
            TypeSpec::List(element) => ValueType::List(Box::new(element.value_type()?)),
            TypeSpec::Map(key, value) => {
                ValueType::Map(Box::new(key.value_type()?), Box::new(value.value_type()?))
            }
        })
    }
}

/// Default value as written in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
    Many(Vec<Literal>),
    Pairs(IndexMap<String, Literal>),
}

impl Literal {
    /// The command-line token this literal stands for.
    pub fn token(&self) -> String {
        let separator = LIST_SEPARATOR.to_string();
        match self {
            Literal::Bool(b) => b.to_string(),
            Literal::Int(i) => i.to_string(),
            Literal::Double(d) => d.to_string(),
            Literal::Text(text) => text.clone(),
            Literal::Many(items) => items
                .iter()
                .map(Literal::token)
                .collect::<Vec<_>>()
                .join(&separator),
            Literal::Pairs(pairs) => pairs
                .iter()
                .map(|(k, v)| format!("{k}{MAP_ASSIGN}{}", v.token()))
                .collect::<Vec<_>>()
                .join(&separator),
        }
    }

    fn convert(&self, value_type: &ValueType, field: &str) -> Result<Value, String> {
        value_type
            .convert(&self.token(), field)
            .map_err(|err| format!("invalid default: {err}"))
    }

    /// Elements of a multi-valued default; a scalar is a one-element list.
    fn convert_each(&self, value_type: &ValueType, field: &str) -> Result<Vec<Value>, String> {
        match self {
            Literal::Many(items) => items
                .iter()
                .map(|item| item.convert(value_type, field))
                .collect(),
            single => Ok(vec![single.convert(value_type, field)?]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultipleSpec {
    Repeated,
    Delimited(char),
    RepeatedDelimited(char),
}

impl From<MultipleSpec> for Multiplicity {
    fn from(spec: MultipleSpec) -> Self {
        match spec {
            MultipleSpec::Repeated => Multiplicity::Repeated,
            MultipleSpec::Delimited(d) => Multiplicity::Delimited(d),
            MultipleSpec::RepeatedDelimited(d) => Multiplicity::RepeatedDelimited(d),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TypeSpec,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Literal>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple: Option<MultipleSpec>,
}

/// Positional declaration. Required unless `optional`, `variadic`, given a
/// default, or declared with `count: 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TypeSpec,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Literal>,
    #[serde(default)]
    pub optional: bool,
    /// Exact number of tokens consumed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// Absorbs every remaining positional token.
    #[serde(default)]
    pub variadic: bool,
}

enum Built {
    Single(Declaration<Value>),
    Multi(Declaration<Vec<Value>>),
}

impl OptionSpec {
    fn declaration(&self) -> Result<Built, String> {
        let field = format!("flag -{}", self.name);
        let value_type = self.kind.value_type()?;
        let mut base =
            Declaration::option(Kind::dynamic(value_type.clone())).description(&self.description);
        if self.required {
            base = base.required();
        }
        if let Some(note) = &self.deprecated {
            base = base.deprecated(note);
        }
        Ok(match (self.multiple, &self.default) {
            (None, None) => Built::Single(base),
            (None, Some(default)) => Built::Single(base.default(default.convert(&value_type, &field)?)),
            (Some(multiple), default) => {
                let multi = base.multiple(multiple.into());
                match default {
                    Some(default) => Built::Multi(multi.default(default.convert_each(&value_type, &field)?)),
                    None => Built::Multi(multi),
                }
            }
        })
    }
}

impl ArgumentSpec {
    fn declaration(&self) -> Result<Built, String> {
        let field = format!("argument {}", self.name);
        let value_type = self.kind.value_type()?;
        let base =
            Declaration::argument(Kind::dynamic(value_type.clone())).description(&self.description);
        let required =
            !self.optional && !self.variadic && self.count != Some(0) && self.default.is_none();

        let arity = match (self.variadic, self.count) {
            (true, _) => Some(Arity::Unbounded),
            (false, Some(n)) => Some(Arity::Exact(n)),
            (false, None) => None,
        };
        Ok(match arity {
            None => {
                let base = match &self.default {
                    Some(default) => base.default(default.convert(&value_type, &field)?),
                    None => base,
                };
                Built::Single(if required { base.required() } else { base })
            }
            Some(arity) => {
                let multi = base.arity(arity);
                let multi = match &self.default {
                    Some(default) => multi.default(default.convert_each(&value_type, &field)?),
                    None => multi,
                };
                Built::Multi(if required { multi.required() } else { multi })
            }
        })
    }
}

/// Where a declared flag came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Option,
    Argument,
    Global,
}

enum Handle {
    Single(Flag<Value>),
    Multi(Flag<Vec<Value>>),
}

/// A flag declared from the file.
pub struct Entry {
    pub scope: Scope,
    handle: Handle,
}

impl Entry {
    pub fn name(&self) -> &str {
        match &self.handle {
            Handle::Single(flag) => flag.name(),
            Handle::Multi(flag) => flag.name(),
        }
    }

    pub fn origin(&self) -> Origin {
        match &self.handle {
            Handle::Single(flag) => flag.origin(),
            Handle::Multi(flag) => flag.origin(),
        }
    }

    pub fn value(&self) -> Option<Value> {
        match &self.handle {
            Handle::Single(flag) => flag.get(),
            Handle::Multi(flag) => flag.get().map(Value::List),
        }
    }
}

/// Registry built from a declaration file, with its flags in file order.
pub struct Declared {
    pub registry: FlagRegistry,
    pub entries: Vec<Entry>,
}

impl Declared {
    pub fn count(&self, scope: Scope) -> usize {
        self.entries.iter().filter(|e| e.scope == scope).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclarationFile {
    #[serde(flatten)]
    pub config: RegistryConfig,
    #[serde(default)]
    pub options: Vec<OptionSpec>,
    #[serde(default)]
    pub arguments: Vec<ArgumentSpec>,
    #[serde(default)]
    pub globals: Vec<OptionSpec>,
}

impl DeclarationFile {
    pub fn load(path: &Path) -> Result<Self, String> {
        let raw = fs::read_to_string(path)
            .map_err(|err| format!("Failed to read '{}': {err}", path.display()))?;
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        if is_json {
            serde_json::from_str(&raw)
                .map_err(|err| format!("Invalid declaration JSON '{}': {err}", path.display()))
        } else {
            serde_yaml::from_str(&raw)
                .map_err(|err| format!("Invalid declaration YAML '{}': {err}", path.display()))
        }
    }

    /// Declares everything into a fresh registry. Globals go into a private
    /// table so separate runs never collide.
    pub fn build(&self) -> Result<Declared, String> {
        let globals = Arc::new(GlobalRegistry::new());
        let mut entries = Vec::new();

        for spec in &self.globals {
            let context = |err: argflags::FlagError| format!("global flag '{}': {err}", spec.name);
            let handle = match spec.declaration().map_err(|e| format!("global flag '{}': {e}", spec.name))? {
                Built::Single(declaration) => {
                    let global = GlobalFlag::declare_in(&globals, &spec.name, declaration).map_err(context)?;
                    Handle::Single(Flag::clone(&global))
                }
                Built::Multi(declaration) => {
                    let global = GlobalFlag::declare_in(&globals, &spec.name, declaration).map_err(context)?;
                    Handle::Multi(Flag::clone(&global))
                }
            };
            entries.push(Entry {
                scope: Scope::Global,
                handle,
            });
        }

        let registry = FlagRegistry::builder(self.config.parser.program.clone())
            .config(self.config.clone())
            .globals(globals)
            .build();

        for spec in &self.options {
            let handle = bind(&registry, &spec.name, spec.declaration(), "option")?;
            entries.push(Entry {
                scope: Scope::Option,
                handle,
            });
        }
        for spec in &self.arguments {
            let handle = bind(&registry, &spec.name, spec.declaration(), "argument")?;
            entries.push(Entry {
                scope: Scope::Argument,
                handle,
            });
        }

        Ok(Declared { registry, entries })
    }
}

fn bind(
    registry: &FlagRegistry,
    name: &str,
    built: Result<Built, String>,
    what: &str,
) -> Result<Handle, String> {
    let context = |err: String| format!("{what} '{name}': {err}");
    match built.map_err(context)? {
        Built::Single(declaration) => registry
            .bind(name, declaration)
            .map(Handle::Single)
            .map_err(|err| context(err.to_string())),
        Built::Multi(declaration) => registry
            .bind(name, declaration)
            .map(Handle::Multi)
            .map_err(|err| context(err.to_string())),
    }
}
