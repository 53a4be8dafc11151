//! Deterministic rendering of usage text.
//!
//! Layout: a header naming the program, a `Positionals:` section in
//! declaration order, then an `Options:` section. Each entry is one line:
//!
//! ```text
//!     -count [4] -> Worker count (optional) { Int }
//! ```

use std::fmt::Write;

use crate::descriptor::{Arity, Descriptor, Multiplicity, Role};

const INDENT: &str = "    ";

/// How an option can also be supplied from the external environment.
pub(crate) struct EnvHint<'a> {
    pub(crate) prefix: &'a str,
    pub(crate) is_global: &'a dyn Fn(&str) -> bool,
}

pub(crate) fn render(
    program: &str,
    arguments: &[&Descriptor],
    options: &[&Descriptor],
    env: Option<&EnvHint<'_>>,
) -> String {
    let arguments: Vec<&Descriptor> = arguments.iter().copied().filter(|d| !d.is_hidden()).collect();
    let mut out = String::new();

    let mut header = format!("Usage: {program} [options]");
    for argument in &arguments {
        header.push(' ');
        header.push_str(&synopsis(argument));
    }
    out.push_str(&header);
    out.push('\n');

    if !arguments.is_empty() {
        out.push_str("Positionals:\n");
        for argument in &arguments {
            entry(&mut out, argument, None);
        }
    }

    out.push_str("Options:\n");
    for option in options {
        let hint = env.and_then(|env| {
            option
                .name()
                .filter(|name| (env.is_global)(name))
                .map(|name| format!("{}{name}", env.prefix))
        });
        entry(&mut out, option, hint.as_deref());
    }
    out
}

fn synopsis(argument: &Descriptor) -> String {
    let mut token = argument.display_name();
    if argument.is_multi() {
        token.push_str("...");
    }
    if argument.is_required() {
        token
    } else {
        format!("[{token}]")
    }
}

fn entry(out: &mut String, descriptor: &Descriptor, env_key: Option<&str>) {
    let _ = write!(out, "{INDENT}{}", descriptor.display_name());
    if let Some(default) = descriptor.default() {
        let _ = write!(out, " [{default}]");
    }
    let _ = write!(out, " -> {}", descriptor.description());
    out.push_str(if descriptor.is_required() {
        " (required)"
    } else {
        " (optional)"
    });
    match descriptor.role() {
        Role::Option(Multiplicity::Single) | Role::Argument(Arity::Exact(1)) => {}
        Role::Option(Multiplicity::Repeated) => out.push_str(" (repeatable)"),
        Role::Option(Multiplicity::Delimited(d) | Multiplicity::RepeatedDelimited(d)) => {
            let _ = write!(out, " (separated by '{d}')");
        }
        Role::Argument(Arity::Exact(n)) => {
            let _ = write!(out, " ({n} values)");
        }
        Role::Argument(Arity::Unbounded) => out.push_str(" (any number of values)"),
    }
    let _ = write!(out, " {{ {} }}", descriptor.value_type().describe());
    if let Some(key) = env_key {
        let _ = write!(out, " [env: {key}]");
    }
    if let Some(note) = descriptor.deprecation() {
        let _ = write!(out, " (deprecated: {note})");
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Value, ValueType};

    fn named(descriptor: Descriptor, name: &str) -> Descriptor {
        descriptor.bind(name).unwrap();
        descriptor
    }

    #[test]
    fn test_render_sections_in_declaration_order() {
        let input = named(
            Descriptor::argument(ValueType::Str)
                .with_description("Input file")
                .required(),
            "input",
        );
        let rest = named(
            Descriptor::argument(ValueType::Str)
                .with_description("Extra")
                .with_arity(Arity::Unbounded),
            "rest",
        );
        let count = named(
            Descriptor::option(ValueType::Int)
                .with_description("Worker count")
                .with_default(Value::Int(4)),
            "count",
        );
        let old = named(
            Descriptor::option(ValueType::SWITCH)
                .with_description("Old switch")
                .deprecated("use -count"),
            "old",
        );

        let text = render("tool", &[&input, &rest], &[&count, &old], None);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Usage: tool [options] input [rest...]");
        assert_eq!(lines[1], "Positionals:");
        assert_eq!(lines[2], "    input -> Input file (required) { String }");
        assert_eq!(
            lines[3],
            "    rest -> Extra (optional) (any number of values) { String }"
        );
        assert_eq!(lines[4], "Options:");
        assert_eq!(lines[5], "    -count [4] -> Worker count (optional) { Int }");
        assert_eq!(
            lines[6],
            "    -old -> Old switch (optional) { Boolean } (deprecated: use -count)"
        );
    }

    #[test]
    fn test_render_env_hint_for_globals() {
        let region = named(
            Descriptor::option(ValueType::Str).with_description("Region"),
            "region",
        );
        let is_global = |name: &str| name == "region";
        let hint = EnvHint {
            prefix: "APP_",
            is_global: &is_global,
        };
        let text = render("tool", &[], &[&region], Some(&hint));
        assert!(!text.contains("Positionals:"));
        assert!(text.contains("    -region -> Region (optional) { String } [env: APP_region]"));
    }
}
