mod declaration;

use std::path::PathBuf;

use argflags::{Origin, ParseOutcome, Value};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::declaration::{Declared, DeclarationFile, Scope};

/// CLI-specific output format enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Text,
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "argflags")]
#[command(about = "Check flag declarations and run parse passes against them")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one parse pass over the tokens given after `--`.
    Parse(ParseArgs),
    /// Print the usage text of a declaration file.
    Usage(UsageArgs),
    /// Validate a declaration file without parsing anything.
    Check(CheckArgs),
}

#[derive(Debug, Args)]
struct ParseArgs {
    /// Declaration file (YAML, or JSON with a .json extension).
    declaration: PathBuf,
    /// Output format.
    #[arg(long, default_value = "text")]
    format: CliOutputFormat,
    /// Collect unknown flags instead of failing.
    #[arg(long)]
    allow_undefined: bool,
    /// Do not merge global flags or read them from the environment.
    #[arg(long)]
    no_globals: bool,
    /// Tokens to parse.
    #[arg(last = true)]
    tokens: Vec<String>,
}

#[derive(Debug, Args)]
struct UsageArgs {
    /// Declaration file (YAML, or JSON with a .json extension).
    declaration: PathBuf,
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Declaration files to validate.
    #[arg(required = true)]
    declarations: Vec<PathBuf>,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Parse(args) => run_parse(args),
        Command::Usage(args) => run_usage(args),
        Command::Check(args) => run_check(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
enum Status {
    Ok,
    Error,
    Help,
}

#[derive(Debug, Serialize)]
struct FlagReport {
    name: String,
    scope: Scope,
    origin: Origin,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ParseReport {
    program: String,
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<String>,
    flags: Vec<FlagReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    undefined: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

impl ParseReport {
    fn new(declared: &Declared, outcome: &ParseOutcome) -> Self {
        let (status, error, usage) = match outcome {
            ParseOutcome::Ok => (Status::Ok, None, None),
            ParseOutcome::Error(err) => (Status::Error, Some(err.to_string()), None),
            ParseOutcome::Help(text) => (Status::Help, None, Some(text.clone())),
        };
        let flags = declared
            .entries
            .iter()
            .map(|entry| FlagReport {
                name: entry.name().to_string(),
                scope: entry.scope,
                origin: entry.origin(),
                value: entry.value(),
            })
            .collect();
        Self {
            program: declared.registry.config().parser.program.clone(),
            status,
            error,
            usage,
            flags,
            undefined: declared.registry.undefined(),
            warnings: declared.registry.warnings(),
        }
    }

    fn render_text(&self) -> String {
        if let Some(usage) = &self.usage {
            return usage.clone();
        }
        if self.error.is_some() {
            return String::new();
        }
        let mut out = String::new();
        for flag in &self.flags {
            match &flag.value {
                Some(value) => out.push_str(&format!("{} = {value} ({})\n", flag.name, flag.origin)),
                None => out.push_str(&format!("{} is unset ({})\n", flag.name, flag.origin)),
            }
        }
        if !self.undefined.is_empty() {
            out.push_str(&format!("undefined: {}\n", self.undefined.join(" ")));
        }
        out
    }
}

fn run_parse(args: ParseArgs) -> Result<(), String> {
    let mut file = DeclarationFile::load(&args.declaration)?;
    if args.allow_undefined {
        file.config.parser.allow_undefined = true;
    }
    if args.no_globals {
        file.config.merge_globals = false;
    }
    let declared = file.build()?;

    debug!(tokens = args.tokens.len(), "parsing tokens");
    let outcome = declared
        .registry
        .parse_result(&args.tokens)
        .map_err(|err| err.to_string())?;
    let report = ParseReport::new(&declared, &outcome);

    match args.format {
        CliOutputFormat::Text => print!("{}", report.render_text()),
        CliOutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| format!("Failed to serialize output: {e}"))?;
            println!("{json}");
        }
        CliOutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(&report)
                .map_err(|e| format!("Failed to serialize output: {e}"))?;
            print!("{yaml}");
        }
    }

    match outcome {
        ParseOutcome::Error(err) => Err(err.to_string()),
        ParseOutcome::Ok | ParseOutcome::Help(_) => Ok(()),
    }
}

fn run_usage(args: UsageArgs) -> Result<(), String> {
    let declared = DeclarationFile::load(&args.declaration)?.build()?;
    print!("{}", declared.registry.usage());
    Ok(())
}

fn run_check(args: CheckArgs) -> Result<(), String> {
    for path in &args.declarations {
        let declared = DeclarationFile::load(path)?.build()?;
        println!(
            "{}: program '{}' declares {} option(s), {} argument(s), {} global(s).",
            path.display(),
            declared.registry.config().parser.program,
            declared.count(Scope::Option),
            declared.count(Scope::Argument),
            declared.count(Scope::Global),
        );
    }
    Ok(())
}
