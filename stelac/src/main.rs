//! STELA Compiler CLI
//!
//! The main entry point for the STELA compiler.
//!
//! # Usage
//!
//! ```text
//! stelac [OPTIONS] <COMMAND>
//!
//! Commands:
//!   check    Type-check a set of modules
//!   order    Print the order modules are analyzed in
//!   helpers  List the lifetime helpers the program needs
//!
//! Options:
//!   -v, --verbose                 Increase log verbosity (can be repeated)
//!       --message-format <FMT>    Diagnostic output [possible values: human, json]
//!       --no-warn-unused          Do not report unused declarations
//!   -h, --help                    Print help information
//!   -V, --version                 Print version information
//! ```

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use stelac::codegen::{instantiate_helpers, RecordingBackend};
use stelac::config::{CompilerConfig, MessageFormat};
use stelac::diagnostics::{Diagnostic, DiagnosticSink, EmitterSink, JsonSink};
use stelac::project::{CheckedProgram, Session, SessionError};

/// The STELA Programming Language Compiler
#[derive(Parser)]
#[command(name = "stelac")]
#[command(version)]
#[command(about = "The STELA programming language compiler", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// How diagnostics are printed (defaults to STELA_MESSAGE_FORMAT or human)
    #[arg(long, value_enum, global = true)]
    message_format: Option<FormatArg>,

    /// Do not report unused declarations
    #[arg(long, global = true)]
    no_warn_unused: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Type-check a set of modules
    ///
    /// Parses every file, orders the modules by their imports and runs
    /// semantic analysis. The first error stops the compilation.
    Check(FileArgs),

    /// Print the order modules are analyzed in
    Order(FileArgs),

    /// List the lifetime helpers the program needs
    ///
    /// Prints one line per (operation, type) helper with what it does and
    /// which other helpers it calls.
    Helpers(HelperArgs),
}

#[derive(Args)]
struct FileArgs {
    /// Module source files
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,
}

#[derive(Args)]
struct HelperArgs {
    #[command(flatten)]
    files: FileArgs,

    /// Print the helpers as LLVM IR
    #[cfg(feature = "llvm")]
    #[arg(long)]
    emit_llvm: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    /// Annotated source snippets
    Human,
    /// One JSON object per line
    Json,
}

impl From<FormatArg> for MessageFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Human => MessageFormat::Human,
            FormatArg::Json => MessageFormat::Json,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match CompilerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };
    if cli.no_warn_unused {
        config.warn_unused = false;
    }
    if let Some(format) = cli.message_format {
        config.message_format = format.into();
    }

    init_logging(cli.verbose, &config);

    match &cli.command {
        Commands::Check(args) => cmd_check(args, &config),
        Commands::Order(args) => cmd_order(args, &config),
        Commands::Helpers(args) => cmd_helpers(args, &config),
    }
}

/// Install the `tracing` subscriber. `-v` flags win over `STELA_LOG`.
fn init_logging(verbose: u8, config: &CompilerConfig) {
    let directive = match verbose {
        0 => config.log_filter.as_str(),
        1 => "stelac=info",
        2 => "stelac=debug",
        _ => "stelac=trace",
    };
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|err| {
        eprintln!("warning: invalid log filter `{directive}`: {err}");
        EnvFilter::new("warn")
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Run `f` with the sink selected by the message format.
fn with_sink<R>(session: &Session, config: &CompilerConfig, f: impl FnOnce(&mut dyn DiagnosticSink) -> R) -> R {
    match config.message_format {
        MessageFormat::Human => f(&mut EmitterSink::new(session.files())),
        MessageFormat::Json => f(&mut JsonSink::new(io::stdout())),
    }
}

/// Parse every file. Syntax errors are collected so all files get reported.
fn load(args: &FileArgs) -> Result<(Session, Vec<Diagnostic>), ExitCode> {
    let mut session = Session::new();
    let mut syntax_errors = Vec::new();
    for path in &args.files {
        match session.add_file(path) {
            Ok(_) => debug!(file = %path.display(), "loaded"),
            Err(SessionError::Parse { mut diagnostics, .. }) => syntax_errors.append(&mut diagnostics),
            Err(err @ SessionError::Io { .. }) => {
                eprintln!("error: {err}");
                return Err(ExitCode::from(1));
            }
        }
    }
    Ok((session, syntax_errors))
}

/// Load and analyze. Every diagnostic goes to the sink.
fn analyze(args: &FileArgs, config: &CompilerConfig) -> Result<(Session, CheckedProgram), ExitCode> {
    let (session, syntax_errors) = load(args)?;
    let result = with_sink(&session, config, |sink| {
        if !syntax_errors.is_empty() {
            for diagnostic in &syntax_errors {
                sink.report(diagnostic);
            }
            return None;
        }
        session.check(config, sink).ok()
    });

    match result {
        Some(program) => Ok((session, program)),
        None => {
            if config.message_format == MessageFormat::Human {
                eprintln!("Compilation failed.");
            }
            Err(ExitCode::from(1))
        }
    }
}

/// Check command - type-check modules
fn cmd_check(args: &FileArgs, config: &CompilerConfig) -> ExitCode {
    match analyze(args, config) {
        Ok((_, program)) => {
            if config.message_format == MessageFormat::Human {
                println!("info: {} module(s) checked successfully.", program.order.len());
            }
            ExitCode::SUCCESS
        }
        Err(code) => code,
    }
}

/// Order command - print module names in analysis order
fn cmd_order(args: &FileArgs, config: &CompilerConfig) -> ExitCode {
    let (session, syntax_errors) = match load(args) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    if !syntax_errors.is_empty() {
        with_sink(&session, config, |sink| {
            for diagnostic in &syntax_errors {
                sink.report(diagnostic);
            }
        });
        return ExitCode::from(1);
    }

    match session.module_order() {
        Ok(order) => {
            for index in order {
                println!("{}", session.ast().name(session.modules()[index].name.name));
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

/// Helpers command - list or emit lifetime helpers
fn cmd_helpers(args: &HelperArgs, config: &CompilerConfig) -> ExitCode {
    let (session, program) = match analyze(&args.files, config) {
        Ok(analyzed) => analyzed,
        Err(code) => return code,
    };

    if let Some(code) = emit_llvm(args, &session, &program) {
        return code;
    }

    match instantiate_helpers(session.ast(), &program.analysis, RecordingBackend::new()) {
        Ok(cache) => {
            print!("{}", cache.backend().render());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

#[cfg(feature = "llvm")]
fn emit_llvm(args: &HelperArgs, session: &Session, program: &CheckedProgram) -> Option<ExitCode> {
    if !args.emit_llvm {
        return None;
    }
    let name = program.order.last().map_or("stela", String::as_str);
    let code = match stelac::codegen::compile_helpers_to_ir(session.ast(), &program.analysis, name) {
        Ok(ir) => {
            print!("{ir}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    };
    Some(code)
}

#[cfg(not(feature = "llvm"))]
fn emit_llvm(_args: &HelperArgs, _session: &Session, _program: &CheckedProgram) -> Option<ExitCode> {
    None
}
