use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, LevelFilter};
use lox_common::error::{self, ErrorS};
use lox_interpreter::Interpreter;
use lox_syntax::ast::Stmt;
use lox_syntax::rpn;
use termcolor::{ColorChoice, StandardStream};

/// Exit code for programs rejected before they start running.
const EXIT_STATIC_ERROR: u8 = 65;
/// Exit code for programs that stopped on a runtime error.
const EXIT_RUNTIME_ERROR: u8 = 70;

#[derive(Debug, Parser)]
#[clap(about, author, disable_help_subcommand = true, propagate_version = true, version)]
pub struct Cmd {
    /// Print debug logs to stderr. `RUST_LOG` is used otherwise.
    #[clap(long, global = true)]
    log: bool,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start an interactive session.
    #[cfg(feature = "repl")]
    Repl,
    /// Run a script.
    Run { path: String },
    /// Print every expression statement in a script in reverse Polish
    /// notation.
    Rpn { path: String },
}

impl Cmd {
    pub fn init_logger(&self) {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(LevelFilter::Off).parse_default_env();
        if self.log {
            builder.filter_level(LevelFilter::Debug);
        }
        builder.init();
    }

    pub fn run(&self) -> Result<ExitCode> {
        match &self.command {
            #[cfg(feature = "repl")]
            Command::Repl => repl(),
            Command::Run { path } => run(path),
            Command::Rpn { path } => print_rpn(path),
        }
    }
}

#[cfg(feature = "repl")]
fn repl() -> Result<ExitCode> {
    crate::repl::Session::new()?.run()?;
    Ok(ExitCode::SUCCESS)
}

fn run(path: &str) -> Result<ExitCode> {
    let source = read(path)?;
    let mut interpreter = Interpreter::new(io::stdout().lock());
    match interpreter.run(&source) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(errors) => {
            let code = exit_code(&errors);
            report(interpreter.source(), errors);
            Ok(code)
        }
    }
}

fn print_rpn(path: &str) -> Result<ExitCode> {
    let source = read(path)?;
    let program = match lox_syntax::parse(&source, 0) {
        Ok(program) => program,
        Err(errors) => {
            report(&source, errors);
            return Ok(ExitCode::from(EXIT_STATIC_ERROR));
        }
    };

    let stdout = &mut io::stdout().lock();
    for (stmt, _) in &program.stmts {
        if let Stmt::Expr(expr) = stmt {
            writeln!(stdout, "{}", rpn::to_rpn(&expr.value)).context("could not write to stdout")?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn read(path: &str) -> Result<String> {
    debug!("reading {path}");
    fs::read_to_string(path).with_context(|| format!("could not read file: {path}"))
}

fn exit_code(errors: &[ErrorS]) -> ExitCode {
    if errors.iter().any(|(e, _)| e.is_static()) {
        ExitCode::from(EXIT_STATIC_ERROR)
    } else {
        ExitCode::from(EXIT_RUNTIME_ERROR)
    }
}

fn report(source: &str, errors: Vec<ErrorS>) {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    error::report_err(&mut stderr, source, errors);
}
