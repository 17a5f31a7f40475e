//! Tern CLI

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use tern::interp::{Interpreter, RuntimeError, Value};

#[derive(Parser)]
#[command(name = "tern", version, about = "Tern - a small imperative scripting language")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a Tern source file
    Run {
        /// Source file to run
        file: PathBuf,
    },
    /// Parse and dump AST (debug)
    Parse {
        /// Source file to parse
        file: PathBuf,
    },
    /// Tokenize and dump tokens (debug)
    Tokens {
        /// Source file to tokenize
        file: PathBuf,
    },
    /// Start an interactive session
    Repl,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { file } => run_file(&file),
        Command::Parse { file } => report_front_end(parse_file(&file)),
        Command::Tokens { file } => report_front_end(tokenize_file(&file)),
        Command::Repl => match tern::repl::Repl::new() {
            Ok(mut repl) => match repl.run() {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("Error: {e}");
                    ExitCode::FAILURE
                }
            },
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        },
    }
}

fn report_front_end(result: Result<(), Box<dyn std::error::Error>>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Execute a source file: all top-level statements run first, then `main`
/// (if declared) determines the exit code. Failures exit nonzero.
fn run_file(path: &PathBuf) -> ExitCode {
    let filename = path.display().to_string();
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Could not read {filename}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let tokens = match tern::lexer::tokenize(&source) {
        Ok(tokens) => tokens,
        Err(e) => {
            tern::error::report_error(&filename, &source, &e);
            return ExitCode::FAILURE;
        }
    };
    let program = match tern::parser::parse(tokens) {
        Ok(program) => program,
        Err(e) => {
            tern::error::report_error(&filename, &source, &e);
            return ExitCode::FAILURE;
        }
    };

    let mut interp = Interpreter::new();
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            interp.set_base_dir(dir);
        }
    }

    if let Err(e) = interp.run_program(&program) {
        report_runtime_error(&filename, &source, &e);
        return ExitCode::FAILURE;
    }

    // The integer returned by main becomes the process exit code
    match interp.run_main() {
        Ok(Some(Value::Int(code))) => ExitCode::from(code.rem_euclid(256) as u8),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            report_runtime_error(&filename, &source, &e);
            ExitCode::FAILURE
        }
    }
}

/// Render a runtime failure, pointing at the source when a span is known
fn report_runtime_error(filename: &str, source: &str, error: &RuntimeError) {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    match error.span {
        Some(span) => {
            let _ = Report::build(ReportKind::Error, (filename, span.start..span.end))
                .with_message("Runtime error")
                .with_label(
                    Label::new((filename, span.start..span.end))
                        .with_message(&error.message)
                        .with_color(Color::Red),
                )
                .finish()
                .print((filename, Source::from(source)));
        }
        None => eprintln!("Runtime error: {}", error.message),
    }
}

fn parse_file(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;

    let tokens = tern::lexer::tokenize(&source)?;
    let ast = tern::parser::parse(tokens)?;

    println!("{}", serde_json::to_string_pretty(&ast)?);
    Ok(())
}

fn tokenize_file(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;

    let tokens = tern::lexer::tokenize(&source)?;
    for (tok, span) in &tokens {
        println!("{tok:?} @ {}..{}", span.start, span.end);
    }

    Ok(())
}
