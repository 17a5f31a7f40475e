//! REPL (Read-Eval-Print Loop)

use crate::interp::{Interpreter, Value};
use crate::lexer::tokenize;
use crate::parser::parse;
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};
use std::path::PathBuf;

const PROMPT: &str = "> ";
const HISTORY_FILE: &str = ".tern_history";

/// REPL state
pub struct Repl {
    editor: DefaultEditor,
    interpreter: Interpreter,
    history_path: Option<PathBuf>,
}

impl Repl {
    /// Create a new REPL
    pub fn new() -> RlResult<Self> {
        let editor = DefaultEditor::new()?;
        let interpreter = Interpreter::new();
        let history_path = dirs_home().map(|h| h.join(HISTORY_FILE));

        let mut repl = Repl {
            editor,
            interpreter,
            history_path,
        };

        if let Some(ref path) = repl.history_path {
            let _ = repl.editor.load_history(path);
        }

        Ok(repl)
    }

    /// Run the REPL
    pub fn run(&mut self) -> RlResult<()> {
        println!("Tern REPL");
        println!("Type :help for help, :quit to exit.\n");

        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();

                    if line.is_empty() {
                        continue;
                    }

                    let _ = self.editor.add_history_entry(line);

                    if line.starts_with(':') {
                        if self.handle_command(line) {
                            break;
                        }
                        continue;
                    }

                    self.eval_input(line);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("Goodbye!");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {err}");
                    break;
                }
            }
        }

        if let Some(ref path) = self.history_path {
            let _ = self.editor.save_history(path);
        }

        Ok(())
    }

    /// Handle REPL commands (starting with :). Returns true to exit.
    fn handle_command(&mut self, cmd: &str) -> bool {
        match cmd {
            ":quit" | ":q" | ":exit" => {
                println!("Goodbye!");
                true
            }
            ":help" | ":h" | ":?" => {
                self.print_help();
                false
            }
            ":clear" => {
                print!("\x1B[2J\x1B[1;1H");
                false
            }
            _ => {
                println!("Unknown command: {cmd}");
                println!("Type :help for help.");
                false
            }
        }
    }

    fn print_help(&self) {
        println!("Tern REPL Commands:");
        println!("  :help, :h, :?   Show this help");
        println!("  :quit, :q       Exit the REPL");
        println!("  :clear          Clear the screen");
        println!();
        println!("You can enter:");
        println!("  - Statements: let x = 1;  print x;");
        println!("  - Expressions: 1 + 2;  add(1, 2);");
        println!("  - Declarations: fn add(a: int, b: int): int {{ return a + b; }}");
        println!();
        println!("Built-in functions include:");
        println!("  len(x)          Length of a string or collection");
        println!("  str(x)          Render any value as a string");
        println!("  abs/min/max     Numeric helpers");
        println!("  assert(cond)    Fail when the condition is false");
    }

    /// Parse and evaluate one line against the persistent interpreter
    fn eval_input(&mut self, input: &str) {
        // Statements need their terminating semicolon; add one for bare
        // expressions so `1 + 2` works as expected
        let source = if input.ends_with(';') || input.ends_with('}') {
            input.to_string()
        } else {
            format!("{input};")
        };

        let tokens = match tokenize(&source) {
            Ok(tokens) => tokens,
            Err(err) => {
                eprintln!("Lexer error: {}", err.message());
                return;
            }
        };

        match parse(tokens) {
            Ok(program) => match self.interpreter.run_program(&program) {
                Ok(value) => {
                    // Echo results of expressions; declarations yield null
                    if !matches!(value, Value::Null) {
                        println!("{value}");
                    }
                }
                Err(err) => {
                    eprintln!("Runtime error: {}", err.message);
                }
            },
            Err(err) => {
                eprintln!("Parse error: {}", err.message());
            }
        }
    }
}

/// Get home directory
fn dirs_home() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}
