//! Reads a whole source text, then drives lexer → parser → semantic
//! checker → evaluator one command at a time, the way the teacher's
//! `runner.rs` drove `run_file`/`run_prompt` over its own pipeline — except
//! the whole input is scanned once up front (§6: the grammar allows
//! multi-line constructs, so a per-line incremental parse the teacher used
//! for single-statement Lox lines does not apply here).

use std::io::Write;

use tracing::{debug, info};

use crate::diagnostics::{Diagnostics, Unwind};
use crate::interpreter::Evaluator;
use crate::lexer::Scanner;
use crate::parser::Parser;
use crate::runtime::RuntimeContext;

/// Runs `source` to completion, writing expression-statement results to
/// `out` and diagnostics to `diag_out`. Returns the process exit status:
/// always `0`, per the external-interface contract (runtime errors are
/// reported but do not change the exit status; only `halt` stops early).
pub fn run<O: Write, E: Write>(source: &str, out: O, diag_out: E) -> i32 {
    let mut diagnostics = Diagnostics::new(diag_out);
    let tokens = Scanner::new(source).scan_tokens(&mut diagnostics);
    info!(token_count = tokens.len(), "scanned source");

    let mut parser = Parser::new(tokens);
    let mut rt = RuntimeContext::new();
    let mut evaluator = Evaluator::new(out);

    loop {
        match parser.next_command(&mut diagnostics) {
            Some(command) => {
                debug!(?command, "executing command");
                match evaluator.exec_command(command, &mut rt) {
                    Ok(()) => {}
                    Err(Unwind::Halt) => {
                        info!("halt encountered, exiting");
                        return 0;
                    }
                    Err(Unwind::Error(err)) => diagnostics.report(err),
                }
            }
            None => {
                if parser.is_at_end_of_input() {
                    break;
                }
                // Otherwise the command failed (diagnostic already reported,
                // parser already resynchronized) — keep going.
            }
        }
    }
    0
}
