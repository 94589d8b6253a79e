//! Command-line surface, replacing the teacher's hand-parsed `env::args()`
//! with a `clap` derive struct.

use std::path::PathBuf;

use clap::Parser as ClapParser;

/// A small bc-like calculator REPL.
///
/// With no FILE argument, reads commands from standard input until EOF.
/// With FILE, reads the whole file as one batch instead.
#[derive(Debug, ClapParser)]
#[command(name = "bcrs", version, about)]
pub struct Cli {
    /// Source file to run in batch mode; omit to read from standard input.
    pub file: Option<PathBuf>,

    /// Raise log verbosity; repeat for more detail (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn tracing_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
