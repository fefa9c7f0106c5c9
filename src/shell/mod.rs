//! The interactive control shell: a line-oriented REPL on standard input
//! that toggles recovery policy, triggers map saves, and reopens the
//! infile while a recovery session is mounted. Runs on its own thread,
//! sharing the session with the filesystem adapter; every command that
//! mutates state takes the session lock only for the duration of the
//! mutation, never across the pager's blocking subprocess I/O.

mod commands;
mod pager;

use std::io::{self, BufRead, Write};
use std::sync::Arc;

pub use commands::Outcome;

use crate::session::Session;

/// Runs the REPL to completion against `input`, returning when a command
/// requests `exit` or the input stream reaches end-of-file (mirroring
/// `fgets` returning `NULL` on a closed stdin).
pub fn run<R: BufRead>(session: &Arc<Session>, mut input: R) -> io::Result<()> {
    println!("fuserescue shell. Type help and list of commands");
    prompt()?;

    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if !tokens.is_empty() {
            if let Outcome::Exit = commands::dispatch(session, &tokens) {
                break;
            }
        }
        prompt()?;
    }
    Ok(())
}

fn prompt() -> io::Result<()> {
    print!("> ");
    io::stdout().flush()
}
