//! Command dispatch for the control shell: one function per recognized
//! command, matched flat against the first whitespace-separated token.

use std::sync::Arc;

use log::LevelFilter;

use crate::config::DIRECTIO_BUFFER_SIZE;
use crate::map::SegmentState;
use crate::session::{LogLevel, Session};
use crate::util::{parse_u64, Cursor};

use super::pager;

const COMMANDS: &[(&str, &str)] = &[
    ("help", "Displays a list of commands"),
    ("save", "Saves the mapfile, optionally to a different path"),
    ("exit", "Unmounts and exits the program"),
    (
        "recovery",
        "Allow reading from device to backup. Arguments: allow|deny|show [nontried|nontrimmed|nonscraped|badsector]",
    ),
    ("reopen", "Reopen the infile. You can optionally specify a new path"),
    ("blocksize", "Get or set the biggest unit of data tried to recover at once"),
    ("loglevel", "Get or set loglevel: default|info"),
    ("show", "Page mapfile contents, the license, or the readme: map|license|readme"),
];

/// What the REPL loop should do after a dispatched command.
pub enum Outcome {
    Continue,
    Exit,
}

/// Dispatches a whitespace-tokenized command line. Unknown commands print
/// "Command not found"; parse/usage errors print a usage line and never
/// terminate the shell.
pub fn dispatch(session: &Arc<Session>, tokens: &[&str]) -> Outcome {
    match tokens[0] {
        "help" => cmd_help(),
        "save" => cmd_save(session, &tokens[1..]),
        "exit" => return Outcome::Exit,
        "recovery" => cmd_recovery(session, &tokens[1..]),
        "reopen" => cmd_reopen(session, &tokens[1..]),
        "blocksize" => cmd_blocksize(session, &tokens[1..]),
        "loglevel" => cmd_loglevel(session, &tokens[1..]),
        "show" => cmd_show(session, &tokens[1..]),
        _ => println!("Command not found"),
    }
    Outcome::Continue
}

fn cmd_help() {
    println!("Available commands are:");
    for (name, description) in COMMANDS {
        println!("  {name} \t- {description}");
    }
}

fn cmd_save(session: &Arc<Session>, args: &[&str]) {
    if args.len() > 1 {
        println!("usage: save [path]");
        return;
    }
    let mut state = session.lock();
    let path = args.first().map(std::path::PathBuf::from).unwrap_or_else(|| state.config.mapfile_path.clone());
    match state.map.save(&path) {
        Ok(()) => {
            if args.is_empty() {
                state.config.unsaved = false;
            }
            println!("saved mapfile to {}", path.display());
        }
        Err(e) => eprintln!("failed to save mapfile: {e}"),
    }
}

fn cmd_reopen(session: &Arc<Session>, args: &[&str]) {
    if args.len() > 1 {
        println!("usage: reopen [infile]");
        return;
    }
    let mut state = session.lock();
    let path = args.first().map(std::path::PathBuf::from).unwrap_or_else(|| state.config.infile_path.clone());
    match state.reopen(&path) {
        Ok(()) => println!("reopened {}", path.display()),
        Err(e) => eprintln!("failed to reopen infile: {e}"),
    }
}

fn cmd_blocksize(session: &Arc<Session>, args: &[&str]) {
    if args.len() > 1 {
        println!("usage: blocksize [size]");
        return;
    }
    let mut state = session.lock();
    if let Some(arg) = args.first() {
        let mut cur = Cursor::new(arg);
        match parse_u64(&mut cur) {
            Ok(size) if size as usize > DIRECTIO_BUFFER_SIZE => {
                eprintln!("blocksize too big, can't be bigger than {DIRECTIO_BUFFER_SIZE}");
            }
            Ok(size) => state.config.blocksize = size as usize,
            Err(e) => eprintln!("failed to parse size: {e}"),
        }
    }
    println!("blocksize = {}", state.config.blocksize);
}

fn cmd_recovery(session: &Arc<Session>, args: &[&str]) {
    let usage = || {
        println!("usage: recovery allow|deny|show [nontried|nontrimmed|nonscraped|badsector]...");
    };

    if args.is_empty() || !["allow", "deny", "show"].contains(&args[0]) {
        usage();
        return show_recovery_status(session);
    }

    if args[0] != "show" {
        let allow = args[0] == "allow";
        let mut state = session.lock();
        if args.len() == 1 {
            state.config.allowed = allow;
        } else {
            for name in &args[1..] {
                let Some(s) = state_name(name) else { continue };
                if allow {
                    state.config.recover_states.set(s);
                } else {
                    state.config.recover_states.clear(s);
                }
            }
        }
    }

    show_recovery_status(session);
}

fn state_name(name: &str) -> Option<SegmentState> {
    match name {
        "nontried" => Some(SegmentState::NonTried),
        "nontrimmed" => Some(SegmentState::NonTrimmed),
        "nonscraped" => Some(SegmentState::NonScraped),
        "badsector" => Some(SegmentState::BadSector),
        _ => None,
    }
}

fn show_recovery_status(session: &Arc<Session>) {
    let state = session.lock();
    println!("recovery mode: {}", if state.config.allowed { "allow" } else { "deny" });
    print!("sections to recover: ");
    for (name, s) in [
        ("nontried", SegmentState::NonTried),
        ("nontrimmed", SegmentState::NonTrimmed),
        ("nonscraped", SegmentState::NonScraped),
        ("badsector", SegmentState::BadSector),
    ] {
        if state.config.recover_states.is_set(s) {
            print!("{name} ");
        }
    }
    println!();
}

fn cmd_loglevel(session: &Arc<Session>, args: &[&str]) {
    if args.len() > 1 {
        println!("usage: loglevel default|info");
        return;
    }
    let mut state = session.lock();
    if let Some(arg) = args.first() {
        match *arg {
            "default" => {
                state.config.loglevel = LogLevel::Default;
                log::set_max_level(LevelFilter::Warn);
            }
            "info" => {
                state.config.loglevel = LogLevel::Info;
                log::set_max_level(LevelFilter::Info);
            }
            _ => {
                println!("usage: loglevel default|info");
                return;
            }
        }
    }
    println!(
        "loglevel = {}",
        match state.config.loglevel {
            LogLevel::Default => "default",
            LogLevel::Info => "info",
        }
    );
}

fn cmd_show(session: &Arc<Session>, args: &[&str]) {
    if args.len() != 1 {
        println!("usage: show map|license|readme");
        return;
    }
    let content: Vec<u8> = match args[0] {
        "map" => {
            let state = session.lock();
            let mut buf = Vec::new();
            if state.map.write_to(&mut buf).is_err() {
                eprintln!("failed to render mapfile");
                return;
            }
            buf
        }
        "license" => include_bytes!("../../LICENSE").to_vec(),
        "readme" => include_bytes!("../../README.md").to_vec(),
        other => {
            println!("unknown show target {other:?}; expected map|license|readme");
            return;
        }
    };

    if let Err(e) = pager::page(&content) {
        eprintln!("failed to launch pager: {e}");
    }
}
