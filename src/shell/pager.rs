//! Launches an external pager to display `show` output, the way a shell
//! built-in `less`/`more` invocation works: a child process is spawned with
//! its stdin piped, the content is written into the pipe, and the parent
//! waits for the child to exit before returning control to the prompt.

use std::io::Write;
use std::process::{Command, Stdio};

/// Candidate pager commands tried in order when neither `PAGER` nor
/// `MDPAGER` is set. `cat` is the last resort and always succeeds.
const FALLBACK_PAGERS: &[&str] = &["less", "more", "cat"];

/// Writes `content` to a pager subprocess and waits for it to exit.
///
/// Command selection: `MDPAGER` first (intended for the `show readme`
/// command's Markdown-flavored content), then `PAGER`, then the fallback
/// list. Each candidate is split on whitespace and run directly (no shell),
/// matching a plain `sh -c "$PAGER"`-free invocation; if spawning a
/// candidate fails, the next one is tried.
pub fn page(content: &[u8]) -> std::io::Result<()> {
    let mut candidates: Vec<String> = Vec::new();
    if let Ok(v) = std::env::var("MDPAGER") {
        if !v.trim().is_empty() {
            candidates.push(v);
        }
    }
    if let Ok(v) = std::env::var("PAGER") {
        if !v.trim().is_empty() {
            candidates.push(v);
        }
    }
    candidates.extend(FALLBACK_PAGERS.iter().map(|s| s.to_string()));

    for candidate in candidates {
        let mut parts = candidate.split_whitespace();
        let Some(program) = parts.next() else { continue };
        let args: Vec<&str> = parts.collect();

        let child = Command::new(program).args(&args).stdin(Stdio::piped()).spawn();
        let mut child = match child {
            Ok(c) => c,
            Err(_) => continue,
        };

        if let Some(mut stdin) = child.stdin.take() {
            // A pager that exits early (e.g. the user quit `less`) closes its
            // end of the pipe; a broken-pipe write error is not a failure.
            if let Err(e) = stdin.write_all(content) {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e);
                }
            }
        }
        child.wait()?;
        return Ok(());
    }

    Ok(())
}
