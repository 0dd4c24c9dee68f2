//! Text rendering for failures.
//!
//! Two shapes of output exist:
//!
//! - the full trace, written to archive files and used by the inline
//!   processor:
//!
//! ```text
//! ConnectionReset: peer went away
//! 	at net::read(src/net.rs:42:9)
//! 	at app::main(src/main.rs:7:5)
//! Caused by: Os: broken pipe
//! 	at sys::recv(src/sys.rs:12:1)
//! 	... 1 more
//! ```
//!
//! - the substitute message, which replaces the trace in the log line:
//!   `peer went away (file:///var/log/app/stacktrace_ConnectionReset_<fp>.txt)`

use std::fmt::Write as FmtWrite;

use crate::archive::Locator;
use crate::failure::{Failure, StackFrame};

/// Append the full multi-line trace of `failure` to `out`.
///
/// Causes follow as `Caused by:` sections; frames a cause shares with the
/// trace that encloses it are collapsed to `... N more`. No trailing newline.
pub fn render_trace(failure: &Failure, out: &mut String) {
    let mut chain = failure.chain();
    let Some(first) = chain.next() else {
        return;
    };

    write_header(out, first);
    for frame in &first.frames {
        write_frame(out, frame);
    }

    let mut enclosing: &[StackFrame] = &first.frames;
    for cause in chain {
        out.push_str("\nCaused by: ");
        write_header(out, cause);

        let common = common_suffix_len(&cause.frames, enclosing);
        for frame in &cause.frames[..cause.frames.len() - common] {
            write_frame(out, frame);
        }
        if common > 0 {
            let _ = write!(out, "\n\t... {} more", common);
        }
        enclosing = &cause.frames;
    }

    let truncated = failure.truncated_causes();
    if truncated > 0 {
        let _ = write!(out, "\n\t... {} further causes omitted", truncated);
    }
}

/// Full trace as an owned string.
pub fn trace_string(failure: &Failure) -> String {
    let mut out = String::new();
    render_trace(failure, &mut out);
    out
}

/// Append `<message> (<locator>)` to `out`.
///
/// An absent message contributes nothing, so the text then starts with the
/// delimiter.
pub fn render_substitute(failure: &Failure, locator: &Locator, out: &mut String) {
    out.push_str(failure.message_or_empty());
    out.push_str(" (");
    out.push_str(locator.as_str());
    out.push(')');
}

fn write_header(out: &mut String, failure: &Failure) {
    out.push_str(&failure.kind);
    if let Some(message) = &failure.message {
        out.push_str(": ");
        out.push_str(message);
    }
}

fn write_frame(out: &mut String, frame: &StackFrame) {
    out.push_str("\n\tat ");
    out.push_str(&frame.symbol);
    if let Some(location) = &frame.location {
        out.push('(');
        out.push_str(location);
        out.push(')');
    }
}

/// Number of trailing frames `frames` has in common with `enclosing`.
fn common_suffix_len(frames: &[StackFrame], enclosing: &[StackFrame]) -> usize {
    frames
        .iter()
        .rev()
        .zip(enclosing.iter().rev())
        .take_while(|(a, b)| a == b)
        .count()
}
