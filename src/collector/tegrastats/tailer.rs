//! Latest-line extraction from the tail of a growing log file.
//!
//! tegrastats appends one line per interval and never rewrites earlier
//! content, so only a bounded window at the end of the file is read. The
//! final segment is discarded unless it is newline-terminated: it may be a
//! line the writer has not finished yet.

use crate::collector::traits::Tail;

/// Size of the trailing window read on every sample.
///
/// Far larger than any tegrastats line, so the window always holds at least
/// one complete record once the log has one.
pub const TAIL_WINDOW: u64 = 64 * 1024;

/// Returns the last complete line in `tail`, without its terminator.
///
/// A line is complete when it ends with `\n` and starts either at the start
/// of the file or right after an earlier `\n`. Trailing blank lines are
/// skipped. A window that does not start at offset 0 may begin mid-line, so
/// its first segment is never returned.
pub fn last_complete_line(tail: &Tail) -> Option<&str> {
    let text = tail.text.as_str();
    let mut body = &text[..text.rfind('\n')?];

    // Blank lines carry no sample; step back over them.
    loop {
        let (line, rest) = match body.rfind('\n') {
            Some(start) => (&body[start + 1..], Some(&body[..start])),
            None if tail.from_start => (body, None),
            None => return None,
        };

        let line = line.strip_suffix('\r').unwrap_or(line);
        if !line.trim().is_empty() {
            return Some(line);
        }
        body = rest?;
    }
}
