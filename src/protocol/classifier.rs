//! Request Classifier
//!
//! Maps the first bytes of a request to one of the known HTTP command verbs.
//!
//! ## How Matching Works
//!
//! The verbs live in a fixed, ordered table. Each entry is compared against
//! the start of the buffer, case-sensitively, and the first entry that is a
//! prefix of the buffer wins:
//!
//! ```text
//! "GET / HTTP/1.1\r\n"   ──>  Command::Get      (index 0)
//! "PATCH /a HTTP/1.1"    ──>  Command::Patch    (index 8)
//! "get / HTTP/1.1"       ──>  None
//! "FOO /x\r\n\r\n"       ──>  None
//! ```
//!
//! Only the verb is inspected. `"GETX"` still classifies as `GET`, and a
//! longer verb placed after one of its own prefixes would never be reached.
//! The current table has no such pair.

use std::fmt;

/// A recognized request verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Trace,
    Options,
    Connect,
    Patch,
}

/// The ordered verb table. Position in this table is the classification index.
pub const COMMANDS: [(&[u8], Command); 9] = [
    (b"GET", Command::Get),
    (b"HEAD", Command::Head),
    (b"POST", Command::Post),
    (b"PUT", Command::Put),
    (b"DELETE", Command::Delete),
    (b"TRACE", Command::Trace),
    (b"OPTIONS", Command::Options),
    (b"CONNECT", Command::Connect),
    (b"PATCH", Command::Patch),
];

impl Command {
    /// Returns the position of this verb in [`COMMANDS`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Returns the verb as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Get => "GET",
            Command::Head => "HEAD",
            Command::Post => "POST",
            Command::Put => "PUT",
            Command::Delete => "DELETE",
            Command::Trace => "TRACE",
            Command::Options => "OPTIONS",
            Command::Connect => "CONNECT",
            Command::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a raw request buffer.
///
/// Returns the first [`Command`] whose verb is a prefix of `buf`, or `None`
/// when nothing matches. Never fails and has no side effects.
///
/// # Example
///
/// ```
/// use stubhttpd::protocol::{classify, Command};
///
/// assert_eq!(classify(b"HEAD /index.html HTTP/1.0\r\n"), Some(Command::Head));
/// assert_eq!(classify(b"FOO /x\r\n\r\n"), None);
/// ```
pub fn classify(buf: &[u8]) -> Option<Command> {
    COMMANDS
        .iter()
        .find(|(verb, _)| buf.starts_with(verb))
        .map(|&(_, command)| command)
}
