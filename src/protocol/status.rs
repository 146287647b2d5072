//! Status Lines
//!
//! The server only ever produces one response: a bad-request status line
//! followed by a blank line. The version tag is a fixed literal and is not
//! the result of any protocol negotiation.
//!
//! ```text
//! 400 Bad Request HTTP/2.0\r\n\r\n
//! ```

use std::io::{self, Cursor, Write};

/// The protocol version string appended to every status line.
pub const HTTP_VERSION: &str = "HTTP/2.0";

/// Status text sent for requests that cannot be classified.
pub const STATUS_400: &str = "400 Bad Request";

/// Writes the bad-request line into `buf` and returns its length.
///
/// Fails with [`io::ErrorKind::WriteZero`] if `buf` is too small to hold it.
pub fn write_bad_request(buf: &mut [u8]) -> io::Result<usize> {
    let mut cursor = Cursor::new(buf);
    write!(cursor, "{} {}\r\n\r\n", STATUS_400, HTTP_VERSION)?;
    Ok(cursor.position() as usize)
}

/// Returns the bad-request line as an owned byte vector.
pub fn bad_request() -> Vec<u8> {
    format!("{} {}\r\n\r\n", STATUS_400, HTTP_VERSION).into_bytes()
}
