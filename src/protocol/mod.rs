//! Request Protocol
//!
//! The wire-level side of the server: what a request must start with to be
//! recognized, and what is written back when it is not.
//!
//! ## Modules
//!
//! - `classifier`: Maps the first bytes of a request to a known verb
//! - `status`: Builds the fixed bad-request status line
//!
//! ## Example
//!
//! ```
//! use stubhttpd::protocol::{bad_request, classify, Command};
//!
//! assert_eq!(classify(b"GET / HTTP/1.1\r\n\r\n"), Some(Command::Get));
//! assert_eq!(bad_request(), b"400 Bad Request HTTP/2.0\r\n\r\n");
//! ```

pub mod classifier;
pub mod status;

// Re-export commonly used types for convenience
pub use classifier::{classify, Command, COMMANDS};
pub use status::{bad_request, write_bad_request, HTTP_VERSION, STATUS_400};
