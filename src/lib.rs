//! # stubhttpd - A Minimal Concurrent TCP Listener
//!
//! stubhttpd accepts TCP connections, gives each one its own task and
//! buffer, and classifies whatever the client sends against the HTTP
//! request verbs. Unrecognized requests get a fixed bad-request line back;
//! recognized ones are acknowledged internally and get no reply.
//!
//! ## Quick Start
//!
//! ```ignore
//! use stubhttpd::config::Config;
//! use stubhttpd::connection::ConnectionStats;
//! use stubhttpd::server::Acceptor;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config { port: 8080, ..Config::default() };
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let acceptor = Acceptor::bind(&config, stats)?;
//!     acceptor.run().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Wire Behavior
//!
//! - Requests starting with `GET`, `HEAD`, `POST`, `PUT`, `DELETE`, `TRACE`,
//!   `OPTIONS`, `CONNECT` or `PATCH` are acknowledged with no reply
//! - Anything else receives `400 Bad Request HTTP/2.0\r\n\r\n` and the
//!   connection stays open for the next request
//!
//! ## Module Overview
//!
//! - [`protocol`]: Verb classification and the bad-request line
//! - [`connection`]: Buffers, registry, workers and abnormal termination
//! - [`server`]: The acceptor and its transport seam
//! - [`config`]: Command-line configuration
//!
//! ## Design Highlights
//!
//! ### Exactly-Once Cleanup
//!
//! A worker's buffer can be released by the worker itself or by the
//! abnormal-termination path after a broken pipe. Both race on the
//! worker's registry entry, an atomic claim-once guard, and only the call
//! that clears it owns the release.
//!
//! ### Interrupts as Cancellation
//!
//! A broken pipe never runs cleanup from inside an interrupted operation.
//! It cancels the worker's token, and the worker tears itself down at its
//! next safe point.

pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;

// Re-export commonly used types for convenience
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats, ConnectionWorker};
pub use protocol::{classify, Command};
pub use server::{Acceptor, AcceptorError};

/// The default port stubhttpd listens on
pub const DEFAULT_PORT: u16 = 80;

/// The default accept backlog
pub const DEFAULT_BACKLOG: u32 = 128;

/// Version of stubhttpd
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
