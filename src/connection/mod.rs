//! Connection Module
//!
//! This module manages individual client connections. Each accepted
//! connection is handled by its own task, and every task owns exactly one
//! buffer for its whole life.
//!
//! The acceptor reserves a [`Page`], attaches it to the accepted socket and
//! spawns a [`ConnectionWorker`] that owns the resulting
//! [`ConnectionBuffer`]. The worker's [`ConnectionRegistry`] entry and its
//! [`AbnormalTerminationHandler`] decide which path releases it.
//!
//! ## Example
//!
//! ```ignore
//! use stubhttpd::connection::{handle_connection, ConnectionStats, Page};
//! use std::sync::Arc;
//!
//! let stats = Arc::new(ConnectionStats::new());
//!
//! // For each accepted connection...
//! let page = Page::acquire()?;
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(page.attach(stream, addr), None, stats));
//! ```

pub mod buffer;
pub mod registry;
pub mod stats;
pub mod termination;
pub mod worker;

// Re-export commonly used types
pub use buffer::{BufferError, ConnectionBuffer, Page, BUFFER_CAPACITY, PAGE_SIZE};
pub use registry::ConnectionRegistry;
pub use stats::ConnectionStats;
pub use termination::{is_broken_pipe, AbnormalTerminationHandler};
pub use worker::{handle_connection, ConnectionError, ConnectionWorker};
