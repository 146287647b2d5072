//! Server Module
//!
//! The listening side of the server: binding the socket and running the
//! accept loop that starts a worker for every connection.
//!
//! ## Modules
//!
//! - `acceptor`: Bind/listen and the accept loop
//! - `transport`: The listening-socket trait the acceptor is generic over

pub mod acceptor;
pub mod transport;

// Re-export commonly used types
pub use acceptor::{Acceptor, AcceptorError};
pub use transport::Transport;
