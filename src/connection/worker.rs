//! Connection Worker
//!
//! This module handles individual client connections. Each client gets its
//! own worker task that runs a small state machine until the peer goes
//! away.
//!
//! ## Connection Lifecycle
//!
//! ```text
//!        ┌─────────────────────── ok ───────────────────────┐
//!        ▼                                                  │
//!     Reading ──n bytes──> Classifying ──no match──> RespondingError
//!      ▲   │                    │ match
//!      │   │                    ▼
//!      │   │              Acknowledging
//!      └───┼────────────────────┘
//!          │ 0 bytes / error / interrupt / idle
//!          ▼
//!       Closing
//! ```
//!
//! ## Cleanup
//!
//! The worker holds its buffer for the whole connection and never shares
//! it. Its registry entry only records who gets to release it: on the way
//! out, [`close`] takes the entry unless the cancellation token has fired
//! or the entry is already gone, in which case the
//! [`AbnormalTerminationHandler`] does the release instead. Either way the
//! buffer is released once, on the worker's task.
//!
//! [`close`]: ConnectionWorker::close

use crate::connection::buffer::ConnectionBuffer;
use crate::connection::registry::ConnectionRegistry;
use crate::connection::stats::ConnectionStats;
use crate::connection::termination::{is_broken_pipe, AbnormalTerminationHandler};
use crate::protocol::{classify, Command};
use std::future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// States of one connection.
#[derive(Debug)]
enum WorkerState {
    Reading,
    Classifying(usize),
    Acknowledging(Command),
    RespondingError,
    Closing(ConnectionError),
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// The abnormal-termination event was delivered
    #[error("Connection interrupted")]
    Interrupted,

    /// No data arrived within the configured idle timeout
    #[error("Idle timeout")]
    IdleTimeout,
}

/// Handles a single client connection.
///
/// The worker owns its registry entry and cancellation token. Use
/// [`ConnectionWorker::termination_handler`] to get a handle that can
/// interrupt or terminate it from elsewhere.
pub struct ConnectionWorker {
    /// Client's address (for logging)
    peer: SocketAddr,

    /// Claim on this worker's buffer
    registry: ConnectionRegistry,

    /// Fired when the peer breaks the pipe
    token: CancellationToken,

    /// Cleanup path for abnormal termination
    termination: AbnormalTerminationHandler,

    /// Close the connection after this long without data
    idle_timeout: Option<Duration>,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl ConnectionWorker {
    /// Creates a new worker.
    ///
    /// # Arguments
    ///
    /// * `peer` - The client's socket address
    /// * `idle_timeout` - Optional limit on time spent waiting for a request
    /// * `stats` - Shared connection statistics
    pub fn new(
        peer: SocketAddr,
        idle_timeout: Option<Duration>,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        let registry = ConnectionRegistry::new();
        let token = CancellationToken::new();
        let termination =
            AbnormalTerminationHandler::new(registry.clone(), token.clone(), Arc::clone(&stats));

        Self {
            peer,
            registry,
            token,
            termination,
            idle_timeout,
            stats,
        }
    }

    /// Returns a handle that can interrupt this worker.
    pub fn termination_handler(&self) -> AbnormalTerminationHandler {
        self.termination.clone()
    }

    /// Returns a handle to this worker's registry entry.
    pub fn registry(&self) -> ConnectionRegistry {
        self.registry.clone()
    }

    /// Runs the connection until it terminates.
    ///
    /// Returns `Ok(())` when the client closed the connection, and the
    /// reason otherwise. In both cases the buffer has been released by the
    /// time this returns.
    pub async fn run<S>(self, mut buffer: ConnectionBuffer<S>) -> Result<(), ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.registry.claim();
        self.stats.connection_opened();
        info!(client = %self.peer, "Client connected");

        let result = match self.main_loop(&mut buffer).await {
            ConnectionError::ClientDisconnected => Ok(()),
            reason => Err(reason),
        };
        self.close(buffer).await;

        match &result {
            Ok(()) => info!(client = %self.peer, "Client disconnected gracefully"),
            Err(ConnectionError::Interrupted) => {
                debug!(client = %self.peer, "Connection interrupted")
            }
            Err(ConnectionError::IoError(e)) if is_broken_pipe(e) => {
                debug!(client = %self.peer, error = %e, "Connection reset by client")
            }
            Err(ConnectionError::IdleTimeout) => {
                info!(client = %self.peer, timeout = ?self.idle_timeout, "Idle connection closed")
            }
            Err(e) => warn!(client = %self.peer, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    /// Releases the buffer through whichever path owns the registry entry.
    ///
    /// Returns `true` if the normal path did the release, `false` if it was
    /// handed to the abnormal-termination path.
    pub async fn close<S>(&self, buffer: ConnectionBuffer<S>) -> bool
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if !self.token.is_cancelled() && self.registry.take_and_clear() {
            debug!(client = %self.peer, "Close: storage found");
            buffer.release().await;
            self.stats.buffer_released();
            true
        } else {
            debug!(client = %self.peer, "Close: entry owned by abnormal termination");
            self.termination.release(buffer).await;
            false
        }
    }

    /// The read-classify-respond loop. Returns why the connection ended.
    async fn main_loop<S>(&self, buffer: &mut ConnectionBuffer<S>) -> ConnectionError
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut state = WorkerState::Reading;

        loop {
            // Safe point: an interrupt delivered since the last step wins.
            if self.token.is_cancelled() && !matches!(state, WorkerState::Closing(_)) {
                state = WorkerState::Closing(ConnectionError::Interrupted);
            }

            state = match state {
                WorkerState::Reading => match self.read(buffer).await {
                    Ok(0) => WorkerState::Closing(ConnectionError::ClientDisconnected),
                    Ok(n) => WorkerState::Classifying(n),
                    Err(e) => WorkerState::Closing(e),
                },
                WorkerState::Classifying(n) => match self.classify_request(buffer, n) {
                    Some(command) => WorkerState::Acknowledging(command),
                    None => WorkerState::RespondingError,
                },
                WorkerState::Acknowledging(command) => {
                    // Recognized verbs get no response.
                    debug!(client = %self.peer, verb = %command, "Request acknowledged");
                    self.stats.request_acknowledged();
                    WorkerState::Reading
                }
                WorkerState::RespondingError => match self.respond_bad_request(buffer).await {
                    Ok(()) => WorkerState::Reading,
                    Err(e) => WorkerState::Closing(e),
                },
                WorkerState::Closing(reason) => return reason,
            };
        }
    }

    /// Reads the next request into the owned buffer.
    async fn read<S>(&self, buffer: &mut ConnectionBuffer<S>) -> Result<usize, ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ConnectionError::Interrupted),
            _ = idle(self.idle_timeout) => Err(ConnectionError::IdleTimeout),
            result = buffer.read_request() => match result {
                Ok(n) => {
                    self.stats.bytes_read(n);
                    Ok(n)
                }
                Err(e) => Err(self.transport_error(e)),
            },
        }
    }

    fn classify_request<S>(&self, buffer: &ConnectionBuffer<S>, len: usize) -> Option<Command> {
        let command = classify(buffer.request(len));
        if command.is_none() {
            debug!(client = %self.peer, bytes = len, "Unrecognized request");
        }
        command
    }

    async fn respond_bad_request<S>(
        &self,
        buffer: &mut ConnectionBuffer<S>,
    ) -> Result<(), ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ConnectionError::Interrupted),
            result = buffer.respond_bad_request() => match result {
                Ok(n) => {
                    self.stats.bytes_written(n);
                    self.stats.bad_request();
                    Ok(())
                }
                Err(e) => Err(self.transport_error(e)),
            },
        }
    }

    /// Delivers the abnormal-termination event for broken pipes.
    fn transport_error(&self, err: io::Error) -> ConnectionError {
        if is_broken_pipe(&err) {
            self.termination.interrupt();
        }
        ConnectionError::IoError(err)
    }
}

/// Resolves after `limit`, or never when there is no limit.
async fn idle(limit: Option<Duration>) {
    match limit {
        Some(limit) => tokio::time::sleep(limit).await,
        None => future::pending().await,
    }
}

/// Runs a worker for one accepted connection.
///
/// This is a convenience function that creates a [`ConnectionWorker`] and
/// runs it to completion.
pub async fn handle_connection<S>(
    buffer: ConnectionBuffer<S>,
    idle_timeout: Option<Duration>,
    stats: Arc<ConnectionStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let peer = buffer.peer();
    let worker = ConnectionWorker::new(peer, idle_timeout, stats);
    if let Err(e) = worker.run(buffer).await {
        match e {
            ConnectionError::Interrupted => {}
            ConnectionError::IoError(ref io_err) if is_broken_pipe(io_err) => {}
            _ => {
                debug!(client = %peer, error = %e, "Connection ended with error");
            }
        }
    }
}
