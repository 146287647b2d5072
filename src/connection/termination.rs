//! Abnormal Termination
//!
//! A connection whose peer resets or breaks the pipe is ended through this
//! handler instead of the worker's normal closing path.
//!
//! Delivery and cleanup are split. [`AbnormalTerminationHandler::interrupt`]
//! only cancels the worker's token; it is safe to call from any task or
//! thread at any time. [`AbnormalTerminationHandler::terminate`] also takes
//! the worker's registry entry, so the abnormal path owns the release.
//! The release itself, [`AbnormalTerminationHandler::release`], runs on the
//! worker's task at its next safe point, since only the worker holds the
//! buffer.

use crate::connection::buffer::ConnectionBuffer;
use crate::connection::registry::ConnectionRegistry;
use crate::connection::stats::ConnectionStats;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Returns `true` for transport errors that mean the peer is gone.
pub fn is_broken_pipe(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
    )
}

/// Ends one worker after its peer has reset the connection.
#[derive(Debug, Clone)]
pub struct AbnormalTerminationHandler {
    registry: ConnectionRegistry,
    token: CancellationToken,
    stats: Arc<ConnectionStats>,
}

impl AbnormalTerminationHandler {
    pub fn new(
        registry: ConnectionRegistry,
        token: CancellationToken,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        Self {
            registry,
            token,
            stats,
        }
    }

    /// Delivers the broken-pipe event to the worker.
    pub fn interrupt(&self) {
        self.token.cancel();
    }

    pub fn is_interrupted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Interrupts the worker and takes its registry entry.
    ///
    /// Returns `true` if the entry was still claimed, meaning the worker
    /// will release its buffer through [`release`](Self::release) rather
    /// than its own close. Never waits on the worker.
    pub fn terminate(&self) -> bool {
        self.interrupt();

        let taken = self.registry.take_and_clear();
        if taken {
            debug!("Abnormal termination: storage found");
        } else {
            debug!("Abnormal termination: no storage");
        }
        taken
    }

    /// Abnormal-path cleanup, run by the worker once it has stopped its I/O.
    ///
    /// Clears the entry if [`terminate`](Self::terminate) has not already
    /// done so, then closes the socket and frees the buffer.
    pub async fn release<S>(&self, buffer: ConnectionBuffer<S>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.registry.take_and_clear();
        debug!(client = %buffer.peer(), "Releasing storage after abnormal termination");
        buffer.release().await;
        self.stats.buffer_released();
        self.stats.abnormal_termination();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::buffer::Page;
    use std::net::SocketAddr;
    use std::sync::atomic::Ordering;
    use tokio_test::io::Builder;

    type HandlerParts = (
        AbnormalTerminationHandler,
        ConnectionRegistry,
        Arc<ConnectionStats>,
    );

    fn handler() -> HandlerParts {
        let registry = ConnectionRegistry::new();
        let stats = Arc::new(ConnectionStats::new());
        let handler = AbnormalTerminationHandler::new(
            registry.clone(),
            CancellationToken::new(),
            Arc::clone(&stats),
        );
        (handler, registry, stats)
    }

    #[test]
    fn test_broken_pipe_kinds() {
        assert!(is_broken_pipe(&io::Error::from(io::ErrorKind::BrokenPipe)));
        assert!(is_broken_pipe(&io::Error::from(io::ErrorKind::ConnectionReset)));
        assert!(!is_broken_pipe(&io::Error::from(io::ErrorKind::TimedOut)));
        assert!(!is_broken_pipe(&io::Error::from(io::ErrorKind::InvalidData)));
    }

    #[test]
    fn test_interrupt_only_cancels() {
        let (handler, registry, stats) = handler();
        registry.claim();
        assert!(!handler.is_interrupted());

        handler.interrupt();
        handler.interrupt();
        assert!(handler.is_interrupted());
        assert!(registry.is_claimed());
        assert_eq!(stats.buffers_released.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_terminate_takes_claimed_entry_once() {
        let (handler, registry, _) = handler();
        registry.claim();

        assert!(handler.terminate());
        assert!(handler.is_interrupted());
        assert!(!registry.is_claimed());

        assert!(!handler.terminate());
    }

    #[test]
    fn test_terminate_without_storage_is_noop() {
        let (handler, _, stats) = handler();

        assert!(!handler.terminate());
        assert!(handler.is_interrupted());
        assert_eq!(stats.abnormal_terminations.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_release_clears_entry_and_counts() {
        let (handler, registry, stats) = handler();
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        registry.claim();

        handler
            .release(Page::acquire().unwrap().attach(Builder::new().build(), peer))
            .await;

        assert!(!registry.is_claimed());
        assert_eq!(stats.buffers_released.load(Ordering::Relaxed), 1);
        assert_eq!(stats.abnormal_terminations.load(Ordering::Relaxed), 1);
    }
}
