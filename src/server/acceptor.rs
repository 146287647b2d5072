//! Connection Acceptor
//!
//! Owns the listening socket and starts one worker task per connection.
//!
//! ## Accept Loop
//!
//! ```text
//! loop {
//!     page   = Page::acquire()      retry until it succeeds
//!     stream = transport.accept()   retry until it succeeds
//!     spawn(worker(page + stream))  detached, never joined
//! }
//! ```
//!
//! Buffer and accept failures are transient: they are logged, counted and
//! retried immediately, with only a scheduler yield in between. Socket
//! creation, bind and listen failures are fatal and returned to the caller.
//! There is no cap on the number of live workers.

use crate::config::Config;
use crate::connection::{handle_connection, ConnectionStats, Page, BUFFER_CAPACITY};
use crate::server::transport::Transport;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Errors that stop the acceptor before it serves anything.
#[derive(Debug, Error)]
pub enum AcceptorError {
    /// The listening socket could not be created or configured
    #[error("failed to create socket: {0}")]
    Socket(#[source] io::Error),

    /// The address is in use or needs privileges we lack
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The socket could not be put into listening mode
    #[error("failed to listen with backlog {backlog}: {source}")]
    Listen {
        backlog: u32,
        #[source]
        source: io::Error,
    },
}

/// Accepts connections and hands each one to its own worker.
pub struct Acceptor<T> {
    /// The listening socket
    transport: T,

    /// Size of each connection buffer
    buffer_capacity: usize,

    /// Passed on to every worker
    idle_timeout: Option<Duration>,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl Acceptor<TcpListener> {
    /// Creates an IPv4 listening socket according to `config`.
    pub fn bind(config: &Config, stats: Arc<ConnectionStats>) -> Result<Self, AcceptorError> {
        let addr = config.bind_address();

        let socket = TcpSocket::new_v4().map_err(AcceptorError::Socket)?;
        socket
            .set_reuseaddr(true)
            .map_err(AcceptorError::Socket)?;
        socket
            .bind(addr)
            .map_err(|source| AcceptorError::Bind { addr, source })?;
        let listener = socket
            .listen(config.backlog)
            .map_err(|source| AcceptorError::Listen {
                backlog: config.backlog,
                source,
            })?;

        info!(address = %addr, backlog = config.backlog, "Listening");

        Ok(Self::new(listener, config.idle_timeout, stats))
    }
}

impl<T: Transport> Acceptor<T> {
    /// Wraps an already listening transport.
    pub fn new(transport: T, idle_timeout: Option<Duration>, stats: Arc<ConnectionStats>) -> Self {
        Self {
            transport,
            buffer_capacity: BUFFER_CAPACITY,
            idle_timeout,
            stats,
        }
    }

    /// Overrides the per-connection buffer size.
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Accepts connections forever.
    pub async fn run(self) {
        loop {
            // Workers are detached.
            let _ = self.accept_one().await;
        }
    }

    /// Runs one iteration of the accept loop and returns the new worker.
    pub async fn accept_one(&self) -> JoinHandle<()> {
        let page = self.reserve_page().await;
        self.stats.buffer_acquired();
        let (stream, peer) = self.accept_connection().await;

        debug!(client = %peer, "Accepted connection");
        let buffer = page.attach(stream, peer);
        tokio::spawn(handle_connection(
            buffer,
            self.idle_timeout,
            Arc::clone(&self.stats),
        ))
    }

    async fn reserve_page(&self) -> Page {
        loop {
            match Page::with_capacity(self.buffer_capacity) {
                Ok(page) => return page,
                Err(e) => {
                    // Terminating workers free their pages; keep trying.
                    self.stats.allocation_failed();
                    error!(error = %e, "Failed to reserve connection buffer");
                    tokio::task::yield_now().await;
                }
            }
        }
    }

    async fn accept_connection(&self) -> (T::Stream, SocketAddr) {
        loop {
            match self.transport.accept().await {
                Ok(connection) => return connection,
                Err(e) => {
                    self.stats.accept_failed();
                    error!("Failed to accept connection: {}", e);
                    tokio::task::yield_now().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    const BAD_REQUEST: &[u8] = b"400 Bad Request HTTP/2.0\r\n\r\n";

    fn loopback_config(port: u16) -> Config {
        Config {
            host: Ipv4Addr::LOCALHOST,
            port,
            backlog: 16,
            ..Config::default()
        }
    }

    /// A listener that fails a fixed number of accepts before working.
    struct FlakyTransport {
        inner: TcpListener,
        failures_left: AtomicUsize,
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        type Stream = TcpStream;

        async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
            let injected = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if injected {
                return Err(io::Error::new(io::ErrorKind::Other, "injected accept failure"));
            }
            self.inner.accept().await
        }

        fn local_addr(&self) -> io::Result<SocketAddr> {
            self.inner.local_addr()
        }
    }

    async fn exchange_bad_request(addr: SocketAddr) {
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"FOO /x\r\n\r\n").await.unwrap();

        let mut buf = [0u8; 64];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_bind_and_serve() {
        let stats = Arc::new(ConnectionStats::new());
        let acceptor = Acceptor::bind(&loopback_config(0), Arc::clone(&stats)).unwrap();
        let addr = acceptor.local_addr().unwrap();
        assert_ne!(addr.port(), 0);

        tokio::spawn(acceptor.run());

        exchange_bad_request(addr).await;
        // One page for the served connection, one waiting for the next.
        assert_eq!(stats.buffers_acquired.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_reserved_page_counted_before_accept() {
        let stats = Arc::new(ConnectionStats::new());
        let acceptor = Acceptor::new(
            TcpListener::bind("127.0.0.1:0").await.unwrap(),
            None,
            Arc::clone(&stats),
        );

        // No client ever connects, so the loop parks in accept.
        let task = tokio::spawn(acceptor.run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        task.abort();

        assert_eq!(stats.buffers_acquired.load(Ordering::Relaxed), 1);
        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_known_verb_gets_no_reply() {
        let acceptor =
            Acceptor::bind(&loopback_config(0), Arc::new(ConnectionStats::new())).unwrap();
        let addr = acceptor.local_addr().unwrap();
        tokio::spawn(acceptor.run());

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();

        let mut buf = [0u8; 64];
        let read = tokio::time::timeout(Duration::from_millis(100), client.read(&mut buf)).await;
        assert!(read.is_err(), "no bytes expected for a recognized verb");
    }

    #[tokio::test]
    async fn test_bind_conflict_is_fatal() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let result = Acceptor::bind(&loopback_config(port), Arc::new(ConnectionStats::new()));
        assert!(matches!(result, Err(AcceptorError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_survives_transient_accept_failures() {
        let stats = Arc::new(ConnectionStats::new());
        let transport = FlakyTransport {
            inner: TcpListener::bind("127.0.0.1:0").await.unwrap(),
            failures_left: AtomicUsize::new(5),
        };
        let acceptor = Acceptor::new(transport, None, Arc::clone(&stats));
        let addr = acceptor.local_addr().unwrap();
        tokio::spawn(acceptor.run());

        exchange_bad_request(addr).await;
        exchange_bad_request(addr).await;

        assert_eq!(stats.accept_failures.load(Ordering::Relaxed), 5);
        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_accept_one_spawns_detached_worker() {
        let stats = Arc::new(ConnectionStats::new());
        let acceptor = Acceptor::new(
            TcpListener::bind("127.0.0.1:0").await.unwrap(),
            None,
            Arc::clone(&stats),
        );
        let addr = acceptor.local_addr().unwrap();

        let client = TcpStream::connect(addr).await.unwrap();
        let worker = acceptor.accept_one().await;
        drop(client);

        worker.await.unwrap();
        assert_eq!(stats.buffers_released.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_allocation_failure_is_retried() {
        let stats = Arc::new(ConnectionStats::new());
        let acceptor = Acceptor::new(
            TcpListener::bind("127.0.0.1:0").await.unwrap(),
            None,
            Arc::clone(&stats),
        )
        .with_buffer_capacity(usize::MAX);

        let task = tokio::spawn(acceptor.run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        task.abort();

        assert!(stats.allocation_failures.load(Ordering::Relaxed) > 1);
        assert_eq!(stats.buffers_acquired.load(Ordering::Relaxed), 0);
    }
}
