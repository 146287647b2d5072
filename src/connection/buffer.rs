//! Connection Buffers
//!
//! Every connection gets one page-sized scratch region for its whole life.
//! The same region holds inbound request bytes and the outbound response
//! line.
//!
//! A [`Page`] is reserved by the acceptor before it accepts, attached to the
//! socket afterwards, and then owned by exactly one worker until
//! [`ConnectionBuffer::release`].
//!
//! `release` takes the buffer by value, so releasing the same buffer twice
//! does not compile. Deciding *which* cleanup path gets to call it is the
//! job of the worker's registry entry.

use crate::protocol::write_bad_request;
use std::collections::TryReserveError;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// Size of one virtual-memory page.
pub const PAGE_SIZE: usize = 4096;

/// Bytes of each page reserved for per-connection bookkeeping.
pub const HEADER_SIZE: usize = 20;

/// Usable bytes in a connection buffer.
pub const BUFFER_CAPACITY: usize = PAGE_SIZE - HEADER_SIZE;

/// Errors that can occur while reserving a buffer.
#[derive(Debug, Error)]
pub enum BufferError {
    /// The allocator could not satisfy the request. Callers treat this as
    /// transient and retry.
    #[error("resource exhausted: could not reserve {requested} bytes")]
    ResourceExhausted {
        requested: usize,
        #[source]
        source: TryReserveError,
    },
}

/// A reserved but not yet attached memory region.
pub struct Page {
    data: Box<[u8]>,
}

impl Page {
    /// Reserves a region of [`BUFFER_CAPACITY`] bytes.
    pub fn acquire() -> Result<Self, BufferError> {
        Self::with_capacity(BUFFER_CAPACITY)
    }

    /// Reserves a region of `capacity` bytes.
    ///
    /// The reservation goes through the fallible allocation API so that
    /// exhaustion surfaces as an error instead of aborting the process.
    pub fn with_capacity(capacity: usize) -> Result<Self, BufferError> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|source| BufferError::ResourceExhausted {
                requested: capacity,
                source,
            })?;
        data.resize(capacity, 0);

        Ok(Self {
            data: data.into_boxed_slice(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Hands the region to an accepted socket.
    pub fn attach<S>(self, socket: S, peer: SocketAddr) -> ConnectionBuffer<S> {
        ConnectionBuffer {
            socket,
            peer,
            data: self.data,
        }
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("capacity", &self.data.len())
            .finish()
    }
}

/// A memory region together with the socket it serves.
pub struct ConnectionBuffer<S> {
    /// The accepted connection; closed when the buffer is released
    socket: S,

    /// Client's address (for logging)
    peer: SocketAddr,

    /// Scratch space for reads and the response line
    data: Box<[u8]>,
}

impl<S> ConnectionBuffer<S> {
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Returns the first `len` bytes of the region.
    pub fn request(&self, len: usize) -> &[u8] {
        &self.data[..len.min(self.data.len())]
    }
}

impl<S> ConnectionBuffer<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Reads at most `capacity - 1` bytes from the socket into the region.
    ///
    /// Returns `Ok(0)` when the peer has closed its side.
    pub async fn read_request(&mut self) -> io::Result<usize> {
        let limit = self.data.len().saturating_sub(1);
        let n = self.socket.read(&mut self.data[..limit]).await?;
        trace!(client = %self.peer, bytes = n, "Read data");
        Ok(n)
    }

    /// Builds the bad-request line in the region and writes it out.
    ///
    /// Overwrites whatever request bytes the region held.
    pub async fn respond_bad_request(&mut self) -> io::Result<usize> {
        let len = write_bad_request(&mut self.data)?;
        self.socket.write_all(&self.data[..len]).await?;
        self.socket.flush().await?;
        trace!(client = %self.peer, bytes = len, "Sent response");
        Ok(len)
    }

    /// Closes the socket and frees the region.
    pub async fn release(mut self) {
        // The peer may already be gone; the close itself cannot be retried.
        if let Err(e) = self.socket.shutdown().await {
            trace!(client = %self.peer, error = %e, "Shutdown after peer loss");
        }
        trace!(client = %self.peer, "Buffer released");
    }
}

impl<S> fmt::Debug for ConnectionBuffer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionBuffer")
            .field("peer", &self.peer)
            .field("capacity", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    fn peer() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    #[test]
    fn test_capacity_is_page_minus_header() {
        let page = Page::acquire().unwrap();
        assert_eq!(page.capacity(), BUFFER_CAPACITY);
        assert_eq!(BUFFER_CAPACITY, 4076);
    }

    #[test]
    fn test_oversized_reservation_is_exhaustion() {
        let err = Page::with_capacity(usize::MAX).unwrap_err();
        assert!(matches!(
            err,
            BufferError::ResourceExhausted { requested, .. } if requested == usize::MAX
        ));
    }

    #[tokio::test]
    async fn test_read_leaves_one_byte_spare() {
        let request = vec![b'A'; 16];
        let socket = Builder::new().read(&request).build();
        let mut buffer = Page::with_capacity(8).unwrap().attach(socket, peer());

        let n = buffer.read_request().await.unwrap();
        assert_eq!(n, 7);
        assert_eq!(buffer.request(n), b"AAAAAAA");

        // Drain the mock so it does not complain on drop.
        let n = buffer.read_request().await.unwrap();
        assert_eq!(n, 7);
        let n = buffer.read_request().await.unwrap();
        assert_eq!(n, 2);
    }

    #[tokio::test]
    async fn test_bad_request_is_built_in_place() {
        let socket = Builder::new()
            .read(b"FOO /x\r\n\r\n")
            .write(b"400 Bad Request HTTP/2.0\r\n\r\n")
            .build();
        let mut buffer = Page::acquire().unwrap().attach(socket, peer());

        let n = buffer.read_request().await.unwrap();
        assert_eq!(buffer.request(n), b"FOO /x\r\n\r\n");

        let written = buffer.respond_bad_request().await.unwrap();
        assert_eq!(buffer.request(written), b"400 Bad Request HTTP/2.0\r\n\r\n");
        buffer.release().await;
    }

    #[tokio::test]
    async fn test_peer_close_reads_zero() {
        let socket = Builder::new().build();
        let mut buffer = Page::acquire().unwrap().attach(socket, peer());
        assert_eq!(buffer.read_request().await.unwrap(), 0);
    }
}
