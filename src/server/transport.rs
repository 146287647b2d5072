//! Listening Transport
//!
//! The acceptor only needs two things from its listening socket: the next
//! connection and the address it is bound to. Keeping that behind a trait
//! lets tests put a faulty listener in front of a real one.

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

/// A source of accepted connections.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// The stream type handed to workers.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Waits for the next inbound connection.
    async fn accept(&self) -> io::Result<(Self::Stream, SocketAddr)>;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl Transport for TcpListener {
    type Stream = TcpStream;

    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}
