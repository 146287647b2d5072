//! Connection Statistics
//!
//! Process-wide counters shared by the acceptor and every worker. All
//! updates use relaxed atomics; the counters are for reporting and tests,
//! never for synchronization.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Requests that matched a known verb
    pub requests_acknowledged: AtomicU64,
    /// Requests answered with the bad-request line
    pub bad_requests: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
    /// Connection buffers handed out by the acceptor
    pub buffers_acquired: AtomicU64,
    /// Connection buffers released by either cleanup path
    pub buffers_released: AtomicU64,
    /// Workers ended by a broken pipe or reset
    pub abnormal_terminations: AtomicU64,
    /// Failed accept calls
    pub accept_failures: AtomicU64,
    /// Failed buffer reservations
    pub allocation_failures: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn request_acknowledged(&self) {
        self.requests_acknowledged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bad_request(&self) {
        self.bad_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn buffer_acquired(&self) {
        self.buffers_acquired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn buffer_released(&self) {
        self.buffers_released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn abnormal_termination(&self) {
        self.abnormal_terminations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn accept_failed(&self) {
        self.accept_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn allocation_failed(&self) {
        self.allocation_failures.fetch_add(1, Ordering::Relaxed);
    }
}
