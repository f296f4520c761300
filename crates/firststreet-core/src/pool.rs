//! Per-batch connection pool.
//!
//! Caps the number of simultaneous requests per destination host. A pool is
//! created for each batch and dropped with it; permits are released when the
//! returned guard goes out of scope, including when a task is aborted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug)]
pub struct ConnectionPool {
    limit_per_host: usize,
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: AtomicUsize,
}

impl ConnectionPool {
    /// `limit_per_host` is clamped to at least one connection.
    pub fn new(limit_per_host: usize) -> Self {
        Self {
            limit_per_host: limit_per_host.max(1),
            hosts: Mutex::new(HashMap::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn limit_per_host(&self) -> usize {
        self.limit_per_host
    }

    /// Waits for a free connection slot towards `host`.
    pub async fn acquire(&self, host: &str) -> ConnectionPermit {
        let semaphore = self.semaphore_for(host);
        let permit = semaphore
            .acquire_owned()
            .await
            .expect("pool semaphores are never closed");

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        ConnectionPermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Requests currently holding a permit, across all hosts.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous permits observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn semaphore_for(&self, host: &str) -> Arc<Semaphore> {
        let mut hosts = self
            .hosts
            .lock()
            .expect("connection pool lock should not be poisoned");
        Arc::clone(
            hosts
                .entry(host.to_owned())
                .or_insert_with(|| Arc::new(Semaphore::new(self.limit_per_host))),
        )
    }
}

/// Slot held for the duration of one request.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
