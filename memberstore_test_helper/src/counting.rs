use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use memberstore_core::db::ConnectionProvider;
use memberstore_core::Result;

/// Wraps a provider and counts what passes through it.
///
/// Optionally holds every lease for a fixed delay after acquiring it, to
/// simulate slow work while a connection is checked out.
#[derive(Debug)]
pub struct CountingProvider<P> {
    inner: P,
    hold: Option<Duration>,
    acquired: AtomicUsize,
    acquire_failures: AtomicUsize,
    released: AtomicUsize,
    release_failures: AtomicUsize,
    outstanding: AtomicUsize,
    peak: AtomicUsize,
}

impl<P> CountingProvider<P> {
    /// Wrap `inner`.
    pub fn new(inner: P) -> Self {
        CountingProvider {
            inner,
            hold: None,
            acquired: AtomicUsize::new(0),
            acquire_failures: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            release_failures: AtomicUsize::new(0),
            outstanding: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
    /// Sleep for `hold` after each successful acquire.
    pub fn holding(mut self, hold: Duration) -> Self {
        self.hold = Some(hold);
        self
    }
    /// The wrapped provider.
    pub fn inner(&self) -> &P {
        &self.inner
    }
    /// Successful acquisitions.
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }
    /// Failed acquisitions.
    pub fn acquire_failures(&self) -> usize {
        self.acquire_failures.load(Ordering::SeqCst)
    }
    /// Release calls, whether or not the inner release succeeded.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
    /// Release calls on which the inner provider reported an error.
    pub fn release_failures(&self) -> usize {
        self.release_failures.load(Ordering::SeqCst)
    }
    /// Connections currently leased.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
    /// Most connections ever leased at the same time.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl<P: ConnectionProvider> ConnectionProvider for CountingProvider<P> {
    type Connection = P::Connection;

    fn acquire(&self) -> Result<Self::Connection> {
        let conn = self.inner.acquire().inspect_err(|_| {
            self.acquire_failures.fetch_add(1, Ordering::SeqCst);
        })?;
        self.acquired.fetch_add(1, Ordering::SeqCst);
        let now = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(hold) = self.hold {
            thread::sleep(hold);
        }
        Ok(conn)
    }

    fn release(&self, conn: Self::Connection) -> Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        self.inner.release(conn).inspect_err(|_| {
            self.release_failures.fetch_add(1, Ordering::SeqCst);
        })
    }
}
