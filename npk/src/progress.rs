//! Advisory progress observation for package reads.
//!
//! A package can be opened with a progress callback that observes every
//! raw read in configurable chunks. The callback is per package instance
//! and purely advisory: it never affects parsing or read outcomes.

use std::fmt;
use std::sync::Arc;

/// What kind of data a read is fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    /// The fixed package header (and package timestamp).
    PackageHeader,
    /// The entity directory.
    EntityDirectory,
    /// Entity payload bytes.
    EntityData,
}

/// Callback signature: kind, label (package path or entity name), bytes
/// processed so far, total bytes of this read.
pub type ProgressFn = dyn Fn(ProgressKind, &str, u64, u64) + Send + Sync;

/// A progress callback plus the granularity it wants to be called at.
#[derive(Clone)]
pub struct Progress {
    callback: Arc<ProgressFn>,
    chunk_size: usize,
}

impl Progress {
    /// Wrap a callback. `chunk_size` is the read granularity in bytes;
    /// zero means one callback per whole read.
    pub fn new<F>(chunk_size: usize, callback: F) -> Self
    where
        F: Fn(ProgressKind, &str, u64, u64) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
            chunk_size,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub(crate) fn report(&self, kind: ProgressKind, label: &str, processed: u64, total: u64) {
        (self.callback)(kind, label, processed, total);
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}
