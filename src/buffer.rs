//! buffer.rs — shared queue of pending alert segments between ingest and publish.

use std::sync::{Arc, Mutex};

/// Pending post segments, appended by the ingest side and drained by the publisher.
///
/// Cloning is cheap and every clone shares the same queue. Both `append` and
/// `drain_all` hold the lock only for the list operation itself, so an append
/// lands either in the drain that follows it or in the next one, never both.
#[derive(Debug, Clone, Default)]
pub struct AlertBuffer {
    inner: Arc<Mutex<Vec<String>>>,
}

impl AlertBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `segments` at the tail, in order.
    pub fn append<I>(&self, segments: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut v = self.lock();
        v.extend(segments);
    }

    /// Take everything pending and leave the buffer empty.
    pub fn drain_all(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    // Vec push/take have no partial states; poisoning is ignored.
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
