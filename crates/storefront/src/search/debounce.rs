//! Cancellable scheduled work tagged with a sequence number.

use core::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Monotonically increasing tag for suggestion queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    /// The number after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A query waiting out its quiet period.
///
/// Dropping a `DebounceTask` detaches it; call [`cancel`](Self::cancel) to
/// stop it from firing.
#[derive(Debug)]
pub(crate) struct DebounceTask {
    sequence: SequenceNumber,
    query: String,
    handle: JoinHandle<()>,
}

impl DebounceTask {
    /// Run `on_fire` after `delay` unless cancelled first.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub(crate) fn schedule<F>(
        sequence: SequenceNumber,
        query: String,
        delay: Duration,
        on_fire: F,
    ) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire.await;
        });
        Self {
            sequence,
            query,
            handle,
        }
    }

    pub(crate) const fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    pub(crate) fn query(&self) -> &str {
        &self.query
    }

    /// Stop the task if its quiet period has not elapsed yet.
    pub(crate) fn cancel(self) {
        tracing::trace!(sequence = %self.sequence, "Debounce cancelled");
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_sequence_ordering() {
        let first = SequenceNumber::default().next();
        let second = first.next();
        assert!(second > first);
        assert_eq!(second.get(), 2);
        assert_eq!(second.to_string(), "#2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let task = DebounceTask::schedule(
            SequenceNumber(1),
            "fern".to_string(),
            Duration::from_millis(300),
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert_eq!(task.query(), "fern");

        tokio::time::sleep(Duration::from_millis(299)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let task = DebounceTask::schedule(
            SequenceNumber(1),
            "fern".to_string(),
            Duration::from_millis(300),
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        task.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
