//! Wake-up hook supplied by the embedding worker pool.
//!
//! Nothing in this crate blocks. A consumer that finds a queue (or a queue set)
//! empty has to park somewhere else, typically on a counting semaphore or an
//! eventfd owned by the pool. Implement [`Notify`] for that primitive and hand it
//! to [`QueueConfig`](crate::QueueConfig) or [`QueueSet::with_notifier`](crate::QueueSet::with_notifier);
//! every successful write signals it once, after the queue mutex is released.

use std::sync::atomic::{AtomicU64, Ordering};

pub trait Notify: Send + Sync {
    /// Called once per item made available.
    fn notify(&self);
}

impl<F> Notify for F
where
    F: Fn() + Send + Sync,
{
    fn notify(&self) {
        self()
    }
}

/// Counts signals without waking anything.
///
/// Useful for consumers that poll and only want to know whether anything
/// arrived since their last look.
#[derive(Debug, Default)]
pub struct CountingNotify {
    signals: AtomicU64,
}

impl CountingNotify {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signals(&self) -> u64 {
        self.signals.load(Ordering::Acquire)
    }

    /// Returns the number of signals since the previous call and resets the count.
    pub fn take(&self) -> u64 {
        self.signals.swap(0, Ordering::AcqRel)
    }
}

impl Notify for CountingNotify {
    fn notify(&self) {
        self.signals.fetch_add(1, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::{CountingNotify, Notify};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn counting_notify_take_resets() {
        let notify = CountingNotify::new();
        notify.notify();
        notify.notify();
        assert_eq!(notify.signals(), 2);
        assert_eq!(notify.take(), 2);
        assert_eq!(notify.signals(), 0);
    }

    #[test]
    fn closures_are_notifiers() {
        let hits = AtomicUsize::new(0);
        let hook = || {
            hits.fetch_add(1, Ordering::Relaxed);
        };
        hook.notify();
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }
}
