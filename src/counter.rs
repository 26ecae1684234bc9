//! External completion counter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Counts outstanding producer tasks, so
/// [`Progress::wait`](crate::Progress::wait) can hold the display open until
/// every producer has checked out, including ones that never touch a bar at the
/// end of their run.
///
/// Cheaply cloneable; all clones share the count. Pass one clone to
/// [`ProgressBuilder::task_counter`](crate::ProgressBuilder::task_counter)
/// and hand the others to producers.
#[derive(Debug, Clone)]
pub struct TaskCounter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    count: AtomicUsize,
    notify: Notify,
}

impl TaskCounter {
    /// Counter starting at `tasks` outstanding tasks.
    pub fn new(tasks: usize) -> Self {
        TaskCounter {
            inner: Arc::new(Inner {
                count: AtomicUsize::new(tasks),
                notify: Notify::new(),
            }),
        }
    }

    /// Register `n` additional outstanding tasks.
    pub fn add(&self, n: usize) {
        self.inner.count.fetch_add(n, Ordering::AcqRel);
    }

    /// Check one task out. Calling `done` more times than tasks were added
    /// saturates at zero and is logged rather than panicking.
    pub fn done(&self) {
        let mut current = self.inner.count.load(Ordering::Acquire);
        loop {
            if current == 0 {
                tracing::warn!(target: "multibar::counter", "done() called on an idle counter");
                return;
            }
            match self.inner.count.compare_exchange(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
        if current == 1 {
            self.inner.notify.notify_waiters();
        }
    }

    /// Number of outstanding tasks.
    pub fn count(&self) -> usize {
        self.inner.count.load(Ordering::Acquire)
    }

    /// Wait until the count reaches zero.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_idle_returns_once_all_tasks_check_out() {
        let counter = TaskCounter::new(2);
        let waiter = {
            let counter = counter.clone();
            tokio::spawn(async move { counter.wait_idle().await })
        };
        counter.done();
        assert_eq!(counter.count(), 1);
        counter.done();
        assert!(waiter.await.is_ok());
    }

    #[tokio::test]
    async fn wait_idle_on_a_fresh_counter_is_immediate() {
        TaskCounter::new(0).wait_idle().await;
    }

    #[test]
    fn done_saturates_at_zero() {
        let counter = TaskCounter::new(1);
        counter.done();
        counter.done();
        assert_eq!(counter.count(), 0);
    }
}
