use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::canon::CanonicalUrl;

struct Inner {
    queue: VecDeque<CanonicalUrl>,
    visited: HashSet<CanonicalUrl>,
    in_flight: usize,
}

/// Shared work queue plus visited set for one crawl run.
///
/// A URL enters the visited set at most once, atomically with its enqueue:
/// the membership test and the push happen in a single critical section, so
/// racing discoverers cannot enqueue the same URL twice. Workers drain the
/// queue to exhaustion; `next_task` returns `None` only once the queue is
/// empty and no task is still in flight.
pub(crate) struct Frontier {
    inner: Mutex<Inner>,
    wakeup: Notify,
}

impl Frontier {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                visited: HashSet::new(),
                in_flight: 0,
            }),
            wakeup: Notify::new(),
        }
    }

    /// Test-and-set enqueue. Returns `true` when the URL was new and is now
    /// queued; `false` when it was already enqueued or processed this run.
    pub(crate) fn enqueue_if_new(&self, url: CanonicalUrl) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if !inner.visited.insert(url.clone()) {
            return false;
        }
        inner.queue.push_back(url);
        drop(inner);
        self.wakeup.notify_one();
        true
    }

    /// Test-and-set membership without enqueueing, for tasks that
    /// re-canonicalize to a different URL after dequeue.
    pub(crate) fn mark_visited(&self, url: &CanonicalUrl) -> bool {
        self.inner.lock().unwrap().visited.insert(url.clone())
    }

    /// Next task, or `None` once the run has drained. Each `Some` must be
    /// balanced by a `task_done` call.
    pub(crate) async fn next_task(&self) -> Option<CanonicalUrl> {
        loop {
            let notified = self.wakeup.notified();
            tokio::pin!(notified);
            // Register before the emptiness check so a wakeup issued between
            // the check and the await is not lost.
            notified.as_mut().enable();
            {
                let mut inner = self.inner.lock().unwrap();
                if let Some(url) = inner.queue.pop_front() {
                    inner.in_flight += 1;
                    return Some(url);
                }
                if inner.in_flight == 0 {
                    drop(inner);
                    // Wake the remaining idle workers so they exit too.
                    self.wakeup.notify_waiters();
                    return None;
                }
            }
            notified.await;
        }
    }

    pub(crate) fn task_done(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.in_flight -= 1;
        if inner.in_flight == 0 && inner.queue.is_empty() {
            drop(inner);
            self.wakeup.notify_waiters();
        }
    }

    pub(crate) fn visited_count(&self) -> usize {
        self.inner.lock().unwrap().visited.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn url(n: usize) -> CanonicalUrl {
        CanonicalUrl::parse(&format!("https://ex.com/page/{n}")).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn racing_inserts_accept_each_url_exactly_once() {
        let frontier = Arc::new(Frontier::new());
        let accepted = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let frontier = frontier.clone();
            let accepted = accepted.clone();
            handles.push(tokio::spawn(async move {
                for n in 0..50 {
                    if frontier.enqueue_if_new(url(n)) {
                        accepted.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(accepted.load(Ordering::SeqCst), 50);
        assert_eq!(frontier.visited_count(), 50);
    }

    #[tokio::test]
    async fn drains_to_exhaustion() {
        let frontier = Frontier::new();
        for n in 0..5 {
            assert!(frontier.enqueue_if_new(url(n)));
        }

        let mut seen = 0;
        while let Some(_task) = frontier.next_task().await {
            seen += 1;
            frontier.task_done();
        }
        assert_eq!(seen, 5);
    }

    #[tokio::test]
    async fn in_flight_task_can_extend_the_queue() {
        let frontier = Arc::new(Frontier::new());
        frontier.enqueue_if_new(url(0));

        let first = frontier.next_task().await.unwrap();
        assert_eq!(first, url(0));

        // A second worker blocks on the empty queue until the first worker
        // either discovers more work or finishes.
        let waiter = {
            let frontier = frontier.clone();
            tokio::spawn(async move { frontier.next_task().await })
        };

        frontier.enqueue_if_new(url(1));
        let second = waiter.await.unwrap();
        assert_eq!(second, Some(url(1)));

        frontier.task_done();
        frontier.task_done();
        assert_eq!(frontier.next_task().await, None);
    }
}
