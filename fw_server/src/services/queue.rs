//! Generic at-least-once work queue.
//!
//! Tasks go to a background consumer loop; a handler error puts the
//! delivery back on the queue after a delay, up to an attempt cap.
//! Handlers must be idempotent — the same task can be seen more than once
//! — and must not retry internally; redelivery is the queue's job.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;

/// One delivery of a task, tagged with how many times it has been handed
/// to the consumer.
#[derive(Debug)]
pub struct Delivery<T> {
    pub task: T,
    pub attempt: u32,
}

/// Producer handle. Cheap to clone.
#[derive(Debug)]
pub struct WorkQueue<T> {
    tx: mpsc::UnboundedSender<Delivery<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send + 'static> WorkQueue<T> {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Delivery<T>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a task for first delivery. False when the consumer is gone.
    pub fn enqueue(&self, task: T) -> bool {
        self.tx.send(Delivery { task, attempt: 1 }).is_ok()
    }

    fn redeliver(&self, task: T, attempt: u32) -> bool {
        self.tx.send(Delivery { task, attempt }).is_ok()
    }
}

/// Redelivery settings for a consumer loop.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub redelivery_delay: Duration,
}

/// Run the consumer loop forever. Spawned as a background tokio task.
///
/// Deliveries are processed one at a time; upstream fetches inside a task
/// are already sequential to bound peak memory, and a single consumer
/// keeps it that way across tasks too.
pub async fn run_consumer<T, H, Fut>(
    queue: WorkQueue<T>,
    mut rx: mpsc::UnboundedReceiver<Delivery<T>>,
    policy: RetryPolicy,
    handler: H,
) where
    T: Clone + Send + 'static,
    H: Fn(T) -> Fut + Send,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    while let Some(delivery) = rx.recv().await {
        match handler(delivery.task.clone()).await {
            Ok(()) => {}
            Err(e) if delivery.attempt >= policy.max_attempts => {
                tracing::error!(
                    attempt = delivery.attempt,
                    "Task dropped after final attempt: {e:#}"
                );
                crate::metrics::task_processed("dropped");
            }
            Err(e) => {
                tracing::warn!(
                    attempt = delivery.attempt,
                    "Task failed, scheduling redelivery: {e:#}"
                );
                crate::metrics::task_processed("retried");
                let queue = queue.clone();
                let task = delivery.task;
                let attempt = delivery.attempt + 1;
                let delay = policy.redelivery_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    queue.redeliver(task, attempt);
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn redelivers_failed_tasks_until_success() {
        let (queue, rx) = WorkQueue::new();
        let policy = RetryPolicy {
            max_attempts: 5,
            redelivery_delay: Duration::from_millis(5),
        };

        let calls = Arc::new(AtomicU32::new(0));
        let handler_calls = calls.clone();
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move {
                run_consumer(queue, rx, policy, move |_task: u32| {
                    let calls = handler_calls.clone();
                    async move {
                        // Fail the first two deliveries.
                        if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                            anyhow::bail!("transient")
                        }
                        Ok(())
                    }
                })
                .await;
            })
        };

        assert!(queue.enqueue(7));
        for _ in 0..100 {
            if calls.load(Ordering::SeqCst) >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        consumer.abort();
    }

    #[tokio::test]
    async fn drops_tasks_after_the_attempt_cap() {
        let (queue, rx) = WorkQueue::new();
        let policy = RetryPolicy {
            max_attempts: 2,
            redelivery_delay: Duration::from_millis(1),
        };

        let calls = Arc::new(AtomicU32::new(0));
        let handler_calls = calls.clone();
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move {
                run_consumer(queue, rx, policy, move |_task: u32| {
                    let calls = handler_calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        anyhow::bail!("permanent")
                    }
                })
                .await;
            })
        };

        assert!(queue.enqueue(7));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        consumer.abort();
    }
}
