//! A single FIFO queue that starts outbound requests no faster than the configured rate.
//!
//! Requests are spaced start-to-start: the worker waits until `1000 / rate` milliseconds have
//! passed since the previous request *started*, spawns the next one, and then waits for it to
//! release its [`Slot`] before looking at the queue again.  A request that never releases is
//! skipped after the queue timeout so it cannot wedge every other caller.
use super::RequestErr;
use crate::config::Config;

use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};


type Job = Box<dyn FnOnce(Slot) -> BoxFuture<'static, ()> + Send>;

/// Handle to the queue.  Clones share the same worker and the same rate limit.
#[derive(Clone, Debug)]
pub struct Scheduler {
    queue: mpsc::UnboundedSender<Job>,
}

/// Proof that a request holds the queue.  The queue moves on once it is released or dropped.
#[derive(Debug)]
pub struct Slot(oneshot::Sender<()>);

impl Slot {
    pub fn release(self) {
        let _ = self.0.send(());
    }
}

impl Scheduler {
    pub fn new(cfg: &Config) -> Self {
        let (queue, jobs) = mpsc::unbounded_channel();
        let spacing = Duration::from_millis(1000 / u64::from((*cfg.max_requests_per_second).max(1)));
        tokio::spawn(Self::run(jobs, spacing, *cfg.queue_timeout));
        Self { queue }
    }

    async fn run(mut jobs: mpsc::UnboundedReceiver<Job>, spacing: Duration, ceiling: Duration) {
        let mut last_start: Option<Instant> = None;
        while let Some(job) = jobs.recv().await {
            if let Some(started) = last_start {
                time::sleep_until(started + spacing).await;
            }
            last_start = Some(Instant::now());

            let (slot, released) = oneshot::channel();
            tokio::spawn(job(Slot(slot)));
            if time::timeout(ceiling, released).await.is_err() {
                log::warn!(
                    "A request held the queue for more than {:?}; starting the next one",
                    ceiling
                );
            }
        }
        log::debug!("Request queue closed");
    }

    /// Queues `task`.  It is started with the [`Slot`] it must release once it no longer needs
    /// exclusive use of the queue; the returned future resolves to whatever `task` produces.
    ///
    /// Dropping the returned future does not cancel the task, but its result is discarded.
    pub fn submit<F, Fut, T>(&self, task: F) -> impl Future<Output = Result<T, RequestErr>> + Send
    where
        F: FnOnce(Slot) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let job: Job = Box::new(move |slot| {
            async move {
                let _ = result_tx.send(task(slot).await);
            }
            .boxed()
        });
        let queued = self.queue.send(job).map_err(|_| RequestErr::QueueClosed);

        async move {
            queued?;
            result_rx.await.map_err(|_| RequestErr::QueueClosed)
        }
    }
}
