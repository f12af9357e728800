//! Bounded worker pool with worker recycling
//!
//! At most `workers` tasks run at once. Each worker pulls jobs from a shared
//! queue and retires after `max_jobs_per_worker` jobs; a retired worker is
//! replaced while jobs remain. Workers share only the job queue and the
//! outcome channel.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Counters describing a pool run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    /// Workers started, including replacements
    pub workers_spawned: usize,
    /// Workers that hit the per-worker job limit
    pub workers_retired: usize,
    /// Workers that ended abnormally
    pub workers_crashed: usize,
    pub jobs_run: usize,
}

enum WorkerExit {
    /// Reached the job limit
    Retired,
    /// Found the queue empty
    Drained,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
    max_jobs_per_worker: usize,
}

impl WorkerPool {
    /// Both limits are clamped to at least one
    pub fn new(workers: usize, max_jobs_per_worker: usize) -> Self {
        Self {
            workers: workers.max(1),
            max_jobs_per_worker: max_jobs_per_worker.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn max_jobs_per_worker(&self) -> usize {
        self.max_jobs_per_worker
    }

    /// Run `handler` once per job and collect the outcomes in completion order
    pub async fn run<J, O, F, Fut>(&self, jobs: Vec<J>, handler: F) -> (Vec<O>, PoolMetrics)
    where
        J: Send + 'static,
        O: Send + 'static,
        F: Fn(J) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
    {
        let mut metrics = PoolMetrics::default();
        if jobs.is_empty() {
            return (Vec::new(), metrics);
        }

        let pending = Arc::new(AtomicUsize::new(jobs.len()));
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        for job in jobs {
            // The receiver is alive until every worker is done
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        let queue = Arc::new(Mutex::new(job_rx));
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let handler = Arc::new(handler);

        let worker = Worker {
            queue,
            pending: Arc::clone(&pending),
            outcomes: outcome_tx,
            handler,
            max_jobs: self.max_jobs_per_worker,
        };

        let mut set = JoinSet::new();
        let initial = self.workers.min(pending.load(Ordering::SeqCst));
        for _ in 0..initial {
            set.spawn(worker.clone().run(metrics.workers_spawned));
            metrics.workers_spawned += 1;
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(WorkerExit::Retired) => metrics.workers_retired += 1,
                Ok(WorkerExit::Drained) => continue,
                Err(e) => {
                    error!("Instrumentation worker ended abnormally: {}", e);
                    metrics.workers_crashed += 1;
                }
            }

            if pending.load(Ordering::SeqCst) > 0 {
                debug!("Replacing worker ({} jobs pending)", pending.load(Ordering::SeqCst));
                set.spawn(worker.clone().run(metrics.workers_spawned));
                metrics.workers_spawned += 1;
            }
        }
        drop(worker);

        let mut outcomes = Vec::new();
        while let Some(outcome) = outcome_rx.recv().await {
            outcomes.push(outcome);
        }
        metrics.jobs_run = outcomes.len();
        (outcomes, metrics)
    }
}

struct Worker<J, O, F> {
    queue: Arc<Mutex<mpsc::UnboundedReceiver<J>>>,
    pending: Arc<AtomicUsize>,
    outcomes: mpsc::UnboundedSender<O>,
    handler: Arc<F>,
    max_jobs: usize,
}

impl<J, O, F> Clone for Worker<J, O, F> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            pending: Arc::clone(&self.pending),
            outcomes: self.outcomes.clone(),
            handler: Arc::clone(&self.handler),
            max_jobs: self.max_jobs,
        }
    }
}

impl<J, O, F, Fut> Worker<J, O, F>
where
    J: Send + 'static,
    O: Send + 'static,
    F: Fn(J) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
{
    async fn run(self, id: usize) -> WorkerExit {
        let mut completed = 0;
        while completed < self.max_jobs {
            let job = self.queue.lock().await.recv().await;
            let Some(job) = job else {
                debug!("Worker {} drained the queue after {} jobs", id, completed);
                return WorkerExit::Drained;
            };
            self.pending.fetch_sub(1, Ordering::SeqCst);

            let outcome = (self.handler)(job).await;
            completed += 1;
            let _ = self.outcomes.send(outcome);
        }
        debug!("Worker {} retiring after {} jobs", id, completed);
        WorkerExit::Retired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    #[tokio::test]
    async fn test_runs_every_job_once() {
        let pool = WorkerPool::new(3, 2);
        let (mut outcomes, metrics) = pool.run((0..10).collect(), |n: u32| async move { n * 2 }).await;

        outcomes.sort_unstable();
        assert_eq!(outcomes, (0..10).map(|n| n * 2).collect::<Vec<_>>());
        assert_eq!(metrics.jobs_run, 10);
    }

    #[tokio::test]
    async fn test_workers_retire_and_are_replaced() {
        let pool = WorkerPool::new(2, 5);
        let (outcomes, metrics) = pool
            .run((0..12).collect::<Vec<u32>>(), |n| async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                n
            })
            .await;

        assert_eq!(outcomes.len(), 12);
        // 12 jobs at 5 per worker need at least three workers
        assert!(metrics.workers_spawned >= 3, "{metrics:?}");
        assert!(metrics.workers_retired >= 2, "{metrics:?}");
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(2, 1);

        let (outcomes, _) = {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            pool.run((0..8).collect::<Vec<u32>>(), move |n| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    n
                }
            })
            .await
        };

        assert_eq!(outcomes.iter().collect::<HashSet<_>>().len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let (outcomes, metrics) = WorkerPool::new(4, 5).run(Vec::<u32>::new(), |n| async move { n }).await;
        assert!(outcomes.is_empty());
        assert_eq!(metrics, PoolMetrics::default());
    }
}
