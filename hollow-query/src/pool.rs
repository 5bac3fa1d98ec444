//! The shared scan worker pool.
//!
//! One fixed pool amortises thread creation across every scan in the
//! process. A scan broadcasts the same chunk-stealing closure to every
//! worker and blocks until all of them drain; workers never die, since a
//! panicking task is caught and counted as drained.

use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread;
use tracing::warn;

type Job = Box<dyn FnOnce() + Send>;

/// A fixed pool of scan workers fed through one queue.
pub struct ScanPool {
    sender: Mutex<Sender<Job>>,
    workers: usize,
}

impl ScanPool {
    /// A pool with one worker per available core.
    pub fn new() -> Self {
        let workers = thread::available_parallelism().map_or(4, |n| n.get());
        Self::with_workers(workers)
    }

    /// A pool with exactly `workers` threads.
    pub fn with_workers(workers: usize) -> Self {
        let workers = workers.max(1);
        let (sender, receiver) = channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        for i in 0..workers {
            let receiver = receiver.clone();
            let _ = thread::Builder::new()
                .name(format!("hollow-scan-{i}"))
                .spawn(move || loop {
                    let job = {
                        let guard = receiver.lock();
                        guard.recv()
                    };
                    match job {
                        Ok(job) => job(),
                        Err(_) => break,
                    }
                });
        }
        Self {
            sender: Mutex::new(sender),
            workers,
        }
    }

    /// Number of workers in the pool.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Hand `task` to every worker and block until all copies finish.
    /// A panicking copy is logged and counted as finished.
    pub fn broadcast(&self, task: Arc<dyn Fn() + Send + Sync>) {
        let pending = Arc::new((Mutex::new(0usize), Condvar::new()));
        for _ in 0..self.workers {
            let task = task.clone();
            let pending = pending.clone();
            let pending_for_job = pending.clone();
            *pending.0.lock() += 1;
            let job: Job = Box::new(move || {
                if catch_unwind(AssertUnwindSafe(|| task())).is_err() {
                    warn!("scan task panicked");
                }
                let (count, condvar) = &*pending_for_job;
                let mut n = count.lock();
                *n -= 1;
                if *n == 0 {
                    condvar.notify_all();
                }
            });
            if self.sender.lock().send(job).is_err() {
                *pending.0.lock() -= 1;
            }
        }
        let (count, condvar) = &*pending;
        let mut n = count.lock();
        while *n > 0 {
            condvar.wait(&mut n);
        }
    }
}

impl Default for ScanPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn broadcast_runs_one_copy_per_worker() {
        let pool = ScanPool::with_workers(4);
        let runs = Arc::new(AtomicUsize::new(0));
        let task_runs = runs.clone();
        pool.broadcast(Arc::new(move || {
            task_runs.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(runs.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn broadcast_survives_panicking_tasks() {
        let pool = ScanPool::with_workers(2);
        pool.broadcast(Arc::new(|| panic!("scan failure")));
        // the pool is still usable afterwards
        let runs = Arc::new(AtomicUsize::new(0));
        let task_runs = runs.clone();
        pool.broadcast(Arc::new(move || {
            task_runs.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn pool_is_reusable_across_scans() {
        let pool = ScanPool::with_workers(3);
        for _ in 0..5 {
            let runs = Arc::new(AtomicUsize::new(0));
            let task_runs = runs.clone();
            pool.broadcast(Arc::new(move || {
                task_runs.fetch_add(1, Ordering::SeqCst);
            }));
            assert_eq!(runs.load(Ordering::SeqCst), 3);
        }
    }
}
