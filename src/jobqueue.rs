//! A bounded multithreaded job queue.
//!
//! Jobs are pushed by the main thread. Each worker pops a job, executes
//! it, and goes back for another. Workers are spawned lazily, up to a
//! fixed cap, and each owns a per-thread state object (typically a random
//! number generator) built once by a caller-supplied factory and dropped
//! when the worker terminates.
//!
//! One mutex protects the queue, the idle count, the live-thread count
//! and the accepting flag. Two condition variables carry the signals:
//! `wake_worker` (main to workers) and `wake_main` (workers to main).
//! A worker is *idle* while waiting on `wake_worker`, *running* while
//! executing a job, and *terminating* once the queue is closed and empty.
//!
//! Jobs report fatal failures through their return value; the first
//! failure is stored and surfaced by [`JobQueue::wait_on_jobs`]. The pool
//! itself never unwinds across threads.

use crate::errors::JobQueueError;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

type Job<S> = Box<dyn FnOnce(&mut S) -> Result<(), String> + Send + 'static>;
type StateFactory<S> = Arc<dyn Fn(usize) -> S + Send + Sync + 'static>;

struct Inner<S> {
    todo: VecDeque<Job<S>>,
    accepting: bool,
    threads: usize,
    idle: usize,
    failure: Option<String>,
}

struct Shared<S> {
    inner: Mutex<Inner<S>>,
    wake_worker: Condvar,
    wake_main: Condvar,
}

impl<S> Shared<S> {
    // Poisoning means a job panicked while we held the lock only briefly
    // for bookkeeping; the queue state itself stays consistent.
    fn lock(&self) -> MutexGuard<'_, Inner<S>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A pool of at most `max_threads` workers draining a shared job queue.
pub struct JobQueue<S: Send + 'static> {
    shared: Arc<Shared<S>>,
    factory: StateFactory<S>,
    max_threads: usize,
    handles: Vec<JoinHandle<()>>,
}

impl<S: Send + 'static> JobQueue<S> {
    /// Create a queue with a worker cap and a per-thread state factory.
    /// The factory receives the worker's index and runs on the worker's
    /// own thread.
    pub fn new(max_threads: usize, factory: impl Fn(usize) -> S + Send + Sync + 'static) -> Self {
        assert!(max_threads > 0, "job queue needs at least one worker");
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    todo: VecDeque::new(),
                    accepting: true,
                    threads: 0,
                    idle: 0,
                    failure: None,
                }),
                wake_worker: Condvar::new(),
                wake_main: Condvar::new(),
            }),
            factory: Arc::new(factory),
            max_threads,
            handles: Vec::new(),
        }
    }

    /// Submit a job. Wakes an idle worker if there is one; otherwise
    /// spawns a new worker while below the cap; otherwise the job waits
    /// in the queue.
    pub fn add_job(
        &mut self,
        job: impl FnOnce(&mut S) -> Result<(), String> + Send + 'static,
    ) -> Result<(), JobQueueError> {
        let mut inner = self.shared.lock();
        if !inner.accepting {
            return Err(JobQueueError::Closed);
        }
        inner.todo.push_back(Box::new(job));

        if inner.idle > 0 {
            self.shared.wake_worker.notify_one();
        } else if inner.threads < self.max_threads {
            let index = inner.threads;
            inner.threads += 1;
            let shared = Arc::clone(&self.shared);
            let factory = Arc::clone(&self.factory);
            let spawned = std::thread::Builder::new()
                .name(format!("coalpat-worker-{index}"))
                .spawn(move || worker(shared, factory, index));
            match spawned {
                Ok(handle) => self.handles.push(handle),
                Err(e) => {
                    // roll back so wait_on_jobs cannot wait on a job
                    // that no worker will ever take
                    inner.threads -= 1;
                    inner.todo.pop_back();
                    return Err(JobQueueError::Spawn(e));
                }
            }
        }
        Ok(())
    }

    /// Stop accepting jobs and wake every worker so that those finding the
    /// queue empty can terminate.
    pub fn no_more_jobs(&mut self) {
        let mut inner = self.shared.lock();
        inner.accepting = false;
        self.shared.wake_worker.notify_all();
    }

    /// Block until the queue is empty and every worker is idle. Surfaces
    /// the first job failure, if any.
    pub fn wait_on_jobs(&mut self) -> Result<(), JobQueueError> {
        let mut inner = self.shared.lock();
        while !inner.todo.is_empty() || inner.idle < inner.threads {
            if inner.idle > 0 {
                self.shared.wake_worker.notify_one();
            }
            inner = self
                .shared
                .wake_main
                .wait(inner)
                .unwrap_or_else(|e| e.into_inner());
        }
        if !inner.accepting {
            // shutting down: wake everyone so they can exit
            self.shared.wake_worker.notify_all();
        }
        match inner.failure.take() {
            Some(msg) => Err(JobQueueError::WorkerFailed(msg)),
            None => Ok(()),
        }
    }

    /// Close the queue, drain it, and join every worker.
    pub fn shutdown(mut self) -> Result<(), JobQueueError> {
        self.shutdown_in_place()
    }

    fn shutdown_in_place(&mut self) -> Result<(), JobQueueError> {
        self.no_more_jobs();
        let result = self.wait_on_jobs();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        result
    }
}

impl<S: Send + 'static> Drop for JobQueue<S> {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            let _ = self.shutdown_in_place();
        }
    }
}

/// Worker loop: wait for work while the queue accepts jobs, run jobs as
/// they appear, terminate once the queue is closed and empty.
fn worker<S: Send + 'static>(shared: Arc<Shared<S>>, factory: StateFactory<S>, index: usize) {
    let mut state = factory(index);
    let mut inner = shared.lock();
    loop {
        while inner.todo.is_empty() && inner.accepting {
            inner.idle += 1;
            if inner.idle == inner.threads {
                shared.wake_main.notify_one();
            }
            inner = shared
                .wake_worker
                .wait(inner)
                .unwrap_or_else(|e| e.into_inner());
            inner.idle -= 1;
        }

        match inner.todo.pop_front() {
            Some(job) => {
                drop(inner);
                if let Err(msg) = job(&mut state) {
                    let mut locked = shared.lock();
                    if locked.failure.is_none() {
                        locked.failure = Some(msg);
                    }
                }
                inner = shared.lock();
            }
            // queue closed and empty: terminate
            None => break,
        }
    }
    inner.threads -= 1;
    shared.wake_main.notify_one();
    drop(inner);
    // per-thread state is dropped here, on the worker's own thread
    drop(state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_jobs_all_run() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut q: JobQueue<()> = JobQueue::new(4, |_| ());
        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            q.add_job(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        }
        q.no_more_jobs();
        q.wait_on_jobs().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn test_wait_then_submit_more() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut q: JobQueue<()> = JobQueue::new(2, |_| ());
        for round in 0..3 {
            for _ in 0..10 {
                let counter = Arc::clone(&counter);
                q.add_job(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
            }
            q.wait_on_jobs().unwrap();
            assert_eq!(counter.load(Ordering::SeqCst), (round + 1) * 10);
        }
        q.shutdown().unwrap();
    }

    #[test]
    fn test_per_thread_state_is_distinct() {
        // every worker records its own index through its state object
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_factory = Arc::clone(&seen);
        let mut q: JobQueue<usize> = JobQueue::new(3, move |i| {
            seen_in_factory.lock().unwrap().push(i);
            i
        });
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..30 {
            let hits = Arc::clone(&hits);
            q.add_job(move |state| {
                assert!(*state < 3);
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        }
        q.shutdown().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 30);
        let mut indices = seen.lock().unwrap().clone();
        indices.sort_unstable();
        indices.dedup();
        // worker indices are unique
        assert_eq!(indices.len(), seen.lock().unwrap().len());
    }

    #[test]
    fn test_first_failure_is_reported() {
        let mut q: JobQueue<()> = JobQueue::new(2, |_| ());
        q.add_job(|_| Err("boom".to_string())).unwrap();
        for _ in 0..5 {
            q.add_job(|_| Ok(())).unwrap();
        }
        let err = q.shutdown().unwrap_err();
        assert!(matches!(err, JobQueueError::WorkerFailed(msg) if msg == "boom"));
    }

    #[test]
    fn test_closed_queue_rejects_jobs() {
        let mut q: JobQueue<()> = JobQueue::new(1, |_| ());
        q.add_job(|_| Ok(())).unwrap();
        q.no_more_jobs();
        assert!(matches!(q.add_job(|_| Ok(())), Err(JobQueueError::Closed)));
        q.wait_on_jobs().unwrap();
    }

    #[test]
    fn test_queue_with_no_jobs_shuts_down() {
        let q: JobQueue<()> = JobQueue::new(4, |_| ());
        q.shutdown().unwrap();
    }
}
