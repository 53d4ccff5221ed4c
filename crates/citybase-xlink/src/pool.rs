//! Bounded worker pool.
//!
//! The splitter is the single producer; workers block on storage I/O, never
//! the orchestrating thread. `join` is the synchronization barrier used
//! after each phase and after each pass of a recursive category. A
//! panicking job is contained so the pool keeps its capacity and `join`
//! cannot deadlock on a lost worker.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct PoolState {
    queue: VecDeque<Job>,
    active: usize,
    shutdown: bool,
}

#[derive(Default)]
struct PoolShared {
    state: Mutex<PoolState>,
    work_available: Condvar,
    all_idle: Condvar,
}

pub struct WorkerPool {
    shared: Arc<PoolShared>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Self {
        let shared = Arc::new(PoolShared::default());
        let handles = (0..threads.max(1))
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || worker_loop(shared))
            })
            .collect();
        Self { shared, handles }
    }

    pub fn submit(&self, job: impl FnOnce() + Send + 'static) {
        let mut state = self.shared.state.lock();
        state.queue.push_back(Box::new(job));
        drop(state);
        self.shared.work_available.notify_one();
    }

    /// Block until every submitted job has finished.
    pub fn join(&self) {
        let mut state = self.shared.state.lock();
        while !state.queue.is_empty() || state.active > 0 {
            self.shared.all_idle.wait(&mut state);
        }
    }

    /// Run the queue dry, then stop every worker.
    pub fn drain_and_stop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
        }
        self.shared.work_available.notify_all();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.drain_and_stop();
    }
}

fn worker_loop(shared: Arc<PoolShared>) {
    loop {
        let job = {
            let mut state = shared.state.lock();
            loop {
                if let Some(job) = state.queue.pop_front() {
                    state.active += 1;
                    break job;
                }
                if state.shutdown {
                    return;
                }
                shared.work_available.wait(&mut state);
            }
        };

        let _ = catch_unwind(AssertUnwindSafe(job));

        let mut state = shared.state.lock();
        state.active -= 1;
        if state.active == 0 && state.queue.is_empty() {
            shared.all_idle.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn join_waits_for_all_jobs() {
        let pool = WorkerPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..64 {
            let counter = counter.clone();
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.join();

        assert_eq!(counter.load(Ordering::SeqCst), 64);
    }

    #[test]
    fn a_panicking_job_does_not_wedge_the_pool() {
        let pool = WorkerPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));

        pool.submit(|| panic!("boom"));
        for _ in 0..8 {
            let counter = counter.clone();
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.join();

        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn join_on_an_idle_pool_returns_immediately() {
        let pool = WorkerPool::new(1);
        pool.join();
    }
}
