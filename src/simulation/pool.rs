//! Lockstep worker pool for the per-step parallel phases
//!
//! A fixed set of worker threads is spawned once at construction and reused
//! for every step; a pair of barriers keeps them in lockstep with the
//! driving thread:
//!
//! - the driver publishes a job and arrives at the start barrier, releasing
//!   every worker,
//! - each worker runs the job with its own worker index,
//! - driver and workers meet again at the done barrier before `run` returns.
//!
//! The done barrier is what lets `run` accept non-`'static` jobs: by the
//! time it returns, no worker holds the job anymore, so closures may borrow
//! step-local state (the tree, the particle slices) for the duration of one
//! phase.
//!
//! A worker panic would leave the store partially updated, so it aborts the
//! process instead of unwinding past the barrier.

use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread::JoinHandle;

type Job = Arc<dyn Fn(usize) + Send + Sync>;

struct PoolShared {
    start: Barrier, // releases the workers into the published job
    done: Barrier, // collects them again before run() returns
    job: Mutex<Option<Job>>,
    live: AtomicBool, // cleared on drop to shut the workers down
}

pub struct WorkerPool {
    shared: Arc<PoolShared>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `num_threads` workers, parked on the start barrier.
    pub fn new(num_threads: usize) -> Self {
        let shared = Arc::new(PoolShared {
            start: Barrier::new(num_threads + 1),
            done: Barrier::new(num_threads + 1),
            job: Mutex::new(None),
            live: AtomicBool::new(true),
        });

        let handles = (0..num_threads)
            .map(|index| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("quadsim-worker-{index}"))
                    .spawn(move || worker_loop(index, shared))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self { shared, handles }
    }

    pub fn num_threads(&self) -> usize {
        self.handles.len()
    }

    /// Run `job(worker_index)` on every worker and block until all finish.
    ///
    /// The job may borrow from the caller's stack; it is dropped before this
    /// returns.
    pub fn run<'a, F>(&'a self, job: F)
    where
        F: Fn(usize) + Send + Sync + 'a,
    {
        let job: Arc<dyn Fn(usize) + Send + Sync + 'a> = Arc::new(job);
        // SAFETY: the job is published before the start barrier and every
        // clone is dropped before the done barrier releases this thread, so
        // no worker can observe it after 'a ends.
        let job: Job = unsafe {
            std::mem::transmute::<Arc<dyn Fn(usize) + Send + Sync + 'a>, Job>(job)
        };

        *self.shared.job.lock().unwrap() = Some(job);
        self.shared.start.wait();
        self.shared.done.wait();
        *self.shared.job.lock().unwrap() = None;
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shared.live.store(false, Ordering::Release);
        // Release the workers one last time; they observe the cleared flag
        // and exit before reaching the done barrier.
        self.shared.start.wait();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(index: usize, shared: Arc<PoolShared>) {
    loop {
        shared.start.wait();
        if !shared.live.load(Ordering::Acquire) {
            break;
        }

        let job = shared
            .job
            .lock()
            .unwrap()
            .clone()
            .expect("worker released without a job");

        if panic::catch_unwind(AssertUnwindSafe(|| job(index))).is_err() {
            log::error!("worker {index} panicked mid-phase, aborting");
            std::process::abort();
        }
        drop(job);

        shared.done.wait();
    }
}

/// Split `0..n` into `k` contiguous ranges whose lengths differ by at most
/// one. Every index is covered exactly once; trailing ranges may be empty
/// when there are more workers than particles.
pub fn partition(n: usize, k: usize) -> Vec<Range<usize>> {
    let base = n / k;
    let extra = n % k;
    let mut ranges = Vec::with_capacity(k);
    let mut start = 0;
    for worker in 0..k {
        let len = base + usize::from(worker < extra);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

/// Raw pointer that may cross into the workers.
///
/// Wrapping it is what lets a phase job hand each worker a mutable view of
/// its own partition; the caller is responsible for only dereferencing
/// disjoint ranges.
#[derive(Clone, Copy)]
pub(crate) struct SendPtr<T>(pub *mut T);

unsafe impl<T: Send> Send for SendPtr<T> {}
unsafe impl<T: Send> Sync for SendPtr<T> {}
