//! Fixed-size worker pool with a bounded job queue.
//!
//! Every job is handed to one shared `execute` function on a worker thread.
//! [`ThreadPool::add`] never blocks: when more than `max_load` jobs are
//! already waiting, the job is handed back as [`Admission::Saturated`] so the
//! caller can answer it some other way.

use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use thiserror::Error;

/// A boxed closure, for pools that run arbitrary work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("attempted to add to a stopped pool")]
    Stopped,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Outcome of [`ThreadPool::add`].
#[derive(Debug)]
pub enum Admission<J> {
    Accepted,
    /// The queue is full; the job is returned untouched.
    Saturated(J),
}

impl<J> Admission<J> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted)
    }
}

struct Queue<J> {
    jobs: VecDeque<J>,
    stop: bool,
}

struct Shared<J> {
    queue: Mutex<Queue<J>>,
    available: Condvar,
    max_load: usize,
}

impl<J> Shared<J> {
    fn lock(&self) -> MutexGuard<'_, Queue<J>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct ThreadPool<J: Send + 'static> {
    shared: Arc<Shared<J>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    threads: usize,
}

impl ThreadPool<Task> {
    /// A pool whose jobs are plain closures.
    pub fn for_tasks(threads: usize, max_load: usize) -> Result<Self, PoolError> {
        Self::new(threads, max_load, |task: Task| task())
    }
}

impl<J: Send + 'static> ThreadPool<J> {
    /// Starts `threads` workers (`0` picks the available parallelism).
    pub fn new<F>(threads: usize, max_load: usize, execute: F) -> Result<Self, PoolError>
    where
        F: Fn(J) + Send + Sync + 'static,
    {
        let threads = match threads {
            0 => thread::available_parallelism().map_or(1, |n| n.get()),
            n => n,
        };

        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                jobs: VecDeque::new(),
                stop: false,
            }),
            available: Condvar::new(),
            max_load,
        });
        let execute = Arc::new(execute);

        let pool = Self {
            shared: Arc::clone(&shared),
            workers: Mutex::new(Vec::with_capacity(threads)),
            threads,
        };

        for id in 0..threads {
            let shared = Arc::clone(&shared);
            let execute = Arc::clone(&execute);
            let spawned = thread::Builder::new()
                .name(format!("warden-worker-{id}"))
                .spawn(move || worker_loop(&shared, &*execute));

            match spawned {
                Ok(handle) => pool.lock_workers().push(handle),
                Err(e) => {
                    pool.shutdown();
                    return Err(PoolError::Spawn(e));
                }
            }
        }

        Ok(pool)
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a job for the workers.
    ///
    /// Returns [`Admission::Saturated`] with the job when more than
    /// `max_load` jobs are already waiting, and [`PoolError::Stopped`] once
    /// [`shutdown`](ThreadPool::shutdown) has begun.
    pub fn add(&self, job: J) -> Result<Admission<J>, PoolError> {
        {
            let mut queue = self.shared.lock();
            if queue.stop {
                return Err(PoolError::Stopped);
            }
            if queue.jobs.len() > self.shared.max_load {
                return Ok(Admission::Saturated(job));
            }
            queue.jobs.push_back(job);
        }
        self.shared.available.notify_one();
        Ok(Admission::Accepted)
    }

    /// Jobs waiting for a worker.
    pub fn pending(&self) -> usize {
        self.shared.lock().jobs.len()
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn max_load(&self) -> usize {
        self.shared.max_load
    }

    /// Stops accepting jobs, lets the workers finish what is queued and joins
    /// them. Calling it again does nothing.
    pub fn shutdown(&self) {
        self.shared.lock().stop = true;
        self.shared.available.notify_all();

        let workers: Vec<_> = self.lock_workers().drain(..).collect();
        for worker in workers {
            if worker.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
    }
}

impl<J: Send + 'static> Drop for ThreadPool<J> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop<J>(shared: &Shared<J>, execute: &(dyn Fn(J) + Send + Sync)) {
    loop {
        let job = {
            let mut queue = shared.lock();
            loop {
                if let Some(job) = queue.jobs.pop_front() {
                    break job;
                }
                if queue.stop {
                    return;
                }
                queue = shared
                    .available
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        if panic::catch_unwind(AssertUnwindSafe(|| execute(job))).is_err() {
            tracing::error!(
                worker = thread::current().name().unwrap_or("worker"),
                "job panicked"
            );
        }
    }
}
