//! Worker pool with fixed and elastic sizing
//!
//! Jobs travel over an unbounded crossbeam channel. A fixed pool spawns all of
//! its workers up front. An elastic pool hands a job to an idle worker when one
//! is registered and spawns a new worker otherwise; idle workers retire after
//! the idle timeout.

use super::error::PoolError;
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Idle period after which an elastic worker exits
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Unit of work accepted by the pool
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Sizing policy of a [`WorkerPool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    /// Constant number of persistent workers
    Fixed { size: usize },
    /// Workers created on demand and reclaimed after `idle_timeout`
    Elastic { idle_timeout: Duration },
}

impl Default for PoolKind {
    fn default() -> Self {
        PoolKind::Elastic {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// State shared between the pool handle and its workers
struct Shared {
    name: String,
    receiver: Receiver<Job>,
    next_id: AtomicUsize,
    /// Elastic workers waiting for a job that no submitter has claimed yet
    idle: AtomicUsize,
    live: AtomicUsize,
}

pub struct WorkerPool {
    kind: PoolKind,
    sender: Mutex<Option<Sender<Job>>>,
    shared: Arc<Shared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a pool of exactly `size` workers named `"{name}-{n}"` (at least one)
    pub fn fixed(size: usize, name: &str) -> Result<Self, PoolError> {
        let size = size.max(1);
        let pool = Self::with_kind(PoolKind::Fixed { size }, name);
        for _ in 0..size {
            pool.spawn_worker(None)?;
        }
        tracing::debug!("Started fixed pool '{}' with {} workers", name, size);
        Ok(pool)
    }

    /// Create a pool that grows on demand and reclaims workers idle for 60 seconds
    pub fn elastic(name: &str) -> Self {
        Self::elastic_with_idle_timeout(name, DEFAULT_IDLE_TIMEOUT)
    }

    pub fn elastic_with_idle_timeout(name: &str, idle_timeout: Duration) -> Self {
        Self::with_kind(PoolKind::Elastic { idle_timeout }, name)
    }

    /// Create a pool of the given kind
    pub fn new(kind: PoolKind, name: &str) -> Result<Self, PoolError> {
        match kind {
            PoolKind::Fixed { size } => Self::fixed(size, name),
            PoolKind::Elastic { idle_timeout } => {
                Ok(Self::elastic_with_idle_timeout(name, idle_timeout))
            }
        }
    }

    fn with_kind(kind: PoolKind, name: &str) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            kind,
            sender: Mutex::new(Some(sender)),
            shared: Arc::new(Shared {
                name: name.to_string(),
                receiver,
                next_id: AtomicUsize::new(0),
                idle: AtomicUsize::new(0),
                live: AtomicUsize::new(0),
            }),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    /// Number of worker threads currently alive
    pub fn live_workers(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    /// Number of elastic workers parked waiting for work
    pub fn idle_workers(&self) -> usize {
        self.shared.idle.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        lock(&self.sender).is_none()
    }

    /// Queue a job for asynchronous execution; never waits for the job to run
    pub fn submit<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = lock(&self.sender);
        let Some(sender) = sender.as_ref() else {
            return Err(PoolError::ShutDown(self.shared.name.clone()));
        };
        let job: Job = Box::new(job);

        match self.kind {
            PoolKind::Fixed { .. } => sender
                .send(job)
                .map_err(|_| PoolError::ShutDown(self.shared.name.clone())),
            PoolKind::Elastic { .. } => {
                if claim_idle(&self.shared.idle) {
                    sender
                        .send(job)
                        .map_err(|_| PoolError::ShutDown(self.shared.name.clone()))
                } else {
                    self.spawn_worker(Some(job))
                }
            }
        }
    }

    /// Cancel queued jobs, then close the queue so workers exit once their current job ends
    ///
    /// Returns the number of jobs that were dropped without running. Calling it
    /// again is a no-op that returns 0.
    pub fn shutdown(&self) -> usize {
        let Some(sender) = lock(&self.sender).take() else {
            return 0;
        };

        let mut cancelled = 0;
        while let Ok(job) = self.shared.receiver.try_recv() {
            drop(job);
            cancelled += 1;
        }
        drop(sender);

        tracing::debug!(
            "Shut down pool '{}' ({} queued jobs cancelled)",
            self.shared.name,
            cancelled
        );
        cancelled
    }

    /// Wait for every worker thread to exit. Only returns once [`shutdown`](Self::shutdown) was called.
    pub fn join(&self) {
        let handles: Vec<_> = lock(&self.handles).drain(..).collect();
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
    }

    fn spawn_worker(&self, first: Option<Job>) -> Result<(), PoolError> {
        let shared = self.shared.clone();
        let worker_name = format!(
            "{}-{}",
            shared.name,
            shared.next_id.fetch_add(1, Ordering::SeqCst)
        );
        let kind = self.kind;

        shared.live.fetch_add(1, Ordering::SeqCst);
        let spawned = thread::Builder::new()
            .name(worker_name)
            .spawn(move || {
                match kind {
                    PoolKind::Fixed { .. } => fixed_worker(&shared),
                    PoolKind::Elastic { idle_timeout } => {
                        elastic_worker(&shared, first, idle_timeout)
                    }
                }
                shared.live.fetch_sub(1, Ordering::SeqCst);
            });

        match spawned {
            Ok(handle) => {
                let mut handles = lock(&self.handles);
                handles.retain(|h| !h.is_finished());
                handles.push(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.live.fetch_sub(1, Ordering::SeqCst);
                Err(PoolError::Spawn(e))
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.shared.name)
            .field("kind", &self.kind)
            .field("live", &self.live_workers())
            .finish()
    }
}

fn fixed_worker(shared: &Shared) {
    while let Ok(job) = shared.receiver.recv() {
        run_job(job);
    }
}

fn elastic_worker(shared: &Shared, first: Option<Job>, idle_timeout: Duration) {
    let mut next = first;
    loop {
        if let Some(job) = next.take() {
            run_job(job);
        }

        shared.idle.fetch_add(1, Ordering::SeqCst);
        match shared.receiver.recv_timeout(idle_timeout) {
            Ok(job) => next = Some(job),
            Err(RecvTimeoutError::Timeout) => {
                if release_idle(&shared.idle) {
                    break;
                }
                // a submitter claimed this worker just before the timeout fired
                match shared.receiver.recv() {
                    Ok(job) => next = Some(job),
                    Err(_) => break,
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn run_job(job: Job) {
    if catch_unwind(AssertUnwindSafe(job)).is_err() {
        tracing::warn!(
            "Job panicked on worker {}",
            thread::current().name().unwrap_or("unnamed")
        );
    }
}

/// Take one idle worker for a job about to be queued
fn claim_idle(idle: &AtomicUsize) -> bool {
    idle.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Withdraw a timed-out worker from the idle set; fails if it was already claimed
fn release_idle(idle: &AtomicUsize) -> bool {
    claim_idle(idle)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
