//! Multi-worker pool.
//!
//! ```text
//!              ┌────────────── run queue (unbounded) ──────────────┐
//!  evaluate ──▶│ root threads, yielded threads, woken threads      │
//!              └───────────────────────────────────────────────────┘
//!                     │                │                │
//!                     ▼                ▼                ▼
//!                ┌─────────┐      ┌─────────┐      ┌─────────┐
//!                │Worker 0 │      │Worker 1 │  ... │Worker N │   one rayon thread each
//!                └─────────┘      └─────────┘      └─────────┘
//!                     ▲ idle: take a spark
//!              ┌──────┴─────── spark queue (bounded by spark budget) ┐
//!              └─────────────────────────────────────────────────────┘
//! ```
//!
//! A thread that blocks on a thunk is parked on the thunk itself and comes
//! back through the run queue when the update mechanism wakes it.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded, unbounded};
use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::{
    options::RuntimeOptions,
    runtime::{
        closure::Closure,
        context::ContextStats,
        error::RuntimeError,
        scheduler::{Scheduler, Worker},
        thread::{LogicalThread, ThreadId},
        vm::Outcome,
    },
};

const IDLE_POLL: Duration = Duration::from_millis(2);

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to start worker threads: {0}")]
    Build(#[from] ThreadPoolBuildError),
}

/// Counters describing one `run` of the pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolCounters {
    pub workers: usize,
    pub workers_retired: usize,
    pub sparks_accepted: u64,
    pub sparks_dropped: u64,
    pub sparks_run: u64,
    pub threads_requeued: u64,
}

#[derive(Debug)]
pub struct PoolReport {
    pub results: Vec<Result<Closure, RuntimeError>>,
    pub stats: ContextStats,
    pub counters: PoolCounters,
}

pub struct WorkerPool {
    options: RuntimeOptions,
    threads: ThreadPool,
}

impl WorkerPool {
    pub fn new(options: RuntimeOptions) -> Result<Self, PoolError> {
        let threads = ThreadPoolBuilder::new()
            .num_threads(options.worker_count.max(1))
            .thread_name(|i| format!("graft-worker-{}", i))
            .build()?;
        Ok(Self { options, threads })
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    pub fn worker_count(&self) -> usize {
        self.threads.current_num_threads()
    }

    /// Evaluates each computation to weak head normal form, in parallel.
    ///
    /// Results come back in input order.
    pub fn evaluate(&self, computations: Vec<Closure>) -> Vec<Result<Closure, RuntimeError>> {
        self.run(computations).results
    }

    pub fn run(&self, computations: Vec<Closure>) -> PoolReport {
        let workers = self.worker_count();
        let shared = Arc::new(Shared::new(self.options.clone(), computations.len(), workers));
        {
            let mut slots = shared.slots.lock();
            for (index, computation) in computations.into_iter().enumerate() {
                let thread = LogicalThread::new(computation, self.options.stack_limit);
                slots.insert(thread.id, index);
                let _ = shared.run_tx.send(thread);
            }
        }

        if shared.remaining.load(Ordering::Acquire) > 0 {
            self.threads.broadcast(|broadcast| worker_loop(broadcast.index(), &shared));
        }
        shared.drain();

        let results = std::mem::take(&mut *shared.results.lock())
            .into_iter()
            .map(|slot| slot.unwrap_or(Err(RuntimeError::Interrupted)))
            .collect();
        let counters = PoolCounters {
            workers,
            workers_retired: shared.retired.load(Ordering::Relaxed),
            sparks_accepted: shared.sparks_accepted.load(Ordering::Relaxed),
            sparks_dropped: shared.sparks_dropped.load(Ordering::Relaxed),
            sparks_run: shared.sparks_run.load(Ordering::Relaxed),
            threads_requeued: shared.counters_requeued.load(Ordering::Relaxed),
        };
        let stats = *shared.stats.lock();
        PoolReport {
            results,
            stats,
            counters,
        }
    }
}

struct Shared {
    options: RuntimeOptions,
    run_tx: Sender<LogicalThread>,
    run_rx: Receiver<LogicalThread>,
    spark_tx: Sender<Closure>,
    spark_rx: Receiver<Closure>,
    /// Root thread → index of its result.
    slots: Mutex<HashMap<ThreadId, usize>>,
    results: Mutex<Vec<Option<Result<Closure, RuntimeError>>>>,
    remaining: AtomicUsize,
    alive: AtomicUsize,
    retired: AtomicUsize,
    stats: Mutex<ContextStats>,
    sparks_accepted: AtomicU64,
    sparks_dropped: AtomicU64,
    sparks_run: AtomicU64,
    counters_requeued: AtomicU64,
}

impl Shared {
    fn new(options: RuntimeOptions, roots: usize, workers: usize) -> Self {
        let (run_tx, run_rx) = unbounded();
        let (spark_tx, spark_rx) = bounded(options.spark_budget.max(1));
        Self {
            options,
            run_tx,
            run_rx,
            spark_tx,
            spark_rx,
            slots: Mutex::new(HashMap::with_capacity(roots)),
            results: Mutex::new((0..roots).map(|_| None).collect()),
            remaining: AtomicUsize::new(roots),
            alive: AtomicUsize::new(workers),
            retired: AtomicUsize::new(0),
            stats: Mutex::new(ContextStats::default()),
            sparks_accepted: AtomicU64::new(0),
            sparks_dropped: AtomicU64::new(0),
            sparks_run: AtomicU64::new(0),
            counters_requeued: AtomicU64::new(0),
        }
    }

    fn tracing(&self) -> bool {
        self.options.debug.scheduler
    }

    fn requeue(&self, thread: LogicalThread) {
        self.counters_requeued.fetch_add(1, Ordering::Relaxed);
        // The receiver lives in `self`, so the channel cannot be disconnected.
        let _ = self.run_tx.send(thread);
    }

    fn finish(&self, id: ThreadId, result: Result<Closure, RuntimeError>) {
        let Some(index) = self.slots.lock().remove(&id) else {
            if let Err(err) = result {
                debug!(target: "graft::scheduler", thread = %id, error = %err, "spark halted");
            }
            return;
        };
        self.results.lock()[index] = Some(result);
        self.remaining.fetch_sub(1, Ordering::AcqRel);
    }

    /// Abandons threads still queued after every root finished, typically
    /// sparks, so no thunk stays blackholed by a thread that will never run.
    fn drain(&self) {
        let mut leftover: Vec<LogicalThread> = self.run_rx.try_iter().collect();
        if self.tracing() && !leftover.is_empty() {
            debug!(target: "graft::scheduler", count = leftover.len(), "abandoning leftover threads");
        }
        while let Some(thread) = leftover.pop() {
            leftover.extend(thread.abandon());
        }
    }

    fn done(&self) -> bool {
        self.remaining.load(Ordering::Acquire) == 0
    }

    /// Retires the calling worker unless it is the last one alive.
    fn try_retire(&self) -> bool {
        let retired = self
            .alive
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n > 1).then(|| n - 1))
            .is_ok();
        if retired {
            self.retired.fetch_add(1, Ordering::Relaxed);
        }
        retired
    }
}

struct PoolScheduler {
    shared: Arc<Shared>,
}

impl Scheduler for PoolScheduler {
    fn wake(&self, _thunk: &Closure, released: Vec<LogicalThread>) {
        if released.is_empty() {
            return;
        }
        if self.shared.tracing() {
            debug!(target: "graft::scheduler", count = released.len(), "waking blocked threads");
        }
        for thread in released {
            self.shared.requeue(thread);
        }
    }

    fn spark(&self, thunk: Closure) -> bool {
        if thunk.is_value() {
            return false;
        }
        match self.shared.spark_tx.try_send(thunk) {
            Ok(()) => {
                self.shared.sparks_accepted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.shared.sparks_dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    fn should_yield(&self) -> bool {
        !self.shared.run_rx.is_empty()
    }
}

fn worker_loop(index: usize, shared: &Arc<Shared>) {
    let scheduler: Arc<dyn Scheduler> = Arc::new(PoolScheduler {
        shared: Arc::clone(shared),
    });
    let mut worker = Worker::new(index, &shared.options, scheduler);
    let idle_timeout = Duration::from_millis(shared.options.idle_timeout_ms);
    let mut idle_since = Instant::now();

    if shared.tracing() {
        debug!(target: "graft::scheduler", worker = index, "worker started");
    }

    while !shared.done() {
        let thread = match shared.run_rx.recv_timeout(IDLE_POLL) {
            Ok(thread) => thread,
            Err(RecvTimeoutError::Timeout) => match shared.spark_rx.try_recv() {
                Ok(spark) if !spark.is_value() => {
                    shared.sparks_run.fetch_add(1, Ordering::Relaxed);
                    if shared.tracing() {
                        debug!(target: "graft::scheduler", worker = index, "running spark");
                    }
                    worker.spawn(spark)
                }
                Ok(_) => continue,
                Err(_) => {
                    if !idle_timeout.is_zero() && idle_since.elapsed() >= idle_timeout && shared.try_retire() {
                        if shared.tracing() {
                            debug!(target: "graft::scheduler", worker = index, "idle worker retiring");
                        }
                        break;
                    }
                    continue;
                }
            },
            Err(RecvTimeoutError::Disconnected) => break,
        };

        run_one(&mut worker, shared, thread);
        idle_since = Instant::now();
    }

    shared.stats.lock().merge(&worker.stats());
}

fn run_one(worker: &mut Worker, shared: &Shared, thread: LogicalThread) {
    let id = thread.id;
    match worker.run_slice(thread) {
        Ok(Outcome::Finished(value)) => shared.finish(id, Ok(value)),
        Ok(Outcome::Yielded(thread)) => shared.requeue(thread),
        Ok(Outcome::Blocked { thread, on }) => {
            if shared.tracing() {
                debug!(target: "graft::scheduler", worker = worker.id(), thread = %id, "parking on thunk");
            }
            match on.as_thunk() {
                Some(cell) => {
                    if let Err(thread) = cell.park(thread) {
                        shared.requeue(thread);
                    }
                }
                None => shared.requeue(thread),
            }
        }
        Err(err) => shared.finish(id, Err(err)),
    }
}
