use super::diagnostics::{DiagnosticSink, RunFailed, RunSummary, TracingSink};
use super::error::{CoordinatorError, PoolError};
use super::latch::{CompletionLatch, LatchError, ShardOutcome, ShardStatus};
use super::plan::{Shard, Strategy};
use super::pool::{PoolKind, WorkerPool};
use crossbeam::channel::{Receiver, Sender, bounded};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_SERVICE_NAME: &str = "DefaultService";

/// Business logic applied to one shard
///
/// Implemented for any `Fn(usize, &[T], &P) -> anyhow::Result<()>`.
pub trait ShardProcessor<T, P>: Send + Sync {
    fn process(&self, shard_index: usize, items: &[T], context: &P) -> anyhow::Result<()>;
}

impl<T, P, F> ShardProcessor<T, P> for F
where
    F: Fn(usize, &[T], &P) -> anyhow::Result<()> + Send + Sync,
{
    fn process(&self, shard_index: usize, items: &[T], context: &P) -> anyhow::Result<()> {
        self(shard_index, items, context)
    }
}

/// Construction-time settings of a [`Coordinator`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Used in diagnostics and as the worker thread name prefix
    pub service_name: String,
    pub pool: PoolKind,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            pool: PoolKind::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn named(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    pub fn with_pool(mut self, pool: PoolKind) -> Self {
        self.pool = pool;
        self
    }
}

/// Result of a run in which every shard completed
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    pub elapsed: Duration,
    /// One entry per shard, in completion order
    pub outcomes: Vec<ShardOutcome>,
}

/// Wakes a caller blocked in [`Coordinator::run`]
#[derive(Debug, Clone)]
pub struct Interrupter {
    sender: Sender<()>,
}

impl Interrupter {
    pub fn interrupt(&self) {
        // a pending signal is already enough
        let _ = self.sender.try_send(());
    }
}

/// Splits a slice into shards, runs them on its own worker pool and waits for all of them
pub struct Coordinator {
    config: CoordinatorConfig,
    pool: WorkerPool,
    sink: Arc<dyn DiagnosticSink>,
    interrupt_tx: Sender<()>,
    interrupt_rx: Receiver<()>,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Result<Self, PoolError> {
        let pool = WorkerPool::new(config.pool, &config.service_name)?;
        Ok(Self::with_pool(config, pool))
    }

    /// `DefaultService` on an elastic pool
    pub fn with_defaults() -> Self {
        Self::named(DEFAULT_SERVICE_NAME)
    }

    /// Named service on an elastic pool
    pub fn named(service_name: &str) -> Self {
        let config = CoordinatorConfig::named(service_name);
        let pool = WorkerPool::elastic(service_name);
        Self::with_pool(config, pool)
    }

    /// Named service on a pool of `threads` persistent workers
    pub fn fixed(service_name: &str, threads: usize) -> Result<Self, PoolError> {
        Self::new(CoordinatorConfig::named(service_name).with_pool(PoolKind::Fixed { size: threads }))
    }

    fn with_pool(config: CoordinatorConfig, pool: WorkerPool) -> Self {
        let (interrupt_tx, interrupt_rx) = bounded(1);
        Self {
            config,
            pool,
            sink: Arc::new(TracingSink),
            interrupt_tx,
            interrupt_rx,
        }
    }

    /// Replace the default tracing sink
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn service_name(&self) -> &str {
        &self.config.service_name
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            sender: self.interrupt_tx.clone(),
        }
    }

    /// Suggested thread count for [`process_by_threads`](Self::process_by_threads)
    pub fn recommended_threads() -> usize {
        num_cpus::get()
    }

    /// Run with fixed-size shards (at least 2000 items each)
    pub fn process_by_shard_size<T, P, C>(
        &self,
        items: &Arc<[T]>,
        processor: &Arc<C>,
        shard_size: usize,
        context: &Arc<P>,
    ) -> bool
    where
        T: Send + Sync + 'static,
        P: Send + Sync + 'static,
        C: ShardProcessor<T, P> + 'static,
    {
        self.run(items, processor, shard_size, context, Strategy::Size)
    }

    /// Run with `threads` even shards (1..=20, single shard below 2000 items)
    pub fn process_by_threads<T, P, C>(
        &self,
        items: &Arc<[T]>,
        processor: &Arc<C>,
        threads: usize,
        context: &Arc<P>,
    ) -> bool
    where
        T: Send + Sync + 'static,
        P: Send + Sync + 'static,
        C: ShardProcessor<T, P> + 'static,
    {
        self.run(items, processor, threads, context, Strategy::Threads)
    }

    /// Process every shard and report whether all of them completed
    pub fn run<T, P, C>(
        &self,
        items: &Arc<[T]>,
        processor: &Arc<C>,
        param: usize,
        context: &Arc<P>,
        strategy: Strategy,
    ) -> bool
    where
        T: Send + Sync + 'static,
        P: Send + Sync + 'static,
        C: ShardProcessor<T, P> + 'static,
    {
        self.execute(items, processor, param, context, strategy)
            .is_ok()
    }

    /// Process every shard and return the detailed outcome
    ///
    /// Blocks until every shard has reported or the run is interrupted. An
    /// interrupted run does not stop shards that are already executing.
    pub fn execute<T, P, C>(
        &self,
        items: &Arc<[T]>,
        processor: &Arc<C>,
        param: usize,
        context: &Arc<P>,
        strategy: Strategy,
    ) -> Result<RunReport, CoordinatorError>
    where
        T: Send + Sync + 'static,
        P: Send + Sync + 'static,
        C: ShardProcessor<T, P> + 'static,
    {
        let Some(plan) = strategy.plan(items.len(), param) else {
            return Err(CoordinatorError::InvalidInput("sequence is empty"));
        };
        let start_time = Instant::now();
        let summary = RunSummary {
            service: self.config.service_name.clone(),
            operation: strategy.operation(),
            shard_count: plan.shard_count(),
            shard_size: plan.shard_size,
            total: plan.total,
        };

        // discard interrupts raised while nobody was waiting
        while self.interrupt_rx.try_recv().is_ok() {}

        let latch = CompletionLatch::new(plan.shard_count());
        for shard in plan.shards.iter().copied() {
            let guard = latch.guard(shard.index);
            let items = items.clone();
            let processor = processor.clone();
            let context = context.clone();

            let submitted = self.pool.submit(move || {
                let status = process_shard(&*processor, shard, &items[..], &*context);
                guard.finish(status);
            });
            if let Err(e) = submitted {
                self.sink.run_failed(&RunFailed {
                    service: summary.service.clone(),
                    operation: summary.operation,
                    detail: e.to_string(),
                });
                return Err(e.into());
            }
        }

        self.sink.run_started(&summary);

        match latch.wait(Some(&self.interrupt_rx)) {
            Ok(outcomes) => self.finish(summary, outcomes, start_time.elapsed()),
            Err(LatchError::Interrupted { outstanding }) => {
                Err(self.interrupted(&summary, format!("interrupted with {outstanding} shards outstanding")))
            }
            Err(LatchError::Abandoned { outstanding }) => {
                Err(self.interrupted(&summary, format!("{outstanding} shards never reported")))
            }
        }
    }

    fn finish(
        &self,
        summary: RunSummary,
        outcomes: Vec<ShardOutcome>,
        elapsed: Duration,
    ) -> Result<RunReport, CoordinatorError> {
        let failed: Vec<&ShardOutcome> = outcomes
            .iter()
            .filter(|o| !o.status.is_success())
            .collect();

        if failed.is_empty() {
            self.sink.run_finished(&summary, elapsed);
            return Ok(RunReport {
                summary,
                elapsed,
                outcomes,
            });
        }

        for outcome in &failed {
            self.sink.shard_failed(&summary, outcome);
        }
        self.sink.run_failed(&RunFailed {
            service: summary.service.clone(),
            operation: summary.operation,
            detail: format!("{} of {} shards failed", failed.len(), summary.shard_count),
        });
        Err(CoordinatorError::ShardFailures {
            failed: failed.len(),
            total: summary.shard_count,
        })
    }

    fn interrupted(&self, summary: &RunSummary, detail: String) -> CoordinatorError {
        self.sink.run_failed(&RunFailed {
            service: summary.service.clone(),
            operation: summary.operation,
            detail,
        });
        CoordinatorError::Interrupted {
            service: summary.service.clone(),
            operation: summary.operation,
        }
    }

    /// Shut the worker pool down; later runs fail with [`PoolError::ShutDown`]
    pub fn close(&self) {
        self.pool.shutdown();
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .finish()
    }
}

fn process_shard<T, P, C>(processor: &C, shard: Shard, items: &[T], context: &P) -> ShardStatus
where
    C: ShardProcessor<T, P> + ?Sized,
{
    let result = catch_unwind(AssertUnwindSafe(|| {
        processor.process(shard.index, &items[shard.range()], context)
    }));
    match result {
        Ok(Ok(())) => ShardStatus::Completed,
        Ok(Err(e)) => ShardStatus::Failed(format!("{e:#}")),
        Err(payload) => ShardStatus::Panicked(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl DiagnosticSink for RecordingSink {
        fn run_started(&self, s: &RunSummary) {
            self.events.lock().unwrap().push(format!(
                "start {} {} {} {}",
                s.operation, s.shard_count, s.shard_size, s.total
            ));
        }

        fn run_finished(&self, s: &RunSummary, _elapsed: Duration) {
            self.events
                .lock()
                .unwrap()
                .push(format!("finish {} {}", s.shard_count, s.total));
        }

        fn run_failed(&self, f: &RunFailed) {
            self.events.lock().unwrap().push(format!("failed {}", f.operation));
        }

        fn shard_failed(&self, _s: &RunSummary, outcome: &ShardOutcome) {
            self.events
                .lock()
                .unwrap()
                .push(format!("shard_failed {}", outcome.index));
        }
    }

    type Calls = Arc<Mutex<Vec<(usize, usize, usize)>>>;

    /// Processor recording (index, first item, len) of every shard it sees
    fn recorder(calls: &Calls) -> Arc<impl ShardProcessor<usize, ()> + use<>> {
        let calls = calls.clone();
        Arc::new(move |index: usize, items: &[usize], _ctx: &()| -> anyhow::Result<()> {
            calls.lock().unwrap().push((index, items[0], items.len()));
            Ok(())
        })
    }

    fn numbers(total: usize) -> Arc<[usize]> {
        (0..total).collect::<Vec<_>>().into()
    }

    fn coordinator(sink: &Arc<RecordingSink>) -> Coordinator {
        Coordinator::named("test").with_sink(sink.clone())
    }

    #[test]
    fn test_size_driven_run_processes_every_shard() {
        let sink = Arc::new(RecordingSink::default());
        let calls = Calls::default();
        let coordinator = coordinator(&sink);

        let ok = coordinator.process_by_shard_size(&numbers(5000), &recorder(&calls), 2000, &Arc::new(()));
        assert!(ok);

        let mut seen = calls.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![(0, 0, 2000), (1, 2000, 2000), (2, 4000, 1000)]);
        assert_eq!(
            sink.events(),
            vec!["start process_by_shard_size 3 2000 5000", "finish 3 5000"]
        );
    }

    #[test]
    fn test_count_driven_small_input_runs_single_shard() {
        let sink = Arc::new(RecordingSink::default());
        let calls = Calls::default();
        let coordinator = coordinator(&sink);

        assert!(coordinator.process_by_threads(&numbers(100), &recorder(&calls), 4, &Arc::new(())));
        assert_eq!(*calls.lock().unwrap(), vec![(0, 0, 100)]);
    }

    #[test]
    fn test_count_driven_run_with_remainder_shard() {
        let sink = Arc::new(RecordingSink::default());
        let calls = Calls::default();
        let coordinator = coordinator(&sink);

        let report = coordinator
            .execute(&numbers(10_000), &recorder(&calls), 3, &Arc::new(()), Strategy::Threads)
            .unwrap();
        assert_eq!(report.summary.shard_count, 4);
        assert_eq!(report.summary.shard_size, 3333);

        let mut seen = calls.lock().unwrap().clone();
        seen.sort();
        assert_eq!(
            seen,
            vec![(0, 0, 3333), (1, 3333, 3333), (2, 6666, 3333), (3, 9999, 1)]
        );
    }

    #[test]
    fn test_empty_sequence_is_rejected_without_diagnostics() {
        let sink = Arc::new(RecordingSink::default());
        let calls = Calls::default();
        let coordinator = coordinator(&sink);

        let empty: Arc<[usize]> = Vec::new().into();
        assert!(!coordinator.process_by_shard_size(&empty, &recorder(&calls), 2000, &Arc::new(())));
        assert!(matches!(
            coordinator.execute(&empty, &recorder(&calls), 4, &Arc::new(()), Strategy::Threads),
            Err(CoordinatorError::InvalidInput(_))
        ));
        assert!(calls.lock().unwrap().is_empty());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_repeated_runs_report_the_same_totals() {
        let sink = Arc::new(RecordingSink::default());
        let counter = Arc::new(AtomicUsize::new(0));
        let coordinator = coordinator(&sink);

        let processor = {
            let counter = counter.clone();
            Arc::new(move |_: usize, items: &[usize], _: &()| -> anyhow::Result<()> {
                counter.fetch_add(items.len(), Ordering::SeqCst);
                Ok(())
            })
        };
        let items = numbers(7000);

        let first = coordinator.execute(&items, &processor, 2000, &Arc::new(()), Strategy::Size).unwrap();
        let second = coordinator.execute(&items, &processor, 2000, &Arc::new(()), Strategy::Size).unwrap();

        assert_eq!(first.summary, second.summary);
        assert_eq!(first.outcomes.len(), 4);
        assert_eq!(counter.load(Ordering::SeqCst), 14_000);
    }

    #[test]
    fn test_context_reaches_every_shard() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let processor = {
            let seen = seen.clone();
            Arc::new(move |_: usize, _: &[usize], ctx: &String| -> anyhow::Result<()> {
                seen.lock().unwrap().push(ctx.clone());
                Ok(())
            })
        };
        let coordinator = Coordinator::with_defaults();

        assert!(coordinator.process_by_threads(&numbers(6000), &processor, 3, &Arc::new("external".to_string())));
        assert_eq!(*seen.lock().unwrap(), vec!["external"; 3]);
    }

    #[test]
    fn test_failing_shard_fails_the_run_without_blocking() {
        let sink = Arc::new(RecordingSink::default());
        let completed = Arc::new(AtomicUsize::new(0));
        let coordinator = coordinator(&sink);

        let processor = {
            let completed = completed.clone();
            Arc::new(move |index: usize, _: &[usize], _: &()| -> anyhow::Result<()> {
                if index == 1 {
                    anyhow::bail!("bad shard");
                }
                completed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        };

        let result = coordinator.execute(&numbers(6000), &processor, 2000, &Arc::new(()), Strategy::Size);
        assert!(matches!(
            result,
            Err(CoordinatorError::ShardFailures { failed: 1, total: 3 })
        ));
        assert_eq!(completed.load(Ordering::SeqCst), 2);

        let events = sink.events();
        assert!(events.contains(&"shard_failed 1".to_string()));
        assert_eq!(events.last().unwrap(), "failed process_by_shard_size");
    }

    #[test]
    fn test_panicking_shard_fails_the_run_without_blocking() {
        let coordinator = Coordinator::fixed("panicky", 2).unwrap();
        let processor = Arc::new(|index: usize, _: &[usize], _: &()| -> anyhow::Result<()> {
            if index == 0 {
                panic!("shard {index} exploded");
            }
            Ok(())
        });

        assert!(!coordinator.process_by_threads(&numbers(4000), &processor, 2, &Arc::new(())));
        // pool survives the panic
        let calls = Calls::default();
        assert!(coordinator.process_by_threads(&numbers(4000), &recorder(&calls), 2, &Arc::new(())));
    }

    #[test]
    fn test_interrupt_aborts_the_wait() {
        let sink = Arc::new(RecordingSink::default());
        let coordinator = coordinator(&sink);
        let (started_tx, started_rx) = bounded::<()>(1);
        let (release_tx, release_rx) = bounded::<()>(0);

        let processor = Arc::new(move |_: usize, _: &[usize], _: &()| -> anyhow::Result<()> {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
            Ok(())
        });

        let interrupter = coordinator.interrupter();
        let watcher = thread::spawn(move || {
            started_rx.recv().unwrap();
            interrupter.interrupt();
        });

        let result = coordinator.execute(&numbers(10), &processor, 1, &Arc::new(()), Strategy::Threads);
        watcher.join().unwrap();
        assert!(matches!(
            result,
            Err(CoordinatorError::Interrupted { ref service, .. }) if service == "test"
        ));
        assert_eq!(
            sink.events(),
            vec!["start process_by_threads 1 10 10", "failed process_by_threads"]
        );
        drop(release_tx);
    }

    #[test]
    fn test_stale_interrupt_does_not_abort_next_run() {
        let coordinator = Coordinator::with_defaults();
        coordinator.interrupter().interrupt();

        let calls = Calls::default();
        assert!(coordinator.process_by_shard_size(&numbers(10), &recorder(&calls), 1, &Arc::new(())));
    }

    #[test]
    fn test_fixed_pool_names_workers_after_service() {
        let names = Arc::new(Mutex::new(Vec::new()));
        let processor = {
            let names = names.clone();
            Arc::new(move |_: usize, _: &[usize], _: &()| -> anyhow::Result<()> {
                let name = thread::current().name().unwrap_or_default().to_string();
                names.lock().unwrap().push(name);
                Ok(())
            })
        };
        let coordinator = Coordinator::fixed("billing", 2).unwrap();
        assert_eq!(coordinator.pool().live_workers(), 2);

        assert!(coordinator.process_by_threads(&numbers(8000), &processor, 4, &Arc::new(())));
        let names = names.lock().unwrap();
        assert_eq!(names.len(), 4);
        assert!(names.iter().all(|n| n == "billing-0" || n == "billing-1"));
    }

    #[test]
    fn test_run_after_close_fails() {
        let sink = Arc::new(RecordingSink::default());
        let calls = Calls::default();
        let coordinator = coordinator(&sink);
        coordinator.close();
        coordinator.close();

        let result = coordinator.execute(&numbers(10), &recorder(&calls), 1, &Arc::new(()), Strategy::Size);
        assert!(matches!(result, Err(CoordinatorError::Pool(PoolError::ShutDown(_)))));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_recommended_threads_is_positive() {
        assert!(Coordinator::recommended_threads() >= 1);
    }
}
