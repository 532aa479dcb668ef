use super::latch::ShardOutcome;
use std::time::Duration;

/// Shape of one run, reported when it starts and again when it finishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub service: String,
    pub operation: &'static str,
    pub shard_count: usize,
    /// Items per full shard
    pub shard_size: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFailed {
    pub service: String,
    pub operation: &'static str,
    pub detail: String,
}

/// Receiver of run lifecycle events
///
/// `run_started` precedes the blocking wait. It is followed by exactly one of
/// `run_finished` or `run_failed`; `shard_failed` fires once per failed shard
/// before `run_failed`.
pub trait DiagnosticSink: Send + Sync {
    fn run_started(&self, summary: &RunSummary);

    fn run_finished(&self, summary: &RunSummary, elapsed: Duration);

    fn run_failed(&self, failure: &RunFailed);

    fn shard_failed(&self, _summary: &RunSummary, _outcome: &ShardOutcome) {}
}

/// Default sink, writes every event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn run_started(&self, s: &RunSummary) {
        tracing::info!(
            service = %s.service,
            operation = s.operation,
            shards = s.shard_count,
            shard_size = s.shard_size,
            total = s.total,
            "{}-{} START (shard count: {}, shard size: {}, total count: {})",
            s.service,
            s.operation,
            s.shard_count,
            s.shard_size,
            s.total
        );
    }

    fn run_finished(&self, s: &RunSummary, elapsed: Duration) {
        let elapsed_ms = elapsed.as_millis() as u64;
        tracing::info!(
            service = %s.service,
            operation = s.operation,
            shards = s.shard_count,
            shard_size = s.shard_size,
            total = s.total,
            elapsed_ms,
            "{}-{} FINISH (shard count: {}, shard size: {}, total count: {}) in {}ms",
            s.service,
            s.operation,
            s.shard_count,
            s.shard_size,
            s.total,
            elapsed_ms
        );
    }

    fn run_failed(&self, f: &RunFailed) {
        tracing::error!(
            service = %f.service,
            operation = f.operation,
            "{}-{} ERROR: {}",
            f.service,
            f.operation,
            f.detail
        );
    }

    fn shard_failed(&self, s: &RunSummary, outcome: &ShardOutcome) {
        tracing::error!(
            service = %s.service,
            operation = s.operation,
            shard = outcome.index,
            "{}-{} shard {} did not complete: {:?}",
            s.service,
            s.operation,
            outcome.index,
            outcome.status
        );
    }
}
