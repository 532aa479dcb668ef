//! Per-run completion latch
//!
//! Every work unit owns a [`CompletionGuard`]. Dropping the guard reports the
//! shard's outcome exactly once, so a shard that errors, panics, or is dropped
//! unstarted by a pool shutdown still releases the waiting caller.

use crossbeam::channel::{Receiver, Sender, never, unbounded};
use std::thread;

/// How a single shard ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardStatus {
    Completed,
    Failed(String),
    Panicked(String),
    /// The work unit was dropped before it ran
    Cancelled,
}

impl ShardStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ShardStatus::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardOutcome {
    pub index: usize,
    pub status: ShardStatus,
}

/// Why [`CompletionLatch::wait`] returned before every shard reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchError {
    Interrupted { outstanding: usize },
    /// Every guard is gone but fewer outcomes than expected arrived
    Abandoned { outstanding: usize },
}

pub struct CompletionLatch {
    outstanding: usize,
    sender: Sender<ShardOutcome>,
    receiver: Receiver<ShardOutcome>,
}

impl CompletionLatch {
    pub fn new(count: usize) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            outstanding: count,
            sender,
            receiver,
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Guard that reports shard `index` when dropped
    pub fn guard(&self, index: usize) -> CompletionGuard {
        CompletionGuard {
            index,
            sender: self.sender.clone(),
            status: None,
        }
    }

    /// Block until every shard reported, or until `interrupt` receives a signal
    ///
    /// Outcomes are returned in completion order.
    pub fn wait(self, interrupt: Option<&Receiver<()>>) -> Result<Vec<ShardOutcome>, LatchError> {
        let CompletionLatch {
            mut outstanding,
            sender,
            receiver,
        } = self;
        drop(sender);

        let never = never();
        let interrupt = interrupt.unwrap_or(&never);
        let mut outcomes = Vec::with_capacity(outstanding);

        while outstanding > 0 {
            crossbeam::select! {
                recv(receiver) -> msg => match msg {
                    Ok(outcome) => {
                        outcomes.push(outcome);
                        outstanding -= 1;
                    }
                    Err(_) => return Err(LatchError::Abandoned { outstanding }),
                },
                recv(interrupt) -> _ => return Err(LatchError::Interrupted { outstanding }),
            }
        }
        Ok(outcomes)
    }
}

/// Reports one shard's outcome to its latch on drop
pub struct CompletionGuard {
    index: usize,
    sender: Sender<ShardOutcome>,
    status: Option<ShardStatus>,
}

impl CompletionGuard {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Record the outcome and release the guard
    pub fn finish(mut self, status: ShardStatus) {
        self.status = Some(status);
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let status = self.status.take().unwrap_or_else(|| {
            if thread::panicking() {
                ShardStatus::Panicked("work unit unwound".to_string())
            } else {
                ShardStatus::Cancelled
            }
        });
        // the latch may already have given up on this run
        let _ = self.sender.send(ShardOutcome {
            index: self.index,
            status,
        });
    }
}
