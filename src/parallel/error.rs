use thiserror::Error;

/// Errors raised by a [`WorkerPool`](super::pool::WorkerPool)
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("worker pool '{0}' has been shut down")]
    ShutDown(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Errors raised by a single coordinator run
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("{service}-{operation} interrupted while waiting for shards")]
    Interrupted {
        service: String,
        operation: &'static str,
    },

    #[error("{failed} of {total} shards failed")]
    ShardFailures { failed: usize, total: usize },

    #[error(transparent)]
    Pool(#[from] PoolError),
}
