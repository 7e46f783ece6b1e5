//! Isolated compute sessions.
//!
//! A [`ComputeSession`] owns a dedicated thread pool sized to exactly `n`
//! workers and a fixed memory budget for staged data. Every trial acquires a
//! fresh session and tears it down before the next trial begins: reusing a
//! session across node counts would leak warm caches and scratch state into
//! later timings.
//!
//! Teardown runs on every exit path. [`ComputeSession::release`] is
//! idempotent and also invoked on drop, so early returns and panics cannot
//! leave worker threads behind.

use log::debug;

/// Default per-session memory budget for staged data (4 GiB).
pub const DEFAULT_MEMORY_LIMIT_BYTES: usize = 4 * 1024 * 1024 * 1024;

/// Session lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("cannot create an execution context with zero workers")]
    InvalidWorkerCount,

    #[error("failed to create an execution context for {workers} workers: {source}")]
    AcquisitionFailed {
        workers: usize,
        source: rayon::ThreadPoolBuildError,
    },

    #[error("staged data of {requested} bytes exceeds the session budget of {limit} bytes")]
    MemoryBudgetExceeded { requested: usize, limit: usize },

    #[error("session has already been released")]
    Released,
}

/// Sizing for one compute session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Number of logical workers (threads) in the session's pool.
    pub workers: usize,
    /// Upper bound on bytes admitted for staged data.
    pub memory_limit_bytes: usize,
}

impl SessionConfig {
    /// Config for `workers` workers with the default memory budget.
    pub fn for_workers(workers: usize) -> Self {
        Self {
            workers,
            memory_limit_bytes: DEFAULT_MEMORY_LIMIT_BYTES,
        }
    }
}

/// An isolated execution context with exactly `n` workers.
///
/// The session's pool is private: work enters through [`ComputeSession::run`]
/// and parallelizes across the session's workers only. Nothing outside the
/// session shares its threads.
pub struct ComputeSession {
    pool: Option<rayon::ThreadPool>,
    config: SessionConfig,
}

impl ComputeSession {
    /// Acquire a session with `workers` workers and the default budget.
    pub fn acquire(workers: usize) -> Result<Self, SessionError> {
        Self::acquire_with(SessionConfig::for_workers(workers))
    }

    /// Acquire a session with an explicit configuration.
    pub fn acquire_with(config: SessionConfig) -> Result<Self, SessionError> {
        if config.workers == 0 {
            return Err(SessionError::InvalidWorkerCount);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("clusterbench-worker-{i}"))
            .build()
            .map_err(|source| SessionError::AcquisitionFailed {
                workers: config.workers,
                source,
            })?;

        debug!("acquired compute session with {} workers", config.workers);
        Ok(Self {
            pool: Some(pool),
            config,
        })
    }

    /// Number of workers in this session.
    pub fn workers(&self) -> usize {
        self.config.workers
    }

    /// The session's memory budget in bytes.
    pub fn memory_limit(&self) -> usize {
        self.config.memory_limit_bytes
    }

    /// Check that `bytes` of staged data fit the session budget.
    ///
    /// Called before any data is copied into the session; a breach is an
    /// acquisition-class failure, not a fit failure.
    pub fn admit(&self, bytes: usize) -> Result<(), SessionError> {
        if self.pool.is_none() {
            return Err(SessionError::Released);
        }
        if bytes > self.config.memory_limit_bytes {
            return Err(SessionError::MemoryBudgetExceeded {
                requested: bytes,
                limit: self.config.memory_limit_bytes,
            });
        }
        Ok(())
    }

    /// Run `op` inside the session's pool.
    ///
    /// Rayon parallel iterators invoked by `op` use this session's workers.
    pub fn run<T, F>(&self, op: F) -> Result<T, SessionError>
    where
        T: Send,
        F: FnOnce() -> T + Send,
    {
        match &self.pool {
            Some(pool) => Ok(pool.install(op)),
            None => Err(SessionError::Released),
        }
    }

    /// Tear the session down, joining its worker threads.
    ///
    /// Idempotent: safe to call repeatedly and safe to call on a session
    /// whose acquisition partially failed. Also runs on drop.
    pub fn release(&mut self) {
        if self.pool.take().is_some() {
            debug!("released compute session ({} workers)", self.config.workers);
        }
    }

    /// Returns true once the session has been torn down.
    pub fn is_released(&self) -> bool {
        self.pool.is_none()
    }
}

impl Drop for ComputeSession {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_sizes_pool_to_worker_count() {
        let session = ComputeSession::acquire(3).unwrap();
        let threads = session.run(rayon::current_num_threads).unwrap();
        assert_eq!(threads, 3);
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(matches!(
            ComputeSession::acquire(0),
            Err(SessionError::InvalidWorkerCount)
        ));
    }

    #[test]
    fn release_is_idempotent() {
        let mut session = ComputeSession::acquire(1).unwrap();
        session.release();
        session.release();
        assert!(session.is_released());
        assert!(matches!(session.run(|| ()), Err(SessionError::Released)));
    }

    #[test]
    fn admit_enforces_memory_budget() {
        let session = ComputeSession::acquire_with(SessionConfig {
            workers: 1,
            memory_limit_bytes: 1024,
        })
        .unwrap();
        assert!(session.admit(1024).is_ok());
        assert!(matches!(
            session.admit(1025),
            Err(SessionError::MemoryBudgetExceeded { .. })
        ));
    }

    #[test]
    fn sequential_session_has_one_worker() {
        let session = ComputeSession::acquire(1).unwrap();
        let threads = session.run(rayon::current_num_threads).unwrap();
        assert_eq!(threads, 1);
    }
}
