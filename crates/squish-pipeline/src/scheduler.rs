//! Bounded task scheduler using a tokio semaphore

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

/// Scheduler errors outside any single task's failure domain
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Capacity must be at least one
    #[error("Concurrency limit must be at least 1, got {0}")]
    InvalidLimit(usize),

    /// A task panicked or was cancelled
    #[error("Task did not complete: {0}")]
    TaskPanicked(String),

    /// Capacity could no longer be acquired
    #[error("Scheduler capacity closed")]
    Closed,
}

/// Runs tasks with at most `limit` in flight.
///
/// Tasks are admitted in submission order and may finish in any order.
/// The scheduler never times out a task.
#[derive(Debug, Clone, Copy)]
pub struct BoundedScheduler {
    limit: usize,
}

impl BoundedScheduler {
    /// Create a scheduler with a fixed capacity
    pub fn new(limit: usize) -> Result<Self, SchedulerError> {
        if limit == 0 {
            return Err(SchedulerError::InvalidLimit(limit));
        }
        Ok(Self { limit })
    }

    /// Capacity of this scheduler
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run every task and return their results in submission order.
    ///
    /// The first task error fails the run: no further tasks are admitted,
    /// and tasks already running are detached and left to finish.
    pub async fn run_all<T, E, I, Fut>(&self, tasks: I) -> Result<Vec<T>, E>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<SchedulerError> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.limit));
        let mut running: JoinSet<(usize, Result<T, E>)> = JoinSet::new();
        let mut results: Vec<Option<T>> = Vec::new();

        for (index, task) in tasks.into_iter().enumerate() {
            results.push(None);

            // Wait for capacity, collecting finished tasks meanwhile so a
            // failure stops admission as early as possible.
            let permit = loop {
                tokio::select! {
                    permit = semaphore.clone().acquire_owned() => {
                        match permit {
                            Ok(permit) => break permit,
                            Err(_) => {
                                running.detach_all();
                                return Err(SchedulerError::Closed.into());
                            }
                        }
                    }
                    Some(joined) = running.join_next() => {
                        if let Err(e) = record(joined, &mut results) {
                            running.detach_all();
                            return Err(e);
                        }
                    }
                }
            };

            debug!(task = index, "admitting task");
            running.spawn(async move {
                let result = task.await;
                drop(permit);
                (index, result)
            });
        }

        while let Some(joined) = running.join_next().await {
            if let Err(e) = record(joined, &mut results) {
                running.detach_all();
                return Err(e);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }
}

fn record<T, E>(
    joined: Result<(usize, Result<T, E>), JoinError>,
    results: &mut [Option<T>],
) -> Result<(), E>
where
    E: From<SchedulerError>,
{
    match joined {
        Ok((index, Ok(value))) => {
            results[index] = Some(value);
            Ok(())
        }
        Ok((index, Err(e))) => {
            warn!(task = index, "task failed, stopping admission");
            Err(e)
        }
        Err(e) => {
            warn!(error = %e, "task panicked, stopping admission");
            Err(SchedulerError::TaskPanicked(e.to_string()).into())
        }
    }
}
