//! Worker pool for what-if runs.
//!
//! A what-if run is a tight bounded loop with no suspension points, so it is
//! offloaded to a small fixed pool of threads fed by a bounded queue. This
//! keeps long horizons from competing with the live tick thread and bounds the
//! number of runs in flight.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CorridorError, CorridorResult, ExecutionError, ValidationError};
use crate::simulation::{CancellationToken, SimulationResult, WhatIfEngine};

const PATH: &str = "what_if";

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of what-if worker threads.
    pub what_if_workers: usize,
    /// Maximum queued what-if runs.
    pub queue_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            what_if_workers: 2,
            queue_capacity: 64,
        }
    }
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.what_if_workers == 0 || self.queue_capacity == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "runtime.what_if_workers and runtime.queue_capacity must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

enum Job {
    Run {
        engine: Box<WhatIfEngine>,
        horizon_minutes: u32,
        token: CancellationToken,
        reply: Sender<CorridorResult<SimulationResult>>,
    },

    #[cfg(test)]
    Sleep {
        duration: Duration,
        reply: Sender<()>,
    },
}

/// Handle to a submitted what-if run.
#[derive(Debug)]
pub struct WhatIfHandle {
    rx: Receiver<CorridorResult<SimulationResult>>,
    token: CancellationToken,
}

impl WhatIfHandle {
    /// Requests cancellation; the run stops before its next step.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The token observed by the run.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Waits for the run to complete.
    pub fn join(self) -> CorridorResult<SimulationResult> {
        self.rx.recv().map_err(|_| disconnected())?
    }

    /// Waits for the run with a timeout. On timeout the run is cancelled.
    pub fn join_timeout(self, timeout: Duration) -> CorridorResult<SimulationResult> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                self.token.cancel();
                Err(CorridorError::Execution(ExecutionError::Timeout {
                    duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
                }))
            }
            Err(RecvTimeoutError::Disconnected) => Err(disconnected()),
        }
    }
}

fn disconnected() -> CorridorError {
    CorridorError::Execution(ExecutionError::Disconnected {
        path: PATH.to_string(),
    })
}

/// Fixed pool of what-if worker threads.
#[derive(Debug)]
pub struct WhatIfRuntime {
    tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    queue_capacity: usize,
}

impl WhatIfRuntime {
    /// Starts the worker threads.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid configuration and
    /// `ExecutionError::Spawn` if a worker thread cannot be created.
    pub fn start(config: &RuntimeConfig) -> CorridorResult<Self> {
        config.validate()?;
        let (tx, rx) = bounded::<Job>(config.queue_capacity);

        let mut workers = Vec::with_capacity(config.what_if_workers);
        for idx in 0..config.what_if_workers {
            let rx: Receiver<Job> = rx.clone();
            let name = format!("corridor-what-if-{idx}");
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker_loop(&rx))
                .map_err(|err| ExecutionError::Spawn {
                    name,
                    reason: err.to_string(),
                })?;
            workers.push(handle);
        }
        debug!(workers = workers.len(), queue_capacity = config.queue_capacity, "what-if runtime started");

        Ok(Self {
            tx: Some(tx),
            workers,
            queue_capacity: config.queue_capacity,
        })
    }

    /// Queues a prepared sandbox for a run of `horizon_minutes`.
    ///
    /// # Errors
    ///
    /// `ExecutionError::QueueFull` when the queue is at capacity.
    pub fn submit(&self, engine: WhatIfEngine, horizon_minutes: u32) -> CorridorResult<WhatIfHandle> {
        let token = CancellationToken::new();
        let (reply, rx) = bounded(1);
        self.try_submit(Job::Run {
            engine: Box::new(engine),
            horizon_minutes,
            token: token.clone(),
            reply,
        })?;
        Ok(WhatIfHandle { rx, token })
    }

    /// Runs synchronously on the pool.
    pub fn run(&self, engine: WhatIfEngine, horizon_minutes: u32) -> CorridorResult<SimulationResult> {
        self.submit(engine, horizon_minutes)?.join()
    }

    fn try_submit(&self, job: Job) -> CorridorResult<()> {
        let Some(tx) = &self.tx else {
            return Err(disconnected());
        };
        match tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(CorridorError::Execution(ExecutionError::QueueFull {
                path: PATH.to_string(),
                capacity: self.queue_capacity,
            })),
            Err(TrySendError::Disconnected(_)) => Err(disconnected()),
        }
    }

    #[cfg(test)]
    fn submit_sleep(&self, duration: Duration) -> CorridorResult<Receiver<()>> {
        let (reply, rx) = bounded(1);
        self.try_submit(Job::Sleep { duration, reply })?;
        Ok(rx)
    }
}

fn worker_loop(rx: &Receiver<Job>) {
    while let Ok(job) = rx.recv() {
        match job {
            Job::Run {
                engine,
                horizon_minutes,
                token,
                reply,
            } => {
                let result = engine.run_with_cancel(horizon_minutes, &token);
                let _ = reply.send(result);
            }

            #[cfg(test)]
            Job::Sleep { duration, reply } => {
                thread::sleep(duration);
                let _ = reply.send(());
            }
        }
    }
}

impl Drop for WhatIfRuntime {
    fn drop(&mut self) {
        // Closing the queue lets workers drain it and exit.
        self.tx = None;
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Route;
    use crate::train::Train;

    fn sandbox() -> WhatIfEngine {
        let trains = [Train::builder("1", "One").distance(10.0).speed(80.0).build().unwrap()];
        WhatIfEngine::new(&trains, &Route::sc_kzj().station_blocks())
    }

    #[test]
    fn runs_on_the_pool() {
        let runtime = WhatIfRuntime::start(&RuntimeConfig::default()).unwrap();
        let result = runtime.run(sandbox(), 30).unwrap();
        assert_eq!(result.metrics.duration_simulated_min, 30);
        assert_eq!(result.metrics.steps, 180);
    }

    #[test]
    fn queue_full_is_reported() {
        let runtime = WhatIfRuntime::start(&RuntimeConfig {
            what_if_workers: 1,
            queue_capacity: 1,
        })
        .unwrap();

        let busy = runtime.submit_sleep(Duration::from_millis(200)).unwrap();
        // Give the single worker time to pick up the sleep job.
        thread::sleep(Duration::from_millis(50));
        let _queued = runtime.submit_sleep(Duration::from_millis(1)).unwrap();

        let err = runtime.submit(sandbox(), 10).unwrap_err();
        assert!(matches!(err, CorridorError::Execution(ExecutionError::QueueFull { capacity: 1, .. })));
        assert!(err.is_retryable());
        busy.recv().unwrap();
    }

    #[test]
    fn cancelled_before_start_reports_zero_steps() {
        let runtime = WhatIfRuntime::start(&RuntimeConfig {
            what_if_workers: 1,
            queue_capacity: 4,
        })
        .unwrap();
        let busy = runtime.submit_sleep(Duration::from_millis(100)).unwrap();
        let handle = runtime.submit(sandbox(), 60).unwrap();
        handle.cancel();
        busy.recv().unwrap();

        let err = handle.join().unwrap_err();
        assert!(matches!(
            err,
            CorridorError::Execution(ExecutionError::Cancelled { completed_steps: 0 })
        ));
    }

    #[test]
    fn rejects_zero_workers() {
        let err = WhatIfRuntime::start(&RuntimeConfig {
            what_if_workers: 0,
            queue_capacity: 1,
        })
        .unwrap_err();
        assert!(err.is_validation());
    }
}
