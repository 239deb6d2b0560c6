//! Read-resolution engine
//!
//! A read issued right after a write may see a record whose nested fields
//! are still reference markers. The engine re-reads with a growing settle
//! window until the record passes its [`ResolutionProbe`] or the overall
//! deadline elapses.
//!
//! ```text
//! pass 0: read(settle = initial)            -> markers? sleep, retry
//! pass 1: read(settle = initial + step)     -> markers? sleep, retry
//! pass n: read(settle = initial + n * step) -> ... until deadline
//! ```
//!
//! A root that is absent on the first pass is `NotFound` right away. A store
//! that never answers within the deadline is `Timeout`. Those two are never
//! folded into each other.

mod probe;

pub use probe::ResolutionProbe;

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::store::{GraphStore, ReadOptions};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Settle windows and deadline of one resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySchedule {
    pub initial: Duration,
    pub step: Duration,
    pub deadline: Duration,
}

impl RetrySchedule {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            initial: config.initial_settle(),
            step: config.retry_step(),
            deadline: config.resolve_deadline(),
        }
    }

    /// Settle window of pass `attempt` (0-based)
    pub fn window(&self, attempt: u32) -> Duration {
        self.initial + self.step * attempt
    }
}

/// Outcome of polling a path
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Value seen by the last pass
    pub value: Value,
    /// Number of passes issued
    pub attempts: u32,
    pub elapsed: Duration,
    /// Whether the last pass had no unresolved markers
    pub settled: bool,
}

impl Resolution {
    fn timeout(self, path: &str) -> ApiError {
        ApiError::Timeout {
            path: path.to_string(),
            attempts: self.attempts,
            waited_ms: self.elapsed.as_millis() as u64,
        }
    }
}

/// Resolves paths against a store
pub struct Resolver<'a, S: ?Sized> {
    store: &'a S,
    schedule: RetrySchedule,
    lenient_settle: Duration,
}

impl<'a, S: GraphStore + ?Sized> Resolver<'a, S> {
    pub fn new(store: &'a S, schedule: RetrySchedule) -> Self {
        Self {
            store,
            schedule,
            lenient_settle: schedule.initial,
        }
    }

    pub fn from_config(store: &'a S, config: &ClientConfig) -> Self {
        Self {
            store,
            schedule: RetrySchedule::from_config(config),
            lenient_settle: config.lenient_settle(),
        }
    }

    pub fn schedule(&self) -> RetrySchedule {
        self.schedule
    }

    /// Strict read: the settled record, `NotFound` or `Timeout`
    pub async fn resolve(&self, path: &str, probe: &ResolutionProbe) -> Result<Value> {
        let resolution = self.poll(path, probe, |_| {}).await?;
        if resolution.settled {
            Ok(resolution.value)
        } else {
            Err(resolution.timeout(path))
        }
    }

    /// Lenient read: `None` when the root is absent.
    ///
    /// The existence check and the retries share one deadline.
    pub async fn resolve_lenient(
        &self,
        path: &str,
        probe: &ResolutionProbe,
    ) -> Result<Option<Resolution>> {
        let started = Instant::now();
        let deadline = started + self.schedule.deadline;
        let check = self
            .store
            .read_once_at(path, ReadOptions::settle(self.lenient_settle));
        let exists = match tokio::time::timeout_at(deadline, check).await {
            Ok(found) => found.is_some(),
            Err(_) => {
                return Err(ApiError::Timeout {
                    path: path.to_string(),
                    attempts: 1,
                    waited_ms: started.elapsed().as_millis() as u64,
                })
            }
        };
        if !exists {
            debug!(path = %path, "Lenient read found nothing");
            return Ok(None);
        }

        match self.poll_until(path, probe, started, deadline, |_| {}).await {
            Ok(resolution) => Ok(Some(resolution)),
            Err(ApiError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Re-read `path` until it passes `probe` or the deadline elapses.
    ///
    /// `on_pass` sees the raw value of every pass. Returns an unsettled
    /// [`Resolution`] carrying the last value when the deadline elapses with
    /// markers still present.
    pub async fn poll<F>(&self, path: &str, probe: &ResolutionProbe, on_pass: F) -> Result<Resolution>
    where
        F: FnMut(&Value),
    {
        let started = Instant::now();
        self.poll_until(path, probe, started, started + self.schedule.deadline, on_pass)
            .await
    }

    async fn poll_until<F>(
        &self,
        path: &str,
        probe: &ResolutionProbe,
        started: Instant,
        deadline: Instant,
        mut on_pass: F,
    ) -> Result<Resolution>
    where
        F: FnMut(&Value),
    {
        let mut attempts: u32 = 0;
        let mut last: Option<Value> = None;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            // Pass n lasts at least window(n); a store that honors the
            // settle window leaves nothing to sleep off
            let window = self.schedule.window(attempts);
            let pass_started = Instant::now();
            let read = self
                .store
                .read_live_at(path, ReadOptions::settle(window.min(remaining)));
            let outcome = tokio::time::timeout_at(deadline, read).await;
            attempts += 1;

            let value = match outcome {
                Err(_) => {
                    warn!(path = %path, attempts, "Store did not answer before the deadline");
                    break;
                }
                Ok(None) => {
                    debug!(path = %path, attempts, "Root record not materialized");
                    return Err(ApiError::NotFound(path.to_string()));
                }
                Ok(Some(value)) => value,
            };

            on_pass(&value);
            let pending = probe.unresolved(&value);
            if pending == 0 {
                debug!(path = %path, attempts, "Record settled");
                return Ok(Resolution {
                    value,
                    attempts,
                    elapsed: started.elapsed(),
                    settled: true,
                });
            }

            debug!(path = %path, attempts, pending, "Record still replicating, retrying");
            last = Some(value);

            let pass_end = (pass_started + window).min(deadline);
            tokio::time::sleep_until(pass_end).await;
        }

        match last {
            Some(value) => {
                warn!(path = %path, attempts, "Deadline elapsed with unresolved references");
                Ok(Resolution {
                    value,
                    attempts,
                    elapsed: started.elapsed(),
                    settled: false,
                })
            }
            None => Err(ApiError::Timeout {
                path: path.to_string(),
                attempts,
                waited_ms: started.elapsed().as_millis() as u64,
            }),
        }
    }
}
