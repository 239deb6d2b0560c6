//! Multi-step writes with compensations
//!
//! The store has no transactions. A protocol operation that writes several
//! records runs them as a saga: each step must be acknowledged before the
//! next is issued, and when a step fails the completed steps are undone in
//! reverse order. An undo that itself fails leaves a stranded step, which is
//! logged and otherwise left for the next operation to observe.

use crate::error::{ApiError, Result};
use crate::paths;
use crate::store::GraphStore;
use serde_json::Value;
use tracing::{debug, error, warn};

/// How to undo one completed step
#[derive(Debug, Clone, PartialEq)]
pub enum Compensation {
    /// Tombstone `key` of the record at `path`
    Erase { path: String, key: String },
    /// Write `value` back at `path`
    Restore { path: String, value: Value },
    /// Step needs no undo
    Nothing,
}

impl Compensation {
    /// Undo of a write to a fresh path: tombstone its final key
    pub fn erase_of(path: &str) -> Self {
        match paths::split_last(path) {
            Some((parent, key)) => Compensation::Erase {
                path: parent.to_string(),
                key: key.to_string(),
            },
            None => Compensation::Nothing,
        }
    }
}

#[derive(Debug)]
struct CompletedStep {
    path: String,
    compensation: Compensation,
}

pub struct Saga<'a, S: ?Sized> {
    store: &'a S,
    name: &'static str,
    completed: Vec<CompletedStep>,
}

impl<'a, S: GraphStore + ?Sized> Saga<'a, S> {
    pub fn new(store: &'a S, name: &'static str) -> Self {
        Self {
            store,
            name,
            completed: Vec::new(),
        }
    }

    /// Write `value` at `path`
    pub async fn put(&mut self, path: &str, value: Value, compensation: Compensation) -> Result<()> {
        let ack = self.store.put_at(path, value).await;
        self.settle_step(path, ack.err, compensation).await
    }

    /// Tombstone `key` under `path`
    pub async fn erase(&mut self, path: &str, key: &str, compensation: Compensation) -> Result<()> {
        let ack = self.store.erase_key_at(path, key).await;
        let full = paths::join(&[path, key]);
        self.settle_step(&full, ack.err, compensation).await
    }

    /// Number of steps applied so far
    pub fn steps(&self) -> usize {
        self.completed.len()
    }

    async fn settle_step(
        &mut self,
        path: &str,
        err: Option<String>,
        compensation: Compensation,
    ) -> Result<()> {
        match err {
            None => {
                debug!(saga = self.name, step = self.completed.len() + 1, path = %path, "Saga step applied");
                self.completed.push(CompletedStep {
                    path: path.to_string(),
                    compensation,
                });
                Ok(())
            }
            Some(message) => {
                warn!(saga = self.name, path = %path, error = %message, "Saga step failed, compensating");
                self.compensate().await;
                Err(ApiError::StoreWrite {
                    path: path.to_string(),
                    message,
                })
            }
        }
    }

    async fn compensate(&mut self) {
        while let Some(step) = self.completed.pop() {
            let ack = match &step.compensation {
                Compensation::Erase { path, key } => self.store.erase_key_at(path, key).await,
                Compensation::Restore { path, value } => self.store.put_at(path, value.clone()).await,
                Compensation::Nothing => continue,
            };
            match ack.err {
                None => debug!(saga = self.name, path = %step.path, "Step compensated"),
                Some(message) => error!(
                    saga = self.name,
                    path = %step.path,
                    error = %message,
                    "Compensation failed, step stranded"
                ),
            }
        }
    }
}
