//! Current-account capability
//!
//! Every core operation receives the acting account explicitly instead of
//! reaching for process-global state.

use crate::error::{ApiError, Result};
use crate::paths;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Source of wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Milliseconds since the epoch
    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// System wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests and simulations
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(start_millis),
        }
    }

    pub fn advance(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.millis.load(Ordering::SeqCst);
        Utc.timestamp_millis_opt(millis)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// Public identity of an account as embedded in records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerIdentity {
    pub alias: String,
    #[serde(rename = "pub")]
    pub pub_key: String,
}

/// The acting account plus the capabilities operations need
#[derive(Clone)]
pub struct AccountContext {
    alias: String,
    pub_key: String,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AccountContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountContext")
            .field("alias", &self.alias)
            .field("pub_key", &self.pub_key)
            .finish_non_exhaustive()
    }
}

impl AccountContext {
    /// Create a context on the system clock
    pub fn new(alias: impl Into<String>, pub_key: impl Into<String>) -> Result<Self> {
        Self::with_clock(alias, pub_key, Arc::new(SystemClock))
    }

    pub fn with_clock(
        alias: impl Into<String>,
        pub_key: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let alias = alias.into();
        let pub_key = pub_key.into();
        paths::validate_segment("alias", &alias)?;
        if pub_key.trim().is_empty() {
            return Err(ApiError::validation("public key must not be empty"));
        }
        Ok(Self {
            alias,
            pub_key,
            clock,
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn pub_key(&self) -> &str {
        &self.pub_key
    }

    pub fn owner(&self) -> OwnerIdentity {
        OwnerIdentity {
            alias: self.alias.clone(),
            pub_key: self.pub_key.clone(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn timestamp(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Fresh correlation id for requests, responses and notifications
    pub fn correlation_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub fn is_self(&self, alias: &str) -> bool {
        self.alias == alias
    }
}
