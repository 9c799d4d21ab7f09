//! # Rate Limiter
//!
//! Two ceilings apply to every outbound source request:
//! * a **token bucket per source**, refilled continuously at `rate / 60` tokens
//!   per second, holding at most `max(1, rate / 60)` tokens and starting full;
//! * a **global semaphore** capping requests in flight across all sources.
//!
//! Waiters for the same bucket queue on a fair async mutex, so tokens are
//! granted in arrival order. Only the waiting task is suspended.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use sigma_common::config::Config;
use sigma_common::models::candidate::SourceId;

/// Grant timestamps kept per source for inspection.
const GRANT_HISTORY: usize = 4096;
const TOKEN_EPSILON: f64 = 1e-9;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AcquireError {
    #[error("no slot granted within {0:?}")]
    Timeout(Duration),
    #[error("cancelled while waiting for a slot")]
    Cancelled,
    #[error("limiter closed")]
    Closed,
}

/// Proof of a granted slot. Holds one global in-flight slot until dropped.
#[derive(Debug)]
pub struct RatePermit {
    _global: OwnedSemaphorePermit,
    pub granted_at: Instant,
}

pub struct RateLimiter {
    buckets: Mutex<HashMap<SourceId, Arc<SourceBucket>>>,
    global: Arc<Semaphore>,
    default_rpm: u32,
    overrides: BTreeMap<SourceId, u32>,
}

struct SourceBucket {
    state: tokio::sync::Mutex<BucketState>,
    per_second: f64,
    capacity: f64,
    grants: Mutex<VecDeque<Instant>>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(default_rpm: u32, global_max_in_flight: usize) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            global: Arc::new(Semaphore::new(global_max_in_flight.max(1))),
            default_rpm: default_rpm.max(1),
            overrides: BTreeMap::new(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let mut limiter = Self::new(cfg.rate_limit_per_source, cfg.global_max_concurrency);
        limiter.overrides = cfg.rate_limit_overrides.clone();
        limiter
    }

    pub fn with_override(mut self, source: SourceId, rpm: u32) -> Self {
        self.overrides.insert(source, rpm.max(1));
        self
    }

    /// Waits for a token from `source`'s bucket, then for a global slot.
    /// The token is only spent, and the grant recorded, once both are held.
    pub async fn acquire(
        &self,
        source: &SourceId,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<RatePermit, AcquireError> {
        let bucket = self.bucket(source);
        let global = self.global.clone();

        let grant = async move {
            let (permit, granted_at) = bucket.take(global).await?;
            Ok(RatePermit {
                _global: permit,
                granted_at,
            })
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AcquireError::Cancelled),
            res = tokio::time::timeout(timeout, grant) => match res {
                Ok(granted) => granted,
                Err(_elapsed) => Err(AcquireError::Timeout(timeout)),
            },
        }
    }

    /// When each token for `source` was handed out, oldest first.
    pub fn grant_history(&self, source: &SourceId) -> Vec<Instant> {
        let buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        buckets
            .get(source)
            .map(|bucket| {
                let grants = bucket.grants.lock().unwrap_or_else(|e| e.into_inner());
                grants.iter().copied().collect()
            })
            .unwrap_or_default()
    }

    pub fn available_global_slots(&self) -> usize {
        self.global.available_permits()
    }

    fn bucket(&self, source: &SourceId) -> Arc<SourceBucket> {
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        buckets
            .entry(source.clone())
            .or_insert_with(|| {
                let rpm = self.overrides.get(source).copied().unwrap_or(self.default_rpm);
                Arc::new(SourceBucket::new(rpm))
            })
            .clone()
    }
}

impl SourceBucket {
    fn new(rpm: u32) -> Self {
        let per_second = f64::from(rpm.max(1)) / 60.0;
        let capacity = per_second.max(1.0);
        Self {
            state: tokio::sync::Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            per_second,
            capacity,
            grants: Mutex::new(VecDeque::new()),
        }
    }

    async fn take(&self, global: Arc<Semaphore>) -> Result<(OwnedSemaphorePermit, Instant), AcquireError> {
        // Holding the lock while sleeping keeps later arrivals queued behind us.
        let mut state = self.state.lock().await;
        loop {
            self.refill(&mut state);
            if state.tokens + TOKEN_EPSILON >= 1.0 {
                break;
            }
            let missing = 1.0 - state.tokens;
            tokio::time::sleep(Duration::from_secs_f64(missing / self.per_second)).await;
        }

        // Dropped here on timeout or cancel, the token stays in the bucket.
        let permit = global.acquire_owned().await.map_err(|_| AcquireError::Closed)?;

        self.refill(&mut state);
        state.tokens = (state.tokens - 1.0).max(0.0);
        let granted_at = state.last_refill;
        self.record_grant(granted_at);
        Ok((permit, granted_at))
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.per_second).min(self.capacity);
        state.last_refill = now;
    }

    fn record_grant(&self, at: Instant) {
        let mut grants = self.grants.lock().unwrap_or_else(|e| e.into_inner());
        if grants.len() == GRANT_HISTORY {
            grants.pop_front();
        }
        grants.push_back(at);
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
