//! Token-bucket rate limiting keyed by external-API name.
//!
//! One process-wide [`ApiRateLimiter`] is constructed at service start and
//! injected by reference into each worker pool. Budgets are configured per
//! API with distinct read and write allowances, independent of how many
//! pipeline keys are in flight.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Configured allowance for one direction of one API.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateBudget {
    /// Sustained tokens per second.
    pub rate: f64,
    /// Instantaneous burst allowance.
    pub burst: u32,
}

impl Default for RateBudget {
    fn default() -> Self {
        Self {
            rate: 10.0,
            burst: 20,
        }
    }
}

/// Read and write budgets for one external API.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ApiBudget {
    pub read: RateBudget,
    pub write: RateBudget,
}

/// Direction of an external call, for budget selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Read,
    Write,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A single token bucket.
pub struct TokenBucket {
    budget: RateBudget,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(budget: RateBudget) -> Self {
        Self {
            budget,
            state: Mutex::new(BucketState {
                tokens: budget.burst as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let elapsed = state.last_refill.elapsed();
        state.last_refill = Instant::now();
        state.tokens =
            (state.tokens + elapsed.as_secs_f64() * self.budget.rate).min(self.budget.burst as f64);
    }

    /// Take one token if instantly available.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Wait until a token is available, then take it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock();
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                // Time until one token accrues at the sustained rate.
                Duration::from_secs_f64((1.0 - state.tokens) / self.budget.rate.max(f64::EPSILON))
            };
            tokio::time::sleep(wait).await;
        }
    }
}

/// Process-wide limiter registry keyed by (API name, direction).
pub struct ApiRateLimiter {
    buckets: DashMap<(String, OpKind), Arc<TokenBucket>>,
    budgets: HashMap<String, ApiBudget>,
    fallback: ApiBudget,
}

impl ApiRateLimiter {
    pub fn new(budgets: HashMap<String, ApiBudget>, fallback: ApiBudget) -> Self {
        Self {
            buckets: DashMap::new(),
            budgets,
            fallback,
        }
    }

    fn bucket(&self, api: &str, kind: OpKind) -> Arc<TokenBucket> {
        self.buckets
            .entry((api.to_string(), kind))
            .or_insert_with(|| {
                let api_budget = self.budgets.get(api).copied().unwrap_or(self.fallback);
                let budget = match kind {
                    OpKind::Read => api_budget.read,
                    OpKind::Write => api_budget.write,
                };
                debug!(api, ?kind, rate = budget.rate, burst = budget.burst, "rate bucket created");
                Arc::new(TokenBucket::new(budget))
            })
            .clone()
    }

    /// Take one token for the named call if instantly available. A call
    /// that would exceed the allowance is the caller's retryable failure,
    /// never a drop.
    pub fn try_acquire(&self, api: &str, kind: OpKind) -> bool {
        self.bucket(api, kind).try_acquire()
    }

    /// Wait for a token for the named call.
    pub async fn acquire(&self, api: &str, kind: OpKind) {
        self.bucket(api, kind).acquire().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_empty() {
        let bucket = TokenBucket::new(RateBudget {
            rate: 1000.0,
            burst: 2,
        });
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn test_refill_restores_tokens() {
        let bucket = TokenBucket::new(RateBudget {
            rate: 1000.0,
            burst: 1,
        });
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
        std::thread::sleep(Duration::from_millis(5));
        assert!(bucket.try_acquire());
    }

    #[test]
    fn test_read_and_write_budgets_are_independent() {
        let mut budgets = HashMap::new();
        budgets.insert(
            "inventory".to_string(),
            ApiBudget {
                read: RateBudget {
                    rate: 0.001,
                    burst: 1,
                },
                write: RateBudget {
                    rate: 0.001,
                    burst: 1,
                },
            },
        );
        let limiter = ApiRateLimiter::new(budgets, ApiBudget::default());
        assert!(limiter.try_acquire("inventory", OpKind::Read));
        assert!(!limiter.try_acquire("inventory", OpKind::Read));
        // Write bucket still holds its burst token.
        assert!(limiter.try_acquire("inventory", OpKind::Write));
    }

    #[tokio::test]
    async fn test_acquire_waits_for_refill() {
        let bucket = TokenBucket::new(RateBudget {
            rate: 200.0,
            burst: 1,
        });
        bucket.acquire().await;
        let started = Instant::now();
        bucket.acquire().await;
        assert!(started.elapsed() >= Duration::from_millis(3));
    }
}
