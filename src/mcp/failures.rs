//! Consecutive-failure accounting per upstream connection.
//!
//! This is a soft circuit breaker: once a connection reaches the threshold
//! its handle is evicted, and the very next use builds a new one. There is
//! no open/half-open state and no cooldown.

use crate::mcp::registry::ConnectionKey;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Health implied by a connection's failure counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionHealth {
    Healthy,
    /// Failing, but still under the eviction threshold.
    Degraded(u32),
    /// Reached the threshold; the handle must be dropped.
    Evicted,
}

impl ConnectionHealth {
    fn from_count(count: u32, threshold: u32) -> Self {
        if count == 0 {
            ConnectionHealth::Healthy
        } else if count >= threshold {
            ConnectionHealth::Evicted
        } else {
            ConnectionHealth::Degraded(count)
        }
    }
}

#[derive(Debug)]
pub struct FailureTracker {
    threshold: u32,
    counters: RwLock<HashMap<ConnectionKey, Arc<AtomicU32>>>,
}

impl FailureTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            counters: RwLock::new(HashMap::new()),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    fn counter(&self, key: &ConnectionKey) -> Arc<AtomicU32> {
        if let Some(counter) = self
            .counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Arc::clone(counter);
        }
        let mut counters = self
            .counters
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(counters.entry(key.clone()).or_default())
    }

    /// Bumps the counter and reports the resulting health.
    pub fn record_failure(&self, key: &ConnectionKey) -> ConnectionHealth {
        let count = self.counter(key).fetch_add(1, Ordering::SeqCst) + 1;
        ConnectionHealth::from_count(count, self.threshold)
    }

    pub fn record_success(&self, key: &ConnectionKey) {
        if let Some(counter) = self
            .counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            counter.store(0, Ordering::SeqCst);
        }
    }

    pub fn failures(&self, key: &ConnectionKey) -> u32 {
        self.counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|counter| counter.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn health(&self, key: &ConnectionKey) -> ConnectionHealth {
        ConnectionHealth::from_count(self.failures(key), self.threshold)
    }

    pub fn reset(&self, key: &ConnectionKey) {
        self.counters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    pub fn clear(&self) {
        self.counters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of connections with a counter, failing or not.
    pub fn tracked(&self) -> usize {
        self.counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Connections currently carrying a non-zero count, keyed for display.
    pub fn failing(&self) -> BTreeMap<String, u32> {
        self.counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|(key, counter)| {
                let count = counter.load(Ordering::SeqCst);
                (count > 0).then(|| (key.to_string(), count))
            })
            .collect()
    }
}
