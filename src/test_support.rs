//! Shared test support utilities
//!
//! Provides [`InMemoryRelevanceStore`], a `RelevanceStore` backed by plain
//! memory, for use in unit and integration tests.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::sync::Notify;

use crate::store::{GroupId, GroupMetrics, RelevanceStore};

/// In-memory store that serves scripted fetch results and records every write.
#[derive(Default)]
pub struct InMemoryRelevanceStore {
    groups: Mutex<Vec<GroupMetrics>>,
    scripted_fetches: Mutex<VecDeque<Result<Vec<GroupMetrics>, String>>>,
    failing_updates: Mutex<HashSet<GroupId>>,
    updates: Mutex<Vec<(GroupId, f64)>>,
    fail_resets: AtomicBool,
    fetch_calls: AtomicUsize,
    reset_calls: AtomicUsize,
    rows_per_reset: AtomicU64,
    updated: Notify,
}

impl InMemoryRelevanceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose every fetch returns `groups`.
    #[must_use]
    pub fn with_groups(groups: Vec<GroupMetrics>) -> Self {
        let store = Self::default();
        *lock(&store.groups) = groups;
        store
    }

    /// Queues a one-shot fetch result, served before the default groups.
    pub fn push_fetch(&self, result: Result<Vec<GroupMetrics>, String>) {
        lock(&self.scripted_fetches).push_back(result);
    }

    /// Makes every update of `group_id` fail.
    pub fn fail_updates_for(&self, group_id: i64) {
        lock(&self.failing_updates).insert(GroupId(group_id));
    }

    pub fn set_fail_resets(&self, fail: bool) {
        self.fail_resets.store(fail, Ordering::SeqCst);
    }

    /// Rows reported as reset by each successful `make_relevance_zero`.
    pub fn set_rows_per_reset(&self, rows: u64) {
        self.rows_per_reset.store(rows, Ordering::SeqCst);
    }

    /// Successful writes, in arrival order.
    #[must_use]
    pub fn updates(&self) -> Vec<(GroupId, f64)> {
        lock(&self.updates).clone()
    }

    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn reset_calls(&self) -> usize {
        self.reset_calls.load(Ordering::SeqCst)
    }

    /// Waits until at least `count` writes have succeeded.
    pub async fn wait_for_updates(&self, count: usize) -> Vec<(GroupId, f64)> {
        loop {
            let notified = self.updated.notified();
            let updates = self.updates();
            if updates.len() >= count {
                return updates;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl RelevanceStore for InMemoryRelevanceStore {
    async fn get_relevance_metrics(&self) -> Result<Vec<GroupMetrics>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = lock(&self.scripted_fetches).pop_front();
        match scripted {
            Some(Ok(groups)) => Ok(groups),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(lock(&self.groups).clone()),
        }
    }

    async fn update_relevance(&self, metrics: &GroupMetrics) -> Result<()> {
        if lock(&self.failing_updates).contains(&metrics.group_id) {
            return Err(anyhow!("injected update failure for group {}", metrics.group_id));
        }
        let score = metrics
            .score
            .value()
            .ok_or_else(|| anyhow!("group {} has no computed score", metrics.group_id))?;
        lock(&self.updates).push((metrics.group_id, score));
        self.updated.notify_waiters();
        Ok(())
    }

    async fn make_relevance_zero(&self) -> Result<u64> {
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_resets.load(Ordering::SeqCst) {
            return Err(anyhow!("injected reset failure"));
        }
        Ok(self.rows_per_reset.load(Ordering::SeqCst))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
