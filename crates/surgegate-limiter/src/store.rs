//! PolicyStore — authoritative policies, buckets and usage windows.
//!
//! Keys are created lazily on first traffic (or up front via `ensure`)
//! using the tier's base policy, and live for the process lifetime. The
//! number of keys is capped; once full, unseen keys are refused.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use surgegate_core::{PairKey, Policy, TenantTier, TierTable};

use crate::bucket::TokenBucket;
use crate::error::{AdmissionError, AdmissionResult};
use crate::usage::{UsageWindow, WindowSample};

/// Everything tracked for one key. Guarded by a single per-key mutex so
/// admission, policy writes and window drains are mutually atomic.
#[derive(Debug)]
struct KeySlot {
    policy: Policy,
    bucket: TokenBucket,
    window: UsageWindow,
}

impl KeySlot {
    fn new(policy: Policy, now: Instant) -> Self {
        Self {
            policy,
            bucket: TokenBucket::full(&policy, now),
            window: UsageWindow::new(now),
        }
    }
}

struct StoreInner {
    slots: DashMap<PairKey, Arc<Mutex<KeySlot>>>,
    /// Keys reserved against `max_keys`. Keys are never removed.
    reserved: AtomicUsize,
    tiers: TierTable,
    max_keys: usize,
}

/// Read-only view of one key for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct KeyView {
    pub tenant: TenantTier,
    pub resource: String,
    pub rps: f64,
    pub burst: u32,
    pub tokens: f64,
    /// Counts in the window currently being filled.
    pub window: WindowSample,
    pub effective_rps: f64,
    pub blocked_ratio: f64,
    pub utilization: f64,
}

/// Thread-safe, cheaply cloneable policy store.
#[derive(Clone)]
pub struct PolicyStore {
    inner: Arc<StoreInner>,
}

impl PolicyStore {
    pub fn new(tiers: TierTable, max_keys: usize) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                slots: DashMap::new(),
                reserved: AtomicUsize::new(0),
                tiers,
                max_keys,
            }),
        }
    }

    /// Admit or deny one request for `(tenant, resource)`.
    pub fn admit(&self, tenant: TenantTier, resource: &str) -> bool {
        self.admit_at(tenant, resource, Instant::now())
    }

    /// `admit` against an explicit clock reading.
    ///
    /// Refused keys (capacity exhausted) are denied without being recorded.
    pub fn admit_at(&self, tenant: TenantTier, resource: &str, now: Instant) -> bool {
        match self.try_admit_at(tenant, resource, now) {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!(%tenant, resource, error = %e, "admission refused");
                false
            }
        }
    }

    /// Refill the key's bucket, consume one token if available, and record
    /// the outcome in the usage window. Fails only when the key is unseen
    /// and the store is full.
    pub fn try_admit_at(&self, tenant: TenantTier, resource: &str, now: Instant) -> AdmissionResult<bool> {
        let key = PairKey::new(tenant, resource);
        let slot = self.slot(&key, now)?;

        let mut slot = slot.lock();
        let policy = slot.policy;
        slot.bucket.refill(&policy, now);
        let allowed = slot.bucket.try_take();
        slot.window.record(allowed);
        Ok(allowed)
    }

    /// Create the key with its tier's base policy if it is not tracked yet.
    pub fn ensure(&self, key: &PairKey) -> AdmissionResult<Policy> {
        let slot = self.slot(key, Instant::now())?;
        let policy = slot.lock().policy;
        Ok(policy)
    }

    /// Overwrite the policy for a key, clamping to `rps >= 1`, `burst >= 5`.
    ///
    /// Tokens above the new burst are discarded immediately.
    pub fn apply_policy(&self, key: &PairKey, rps: f64, burst: u32) -> AdmissionResult<Policy> {
        let now = Instant::now();
        let slot = self.slot(key, now)?;
        let policy = Policy::clamped(rps, burst);

        let mut slot = slot.lock();
        let previous = slot.policy;
        // Settle accrued tokens under the old rate before switching.
        slot.bucket.refill(&previous, now);
        slot.policy = policy;
        slot.bucket.cap(policy.burst);
        drop(slot);

        info!(
            %key,
            old_rps = previous.rps,
            new_rps = policy.rps,
            old_burst = previous.burst,
            new_burst = policy.burst,
            "policy applied"
        );
        Ok(policy)
    }

    /// Current policy for a key, if tracked.
    pub fn policy(&self, key: &PairKey) -> Option<Policy> {
        let slot = self.inner.slots.get(key)?.value().clone();
        let policy = slot.lock().policy;
        Some(policy)
    }

    /// Atomically read the policy and drain the key's usage window.
    ///
    /// Runs under the key's mutex, so no admission can land between the
    /// read and the reset.
    pub fn drain_window(&self, key: &PairKey, now: Instant) -> Option<(Policy, WindowSample)> {
        let slot = self.inner.slots.get(key)?.value().clone();
        let mut slot = slot.lock();
        let sample = slot.window.drain(now);
        Some((slot.policy, sample))
    }

    /// All tracked keys, sorted.
    pub fn active_keys(&self) -> Vec<PairKey> {
        let mut keys: Vec<PairKey> = self.inner.slots.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Consistent per-key view of every tracked key, sorted by key.
    pub fn snapshot(&self) -> Vec<KeyView> {
        let now = Instant::now();
        let slots: Vec<(PairKey, Arc<Mutex<KeySlot>>)> = self
            .inner
            .slots
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let mut views: Vec<KeyView> = slots
            .into_iter()
            .map(|(key, slot)| {
                let slot = slot.lock();
                let window = slot.window.peek(now);
                let effective_rps = window.ok_rps();
                KeyView {
                    tenant: key.tenant,
                    resource: key.resource,
                    rps: slot.policy.rps,
                    burst: slot.policy.burst,
                    tokens: slot.bucket.tokens(),
                    window,
                    effective_rps,
                    blocked_ratio: window.blocked_ratio(),
                    utilization: effective_rps / slot.policy.rps,
                }
            })
            .collect();
        views.sort_by(|a, b| (a.tenant, &a.resource).cmp(&(b.tenant, &b.resource)));
        views
    }

    pub fn len(&self) -> usize {
        self.inner.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.slots.is_empty()
    }

    pub fn tiers(&self) -> &TierTable {
        &self.inner.tiers
    }

    /// Fetch the slot for a key, creating it when absent and capacity allows.
    ///
    /// A capacity slot is reserved while the entry's shard is locked, so
    /// concurrent first sightings can never exceed `max_keys`.
    fn slot(&self, key: &PairKey, now: Instant) -> AdmissionResult<Arc<Mutex<KeySlot>>> {
        if let Some(slot) = self.inner.slots.get(key) {
            return Ok(slot.value().clone());
        }

        match self.inner.slots.entry(key.clone()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let max = self.inner.max_keys;
                self.inner
                    .reserved
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
                    .map_err(|_| AdmissionError::KeyCapacity(max))?;

                let policy = self.inner.tiers.base_policy(key.tenant);
                debug!(%key, rps = policy.rps, burst = policy.burst, "key registered");
                let slot = Arc::new(Mutex::new(KeySlot::new(policy, now)));
                entry.insert(slot.clone());
                Ok(slot)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn store() -> PolicyStore {
        PolicyStore::new(TierTable::default(), 64)
    }

    fn key(tenant: TenantTier) -> PairKey {
        PairKey::new(tenant, "/api/v1/resourceA")
    }

    #[test]
    fn first_traffic_creates_key_with_tier_defaults() {
        let store = store();
        assert!(store.is_empty());

        assert!(store.admit(TenantTier::Pro, "/api/v1/resourceA"));
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.policy(&key(TenantTier::Pro)),
            Some(Policy { rps: 8.0, burst: 20 })
        );
    }

    #[test]
    fn burst_then_deny_then_refill() {
        let store = store();
        let start = Instant::now();
        store.ensure(&key(TenantTier::Free)).unwrap();
        store.apply_policy(&key(TenantTier::Free), 3.0, 10).unwrap();

        for i in 0..10 {
            assert!(
                store.admit_at(TenantTier::Free, "/api/v1/resourceA", start),
                "request {i} should pass"
            );
        }
        assert!(!store.admit_at(TenantTier::Free, "/api/v1/resourceA", start));

        let later = start + Duration::from_secs(1);
        let mut allowed = 0;
        while store.admit_at(TenantTier::Free, "/api/v1/resourceA", later) {
            allowed += 1;
        }
        assert!(allowed >= 3, "only {allowed} admitted after 1s");
    }

    #[test]
    fn outcomes_are_counted_in_window() {
        let store = store();
        let now = Instant::now();
        for _ in 0..12 {
            store.admit_at(TenantTier::Free, "/api/v1/resourceA", now);
        }

        let (policy, sample) = store.drain_window(&key(TenantTier::Free), now).unwrap();
        assert_eq!(policy.burst, 10);
        assert_eq!(sample.ok, 10);
        assert_eq!(sample.blocked, 2);

        let (_, sample) = store.drain_window(&key(TenantTier::Free), now).unwrap();
        assert_eq!(sample.total(), 0);
    }

    #[test]
    fn apply_policy_clamps_floors() {
        let store = store();
        let policy = store.apply_policy(&key(TenantTier::Free), 0.1, 2).unwrap();
        assert_eq!(policy, Policy { rps: 1.0, burst: 5 });
    }

    #[test]
    fn shrinking_burst_trims_tokens() {
        let store = store();
        let k = key(TenantTier::Enterprise);
        store.ensure(&k).unwrap();
        store.apply_policy(&k, 15.0, 6).unwrap();

        let view = store.snapshot().into_iter().next().unwrap();
        assert!(view.tokens <= 6.0);
    }

    #[test]
    fn tokens_stay_within_bounds() {
        let store = store();
        let start = Instant::now();
        for step in 0..200u64 {
            let now = start + Duration::from_millis(step * 37);
            store.admit_at(TenantTier::Pro, "/api/v1/resourceA", now);
            store.admit_at(TenantTier::Pro, "/api/v1/resourceA", now);
        }
        for view in store.snapshot() {
            assert!(view.tokens >= 0.0);
            assert!(view.tokens <= view.burst as f64);
        }
    }

    #[test]
    fn capacity_refuses_new_keys() {
        let store = PolicyStore::new(TierTable::default(), 1);
        assert!(store.admit(TenantTier::Free, "/a"));
        assert!(!store.admit(TenantTier::Free, "/b"));
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.ensure(&PairKey::new(TenantTier::Pro, "/a")),
            Err(AdmissionError::KeyCapacity(1))
        );
        // Existing keys keep working.
        assert!(store.admit(TenantTier::Free, "/a"));
        assert_eq!(
            store.try_admit_at(TenantTier::Free, "/c", Instant::now()),
            Err(AdmissionError::KeyCapacity(1))
        );
        assert_eq!(store.try_admit_at(TenantTier::Free, "/a", Instant::now()), Ok(true));
    }

    #[test]
    fn concurrent_first_sightings_respect_capacity() {
        let store = PolicyStore::new(TierTable::default(), 5);
        let workers: Vec<_> = (0..8)
            .map(|w| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..20 {
                        store.admit(TenantTier::Pro, &format!("/r{w}-{i}"));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn snapshot_is_sorted_and_reports_utilization() {
        let store = store();
        let now = Instant::now();
        store.admit_at(TenantTier::Enterprise, "/b", now);
        store.admit_at(TenantTier::Free, "/a", now);
        store.admit_at(TenantTier::Free, "/a", now);

        let views = store.snapshot();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].tenant, TenantTier::Free);
        assert_eq!(views[1].tenant, TenantTier::Enterprise);
        assert_eq!(views[0].window.ok, 2);
        assert!(views[0].utilization > 0.0);
    }

    #[test]
    fn key_view_serializes_for_reporting() {
        let store = store();
        store.admit(TenantTier::Enterprise, "/api/v1/resourceB");

        let json = serde_json::to_value(&store.snapshot()[0]).unwrap();
        assert_eq!(json["tenant"], "ent");
        assert_eq!(json["resource"], "/api/v1/resourceB");
        assert_eq!(json["burst"], 40);
        assert_eq!(json["window"]["ok"], 1);
    }

    #[test]
    fn concurrent_admissions_and_drains_lose_no_counts() {
        let store = store();
        let k = key(TenantTier::Enterprise);
        store.ensure(&k).unwrap();

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        store.admit(TenantTier::Enterprise, "/api/v1/resourceA");
                    }
                })
            })
            .collect();

        let mut drained = 0;
        for _ in 0..50 {
            let (_, sample) = store.drain_window(&k, Instant::now()).unwrap();
            drained += sample.total();
        }
        for worker in workers {
            worker.join().unwrap();
        }
        let (_, rest) = store.drain_window(&k, Instant::now()).unwrap();
        drained += rest.total();

        assert_eq!(drained, 2000);
    }
}
