//! Request admission: API key → tier, resource check, bucket decision.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use tracing::debug;

use surgegate_core::{PairKey, TenantTier};

use crate::error::{AdmissionError, AdmissionResult};
use crate::store::PolicyStore;

/// Static API key → tenant tier mapping.
#[derive(Debug, Clone, Default)]
pub struct TenantDirectory {
    keys: HashMap<String, TenantTier>,
}

impl TenantDirectory {
    pub fn new(keys: HashMap<String, TenantTier>) -> Self {
        Self { keys }
    }

    pub fn resolve(&self, api_key: &str) -> AdmissionResult<TenantTier> {
        self.keys
            .get(api_key)
            .copied()
            .ok_or(AdmissionError::Unauthorized)
    }
}

/// Front door for protected resources.
#[derive(Clone)]
pub struct AdmissionGate {
    directory: TenantDirectory,
    store: PolicyStore,
    resources: HashSet<String>,
}

impl AdmissionGate {
    pub fn new(directory: TenantDirectory, store: PolicyStore, resources: &[String]) -> Self {
        Self {
            directory,
            store,
            resources: resources.iter().cloned().collect(),
        }
    }

    /// Register every `(tier, resource)` key up front so the control loop
    /// sees them before any traffic arrives.
    pub fn preload(&self) -> AdmissionResult<usize> {
        let mut resources: Vec<&String> = self.resources.iter().collect();
        resources.sort();
        for tier in TenantTier::ALL {
            for resource in &resources {
                self.store.ensure(&PairKey::new(tier, resource.as_str()))?;
            }
        }
        Ok(self.store.len())
    }

    /// Decide one request. `Ok(false)` means rate limited; a full store
    /// surfaces as `KeyCapacity`.
    pub fn check(&self, api_key: &str, resource: &str) -> AdmissionResult<bool> {
        let tier = self.directory.resolve(api_key)?;
        if !self.resources.contains(resource) {
            return Err(AdmissionError::UnknownResource(resource.to_string()));
        }
        let allowed = self.store.try_admit_at(tier, resource, Instant::now())?;
        if !allowed {
            debug!(tenant = %tier, resource, "rate limited");
        }
        Ok(allowed)
    }

    pub fn store(&self) -> &PolicyStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surgegate_core::TierTable;

    fn gate() -> AdmissionGate {
        let keys = HashMap::from([
            ("free-key".to_string(), TenantTier::Free),
            ("ent-key".to_string(), TenantTier::Enterprise),
        ]);
        let resources = vec!["/api/v1/resourceA".to_string()];
        AdmissionGate::new(
            TenantDirectory::new(keys),
            PolicyStore::new(TierTable::default(), 16),
            &resources,
        )
    }

    #[test]
    fn unknown_key_is_unauthorized() {
        let gate = gate();
        assert_eq!(
            gate.check("nope", "/api/v1/resourceA"),
            Err(AdmissionError::Unauthorized)
        );
        assert!(gate.store().is_empty());
    }

    #[test]
    fn unknown_resource_is_rejected_before_admission() {
        let gate = gate();
        assert_eq!(
            gate.check("free-key", "/elsewhere"),
            Err(AdmissionError::UnknownResource("/elsewhere".into()))
        );
        assert!(gate.store().is_empty());
    }

    #[test]
    fn free_tier_exhausts_default_burst() {
        let gate = gate();
        let allowed = (0..15)
            .filter(|_| gate.check("free-key", "/api/v1/resourceA") == Ok(true))
            .count();
        assert_eq!(allowed, 10);
    }

    #[test]
    fn full_store_is_reported_not_rate_limited() {
        let keys = HashMap::from([
            ("free-key".to_string(), TenantTier::Free),
            ("pro-key".to_string(), TenantTier::Pro),
        ]);
        let resources = vec!["/api/v1/resourceA".to_string()];
        let gate = AdmissionGate::new(
            TenantDirectory::new(keys),
            PolicyStore::new(TierTable::default(), 1),
            &resources,
        );

        assert_eq!(gate.check("free-key", "/api/v1/resourceA"), Ok(true));
        assert_eq!(
            gate.check("pro-key", "/api/v1/resourceA"),
            Err(AdmissionError::KeyCapacity(1))
        );
    }

    #[test]
    fn preload_registers_every_tier() {
        let gate = gate();
        assert_eq!(gate.preload(), Ok(3));
        assert_eq!(
            gate.store().active_keys()[2],
            PairKey::new(TenantTier::Enterprise, "/api/v1/resourceA")
        );
    }
}
