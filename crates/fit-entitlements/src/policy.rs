//! Lock-free tier policy store with hot-swapping
//!
//! Tier policies change rarely and are read on every admission, so the whole
//! table lives behind one [`ArcSwap`]. A write clones the table, replaces one
//! entry and swaps the pointer; readers never block and never observe a
//! half-applied policy.

use crate::catalog::{Catalog, CatalogSnapshot};
use crate::error::{EntitlementError, EntitlementResult};
use crate::model::TierPolicy;
use arc_swap::ArcSwap;
use fit_common::{TierId, ValidationError, ValidationResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Stored policy with the revision it was written at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRecord {
    /// Tier the policy belongs to
    pub tier_id: TierId,
    /// Stored policy
    pub policy: TierPolicy,
    /// Store version at the time of the write; the latest write to a tier
    /// carries that tier's highest revision
    pub revision: u64,
}

/// Tier policy store with atomic updates
pub struct PolicyStore {
    catalog: Arc<dyn Catalog>,
    /// Current policy table (atomically swappable)
    policies: ArcSwap<HashMap<TierId, Arc<PolicyRecord>>>,
    /// Version for cache invalidation
    version: AtomicU64,
}

impl PolicyStore {
    /// Create empty store validating against `catalog`
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            catalog,
            policies: ArcSwap::from_pointee(HashMap::new()),
            version: AtomicU64::new(0),
        }
    }

    /// Get current version
    #[inline(always)]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Policy of an active tier
    ///
    /// Fails with [`EntitlementError::PolicyNotFound`] when the tier does not
    /// exist, is inactive, or has never been given a policy.
    pub fn get_tier_policy(&self, tier_id: TierId) -> EntitlementResult<TierPolicy> {
        match self.catalog.tier(tier_id) {
            Some(tier) if tier.active => {}
            _ => return Err(EntitlementError::PolicyNotFound(tier_id)),
        }
        self.snapshot(tier_id)
            .map(|record| record.policy.clone())
            .ok_or(EntitlementError::PolicyNotFound(tier_id))
    }

    /// Raw stored record, regardless of tier state
    #[inline]
    pub fn snapshot(&self, tier_id: TierId) -> Option<Arc<PolicyRecord>> {
        self.policies.load().get(&tier_id).cloned()
    }

    /// Revision of a tier's policy, 0 when absent
    pub fn revision(&self, tier_id: TierId) -> u64 {
        self.snapshot(tier_id).map(|r| r.revision).unwrap_or(0)
    }

    /// Validate a policy for `tier_id` without writing it
    pub fn check_tier_policy(&self, tier_id: TierId, policy: &TierPolicy) -> EntitlementResult<()> {
        let tier = self
            .catalog
            .tier(tier_id)
            .ok_or_else(|| ValidationError::unknown("tier_id", tier_id))?;
        let catalog = self.catalog.snapshot(tier.tenant_id);
        validate_policy(&catalog, policy)?;
        Ok(())
    }

    /// Validate and atomically replace a tier's policy
    ///
    /// Returns the new revision.
    pub fn set_tier_policy(&self, tier_id: TierId, policy: TierPolicy) -> EntitlementResult<u64> {
        self.check_tier_policy(tier_id, &policy)?;

        // Revision is drawn inside the swap so a retried update gets a newer one
        let mut revision = 0;
        self.policies.rcu(|current| {
            revision = self.version.fetch_add(1, Ordering::AcqRel) + 1;
            let mut next = (**current).clone();
            next.insert(
                tier_id,
                Arc::new(PolicyRecord {
                    tier_id,
                    policy: policy.clone(),
                    revision,
                }),
            );
            next
        });

        info!(
            tier = %tier_id,
            revision,
            all_branches = policy.all_branches,
            branches = policy.branch_ids.len(),
            class_rules = policy.class_rules.len(),
            "tier policy replaced"
        );
        Ok(revision)
    }

    /// Drop a tier's policy; the tier then resolves fail-closed
    pub fn remove_tier_policy(&self, tier_id: TierId) -> bool {
        let existed = self.snapshot(tier_id).is_some();
        if existed {
            self.policies.rcu(|current| {
                let mut next = (**current).clone();
                next.remove(&tier_id);
                next
            });
            self.version.fetch_add(1, Ordering::AcqRel);
            info!(tier = %tier_id, "tier policy removed");
        }
        existed
    }

    /// All stored records, ordered by tier
    pub fn records(&self) -> Vec<Arc<PolicyRecord>> {
        let mut records: Vec<_> = self.policies.load().values().cloned().collect();
        records.sort_by_key(|r| r.tier_id);
        records
    }

    /// Get number of stored policies
    pub fn len(&self) -> usize {
        self.policies.load().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.policies.load().is_empty()
    }
}

/// Check every reference of a policy against the tenant catalog
pub fn validate_policy(catalog: &CatalogSnapshot, policy: &TierPolicy) -> ValidationResult<()> {
    for (i, branch) in policy.branch_ids.iter().enumerate() {
        catalog.check_branch(&format!("branch_ids[{}]", i), *branch)?;
    }
    for (i, rule) in policy.class_rules.iter().enumerate() {
        if !rule.allow {
            return Err(ValidationError::new(
                format!("class_rules[{}].allow", i),
                "tier class rules are allow-only",
            ));
        }
        catalog.check_class_type(&format!("class_rules[{}].target", i), rule.target)?;
        if let Some(branch) = rule.scope.branch() {
            catalog.check_branch(&format!("class_rules[{}].scope", i), branch)?;
        }
    }
    Ok(())
}
