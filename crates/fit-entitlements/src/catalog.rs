//! Catalog reference data
//!
//! Branches, class types and tiers are owned by tenant provisioning. This
//! crate only reads them, through immutable per-tenant snapshots.

use dashmap::DashMap;
use fit_common::{
    Branch, BranchId, ClassType, ClassTypeId, TenantId, Tier, TierId, ValidationError,
    ValidationResult,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Read-only catalog of one tenant at one revision
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// Tenant this snapshot belongs to
    pub tenant_id: TenantId,
    /// Bumped on every catalog change for the tenant
    pub revision: u64,
    /// Branches by id, active or not
    pub branches: BTreeMap<BranchId, Branch>,
    /// Class types by id, active or not
    pub class_types: BTreeMap<ClassTypeId, ClassType>,
    /// Tiers by id, active or not
    pub tiers: BTreeMap<TierId, Tier>,
}

impl CatalogSnapshot {
    /// Empty catalog for a tenant
    pub fn empty(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            ..Default::default()
        }
    }

    /// Build from entity lists, ignoring entries of other tenants
    pub fn from_parts(
        tenant_id: TenantId,
        branches: impl IntoIterator<Item = Branch>,
        class_types: impl IntoIterator<Item = ClassType>,
        tiers: impl IntoIterator<Item = Tier>,
    ) -> Self {
        Self {
            tenant_id,
            revision: 0,
            branches: branches
                .into_iter()
                .filter(|b| b.tenant_id == tenant_id)
                .map(|b| (b.id, b))
                .collect(),
            class_types: class_types
                .into_iter()
                .filter(|c| c.tenant_id == tenant_id)
                .map(|c| (c.id, c))
                .collect(),
            tiers: tiers
                .into_iter()
                .filter(|t| t.tenant_id == tenant_id)
                .map(|t| (t.id, t))
                .collect(),
        }
    }

    /// Ids of active branches
    pub fn active_branch_ids(&self) -> BTreeSet<BranchId> {
        self.branches
            .values()
            .filter(|b| b.active)
            .map(|b| b.id)
            .collect()
    }

    /// Ids of active class types
    pub fn active_class_type_ids(&self) -> BTreeSet<ClassTypeId> {
        self.class_types
            .values()
            .filter(|c| c.active)
            .map(|c| c.id)
            .collect()
    }

    /// Branch exists and is active
    #[inline]
    pub fn is_branch_active(&self, id: BranchId) -> bool {
        self.branches.get(&id).map(|b| b.active).unwrap_or(false)
    }

    /// Class type exists and is active
    #[inline]
    pub fn is_class_type_active(&self, id: ClassTypeId) -> bool {
        self.class_types.get(&id).map(|c| c.active).unwrap_or(false)
    }

    /// Tier, if it exists and is active
    pub fn active_tier(&self, id: TierId) -> Option<&Tier> {
        self.tiers.get(&id).filter(|t| t.active)
    }

    /// Reject unknown or inactive branch reference at `field`
    pub fn check_branch(&self, field: &str, id: BranchId) -> ValidationResult<()> {
        match self.branches.get(&id) {
            None => Err(ValidationError::unknown(field, id)),
            Some(b) if !b.active => Err(ValidationError::inactive(field, id)),
            Some(_) => Ok(()),
        }
    }

    /// Reject unknown or inactive class type reference at `field`
    pub fn check_class_type(&self, field: &str, id: ClassTypeId) -> ValidationResult<()> {
        match self.class_types.get(&id) {
            None => Err(ValidationError::unknown(field, id)),
            Some(c) if !c.active => Err(ValidationError::inactive(field, id)),
            Some(_) => Ok(()),
        }
    }
}

/// Catalog collaborator
pub trait Catalog: Send + Sync {
    /// Current snapshot of a tenant; unknown tenants yield an empty catalog
    fn snapshot(&self, tenant: TenantId) -> Arc<CatalogSnapshot>;

    /// Tier lookup across tenants
    fn tier(&self, tier_id: TierId) -> Option<Tier>;

    /// Active branches of a tenant
    fn list_active_branches(&self, tenant: TenantId) -> Vec<Branch> {
        self.snapshot(tenant)
            .branches
            .values()
            .filter(|b| b.active)
            .cloned()
            .collect()
    }

    /// Active class types of a tenant
    fn list_active_class_types(&self, tenant: TenantId) -> Vec<ClassType> {
        self.snapshot(tenant)
            .class_types
            .values()
            .filter(|c| c.active)
            .cloned()
            .collect()
    }
}

/// In-memory catalog (for testing, the CLI and embedded deployments)
pub struct InMemoryCatalog {
    tenants: DashMap<TenantId, Arc<CatalogSnapshot>>,
    tier_index: DashMap<TierId, TenantId>,
    revision: AtomicU64,
}

impl InMemoryCatalog {
    /// Create empty catalog
    pub fn new() -> Self {
        Self {
            tenants: DashMap::new(),
            tier_index: DashMap::new(),
            revision: AtomicU64::new(0),
        }
    }

    /// Build from flat entity lists spanning any number of tenants
    pub fn from_entities(branches: Vec<Branch>, class_types: Vec<ClassType>, tiers: Vec<Tier>) -> Self {
        let catalog = Self::new();
        for branch in branches {
            catalog.upsert_branch(branch);
        }
        for class_type in class_types {
            catalog.upsert_class_type(class_type);
        }
        for tier in tiers {
            catalog.upsert_tier(tier);
        }
        catalog
    }

    /// Add or replace a branch
    pub fn upsert_branch(&self, branch: Branch) {
        self.modify(branch.tenant_id, |snap| {
            snap.branches.insert(branch.id, branch);
        });
    }

    /// Add or replace a class type
    pub fn upsert_class_type(&self, class_type: ClassType) {
        self.modify(class_type.tenant_id, |snap| {
            snap.class_types.insert(class_type.id, class_type);
        });
    }

    /// Add or replace a tier
    pub fn upsert_tier(&self, tier: Tier) {
        self.tier_index.insert(tier.id, tier.tenant_id);
        self.modify(tier.tenant_id, |snap| {
            snap.tiers.insert(tier.id, tier);
        });
    }

    /// Flip the active flag of a branch
    pub fn set_branch_active(&self, tenant: TenantId, id: BranchId, active: bool) {
        self.modify(tenant, |snap| {
            if let Some(branch) = snap.branches.get_mut(&id) {
                branch.active = active;
            }
        });
    }

    /// Flip the active flag of a class type
    pub fn set_class_type_active(&self, tenant: TenantId, id: ClassTypeId, active: bool) {
        self.modify(tenant, |snap| {
            if let Some(class_type) = snap.class_types.get_mut(&id) {
                class_type.active = active;
            }
        });
    }

    /// Flip the active flag of a tier
    pub fn set_tier_active(&self, tenant: TenantId, id: TierId, active: bool) {
        self.modify(tenant, |snap| {
            if let Some(tier) = snap.tiers.get_mut(&id) {
                tier.active = active;
            }
        });
    }

    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Copy-on-write update of one tenant; readers keep their old Arc
    fn modify(&self, tenant: TenantId, f: impl FnOnce(&mut CatalogSnapshot)) {
        let revision = self.next_revision();
        let mut entry = self
            .tenants
            .entry(tenant)
            .or_insert_with(|| Arc::new(CatalogSnapshot::empty(tenant)));
        let mut next = (**entry.value()).clone();
        f(&mut next);
        next.revision = revision;
        *entry.value_mut() = Arc::new(next);
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog for InMemoryCatalog {
    fn snapshot(&self, tenant: TenantId) -> Arc<CatalogSnapshot> {
        self.tenants
            .get(&tenant)
            .map(|entry| Arc::clone(entry.value()))
            .unwrap_or_else(|| Arc::new(CatalogSnapshot::empty(tenant)))
    }

    fn tier(&self, tier_id: TierId) -> Option<Tier> {
        let tenant = *self.tier_index.get(&tier_id)?;
        self.snapshot(tenant).tiers.get(&tier_id).cloned()
    }
}
