//! Persisted layout of the policy and override stores
//!
//! One `tier_policy` entry per tier, and per member one complete
//! `member_branch_override` and one complete `member_class_override` set.
//! Importing checks every entry with the same rules as a staff edit before
//! writing any of them, so a rejected document leaves both stores untouched.

use crate::error::EntitlementResult;
use crate::model::{MemberBranchOverride, MemberClassOverride, TierPolicy};
use crate::overrides::OverrideStore;
use crate::policy::PolicyStore;
use fit_common::{MemberId, TierId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Serialisable image of both stores
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreDocument {
    /// Policy per tier
    pub tier_policy: BTreeMap<TierId, TierPolicy>,
    /// Complete branch override set per member
    pub member_branch_override: BTreeMap<MemberId, Vec<MemberBranchOverride>>,
    /// Complete class override set per member
    pub member_class_override: BTreeMap<MemberId, Vec<MemberClassOverride>>,
}

/// Counts of an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Tier policies written
    pub tier_policies: usize,
    /// Branch override sets written
    pub branch_override_sets: usize,
    /// Class override sets written
    pub class_override_sets: usize,
}

impl StoreDocument {
    /// Capture the current content of both stores
    pub fn export(policies: &PolicyStore, overrides: &OverrideStore) -> Self {
        let mut doc = Self::default();
        for record in policies.records() {
            doc.tier_policy.insert(record.tier_id, record.policy.clone());
        }
        for set in overrides.all() {
            if !set.branch.is_empty() {
                doc.member_branch_override.insert(set.member_id, set.branch.clone());
            }
            if !set.class.is_empty() {
                doc.member_class_override.insert(set.member_id, set.class.clone());
            }
        }
        doc
    }

    /// Validate every entry, then write them all
    ///
    /// Nothing is written when any entry is rejected.
    pub fn import_into(
        &self,
        policies: &PolicyStore,
        overrides: &OverrideStore,
    ) -> EntitlementResult<ImportReport> {
        self.check(policies, overrides)?;

        let mut report = ImportReport::default();
        for (tier_id, policy) in &self.tier_policy {
            policies.set_tier_policy(*tier_id, policy.clone())?;
            report.tier_policies += 1;
        }
        for (member_id, set) in &self.member_branch_override {
            overrides.set_branch_overrides(*member_id, set.clone())?;
            report.branch_override_sets += 1;
        }
        for (member_id, set) in &self.member_class_override {
            overrides.set_class_overrides(*member_id, set.clone())?;
            report.class_override_sets += 1;
        }
        info!(
            tier_policies = report.tier_policies,
            branch_sets = report.branch_override_sets,
            class_sets = report.class_override_sets,
            "store document imported"
        );
        Ok(report)
    }

    /// Validate every entry against the current catalogs
    pub fn check(&self, policies: &PolicyStore, overrides: &OverrideStore) -> EntitlementResult<()> {
        for (tier_id, policy) in &self.tier_policy {
            policies.check_tier_policy(*tier_id, policy)?;
        }
        for (member_id, set) in &self.member_branch_override {
            overrides.check_branch_overrides(*member_id, set)?;
        }
        for (member_id, set) in &self.member_class_override {
            overrides.check_class_overrides(*member_id, set)?;
        }
        Ok(())
    }

    /// Parse from JSON
    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }

    /// Render as pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::members::{InMemoryMemberDirectory, MemberRecord};
    use crate::model::TierClassRule;
    use fit_common::{Branch, BranchId, ClassType, ClassTypeId, Scope, TenantId, Tier};
    use std::sync::Arc;

    const T1: TenantId = TenantId::new(1);

    fn stores() -> (PolicyStore, OverrideStore) {
        let catalog = Arc::new(InMemoryCatalog::from_entities(
            vec![Branch { id: BranchId::new(1), tenant_id: T1, name: "Downtown".into(), active: true }],
            vec![ClassType { id: ClassTypeId::new(10), tenant_id: T1, name: "Spin".into(), active: true }],
            vec![Tier { id: TierId::new(1), tenant_id: T1, name: "Standard".into(), active: true }],
        ));
        let members = Arc::new(InMemoryMemberDirectory::from_records([MemberRecord {
            member_id: MemberId::new(100),
            tenant_id: T1,
            tier_id: TierId::new(1),
        }]));
        (
            PolicyStore::new(catalog.clone()),
            OverrideStore::new(catalog, members),
        )
    }

    #[test]
    fn test_layout_keys() {
        let json = r#"{
            "tier_policy": {
                "1": { "all_branches": false, "branch_ids": [1], "class_rules": [{ "scope": "global", "target": 10 }] }
            },
            "member_branch_override": {
                "100": [{ "branch_id": 1, "allow": false, "reason": "unpaid locker fee" }]
            }
        }"#;

        let doc = StoreDocument::from_json(json).unwrap();
        assert_eq!(
            doc.tier_policy[&TierId::new(1)].class_rules,
            vec![TierClassRule::global(ClassTypeId::new(10))]
        );
        assert!(doc.member_class_override.is_empty());

        let (policies, overrides) = stores();
        let report = doc.import_into(&policies, &overrides).unwrap();
        assert_eq!(report.tier_policies, 1);
        assert_eq!(report.branch_override_sets, 1);
        assert_eq!(StoreDocument::export(&policies, &overrides), doc);
    }

    #[test]
    fn test_import_rejects_invalid_reference() {
        let mut doc = StoreDocument::default();
        doc.member_class_override.insert(
            MemberId::new(100),
            vec![MemberClassOverride::allow(Scope::Global, ClassTypeId::new(77))],
        );

        let (policies, overrides) = stores();
        let err = doc.import_into(&policies, &overrides).unwrap_err();
        assert_eq!(err.field(), Some("overrides[0].target"));
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_rejected_import_writes_nothing() {
        let mut doc = StoreDocument::default();
        doc.tier_policy
            .insert(TierId::new(1), TierPolicy::branches([BranchId::new(1)]));
        doc.member_branch_override.insert(
            MemberId::new(100),
            vec![MemberBranchOverride::deny(BranchId::new(1)).because("unpaid locker fee")],
        );
        doc.member_class_override.insert(
            MemberId::new(100),
            vec![MemberClassOverride::allow(Scope::Global, ClassTypeId::new(77))],
        );

        let (policies, overrides) = stores();
        assert!(doc.import_into(&policies, &overrides).is_err());
        assert!(policies.is_empty());
        assert!(overrides.is_empty());
        assert!(overrides.list_branch_overrides(MemberId::new(100)).is_empty());

        doc.member_class_override.clear();
        let report = doc.import_into(&policies, &overrides).unwrap();
        assert_eq!(report.tier_policies, 1);
        assert_eq!(report.branch_override_sets, 1);
        assert_eq!(policies.len(), 1);
    }
}
