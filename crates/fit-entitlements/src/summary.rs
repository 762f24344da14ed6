//! Staff-facing entitlement summary
//!
//! Names every branch and class type so staff can read the result without
//! cross-referencing ids, and splits branches by whether class booking is
//! allowlisted there.

use crate::catalog::CatalogSnapshot;
use crate::model::EffectiveEntitlements;
use chrono::{DateTime, Utc};
use fit_common::{BranchId, ClassTypeId, MemberId, Tier};
use serde::{Deserialize, Serialize};

/// Class type with its display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedClassType {
    /// Class type id
    pub id: ClassTypeId,
    /// Display name
    pub name: String,
}

/// One allowed branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSummary {
    /// Branch id
    pub id: BranchId,
    /// Display name
    pub name: String,
    /// Bookable class types at the branch
    pub class_types: Vec<NamedClassType>,
}

/// Entitlements of a member, ready for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementSummary {
    /// Member the summary describes
    pub member_id: MemberId,
    /// Resolved tier, `None` when dangling
    pub tier: Option<Tier>,
    /// Evaluation instant
    pub evaluated_at: DateTime<Utc>,
    /// Resolution failed closed (dangling tier or missing policy)
    pub fail_closed: bool,
    /// Branches where every active class type is bookable
    pub unrestricted: Vec<BranchSummary>,
    /// Branches where only listed class types are bookable
    pub allowlisted: Vec<BranchSummary>,
}

impl EntitlementSummary {
    /// Attach catalog names to a resolution
    pub fn build(
        member_id: MemberId,
        tier: Option<Tier>,
        evaluated_at: DateTime<Utc>,
        fail_closed: bool,
        entitlements: &EffectiveEntitlements,
        catalog: &CatalogSnapshot,
    ) -> Self {
        let mut unrestricted = Vec::new();
        let mut allowlisted = Vec::new();

        for (branch, access) in &entitlements.class_access {
            let summary = BranchSummary {
                id: *branch,
                name: catalog
                    .branches
                    .get(branch)
                    .map(|b| b.name.clone())
                    .unwrap_or_else(|| branch.to_string()),
                class_types: access
                    .allowed_class_types
                    .iter()
                    .map(|id| NamedClassType {
                        id: *id,
                        name: catalog
                            .class_types
                            .get(id)
                            .map(|c| c.name.clone())
                            .unwrap_or_else(|| id.to_string()),
                    })
                    .collect(),
            };
            if access.class_allowlist_enabled {
                allowlisted.push(summary);
            } else {
                unrestricted.push(summary);
            }
        }

        Self {
            member_id,
            tier,
            evaluated_at,
            fail_closed,
            unrestricted,
            allowlisted,
        }
    }

    /// Number of branches the member may enter
    pub fn branch_count(&self) -> usize {
        self.unrestricted.len() + self.allowlisted.len()
    }
}
