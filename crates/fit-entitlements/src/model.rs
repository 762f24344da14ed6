//! Policy, override and result types

use chrono::{DateTime, Utc};
use fit_common::{BranchId, ClassTypeId, Scope, ValidityWindow};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Tier-level class allowlist entry
///
/// Tier rules are allow-only; `allow: false` is rejected on write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TierClassRule {
    /// Where the rule applies
    pub scope: Scope,
    /// Class type the rule grants
    pub target: ClassTypeId,
    /// Always true for stored tier rules
    #[serde(default = "default_allow")]
    pub allow: bool,
}

fn default_allow() -> bool {
    true
}

impl TierClassRule {
    /// Allow `target` at every branch
    pub fn global(target: ClassTypeId) -> Self {
        Self {
            scope: Scope::Global,
            target,
            allow: true,
        }
    }

    /// Allow `target` at one branch
    pub fn at_branch(branch: BranchId, target: ClassTypeId) -> Self {
        Self {
            scope: Scope::Branch(branch),
            target,
            allow: true,
        }
    }
}

/// Default branch scope and class allowlist of a tier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPolicy {
    /// Grant every active branch of the tenant
    pub all_branches: bool,
    /// Granted branches, read only when `all_branches` is false
    #[serde(default)]
    pub branch_ids: BTreeSet<BranchId>,
    /// Any rule switches the tier to class allowlisting
    #[serde(default)]
    pub class_rules: Vec<TierClassRule>,
}

impl TierPolicy {
    /// Policy granting every active branch
    pub fn all_branches() -> Self {
        Self {
            all_branches: true,
            ..Default::default()
        }
    }

    /// Policy granting the listed branches
    pub fn branches(ids: impl IntoIterator<Item = BranchId>) -> Self {
        Self {
            all_branches: false,
            branch_ids: ids.into_iter().collect(),
            class_rules: Vec::new(),
        }
    }

    /// Add a class rule
    pub fn with_rule(mut self, rule: TierClassRule) -> Self {
        self.class_rules.push(rule);
        self
    }

    /// Whether class access is allowlisted for this tier
    #[inline]
    pub fn class_allowlist_enabled(&self) -> bool {
        !self.class_rules.is_empty()
    }
}

/// Per-member branch grant or revocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberBranchOverride {
    /// Branch the override decides
    pub branch_id: BranchId,
    /// Grant or revoke
    pub allow: bool,
    /// Staff note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Validity window
    #[serde(flatten)]
    pub window: ValidityWindow,
}

impl MemberBranchOverride {
    /// Unbounded grant
    pub fn allow(branch_id: BranchId) -> Self {
        Self {
            branch_id,
            allow: true,
            reason: None,
            window: ValidityWindow::always(),
        }
    }

    /// Unbounded revocation
    pub fn deny(branch_id: BranchId) -> Self {
        Self {
            allow: false,
            ..Self::allow(branch_id)
        }
    }

    /// Set validity window
    pub fn valid(mut self, window: ValidityWindow) -> Self {
        self.window = window;
        self
    }

    /// Set staff reason
    pub fn because(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// In force at `now`
    #[inline]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.window.contains(now)
    }
}

/// Per-member class type grant or revocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberClassOverride {
    /// Where the override applies
    pub scope: Scope,
    /// Class type the override decides
    pub target: ClassTypeId,
    /// Grant or revoke
    pub allow: bool,
    /// Staff note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Validity window
    #[serde(flatten)]
    pub window: ValidityWindow,
}

impl MemberClassOverride {
    /// Unbounded grant
    pub fn allow(scope: Scope, target: ClassTypeId) -> Self {
        Self {
            scope,
            target,
            allow: true,
            reason: None,
            window: ValidityWindow::always(),
        }
    }

    /// Unbounded revocation
    pub fn deny(scope: Scope, target: ClassTypeId) -> Self {
        Self {
            allow: false,
            ..Self::allow(scope, target)
        }
    }

    /// Set validity window
    pub fn valid(mut self, window: ValidityWindow) -> Self {
        self.window = window;
        self
    }

    /// Set staff reason
    pub fn because(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// In force at `now`
    #[inline]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.window.contains(now)
    }
}

/// Class access at one allowed branch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchClassAccess {
    /// False means every active class type is bookable
    pub class_allowlist_enabled: bool,
    /// Bookable class types; every active one when unrestricted
    pub allowed_class_types: BTreeSet<ClassTypeId>,
}

impl BranchClassAccess {
    /// Check class type
    #[inline]
    pub fn allows(&self, class_type: ClassTypeId) -> bool {
        self.allowed_class_types.contains(&class_type)
    }
}

/// Resolved access of a member at one instant
///
/// Ordered collections keep two resolutions of the same inputs
/// structurally identical, including their serialised form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveEntitlements {
    /// Branches the member may enter
    pub allowed_branches: BTreeSet<BranchId>,
    /// Class access per allowed branch
    pub class_access: BTreeMap<BranchId, BranchClassAccess>,
}

impl EffectiveEntitlements {
    /// No branches, no class types
    pub fn deny_all() -> Self {
        Self::default()
    }

    /// Record an allowed branch with its class access
    pub(crate) fn grant(&mut self, branch: BranchId, access: BranchClassAccess) {
        self.allowed_branches.insert(branch);
        self.class_access.insert(branch, access);
    }

    /// Nothing granted
    pub fn is_empty(&self) -> bool {
        self.allowed_branches.is_empty()
    }

    /// Check-in eligibility
    #[inline]
    pub fn allows_branch(&self, branch: BranchId) -> bool {
        self.allowed_branches.contains(&branch)
    }

    /// Booking eligibility: branch first, then class type
    #[inline]
    pub fn allows_class(&self, branch: BranchId, class_type: ClassTypeId) -> bool {
        self.allows_branch(branch)
            && self
                .class_access
                .get(&branch)
                .map(|access| access.allows(class_type))
                .unwrap_or(false)
    }

    /// Class access at `branch`
    pub fn class_access(&self, branch: BranchId) -> Option<&BranchClassAccess> {
        self.class_access.get(&branch)
    }
}
