//! Entitlement resolver
//!
//! Pure computation over already-fetched snapshots. No I/O, no locks, no
//! shared state: any number of admissions may resolve concurrently.
//!
//! # Class access ladder
//!
//! ```text
//!   most specific ──►  1. member override, Branch(b)
//!                      2. member override, Global
//!                      3. tier rule,       Branch(b)
//!   least specific ─►  4. tier rule,       Global
//! ```
//!
//! Each class type is decided by the first level that mentions it. A deny
//! high on the ladder therefore hides any allow further down.

use crate::catalog::CatalogSnapshot;
use crate::model::{BranchClassAccess, EffectiveEntitlements, TierPolicy};
use crate::overrides::MemberOverrides;
use chrono::{DateTime, Utc};
use fit_common::{BranchId, ClassTypeId, Scope};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Which rule decided a class type at a branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// Member override scoped to the branch
    MemberBranchOverride,
    /// Member override scoped globally
    MemberGlobalOverride,
    /// Tier rule scoped to the branch
    TierBranchRule,
    /// Tier rule scoped globally
    TierGlobalRule,
    /// No allowlist applies at the branch
    Unrestricted,
    /// Allowlisting applies and nothing mentions the class type
    NotListed,
    /// Member may not enter the branch at all
    BranchNotAllowed,
    /// Class type unknown or deactivated
    ClassTypeInactive,
}

/// Outcome of [`Resolver::explain_class`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDecision {
    /// Final verdict
    pub allowed: bool,
    /// Ladder level or condition that decided it
    pub source: DecisionSource,
}

/// Ladder levels, most specific first
const LADDER: [DecisionSource; 4] = [
    DecisionSource::MemberBranchOverride,
    DecisionSource::MemberGlobalOverride,
    DecisionSource::TierBranchRule,
    DecisionSource::TierGlobalRule,
];

/// Verdicts of one ladder level, keyed by class type
type Level = BTreeMap<ClassTypeId, bool>;

/// Resolution of one member against fixed snapshots
///
/// `policy` is `None` when the member's tier is missing or inactive; the
/// result is then empty.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    catalog: &'a CatalogSnapshot,
    policy: Option<&'a TierPolicy>,
    overrides: &'a MemberOverrides,
    now: DateTime<Utc>,
}

impl<'a> Resolver<'a> {
    /// Bind snapshots and evaluation instant
    pub fn new(
        catalog: &'a CatalogSnapshot,
        policy: Option<&'a TierPolicy>,
        overrides: &'a MemberOverrides,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            catalog,
            policy,
            overrides,
            now,
        }
    }

    /// Compute effective entitlements
    pub fn resolve(&self) -> EffectiveEntitlements {
        let Some(policy) = self.policy else {
            return EffectiveEntitlements::deny_all();
        };

        let active_classes = self.catalog.active_class_type_ids();
        let mut result = EffectiveEntitlements::deny_all();
        for branch in self.effective_branches(policy) {
            let access = self.class_access(policy, branch, &active_classes);
            result.grant(branch, access);
        }
        result
    }

    /// Step 1: tier default, then valid branch overrides decide outright
    fn effective_branches(&self, policy: &TierPolicy) -> BTreeSet<BranchId> {
        let active = self.catalog.active_branch_ids();
        let mut allowed: BTreeSet<BranchId> = if policy.all_branches {
            active.clone()
        } else {
            policy.branch_ids.intersection(&active).copied().collect()
        };

        // Several valid overrides on one branch: any deny wins
        let mut decided: BTreeMap<BranchId, bool> = BTreeMap::new();
        for o in self.overrides.branch.iter().filter(|o| o.is_valid_at(self.now)) {
            if !active.contains(&o.branch_id) {
                debug!(branch = %o.branch_id, "stale branch override ignored");
                continue;
            }
            decided
                .entry(o.branch_id)
                .and_modify(|allow| *allow &= o.allow)
                .or_insert(o.allow);
        }

        for (branch, allow) in decided {
            if allow {
                allowed.insert(branch);
            } else {
                allowed.remove(&branch);
            }
        }
        allowed
    }

    /// Step 2: class access at one effective branch
    fn class_access(
        &self,
        policy: &TierPolicy,
        branch: BranchId,
        active_classes: &BTreeSet<ClassTypeId>,
    ) -> BranchClassAccess {
        let levels = self.ladder(policy, branch);
        if !self.allowlisting(policy, &levels) {
            return BranchClassAccess {
                class_allowlist_enabled: false,
                allowed_class_types: active_classes.clone(),
            };
        }

        let mentioned: BTreeSet<ClassTypeId> = levels
            .iter()
            .flat_map(|level| level.keys().copied())
            .collect();
        let allowed_class_types = mentioned
            .into_iter()
            .filter(|target| first_match(&levels, *target).map(|(allow, _)| allow).unwrap_or(false))
            .collect();

        BranchClassAccess {
            class_allowlist_enabled: true,
            allowed_class_types,
        }
    }

    /// Tier rules exist, or a valid member class override reaches the branch
    fn allowlisting(&self, policy: &TierPolicy, levels: &[Level; 4]) -> bool {
        policy.class_allowlist_enabled() || !levels[0].is_empty() || !levels[1].is_empty()
    }

    /// Build the four ladder levels for `branch`, dropping stale targets
    fn ladder(&self, policy: &TierPolicy, branch: BranchId) -> [Level; 4] {
        let mut levels: [Level; 4] = Default::default();

        for o in self.overrides.class.iter().filter(|o| o.is_valid_at(self.now)) {
            let slot = match o.scope {
                Scope::Branch(b) if b == branch => 0,
                Scope::Branch(_) => continue,
                Scope::Global => 1,
            };
            if !self.catalog.is_class_type_active(o.target) {
                debug!(class_type = %o.target, "stale class override ignored");
                continue;
            }
            // Several valid overrides at one level: any deny wins
            levels[slot]
                .entry(o.target)
                .and_modify(|allow| *allow &= o.allow)
                .or_insert(o.allow);
        }

        for rule in &policy.class_rules {
            let slot = match rule.scope {
                Scope::Branch(b) if b == branch => 2,
                Scope::Branch(_) => continue,
                Scope::Global => 3,
            };
            if !self.catalog.is_class_type_active(rule.target) {
                continue;
            }
            levels[slot]
                .entry(rule.target)
                .and_modify(|allow| *allow &= rule.allow)
                .or_insert(rule.allow);
        }
        levels
    }

    /// Explain how one class type is decided at one branch
    pub fn explain_class(&self, branch: BranchId, class_type: ClassTypeId) -> ClassDecision {
        let Some(policy) = self.policy else {
            return ClassDecision::deny(DecisionSource::BranchNotAllowed);
        };
        if !self.effective_branches(policy).contains(&branch) {
            return ClassDecision::deny(DecisionSource::BranchNotAllowed);
        }
        if !self.catalog.is_class_type_active(class_type) {
            return ClassDecision::deny(DecisionSource::ClassTypeInactive);
        }

        let levels = self.ladder(policy, branch);
        if !self.allowlisting(policy, &levels) {
            return ClassDecision {
                allowed: true,
                source: DecisionSource::Unrestricted,
            };
        }
        match first_match(&levels, class_type) {
            Some((allowed, source)) => ClassDecision { allowed, source },
            None => ClassDecision::deny(DecisionSource::NotListed),
        }
    }

    /// Earliest instant after `now` at which an override window opens or
    /// closes; a result computed at `now` holds until then
    pub fn next_transition(&self) -> Option<DateTime<Utc>> {
        self.overrides.next_transition(self.now)
    }
}

impl ClassDecision {
    fn deny(source: DecisionSource) -> Self {
        Self {
            allowed: false,
            source,
        }
    }
}

/// First level mentioning `target`, most specific first
#[inline]
fn first_match(levels: &[Level; 4], target: ClassTypeId) -> Option<(bool, DecisionSource)> {
    levels
        .iter()
        .zip(LADDER)
        .find_map(|(level, source)| level.get(&target).map(|allow| (*allow, source)))
}
