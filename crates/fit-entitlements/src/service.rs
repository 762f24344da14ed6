//! Entitlement service
//!
//! The query surface used by check-in admission, class-booking admission and
//! staff tooling. Every query resolves from the current snapshots (or a
//! cached resolution stamped with the same revisions) and never fails:
//! anything that cannot be resolved is denied.

use crate::cache::{EntitlementCache, RevisionStamp};
use crate::catalog::{Catalog, CatalogSnapshot};
use crate::config::EntitlementConfig;
use crate::error::EntitlementResult;
use crate::members::{MemberDirectory, MemberRecord};
use crate::model::{EffectiveEntitlements, MemberBranchOverride, MemberClassOverride, TierPolicy};
use crate::overrides::{MemberOverrides, OverrideStore};
use crate::policy::{PolicyRecord, PolicyStore};
use crate::resolver::{ClassDecision, DecisionSource, Resolver};
use crate::summary::EntitlementSummary;
use chrono::{DateTime, Utc};
use fit_common::{AtomicCounter, BranchId, ClassTypeId, Clock, MemberId, Tier, TierId};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything needed to resolve one member, fetched once per query
struct MemberContext {
    record: MemberRecord,
    /// Active tier of the member's tenant
    tier: Option<Tier>,
    catalog: Arc<CatalogSnapshot>,
    policy: Option<Arc<PolicyRecord>>,
    overrides: Arc<MemberOverrides>,
}

impl MemberContext {
    fn stamp(&self) -> RevisionStamp {
        RevisionStamp {
            tenant_id: self.record.tenant_id,
            tier_id: self.record.tier_id,
            catalog: self.catalog.revision,
            policy: self.policy.as_ref().map(|p| p.revision).unwrap_or(0),
            overrides: self.overrides.revision,
        }
    }

    fn resolver(&self, now: DateTime<Utc>) -> Resolver<'_> {
        Resolver::new(
            &self.catalog,
            self.policy.as_ref().map(|p| &p.policy),
            &self.overrides,
            now,
        )
    }

    fn fail_closed(&self) -> bool {
        self.policy.is_none()
    }
}

/// Entitlement service
pub struct EntitlementService {
    catalog: Arc<dyn Catalog>,
    members: Arc<dyn MemberDirectory>,
    policies: Arc<PolicyStore>,
    overrides: Arc<OverrideStore>,
    clock: Arc<dyn Clock>,
    cache: Option<EntitlementCache>,
    config: EntitlementConfig,

    // Metrics
    resolutions: AtomicCounter,
    cache_hits: AtomicCounter,
    fail_closed: AtomicCounter,
    branch_checks: AtomicCounter,
    class_checks: AtomicCounter,
}

impl EntitlementService {
    /// Create service with fresh, empty stores
    pub fn new(
        catalog: Arc<dyn Catalog>,
        members: Arc<dyn MemberDirectory>,
        clock: Arc<dyn Clock>,
        config: EntitlementConfig,
    ) -> Self {
        let policies = Arc::new(PolicyStore::new(Arc::clone(&catalog)));
        let overrides = Arc::new(OverrideStore::new(Arc::clone(&catalog), Arc::clone(&members)));
        Self::with_stores(catalog, members, policies, overrides, clock, config)
    }

    /// Create service over existing stores
    pub fn with_stores(
        catalog: Arc<dyn Catalog>,
        members: Arc<dyn MemberDirectory>,
        policies: Arc<PolicyStore>,
        overrides: Arc<OverrideStore>,
        clock: Arc<dyn Clock>,
        config: EntitlementConfig,
    ) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| EntitlementCache::new(config.cache.max_capacity, config.cache.time_to_live()));
        Self {
            catalog,
            members,
            policies,
            overrides,
            clock,
            cache,
            config,
            resolutions: AtomicCounter::new(0),
            cache_hits: AtomicCounter::new(0),
            fail_closed: AtomicCounter::new(0),
            branch_checks: AtomicCounter::new(0),
            class_checks: AtomicCounter::new(0),
        }
    }

    // ------------------------------------------------------------------
    // Admission queries
    // ------------------------------------------------------------------

    /// Check-in admission
    pub fn is_allowed_at_branch(&self, member_id: MemberId, branch_id: BranchId) -> bool {
        self.is_allowed_at_branch_at(member_id, branch_id, self.clock.now())
    }

    /// Check-in admission at an explicit instant
    pub fn is_allowed_at_branch_at(
        &self,
        member_id: MemberId,
        branch_id: BranchId,
        now: DateTime<Utc>,
    ) -> bool {
        self.branch_checks.inc();
        let allowed = self
            .get_effective_entitlements_at(member_id, now)
            .allows_branch(branch_id);
        debug!(member = %member_id, branch = %branch_id, allowed, "check-in decision");
        allowed
    }

    /// Class-booking admission
    pub fn is_allowed_for_class(
        &self,
        member_id: MemberId,
        branch_id: BranchId,
        class_type_id: ClassTypeId,
    ) -> bool {
        self.is_allowed_for_class_at(member_id, branch_id, class_type_id, self.clock.now())
    }

    /// Class-booking admission at an explicit instant
    pub fn is_allowed_for_class_at(
        &self,
        member_id: MemberId,
        branch_id: BranchId,
        class_type_id: ClassTypeId,
        now: DateTime<Utc>,
    ) -> bool {
        self.class_checks.inc();
        let allowed = self
            .get_effective_entitlements_at(member_id, now)
            .allows_class(branch_id, class_type_id);
        debug!(
            member = %member_id,
            branch = %branch_id,
            class_type = %class_type_id,
            allowed,
            "booking decision"
        );
        allowed
    }

    /// Effective entitlements now
    pub fn get_effective_entitlements(&self, member_id: MemberId) -> Arc<EffectiveEntitlements> {
        self.get_effective_entitlements_at(member_id, self.clock.now())
    }

    /// Effective entitlements at an explicit instant
    pub fn get_effective_entitlements_at(
        &self,
        member_id: MemberId,
        now: DateTime<Utc>,
    ) -> Arc<EffectiveEntitlements> {
        match self.context(member_id) {
            Some(ctx) => self.entitlements_for(&ctx, now),
            None => Arc::new(EffectiveEntitlements::deny_all()),
        }
    }

    /// Staff-facing summary now
    pub fn entitlement_summary(&self, member_id: MemberId) -> EntitlementSummary {
        self.entitlement_summary_at(member_id, self.clock.now())
    }

    /// Staff-facing summary at an explicit instant
    pub fn entitlement_summary_at(&self, member_id: MemberId, now: DateTime<Utc>) -> EntitlementSummary {
        match self.context(member_id) {
            Some(ctx) => {
                let entitlements = self.entitlements_for(&ctx, now);
                EntitlementSummary::build(
                    member_id,
                    ctx.tier.clone(),
                    now,
                    ctx.fail_closed(),
                    &entitlements,
                    &ctx.catalog,
                )
            }
            None => EntitlementSummary {
                member_id,
                tier: None,
                evaluated_at: now,
                fail_closed: true,
                unrestricted: Vec::new(),
                allowlisted: Vec::new(),
            },
        }
    }

    /// Which rule decides a class type at a branch, now
    pub fn explain_class_access(
        &self,
        member_id: MemberId,
        branch_id: BranchId,
        class_type_id: ClassTypeId,
    ) -> ClassDecision {
        self.explain_class_access_at(member_id, branch_id, class_type_id, self.clock.now())
    }

    /// Which rule decides a class type at a branch, at an explicit instant
    pub fn explain_class_access_at(
        &self,
        member_id: MemberId,
        branch_id: BranchId,
        class_type_id: ClassTypeId,
        now: DateTime<Utc>,
    ) -> ClassDecision {
        match self.context(member_id) {
            Some(ctx) => ctx.resolver(now).explain_class(branch_id, class_type_id),
            None => ClassDecision {
                allowed: false,
                source: DecisionSource::BranchNotAllowed,
            },
        }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Policy of an active tier
    pub fn get_tier_policy(&self, tier_id: TierId) -> EntitlementResult<TierPolicy> {
        self.policies.get_tier_policy(tier_id)
    }

    /// Replace a tier's policy
    pub fn set_tier_policy(&self, tier_id: TierId, policy: TierPolicy) -> EntitlementResult<u64> {
        let revision = self.policies.set_tier_policy(tier_id, policy)?;
        // Tier edits are rare and touch every member on the tier
        if let Some(cache) = &self.cache {
            cache.clear();
        }
        Ok(revision)
    }

    /// Branch overrides of a member
    pub fn list_branch_overrides(&self, member_id: MemberId) -> Vec<MemberBranchOverride> {
        self.overrides.list_branch_overrides(member_id)
    }

    /// Replace a member's branch overrides
    pub fn set_branch_overrides(
        &self,
        member_id: MemberId,
        overrides: Vec<MemberBranchOverride>,
    ) -> EntitlementResult<u64> {
        let revision = self.overrides.set_branch_overrides(member_id, overrides)?;
        self.invalidate(member_id);
        Ok(revision)
    }

    /// Class overrides of a member
    pub fn list_class_overrides(&self, member_id: MemberId) -> Vec<MemberClassOverride> {
        self.overrides.list_class_overrides(member_id)
    }

    /// Replace a member's class overrides
    pub fn set_class_overrides(
        &self,
        member_id: MemberId,
        overrides: Vec<MemberClassOverride>,
    ) -> EntitlementResult<u64> {
        let revision = self.overrides.set_class_overrides(member_id, overrides)?;
        self.invalidate(member_id);
        Ok(revision)
    }

    /// Remove every override of a member
    pub fn clear_member_overrides(&self, member_id: MemberId) -> bool {
        let cleared = self.overrides.clear_member(member_id);
        self.invalidate(member_id);
        cleared
    }

    /// Drop overrides that have closed for good
    pub fn purge_expired_overrides(&self) -> usize {
        let purged = self.overrides.purge_expired(self.clock.now());
        for member_id in &purged {
            self.invalidate(*member_id);
        }
        purged.len()
    }

    /// Policy store
    pub fn policies(&self) -> &Arc<PolicyStore> {
        &self.policies
    }

    /// Override store
    pub fn overrides(&self) -> &Arc<OverrideStore> {
        &self.overrides
    }

    /// Active configuration
    pub fn config(&self) -> &EntitlementConfig {
        &self.config
    }

    /// Get service statistics
    pub fn stats(&self) -> ServiceStats {
        let total = self.resolutions.get() + self.cache_hits.get();
        let hits = self.cache_hits.get();
        ServiceStats {
            resolutions: self.resolutions.get(),
            cache_hits: hits,
            cache_hit_rate: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
            cache_entries: self.cache.as_ref().map(|c| c.len()).unwrap_or(0),
            fail_closed: self.fail_closed.get(),
            branch_checks: self.branch_checks.get(),
            class_checks: self.class_checks.get(),
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn invalidate(&self, member_id: MemberId) {
        if let Some(cache) = &self.cache {
            cache.invalidate(member_id);
        }
    }

    /// Fetch all snapshots for a member; `None` when the member is unknown
    fn context(&self, member_id: MemberId) -> Option<MemberContext> {
        let Some(record) = self.members.member(member_id) else {
            self.fail_closed.inc();
            if self.config.warn_on_fail_closed {
                warn!(member = %member_id, "unknown member, denying access");
            }
            return None;
        };

        let catalog = self.catalog.snapshot(record.tenant_id);
        let tier = catalog.active_tier(record.tier_id).cloned();
        let policy = tier.as_ref().and_then(|_| self.policies.snapshot(record.tier_id));

        if policy.is_none() {
            self.fail_closed.inc();
            if self.config.warn_on_fail_closed {
                let reason = if tier.is_none() {
                    "tier missing or inactive"
                } else {
                    "tier has no policy"
                };
                warn!(
                    member = %member_id,
                    tier = %record.tier_id,
                    tenant = %record.tenant_id,
                    reason,
                    "dangling tier assignment, resolving fail-closed"
                );
            }
        }

        Some(MemberContext {
            record,
            tier,
            catalog,
            policy,
            overrides: self.overrides.snapshot(member_id),
        })
    }

    fn entitlements_for(&self, ctx: &MemberContext, now: DateTime<Utc>) -> Arc<EffectiveEntitlements> {
        let member_id = ctx.record.member_id;
        let stamp = ctx.stamp();

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(member_id, &stamp, now) {
                self.cache_hits.inc();
                return hit;
            }
        }

        self.resolutions.inc();
        let resolver = ctx.resolver(now);
        let entitlements = Arc::new(resolver.resolve());

        if let Some(cache) = &self.cache {
            cache.insert(
                member_id,
                stamp,
                now,
                resolver.next_transition(),
                Arc::clone(&entitlements),
            );
        }
        entitlements
    }
}

/// Service statistics
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    /// Resolutions computed
    pub resolutions: u64,
    /// Resolutions served from cache
    pub cache_hits: u64,
    /// Hits over all lookups
    pub cache_hit_rate: f64,
    /// Members currently cached
    pub cache_entries: u64,
    /// Resolutions that failed closed
    pub fail_closed: u64,
    /// Branch admission checks
    pub branch_checks: u64,
    /// Class booking checks
    pub class_checks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::members::InMemoryMemberDirectory;
    use crate::model::TierClassRule;
    use chrono::{Duration, TimeZone};
    use fit_common::{Branch, ClassType, FixedClock, Scope, TenantId, ValidityWindow};

    const T1: TenantId = TenantId::new(1);
    const STANDARD: TierId = TierId::new(1);
    const ALICE: MemberId = MemberId::new(100);
    const BOB: MemberId = MemberId::new(101);

    fn b(id: u64) -> BranchId {
        BranchId::new(id)
    }

    fn c(id: u64) -> ClassTypeId {
        ClassTypeId::new(id)
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
    }

    struct Fixture {
        catalog: Arc<InMemoryCatalog>,
        members: Arc<InMemoryMemberDirectory>,
        clock: Arc<FixedClock>,
        service: EntitlementService,
    }

    fn fixture_with(config: EntitlementConfig) -> Fixture {
        let catalog = Arc::new(InMemoryCatalog::new());
        for id in 1..=3 {
            catalog.upsert_branch(Branch {
                id: b(id),
                tenant_id: T1,
                name: format!("Branch {}", id),
                active: true,
            });
        }
        for id in [10, 11] {
            catalog.upsert_class_type(ClassType {
                id: c(id),
                tenant_id: T1,
                name: format!("Class {}", id),
                active: true,
            });
        }
        catalog.upsert_tier(Tier {
            id: STANDARD,
            tenant_id: T1,
            name: "Standard".into(),
            active: true,
        });

        let members = Arc::new(InMemoryMemberDirectory::from_records([
            MemberRecord { member_id: ALICE, tenant_id: T1, tier_id: STANDARD },
            MemberRecord { member_id: BOB, tenant_id: T1, tier_id: TierId::new(9) },
        ]));
        let clock = Arc::new(FixedClock::new(start()));
        let service = EntitlementService::new(
            catalog.clone(),
            members.clone(),
            clock.clone(),
            config,
        );
        service
            .set_tier_policy(STANDARD, TierPolicy::branches([b(1)]))
            .unwrap();

        Fixture { catalog, members, clock, service }
    }

    fn fixture() -> Fixture {
        fixture_with(EntitlementConfig::default())
    }

    #[test]
    fn test_standard_tier_without_overrides() {
        let f = fixture();
        let ent = f.service.get_effective_entitlements(ALICE);

        assert_eq!(ent.allowed_branches, [b(1)].into_iter().collect());
        let access = ent.class_access(b(1)).unwrap();
        assert!(!access.class_allowlist_enabled);
        assert!(f.service.is_allowed_for_class(ALICE, b(1), c(10)));
        assert!(f.service.is_allowed_for_class(ALICE, b(1), c(11)));
    }

    #[test]
    fn test_branch_allow_override() {
        let f = fixture();
        f.service
            .set_branch_overrides(ALICE, vec![MemberBranchOverride::allow(b(2))])
            .unwrap();

        let ent = f.service.get_effective_entitlements(ALICE);
        assert_eq!(ent.allowed_branches, [b(1), b(2)].into_iter().collect());
        assert!(f.service.is_allowed_at_branch(ALICE, b(2)));
        assert!(!f.service.is_allowed_at_branch(ALICE, b(3)));
    }

    #[test]
    fn test_global_tier_rule_and_branch_deny() {
        let f = fixture();
        f.service
            .set_tier_policy(
                STANDARD,
                TierPolicy::branches([b(1), b(2)]).with_rule(TierClassRule::global(c(10))),
            )
            .unwrap();

        let access = f.service.get_effective_entitlements(ALICE).class_access(b(1)).cloned().unwrap();
        assert!(access.class_allowlist_enabled);
        assert_eq!(access.allowed_class_types, [c(10)].into_iter().collect());

        f.service
            .set_class_overrides(ALICE, vec![MemberClassOverride::deny(Scope::Branch(b(1)), c(10))])
            .unwrap();

        assert!(!f.service.is_allowed_for_class(ALICE, b(1), c(10)));
        assert!(f.service.is_allowed_for_class(ALICE, b(2), c(10)));
        assert!(!f.service.is_allowed_for_class(ALICE, b(2), c(11)));
    }

    #[test]
    fn test_future_override_waits_for_window() {
        let f = fixture();
        let opens = start() + Duration::days(7);
        f.service
            .set_branch_overrides(
                ALICE,
                vec![MemberBranchOverride::allow(b(3)).valid(ValidityWindow::starting(opens))],
            )
            .unwrap();

        assert!(!f.service.is_allowed_at_branch(ALICE, b(3)));

        // cached result must not outlive the window boundary
        f.clock.set(opens);
        assert!(f.service.is_allowed_at_branch(ALICE, b(3)));
    }

    #[test]
    fn test_dangling_tier_fails_closed() {
        let f = fixture();

        assert!(f.service.get_effective_entitlements(BOB).is_empty());
        assert!(!f.service.is_allowed_at_branch(BOB, b(1)));
        assert!(f.service.entitlement_summary(BOB).fail_closed);
        assert!(f.service.stats().fail_closed >= 3);

        // staff reassign a valid tier
        f.members.assign_tier(BOB, STANDARD);
        assert!(f.service.is_allowed_at_branch(BOB, b(1)));
    }

    #[test]
    fn test_deactivated_tier_fails_closed() {
        let f = fixture();
        assert!(f.service.is_allowed_at_branch(ALICE, b(1)));

        f.catalog.set_tier_active(T1, STANDARD, false);
        assert!(!f.service.is_allowed_at_branch(ALICE, b(1)));
        assert!(f.service.get_tier_policy(STANDARD).is_err());
    }

    #[test]
    fn test_unknown_member_is_denied() {
        let f = fixture();
        assert!(!f.service.is_allowed_at_branch(MemberId::new(999), b(1)));
        assert!(f.service.entitlement_summary(MemberId::new(999)).fail_closed);
        assert!(f
            .service
            .set_branch_overrides(MemberId::new(999), vec![])
            .is_err());
    }

    #[test]
    fn test_catalog_deactivation_narrows_access() {
        let f = fixture();
        f.service
            .set_branch_overrides(ALICE, vec![MemberBranchOverride::allow(b(2))])
            .unwrap();
        assert!(f.service.is_allowed_at_branch(ALICE, b(2)));

        f.catalog.set_branch_active(T1, b(2), false);
        assert!(!f.service.is_allowed_at_branch(ALICE, b(2)));
        assert!(f.service.is_allowed_at_branch(ALICE, b(1)));
    }

    #[test]
    fn test_cache_is_used_and_invalidated() {
        let f = fixture();
        f.service.get_effective_entitlements(ALICE);
        f.service.get_effective_entitlements(ALICE);
        assert_eq!(f.service.stats().cache_hits, 1);

        f.service
            .set_branch_overrides(ALICE, vec![MemberBranchOverride::deny(b(1))])
            .unwrap();
        assert!(!f.service.is_allowed_at_branch(ALICE, b(1)));
    }

    #[test]
    fn test_uncached_service_matches_cached() {
        let mut config = EntitlementConfig::default();
        config.cache.enabled = false;
        let uncached = fixture_with(config);
        let cached = fixture();

        for f in [&uncached, &cached] {
            f.service
                .set_class_overrides(ALICE, vec![MemberClassOverride::allow(Scope::Global, c(11))])
                .unwrap();
        }

        assert_eq!(
            uncached.service.get_effective_entitlements(ALICE),
            cached.service.get_effective_entitlements(ALICE)
        );
        assert_eq!(uncached.service.stats().cache_hits, 0);
    }

    #[test]
    fn test_summary_and_explain() {
        let f = fixture();
        f.service
            .set_branch_overrides(ALICE, vec![MemberBranchOverride::allow(b(2))])
            .unwrap();
        f.service
            .set_class_overrides(ALICE, vec![MemberClassOverride::allow(Scope::Branch(b(2)), c(10))])
            .unwrap();

        let summary = f.service.entitlement_summary(ALICE);
        assert!(!summary.fail_closed);
        assert_eq!(summary.tier.as_ref().unwrap().name, "Standard");
        assert_eq!(summary.unrestricted.len(), 1);
        assert_eq!(summary.allowlisted.len(), 1);
        assert_eq!(summary.allowlisted[0].name, "Branch 2");

        let decision = f.service.explain_class_access(ALICE, b(2), c(10));
        assert_eq!(decision.source, DecisionSource::MemberBranchOverride);
        assert!(decision.allowed);
        assert_eq!(
            f.service.explain_class_access(ALICE, b(2), c(11)).source,
            DecisionSource::NotListed
        );
    }

    #[test]
    fn test_purge_expired() {
        let f = fixture();
        f.service
            .set_branch_overrides(
                ALICE,
                vec![MemberBranchOverride::allow(b(2)).valid(ValidityWindow::until(start() + Duration::hours(1)))],
            )
            .unwrap();
        assert!(f.service.is_allowed_at_branch(ALICE, b(2)));

        f.clock.advance(Duration::hours(2));
        assert_eq!(f.service.purge_expired_overrides(), 1);
        assert!(f.service.list_branch_overrides(ALICE).is_empty());
        assert!(!f.service.is_allowed_at_branch(ALICE, b(2)));
    }

    #[test]
    fn test_concurrent_admissions() {
        let f = fixture();
        let service = Arc::new(f.service);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = Arc::clone(&service);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        if i == 0 {
                            service
                                .set_branch_overrides(ALICE, vec![MemberBranchOverride::allow(b(2))])
                                .unwrap();
                        }
                        assert!(service.is_allowed_at_branch(ALICE, b(1)));
                        assert!(!service.is_allowed_at_branch(ALICE, b(3)));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
