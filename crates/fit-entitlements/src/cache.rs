//! Entitlement cache for admission terminals
//!
//! Entries are keyed by member and carry the revision stamp they were
//! computed under. A lookup whose stamp differs, or whose instant falls
//! outside the span the result is known to hold for, is a miss.

use crate::model::EffectiveEntitlements;
use chrono::{DateTime, Utc};
use fit_common::{MemberId, TenantId, TierId};
use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Everything a cached resolution depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RevisionStamp {
    /// Member's tenant
    pub tenant_id: TenantId,
    /// Member's tier at resolution time
    pub tier_id: TierId,
    /// Catalog revision of the tenant
    pub catalog: u64,
    /// Tier policy revision
    pub policy: u64,
    /// Member override revision
    pub overrides: u64,
}

#[derive(Debug, Clone)]
struct CachedEntitlements {
    stamp: RevisionStamp,
    evaluated_at: DateTime<Utc>,
    /// Next override window boundary; `None` means the result never expires by time
    stable_until: Option<DateTime<Utc>>,
    entitlements: Arc<EffectiveEntitlements>,
}

impl CachedEntitlements {
    #[inline]
    fn holds_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.evaluated_at && self.stable_until.map_or(true, |until| now < until)
    }
}

/// Member entitlement cache with LRU eviction
pub struct EntitlementCache {
    cache: Cache<MemberId, CachedEntitlements>,
}

impl EntitlementCache {
    /// Create cache with capacity and time-to-live
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    /// Get cached entitlements if stamp and instant still match
    #[inline]
    pub fn get(
        &self,
        member_id: MemberId,
        stamp: &RevisionStamp,
        now: DateTime<Utc>,
    ) -> Option<Arc<EffectiveEntitlements>> {
        self.cache.get(&member_id).and_then(|entry| {
            if entry.stamp == *stamp && entry.holds_at(now) {
                Some(entry.entitlements)
            } else {
                None
            }
        })
    }

    /// Insert a fresh resolution
    pub fn insert(
        &self,
        member_id: MemberId,
        stamp: RevisionStamp,
        evaluated_at: DateTime<Utc>,
        stable_until: Option<DateTime<Utc>>,
        entitlements: Arc<EffectiveEntitlements>,
    ) {
        self.cache.insert(
            member_id,
            CachedEntitlements {
                stamp,
                evaluated_at,
                stable_until,
                entitlements,
            },
        );
    }

    /// Drop one member
    pub fn invalidate(&self, member_id: MemberId) {
        self.cache.invalidate(&member_id);
    }

    /// Clear cache
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// Get current size
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.cache.entry_count() == 0
    }
}

impl Default for EntitlementCache {
    fn default() -> Self {
        Self::new(65536, Duration::from_secs(300))
    }
}
