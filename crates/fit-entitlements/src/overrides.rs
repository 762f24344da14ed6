//! Per-member override store
//!
//! Staff resubmit a member's complete override set on every save. Each
//! member's branch and class overrides live together in one immutable
//! [`MemberOverrides`] value; a save builds a new value and swaps it in
//! under the member's map entry, so a reader holding the old `Arc` sees the
//! whole old set and the next reader sees the whole new one.

use crate::catalog::{Catalog, CatalogSnapshot};
use crate::error::{EntitlementError, EntitlementResult};
use crate::members::MemberDirectory;
use crate::model::{MemberBranchOverride, MemberClassOverride};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fit_common::{MemberId, ValidationResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Complete override set of one member at one revision
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberOverrides {
    /// Owner of the set
    pub member_id: MemberId,
    /// Branch overrides in submission order
    pub branch: Vec<MemberBranchOverride>,
    /// Class overrides in submission order
    pub class: Vec<MemberClassOverride>,
    /// 0 until the first save
    pub revision: u64,
}

impl MemberOverrides {
    /// Member without overrides
    pub fn empty(member_id: MemberId) -> Self {
        Self {
            member_id,
            ..Default::default()
        }
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.branch.is_empty() && self.class.is_empty()
    }

    /// Earliest bound strictly after `now` across every override
    pub fn next_transition(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let branch = self.branch.iter().map(|o| &o.window);
        let class = self.class.iter().map(|o| &o.window);
        branch
            .chain(class)
            .filter_map(|w| w.next_boundary(now))
            .min()
    }
}

/// Member override store with atomic whole-set replacement
pub struct OverrideStore {
    catalog: Arc<dyn Catalog>,
    members: Arc<dyn MemberDirectory>,
    overrides: DashMap<MemberId, Arc<MemberOverrides>>,
    /// Version for cache invalidation
    version: AtomicU64,
}

impl OverrideStore {
    /// Create empty store
    pub fn new(catalog: Arc<dyn Catalog>, members: Arc<dyn MemberDirectory>) -> Self {
        Self {
            catalog,
            members,
            overrides: DashMap::new(),
            version: AtomicU64::new(0),
        }
    }

    /// Get current version
    #[inline(always)]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Current override set of a member, empty when never saved
    #[inline]
    pub fn snapshot(&self, member_id: MemberId) -> Arc<MemberOverrides> {
        self.overrides
            .get(&member_id)
            .map(|entry| Arc::clone(entry.value()))
            .unwrap_or_else(|| Arc::new(MemberOverrides::empty(member_id)))
    }

    /// Revision of a member's overrides, 0 when never saved
    pub fn revision(&self, member_id: MemberId) -> u64 {
        self.overrides
            .get(&member_id)
            .map(|entry| entry.revision)
            .unwrap_or(0)
    }

    /// Branch overrides of a member
    pub fn list_branch_overrides(&self, member_id: MemberId) -> Vec<MemberBranchOverride> {
        self.snapshot(member_id).branch.clone()
    }

    /// Class overrides of a member
    pub fn list_class_overrides(&self, member_id: MemberId) -> Vec<MemberClassOverride> {
        self.snapshot(member_id).class.clone()
    }

    /// Validate and replace a member's whole branch override set
    pub fn set_branch_overrides(
        &self,
        member_id: MemberId,
        overrides: Vec<MemberBranchOverride>,
    ) -> EntitlementResult<u64> {
        self.check_branch_overrides(member_id, &overrides)?;

        let count = overrides.len();
        let revision = self.replace(member_id, |current| MemberOverrides {
            branch: overrides,
            ..current.clone()
        });
        info!(member = %member_id, revision, count, "branch overrides replaced");
        Ok(revision)
    }

    /// Validate and replace a member's whole class override set
    pub fn set_class_overrides(
        &self,
        member_id: MemberId,
        overrides: Vec<MemberClassOverride>,
    ) -> EntitlementResult<u64> {
        self.check_class_overrides(member_id, &overrides)?;

        let count = overrides.len();
        let revision = self.replace(member_id, |current| MemberOverrides {
            class: overrides,
            ..current.clone()
        });
        info!(member = %member_id, revision, count, "class overrides replaced");
        Ok(revision)
    }

    /// Validate a branch override set for `member_id` without writing it
    pub fn check_branch_overrides(
        &self,
        member_id: MemberId,
        overrides: &[MemberBranchOverride],
    ) -> EntitlementResult<()> {
        let catalog = self.member_catalog(member_id)?;
        validate_branch_overrides(&catalog, overrides)?;
        Ok(())
    }

    /// Validate a class override set for `member_id` without writing it
    pub fn check_class_overrides(
        &self,
        member_id: MemberId,
        overrides: &[MemberClassOverride],
    ) -> EntitlementResult<()> {
        let catalog = self.member_catalog(member_id)?;
        validate_class_overrides(&catalog, overrides)?;
        Ok(())
    }

    /// Remove every override of a member
    pub fn clear_member(&self, member_id: MemberId) -> bool {
        if !self.overrides.contains_key(&member_id) {
            return false;
        }
        self.replace(member_id, |_| MemberOverrides::empty(member_id));
        info!(member = %member_id, "overrides cleared");
        true
    }

    /// Drop overrides whose window closed at or before `now`
    ///
    /// Returns the ids of members whose set changed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Vec<MemberId> {
        let stale: Vec<MemberId> = self
            .overrides
            .iter()
            .filter(|entry| {
                entry.branch.iter().any(|o| o.window.is_expired(now))
                    || entry.class.iter().any(|o| o.window.is_expired(now))
            })
            .map(|entry| *entry.key())
            .collect();

        for member_id in &stale {
            self.replace(*member_id, |current| MemberOverrides {
                branch: current
                    .branch
                    .iter()
                    .filter(|o| !o.window.is_expired(now))
                    .cloned()
                    .collect(),
                class: current
                    .class
                    .iter()
                    .filter(|o| !o.window.is_expired(now))
                    .cloned()
                    .collect(),
                ..current.clone()
            });
            debug!(member = %member_id, "expired overrides purged");
        }
        stale
    }

    /// Every member with a saved set, ordered by member
    pub fn all(&self) -> Vec<Arc<MemberOverrides>> {
        let mut all: Vec<_> = self
            .overrides
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        all.sort_by_key(|o| o.member_id);
        all
    }

    /// Number of members with a saved set
    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    fn member_catalog(&self, member_id: MemberId) -> EntitlementResult<Arc<CatalogSnapshot>> {
        let member = self
            .members
            .member(member_id)
            .ok_or(EntitlementError::MemberNotFound(member_id))?;
        Ok(self.catalog.snapshot(member.tenant_id))
    }

    /// Build the next set from the current one while holding the entry lock
    fn replace(&self, member_id: MemberId, build: impl FnOnce(&MemberOverrides) -> MemberOverrides) -> u64 {
        let mut entry = self
            .overrides
            .entry(member_id)
            .or_insert_with(|| Arc::new(MemberOverrides::empty(member_id)));
        let revision = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        let mut next = build(entry.value());
        next.member_id = member_id;
        next.revision = revision;
        *entry.value_mut() = Arc::new(next);
        revision
    }
}

/// Check branch references and windows of a branch override set
pub fn validate_branch_overrides(
    catalog: &CatalogSnapshot,
    overrides: &[MemberBranchOverride],
) -> ValidationResult<()> {
    for (i, o) in overrides.iter().enumerate() {
        let field = format!("overrides[{}]", i);
        catalog.check_branch(&format!("{}.branch_id", field), o.branch_id)?;
        o.window.validate(&field)?;
    }
    Ok(())
}

/// Check class type and scope references and windows of a class override set
pub fn validate_class_overrides(
    catalog: &CatalogSnapshot,
    overrides: &[MemberClassOverride],
) -> ValidationResult<()> {
    for (i, o) in overrides.iter().enumerate() {
        let field = format!("overrides[{}]", i);
        catalog.check_class_type(&format!("{}.target", field), o.target)?;
        if let Some(branch) = o.scope.branch() {
            catalog.check_branch(&format!("{}.scope", field), branch)?;
        }
        o.window.validate(&field)?;
    }
    Ok(())
}
