//! Member directory collaborator
//!
//! Membership records (tenant and current tier) are owned elsewhere; the
//! entitlement service only needs to look them up.

use dashmap::DashMap;
use fit_common::{MemberId, TenantId, TierId};
use serde::{Deserialize, Serialize};

/// What the entitlement engine needs to know about a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// Member id
    pub member_id: MemberId,
    /// Tenant the member belongs to
    pub tenant_id: TenantId,
    /// Current subscription tier
    pub tier_id: TierId,
}

/// Member lookup
pub trait MemberDirectory: Send + Sync {
    /// Current record of a member
    fn member(&self, member_id: MemberId) -> Option<MemberRecord>;
}

/// In-memory member directory
#[derive(Default)]
pub struct InMemoryMemberDirectory {
    members: DashMap<MemberId, MemberRecord>,
}

impl InMemoryMemberDirectory {
    /// Create empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from records
    pub fn from_records(records: impl IntoIterator<Item = MemberRecord>) -> Self {
        let directory = Self::new();
        for record in records {
            directory.upsert(record);
        }
        directory
    }

    /// Add or replace a member
    pub fn upsert(&self, record: MemberRecord) {
        self.members.insert(record.member_id, record);
    }

    /// Move a member to another tier
    pub fn assign_tier(&self, member_id: MemberId, tier_id: TierId) -> bool {
        match self.members.get_mut(&member_id) {
            Some(mut record) => {
                record.tier_id = tier_id;
                true
            }
            None => false,
        }
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl MemberDirectory for InMemoryMemberDirectory {
    fn member(&self, member_id: MemberId) -> Option<MemberRecord> {
        self.members.get(&member_id).map(|r| *r)
    }
}
