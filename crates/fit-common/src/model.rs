//! Catalog entities and rule building blocks

use crate::{BranchId, ClassTypeId, TenantId, TierId, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical facility location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Branch id
    pub id: BranchId,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Display name
    pub name: String,
    /// Inactive branches are never granted
    pub active: bool,
}

/// Category of bookable class session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassType {
    /// Class type id
    pub id: ClassTypeId,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Display name
    pub name: String,
    /// Inactive class types are never granted
    pub active: bool,
}

/// Subscription tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    /// Tier id
    pub id: TierId,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Display name
    pub name: String,
    /// Members of an inactive tier resolve to nothing
    pub active: bool,
}

/// Where a class rule or class override applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Every branch
    Global,
    /// A single branch
    Branch(BranchId),
}

impl Scope {
    /// Branch this scope is pinned to, if any
    pub fn branch(&self) -> Option<BranchId> {
        match self {
            Scope::Global => None,
            Scope::Branch(id) => Some(*id),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Branch(id) => write!(f, "{}", id),
        }
    }
}

/// Optional validity bounds of an override
///
/// # Invariants
/// - `valid_from < valid_until` when both are present
/// - `valid_from` is inclusive, `valid_until` is exclusive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidityWindow {
    /// Inclusive lower bound, unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound, unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
}

impl ValidityWindow {
    /// Unbounded window
    pub const fn always() -> Self {
        Self {
            valid_from: None,
            valid_until: None,
        }
    }

    /// Window with both bounds
    pub fn between(from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            valid_from: Some(from),
            valid_until: Some(until),
        }
    }

    /// Window opening at `from`
    pub fn starting(from: DateTime<Utc>) -> Self {
        Self {
            valid_from: Some(from),
            valid_until: None,
        }
    }

    /// Window closing at `until`
    pub fn until(until: DateTime<Utc>) -> Self {
        Self {
            valid_from: None,
            valid_until: Some(until),
        }
    }

    /// Check whether `now` falls inside the window
    #[inline]
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        if let Some(from) = self.valid_from {
            if now < from {
                return false;
            }
        }
        if let Some(until) = self.valid_until {
            if now >= until {
                return false;
            }
        }
        true
    }

    /// Window has closed for good at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.valid_until, Some(until) if until <= now)
    }

    /// Validate the bound ordering, reporting against `field`
    pub fn validate(&self, field: &str) -> Result<(), ValidationError> {
        match (self.valid_from, self.valid_until) {
            (Some(from), Some(until)) if from >= until => Err(ValidationError::new(
                format!("{}.valid_from", field),
                format!("must be before valid_until ({} >= {})", from, until),
            )),
            _ => Ok(()),
        }
    }

    /// Next bound strictly after `now`, if any
    pub fn next_boundary(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        [self.valid_from, self.valid_until]
            .into_iter()
            .flatten()
            .filter(|t| *t > now)
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_window_bounds() {
        let window = ValidityWindow::between(at(10), at(20));

        assert!(!window.contains(at(9)));
        assert!(window.contains(at(10)));
        assert!(window.contains(at(19)));
        assert!(!window.contains(at(20)));
        assert!(ValidityWindow::always().contains(at(1)));
    }

    #[test]
    fn test_window_validation() {
        assert!(ValidityWindow::between(at(10), at(20)).validate("o").is_ok());

        let err = ValidityWindow::between(at(20), at(20)).validate("overrides[3]").unwrap_err();
        assert_eq!(err.field, "overrides[3].valid_from");

        assert!(ValidityWindow::starting(at(20)).validate("o").is_ok());
    }

    #[test]
    fn test_next_boundary() {
        let window = ValidityWindow::between(at(10), at(20));

        assert_eq!(window.next_boundary(at(1)), Some(at(10)));
        assert_eq!(window.next_boundary(at(10)), Some(at(20)));
        assert_eq!(window.next_boundary(at(20) + Duration::seconds(1)), None);
        assert!(window.is_expired(at(20)));
    }

    #[test]
    fn test_scope_branch() {
        let b1 = BranchId::new(1);
        assert_eq!(Scope::Global.branch(), None);
        assert_eq!(Scope::Branch(b1).branch(), Some(b1));
    }
}
