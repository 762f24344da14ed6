//! Identifiers (Value Objects)
//!
//! Every catalog entity and member is addressed by a numeric id wrapped in
//! its own type, so a branch id can never be passed where a class type id
//! is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw id
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Get raw value
            pub const fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

numeric_id!(
    /// Tenant (facility operator) identifier
    TenantId,
    "tenant"
);
numeric_id!(
    /// Physical branch identifier
    BranchId,
    "branch"
);
numeric_id!(
    /// Bookable class type identifier
    ClassTypeId,
    "class"
);
numeric_id!(
    /// Subscription tier identifier
    TierId,
    "tier"
);
numeric_id!(
    /// Member identifier
    MemberId,
    "member"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefix() {
        assert_eq!(BranchId::new(7).to_string(), "branch-7");
        assert_eq!(MemberId::from(42).to_string(), "member-42");
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&ClassTypeId::new(10)).unwrap();
        assert_eq!(json, "10");
        let back: ClassTypeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ClassTypeId::new(10));
    }
}
