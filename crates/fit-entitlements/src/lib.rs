//! Member Entitlement Resolution
//!
//! Decides whether a member may check in at a branch and whether they may
//! book a class type there, combining the tier default with staff-authored
//! per-member overrides.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     EntitlementService                           │
//! │  is_allowed_at_branch / is_allowed_for_class / summaries         │
//! │                                                                  │
//! │   ┌─────────────┐  Miss   ┌──────────────────────────────────┐   │
//! │   │ Entitlement │───────►│             Resolver             │   │
//! │   │    Cache    │         │   (pure, lock-free, per call)    │   │
//! │   └─────────────┘         └───────┬──────────┬──────────┬────┘   │
//! │     keyed on revisions            │          │          │        │
//! │                            ┌──────▼───┐ ┌────▼─────┐ ┌──▼─────┐  │
//! │                            │ Catalog  │ │ Policy   │ │Override│  │
//! │                            │ snapshot │ │  Store   │ │ Store  │  │
//! │                            └──────────┘ └──────────┘ └────────┘  │
//! │                                 atomic snapshot swaps            │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Class access ladder
//!
//! Per branch and class type, the most specific source wins:
//! member override at the branch, member override everywhere, tier rule at
//! the branch, tier rule everywhere. Nothing listed means denied once the
//! tier (or an override) switches the branch to allowlisting.

#![warn(missing_docs)]

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod members;
pub mod model;
pub mod overrides;
pub mod persist;
pub mod policy;
pub mod resolver;
pub mod service;
pub mod summary;

pub use cache::{EntitlementCache, RevisionStamp};
pub use catalog::{Catalog, CatalogSnapshot, InMemoryCatalog};
pub use config::{CacheConfig, ConfigError, EntitlementConfig};
pub use error::{EntitlementError, EntitlementResult};
pub use members::{InMemoryMemberDirectory, MemberDirectory, MemberRecord};
pub use model::*;
pub use overrides::{MemberOverrides, OverrideStore};
pub use persist::{ImportReport, StoreDocument};
pub use policy::{PolicyRecord, PolicyStore};
pub use resolver::{ClassDecision, DecisionSource, Resolver};
pub use service::{EntitlementService, ServiceStats};
pub use summary::{BranchSummary, EntitlementSummary, NamedClassType};
