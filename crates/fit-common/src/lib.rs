//! OpenFit Common - Shared types for the facility access platform
//!
//! This crate provides the primitives every other OpenFit crate builds on:
//! - Identifiers for tenants, branches, class types, tiers and members
//! - Catalog entities and rule scopes
//! - Validity windows and the injectable clock
//! - Error handling
//!
//! # Domain Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        TENANT                            │
//! │                                                          │
//! │   ┌──────────┐    ┌────────────┐    ┌──────────────┐     │
//! │   │ Branches │    │ ClassTypes │    │    Tiers     │     │
//! │   └────┬─────┘    └─────┬──────┘    └──────┬───────┘     │
//! │        │                │                  │             │
//! │        └──────── referenced by ────────────┘             │
//! │                         │                                │
//! │           Tier policies  +  Member overrides             │
//! └──────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod ids;
pub mod model;
pub mod time;

pub use error::*;
pub use ids::*;
pub use model::*;
pub use time::*;

use std::sync::atomic::{AtomicU64, Ordering};

/// High-performance counter for lock-free metrics
#[derive(Debug, Default)]
pub struct AtomicCounter(AtomicU64);

impl AtomicCounter {
    /// Create new counter
    pub const fn new(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    /// Increment and return previous value
    #[inline(always)]
    pub fn inc(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    /// Get current value
    #[inline(always)]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}
