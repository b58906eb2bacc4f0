//! # Stratum Core
//!
//! A user-space allocator that simulates a tiered memory hierarchy
//! (fast/normal/slow) on top of ordinary virtual memory, for workloads that
//! want to express placement intent without exotic hardware.
//!
//! ## Features
//!
//! - **Placement hints**: hot/warm/cold (plus pin/prefer-fast) intents
//!   resolved deterministically to tiers
//! - **Capacity budgets**: per-tier soft and hard byte ceilings with ordered
//!   downshift fallback
//! - **Bandwidth model**: per-tier token buckets producing simulated wait
//!   time so benchmarks observe contention effects on uniform hardware
//! - **NUMA-aware bookkeeping**: probed topology with a tier-to-node map
//!   surfaced through the stats JSON
//! - **Copy migration**: live allocations can be moved between tiers
//!
//! Tiers are bookkeeping categories: no placement onto distinct physical
//! memory technologies is performed.
//!
//! ## Example
//!
//! ```
//! use stratum_core::{CapacityConfig, BucketConfig, PlacementHint, Tier,
//!     TieredAllocator, TopologyInfo};
//!
//! let alloc = TieredAllocator::new(
//!     CapacityConfig::default(),
//!     BucketConfig::defaults(),
//!     TopologyInfo::simulated(),
//! );
//!
//! let ptr = alloc.allocate(1 << 20, PlacementHint::Hot).unwrap();
//! assert_eq!(alloc.tier_of(ptr.as_ptr()), Ok(Tier::Fast));
//! alloc.free(ptr.as_ptr());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod allocator;
pub mod config;
pub mod error;
pub mod global;
pub mod page;
pub mod policy;
pub mod stats;
pub mod throttle;
pub mod tier;
pub mod topology;

// Re-exports
pub use allocator::TieredAllocator;
pub use config::{CapacityConfig, HardCapAction};
pub use error::{Error, Result};
pub use global::{
    advise, allocate, charge, free, get_stats, hello, init, move_to_tier, size_of, stats_json,
    tier_of,
};
pub use policy::{Policy, Resolution};
pub use stats::{MigrationSnapshot, Stats, StatsSnapshot};
pub use throttle::{BucketConfig, Throttle};
pub use tier::{PlacementHint, Tier};
pub use topology::TopologyInfo;

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert_eq!(env!("CARGO_PKG_VERSION"), "0.1.0");
    }
}
