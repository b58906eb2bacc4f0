//! Process-wide allocator surface
//!
//! A single shared [`TieredAllocator`] behind a `OnceLock`, configured from
//! the environment on first use. The `OnceLock` is the single-winner guard:
//! concurrent first callers race once, every later access is a plain read.
//! Free functions mirror the allocator's methods for callers that want a
//! C-like flat API (interposition layers, framework bindings).

use std::ptr::NonNull;
use std::sync::OnceLock;

use crate::allocator::TieredAllocator;
use crate::error::Result;
use crate::stats::StatsSnapshot;
use crate::tier::{PlacementHint, Tier};

static GLOBAL: OnceLock<TieredAllocator> = OnceLock::new();

/// The process-wide allocator, constructed from the environment on first
/// access.
pub fn global() -> &'static TieredAllocator {
    GLOBAL.get_or_init(TieredAllocator::from_env)
}

/// Force construction of the process-wide allocator.
///
/// Idempotent in effect; callers that want deterministic configuration
/// should invoke this once before any other operation.
pub fn init() {
    let _ = global();
}

/// Allocate `bytes` with a placement hint. See
/// [`TieredAllocator::allocate`].
pub fn allocate(bytes: usize, hint: PlacementHint) -> Option<NonNull<u8>> {
    global().allocate(bytes, hint)
}

/// Release an allocation; safe on null and foreign pointers.
pub fn free(ptr: *mut u8) {
    global().free(ptr)
}

/// Tier of a live allocation.
pub fn tier_of(ptr: *const u8) -> Result<Tier> {
    global().tier_of(ptr)
}

/// Page-rounded size recorded for a live allocation.
pub fn size_of(ptr: *const u8) -> Result<usize> {
    global().size_of(ptr)
}

/// Re-tiering advice; reserved, currently always succeeds.
pub fn advise(ptr: *mut u8, hint: PlacementHint) -> Result<()> {
    global().advise(ptr, hint)
}

/// Move an allocation to another tier by copy.
pub fn move_to_tier(ptr: *mut u8, destination: Tier) -> Option<NonNull<u8>> {
    global().move_to_tier(ptr, destination)
}

/// Charge simulated cost against one tier; returns the wait in nanoseconds.
pub fn charge(tier: Tier, bytes: u64) -> u64 {
    global().charge(tier, bytes)
}

/// Point-in-time statistics snapshot.
pub fn get_stats() -> StatsSnapshot {
    global().snapshot()
}

/// Two-phase JSON fill of the statistics surface.
pub fn stats_json(buf: &mut [u8]) -> usize {
    global().stats_json(buf)
}

/// Constant liveness/version probe.
pub fn hello() -> &'static str {
    "stratum-ok"
}
