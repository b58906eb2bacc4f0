//! Tiered allocator core
//!
//! [`TieredAllocator`] orchestrates the placement policy, the throttle, and
//! the page mapping layer, and owns the address-to-record registry. The
//! registry is the single source of truth for pointer ownership: a pointer
//! that is not present is never freed or moved here, which is the contract
//! interposition layers rely on to pass foreign pointers through safely.

use std::collections::HashMap;
use std::ptr::NonNull;

use parking_lot::Mutex;

use crate::config::CapacityConfig;
use crate::error::{Error, Result};
use crate::page;
use crate::policy::Policy;
use crate::stats::{Stats, StatsSnapshot};
use crate::throttle::{BucketConfig, Throttle};
use crate::tier::{PlacementHint, Tier};
use crate::topology::TopologyInfo;

/// Metadata for one live allocation.
#[derive(Debug, Clone, Copy)]
struct AllocationRecord {
    /// Page-rounded size of the mapping.
    size: usize,
    /// Tier the allocation is accounted against.
    tier: Tier,
}

/// Tiered-memory simulation allocator.
///
/// Owns every service it depends on as an explicit field, so tests can run
/// multiple independent instances; the process-wide surface in
/// [`crate::global`] wraps one shared instance.
#[derive(Debug)]
pub struct TieredAllocator {
    policy: Policy,
    throttle: Throttle,
    topology: TopologyInfo,
    stats: Stats,
    registry: Mutex<HashMap<usize, AllocationRecord>>,
}

impl TieredAllocator {
    /// Create an allocator from explicit configuration.
    pub fn new(
        capacity: CapacityConfig,
        buckets: [BucketConfig; Tier::COUNT],
        topology: TopologyInfo,
    ) -> Self {
        let stats = Stats::new(topology.node_count);
        Self {
            policy: Policy::new(capacity),
            throttle: Throttle::new(buckets),
            topology,
            stats,
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// Create an allocator configured from the environment: capacity caps
    /// and overflow action from `TA_*` variables, default throttle rates,
    /// and a probed topology.
    pub fn from_env() -> Self {
        Self::new(
            CapacityConfig::from_env(),
            BucketConfig::defaults(),
            TopologyInfo::probe(),
        )
    }

    /// Allocate `bytes` with a placement hint.
    ///
    /// The hint resolves to a tier, adjusted for capacity budgets; the
    /// resolved tier is charged for simulated cost; the request is rounded
    /// up to the page size and satisfied by a fresh anonymous mapping.
    /// Returns `None` when the mapping fails (including zero-byte requests).
    pub fn allocate(&self, bytes: usize, hint: PlacementHint) -> Option<NonNull<u8>> {
        let wanted = Policy::tier_for_hint(hint);
        let resolution = self.policy.resolve(wanted, bytes as u64, &self.stats);
        if resolution.violated {
            self.stats.record_violation(wanted);
        }

        self.allocate_in_tier(bytes, resolution.tier)
    }

    /// Allocate directly in a tier, bypassing capacity adjustment. Used by
    /// migration, where the destination tier is the caller's contract.
    fn allocate_in_tier(&self, bytes: usize, tier: Tier) -> Option<NonNull<u8>> {
        let wait_ns = self.throttle.charge(tier, bytes as u64);

        let size = page::round_up_to_page(bytes)?;
        let ptr = page::map_anonymous(size).ok()?;

        self.registry
            .lock()
            .insert(ptr.as_ptr() as usize, AllocationRecord { size, tier });

        self.stats
            .record_alloc(tier, size as u64, wait_ns, self.topology.node_of(tier));

        Some(ptr)
    }

    /// Release an allocation.
    ///
    /// Null and unregistered pointers are deliberate no-ops so callers may
    /// free indiscriminately.
    pub fn free(&self, ptr: *mut u8) {
        let Some(ptr) = NonNull::new(ptr) else {
            return;
        };

        let record = {
            let mut registry = self.registry.lock();
            registry.remove(&(ptr.as_ptr() as usize))
        };

        let Some(record) = record else {
            return;
        };

        // The erase above committed ownership; the syscall runs unlocked.
        unsafe { page::unmap(ptr, record.size) };

        self.stats.record_free(
            record.tier,
            record.size as u64,
            self.topology.node_of(record.tier),
        );
    }

    /// Tier of a live allocation.
    ///
    /// Null pointers and pointers this allocator does not own report
    /// distinct errors, so resize paths can tell "not mine" from "bad
    /// argument".
    pub fn tier_of(&self, ptr: *const u8) -> Result<Tier> {
        self.lookup(ptr).map(|record| record.tier)
    }

    /// Page-rounded size recorded for a live allocation.
    pub fn size_of(&self, ptr: *const u8) -> Result<usize> {
        self.lookup(ptr).map(|record| record.size)
    }

    fn lookup(&self, ptr: *const u8) -> Result<AllocationRecord> {
        if ptr.is_null() {
            return Err(Error::NullPointer);
        }

        self.registry
            .lock()
            .get(&(ptr as usize))
            .copied()
            .ok_or(Error::NotRegistered)
    }

    /// Re-tiering advice for a live allocation.
    ///
    /// Reserved extension point: currently always succeeds without side
    /// effects.
    pub fn advise(&self, _ptr: *mut u8, _hint: PlacementHint) -> Result<()> {
        Ok(())
    }

    /// Move a live allocation to another tier by copy.
    ///
    /// Charges a read from the source tier and a write to the destination
    /// tier, allocates a fresh region directly in the destination tier,
    /// copies the full rounded size, and frees the original. On success the
    /// original pointer is invalid immediately. On failure returns `None`
    /// and the original allocation is untouched.
    pub fn move_to_tier(&self, ptr: *mut u8, destination: Tier) -> Option<NonNull<u8>> {
        let record = self.lookup(ptr).ok()?;
        self.stats.record_move_attempt();

        self.charge(record.tier, record.size as u64);
        self.charge(destination, record.size as u64);

        let pages = (record.size / page::page_size()) as u64;

        let Some(new_ptr) = self.allocate_in_tier(record.size, destination) else {
            self.stats.record_move_failure(pages);
            return None;
        };

        unsafe {
            std::ptr::copy_nonoverlapping(ptr as *const u8, new_ptr.as_ptr(), record.size);
        }

        self.free(ptr);
        self.stats.record_move_success(pages);

        Some(new_ptr)
    }

    /// Charge simulated cost against one tier, accumulating the wait into
    /// the stats surface. Usable standalone.
    pub fn charge(&self, tier: Tier, bytes: u64) -> u64 {
        let wait_ns = self.throttle.charge(tier, bytes);
        self.stats.add_wait(tier, wait_ns);
        wait_ns
    }

    /// Point-in-time statistics snapshot.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot(self.policy.config(), &self.topology)
    }

    /// Two-phase JSON fill; see [`StatsSnapshot::fill_json`].
    pub fn stats_json(&self, buf: &mut [u8]) -> usize {
        self.snapshot().fill_json(buf)
    }

    /// The probed topology, immutable for the allocator's lifetime.
    pub fn topology(&self) -> &TopologyInfo {
        &self.topology
    }
}

impl Drop for TieredAllocator {
    fn drop(&mut self) {
        // Unmap anything still live so dropped test instances do not leak
        // address space.
        let registry = std::mem::take(self.registry.get_mut());
        for (addr, record) in registry {
            if let Some(ptr) = NonNull::new(addr as *mut u8) {
                unsafe { page::unmap(ptr, record.size) };
            }
        }
    }
}
