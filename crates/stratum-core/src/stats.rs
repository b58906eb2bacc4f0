//! Process-wide allocation statistics
//!
//! All update paths are lock-free relaxed atomics; a snapshot may observe a
//! torn mix of counters taken at slightly different instants, which is an
//! accepted approximation for a statistics surface. The per-node residency
//! array is sized once, from the probed topology, and never resized after.
//!
//! The JSON serialization is an external contract: field names, the
//! fast/normal/slow array ordering, and the two-phase "query needed size,
//! then fill provided buffer" protocol are all parsed by outside tools.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::config::CapacityConfig;
use crate::tier::Tier;
use crate::topology::TopologyInfo;

fn zeroed() -> [AtomicU64; Tier::COUNT] {
    std::array::from_fn(|_| AtomicU64::new(0))
}

/// Atomic counter block for the allocator.
#[derive(Debug)]
pub struct Stats {
    alloc_calls: [AtomicU64; Tier::COUNT],
    free_calls: [AtomicU64; Tier::COUNT],
    bytes_current: [AtomicU64; Tier::COUNT],
    bytes_total_alloc: [AtomicU64; Tier::COUNT],
    bytes_total_freed: [AtomicU64; Tier::COUNT],
    simulated_wait_ns: [AtomicU64; Tier::COUNT],
    capacity_violations: [AtomicU64; Tier::COUNT],
    migrations_attempted: AtomicU64,
    migrations_moved_pages: AtomicU64,
    migrations_failed_pages: AtomicU64,
    node_bytes: Vec<AtomicU64>,
}

impl Stats {
    /// Create a counter block with a node-residency array of `node_count`
    /// entries.
    pub fn new(node_count: usize) -> Self {
        Self {
            alloc_calls: zeroed(),
            free_calls: zeroed(),
            bytes_current: zeroed(),
            bytes_total_alloc: zeroed(),
            bytes_total_freed: zeroed(),
            simulated_wait_ns: zeroed(),
            capacity_violations: zeroed(),
            migrations_attempted: AtomicU64::new(0),
            migrations_moved_pages: AtomicU64::new(0),
            migrations_failed_pages: AtomicU64::new(0),
            node_bytes: (0..node_count.max(1)).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Current residency in bytes for one tier; the policy's occupancy read.
    #[inline]
    pub fn bytes_current(&self, tier: Tier) -> u64 {
        self.bytes_current[tier.index()].load(Ordering::Relaxed)
    }

    pub(crate) fn record_alloc(&self, tier: Tier, bytes: u64, wait_ns: u64, node: usize) {
        let t = tier.index();
        self.alloc_calls[t].fetch_add(1, Ordering::Relaxed);
        self.bytes_current[t].fetch_add(bytes, Ordering::Relaxed);
        self.bytes_total_alloc[t].fetch_add(bytes, Ordering::Relaxed);
        self.simulated_wait_ns[t].fetch_add(wait_ns, Ordering::Relaxed);
        if let Some(counter) = self.node_bytes.get(node) {
            counter.fetch_add(bytes, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_free(&self, tier: Tier, bytes: u64, node: usize) {
        let t = tier.index();
        self.free_calls[t].fetch_add(1, Ordering::Relaxed);
        self.bytes_current[t].fetch_sub(bytes, Ordering::Relaxed);
        self.bytes_total_freed[t].fetch_add(bytes, Ordering::Relaxed);
        if let Some(counter) = self.node_bytes.get(node) {
            counter.fetch_sub(bytes, Ordering::Relaxed);
        }
    }

    pub(crate) fn add_wait(&self, tier: Tier, wait_ns: u64) {
        self.simulated_wait_ns[tier.index()].fetch_add(wait_ns, Ordering::Relaxed);
    }

    pub(crate) fn record_violation(&self, wanted: Tier) {
        self.capacity_violations[wanted.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_move_attempt(&self) {
        self.migrations_attempted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_move_success(&self, pages: u64) {
        self.migrations_moved_pages.fetch_add(pages, Ordering::Relaxed);
    }

    pub(crate) fn record_move_failure(&self, pages: u64) {
        self.migrations_failed_pages.fetch_add(pages, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot, merging in the immutable capacity and
    /// topology blocks that complete the external surface.
    pub fn snapshot(&self, capacity: &CapacityConfig, topology: &TopologyInfo) -> StatsSnapshot {
        let load = |array: &[AtomicU64; Tier::COUNT]| {
            std::array::from_fn(|i| array[i].load(Ordering::Relaxed))
        };

        StatsSnapshot {
            alloc_calls: load(&self.alloc_calls),
            free_calls: load(&self.free_calls),
            bytes_current: load(&self.bytes_current),
            bytes_total_alloc: load(&self.bytes_total_alloc),
            bytes_total_freed: load(&self.bytes_total_freed),
            simulated_wait_ns: load(&self.simulated_wait_ns),
            capacity_soft: capacity.soft,
            capacity_hard: capacity.hard,
            capacity_violations: load(&self.capacity_violations),
            backend: topology.backend,
            tier_node: topology.tier_node,
            node_count: topology.node_count,
            node_bytes: self
                .node_bytes
                .iter()
                .map(|counter| counter.load(Ordering::Relaxed))
                .collect(),
            migrations: MigrationSnapshot {
                attempted: self.migrations_attempted.load(Ordering::Relaxed),
                moved_pages: self.migrations_moved_pages.load(Ordering::Relaxed),
                failed_pages: self.migrations_failed_pages.load(Ordering::Relaxed),
            },
        }
    }
}

/// Migration counter block of a [`StatsSnapshot`].
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MigrationSnapshot {
    /// Move calls on registered pointers.
    pub attempted: u64,
    /// Pages copied by successful moves.
    pub moved_pages: u64,
    /// Pages of moves that failed to allocate a destination.
    pub failed_pages: u64,
}

/// Fixed-shape statistics snapshot.
///
/// Field declaration order is the JSON field order; all per-tier arrays are
/// ordered fast, normal, slow.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    /// Allocation calls per tier.
    pub alloc_calls: [u64; Tier::COUNT],
    /// Free calls per tier.
    pub free_calls: [u64; Tier::COUNT],
    /// Bytes currently resident per tier.
    pub bytes_current: [u64; Tier::COUNT],
    /// Lifetime bytes allocated per tier.
    pub bytes_total_alloc: [u64; Tier::COUNT],
    /// Lifetime bytes freed per tier.
    pub bytes_total_freed: [u64; Tier::COUNT],
    /// Accumulated simulated wait per tier, in nanoseconds.
    pub simulated_wait_ns: [u64; Tier::COUNT],
    /// Configured soft caps per tier (0 = unlimited).
    pub capacity_soft: [u64; Tier::COUNT],
    /// Configured hard caps per tier (0 = unlimited).
    pub capacity_hard: [u64; Tier::COUNT],
    /// Capacity downshifts charged to the originally wanted tier.
    pub capacity_violations: [u64; Tier::COUNT],
    /// Topology backend label: `"numa"` or `"simulated"`.
    pub backend: &'static str,
    /// Tier to NUMA node mapping.
    pub tier_node: [usize; Tier::COUNT],
    /// Number of nodes in the probed topology.
    pub node_count: usize,
    /// Bytes resident per node; length equals `node_count`.
    pub node_bytes: Vec<u64>,
    /// Copy-migration counters.
    pub migrations: MigrationSnapshot,
}

impl StatsSnapshot {
    /// Serialize the snapshot to its contract JSON form.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Two-phase buffer fill.
    ///
    /// With an empty buffer, returns the required length in bytes (excluding
    /// terminator) without writing. Otherwise writes up to `buf.len() - 1`
    /// bytes followed by a NUL terminator, and still returns the required
    /// length so callers can detect truncation.
    pub fn fill_json(&self, buf: &mut [u8]) -> usize {
        let json = self.to_json();
        let needed = json.len();

        if buf.is_empty() {
            return needed;
        }

        let copied = needed.min(buf.len() - 1);
        buf[..copied].copy_from_slice(&json.as_bytes()[..copied]);
        buf[copied] = 0;
        needed
    }
}
