//! NUMA topology probe
//!
//! Single-shot detection of the host's memory-node topology, run once at
//! allocator construction. On Linux the probe enumerates
//! `/sys/devices/system/node`; everywhere else, and on hosts without that
//! tree, a single simulated node is reported. The resulting tier-to-node
//! mapping is advisory bookkeeping: it is published through the stats
//! surface but no placement syscalls are issued.

use tracing::debug;

use crate::tier::Tier;

/// Immutable topology state, exposed only by reference after construction.
#[derive(Debug, Clone)]
pub struct TopologyInfo {
    /// Whether a real multi-node topology was detected.
    pub available: bool,
    /// Highest node id (0 when simulated).
    pub max_node: usize,
    /// Tier to node mapping, indexed by tier.
    pub tier_node: [usize; Tier::COUNT],
    /// Number of nodes (`max_node + 1`, or 1 when simulated).
    pub node_count: usize,
    /// Backend label published in the stats surface.
    pub backend: &'static str,
    /// Advisory preference for the native NUMA library over generic
    /// page-migration primitives (`TA_USE_LIBNUMA`).
    pub prefer_native: bool,
}

impl TopologyInfo {
    /// Probe the host topology and apply environment overrides.
    ///
    /// Per-tier node overrides come from `TA_NODE_FAST`, `TA_NODE_NORMAL`,
    /// and `TA_NODE_SLOW`, each clamped to the probed node range.
    pub fn probe() -> Self {
        let mut info = match probe_max_node() {
            Some(max_node) => Self {
                available: true,
                max_node,
                tier_node: [0; Tier::COUNT],
                node_count: max_node + 1,
                backend: "numa",
                prefer_native: true,
            },
            None => Self::simulated(),
        };

        // Default mapping: FAST->0, NORMAL->1 if present else 0, SLOW->2 if
        // present else the NORMAL mapping.
        let normal = if info.node_count > 1 { 1 } else { 0 };
        let slow = if info.node_count > 2 { 2 } else { normal };
        info.tier_node = [0, normal, slow];

        const KEYS: [&str; Tier::COUNT] = ["TA_NODE_FAST", "TA_NODE_NORMAL", "TA_NODE_SLOW"];
        for (slot, key) in info.tier_node.iter_mut().zip(KEYS) {
            if let Some(node) = env_node(key) {
                *slot = node.min(info.max_node);
            }
        }

        if let Ok(value) = std::env::var("TA_USE_LIBNUMA") {
            info.prefer_native = info.available && value == "1";
        }

        debug!(
            backend = info.backend,
            node_count = info.node_count,
            tier_node = ?info.tier_node,
            "topology probed"
        );

        info
    }

    /// Single-node fallback topology.
    pub fn simulated() -> Self {
        Self {
            available: false,
            max_node: 0,
            tier_node: [0; Tier::COUNT],
            node_count: 1,
            backend: "simulated",
            prefer_native: false,
        }
    }

    /// Node the given tier maps to.
    #[inline]
    pub fn node_of(&self, tier: Tier) -> usize {
        self.tier_node[tier.index()]
    }
}

fn env_node(key: &str) -> Option<usize> {
    std::env::var(key).ok()?.trim().parse().ok()
}

/// Highest node id under the sysfs node tree, or `None` when the tree is
/// absent or empty.
#[cfg(target_os = "linux")]
fn probe_max_node() -> Option<usize> {
    let entries = std::fs::read_dir("/sys/devices/system/node").ok()?;

    let mut max_node = None;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if let Some(id) = name.strip_prefix("node").and_then(|n| n.parse::<usize>().ok()) {
            max_node = Some(max_node.map_or(id, |current: usize| current.max(id)));
        }
    }

    max_node
}

#[cfg(not(target_os = "linux"))]
fn probe_max_node() -> Option<usize> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_topology() {
        let info = TopologyInfo::simulated();
        assert!(!info.available);
        assert_eq!(info.node_count, 1);
        assert_eq!(info.tier_node, [0, 0, 0]);
        assert_eq!(info.backend, "simulated");
    }

    #[test]
    fn test_probe_mapping_is_in_range() {
        let info = TopologyInfo::probe();
        assert!(info.node_count >= 1);
        for tier in Tier::ALL {
            assert!(info.node_of(tier) <= info.max_node);
        }
    }
}
