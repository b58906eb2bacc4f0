//! End-to-end allocator scenarios
//!
//! Each test constructs its own allocator instance with explicit
//! configuration, so tests stay independent of the process environment and
//! of each other.

use stratum_core::{
    BucketConfig, CapacityConfig, Error, PlacementHint, Tier, TieredAllocator, TopologyInfo,
};

const MIB: usize = 1024 * 1024;

fn quiet_buckets() -> [BucketConfig; Tier::COUNT] {
    [BucketConfig { rate_bps: 1e12, base_latency_ns: 0 }; Tier::COUNT]
}

fn uncapped() -> TieredAllocator {
    TieredAllocator::new(
        CapacityConfig::default(),
        quiet_buckets(),
        TopologyInfo::simulated(),
    )
}

#[test]
fn churn_scenario_closes_accounting() {
    // 64 blocks of 16 MiB cycling hot/warm/cold: allocation calls and byte
    // totals must add up across tiers, and freeing everything must drive
    // residency back to zero.
    let alloc = uncapped();
    let hints = [PlacementHint::Hot, PlacementHint::Warm, PlacementHint::Cold];

    let mut blocks = Vec::with_capacity(64);
    for i in 0..64 {
        let ptr = alloc
            .allocate(16 * MIB, hints[i % 3])
            .expect("16 MiB allocation failed");
        blocks.push(ptr);
    }

    let rounded = alloc.size_of(blocks[0].as_ptr()).unwrap() as u64;
    let snapshot = alloc.snapshot();
    assert_eq!(snapshot.alloc_calls.iter().sum::<u64>(), 64);
    assert_eq!(snapshot.bytes_total_alloc.iter().sum::<u64>(), 64 * rounded);

    // Free half, check closure, free the rest.
    for ptr in blocks.iter().step_by(2) {
        alloc.free(ptr.as_ptr());
    }

    let snapshot = alloc.snapshot();
    for t in 0..Tier::COUNT {
        assert_eq!(
            snapshot.bytes_current[t],
            snapshot.bytes_total_alloc[t] - snapshot.bytes_total_freed[t]
        );
    }

    for ptr in blocks.iter().skip(1).step_by(2) {
        alloc.free(ptr.as_ptr());
    }

    let snapshot = alloc.snapshot();
    assert_eq!(snapshot.bytes_current, [0, 0, 0]);
    assert_eq!(snapshot.free_calls.iter().sum::<u64>(), 64);
}

#[test]
fn hint_resolution_is_deterministic_without_caps() {
    let alloc = uncapped();

    let cases = [
        (PlacementHint::Hot, Tier::Fast),
        (PlacementHint::PinFast, Tier::Fast),
        (PlacementHint::PreferFast, Tier::Fast),
        (PlacementHint::Warm, Tier::Normal),
        (PlacementHint::Default, Tier::Normal),
        (PlacementHint::Cold, Tier::Slow),
    ];

    for (hint, expected) in cases {
        let ptr = alloc.allocate(MIB, hint).unwrap();
        assert_eq!(alloc.tier_of(ptr.as_ptr()), Ok(expected), "hint {hint}");
        alloc.free(ptr.as_ptr());
    }
}

#[test]
fn foreign_free_leaves_counters_untouched() {
    let alloc = uncapped();
    let ptr = alloc.allocate(MIB, PlacementHint::Warm).unwrap();
    let before = alloc.snapshot();

    let mut not_mine = [0u8; 64];
    alloc.free(not_mine.as_mut_ptr());
    alloc.free(std::ptr::null_mut());

    let after = alloc.snapshot();
    assert_eq!(before.free_calls, after.free_calls);
    assert_eq!(before.bytes_current, after.bytes_current);
    assert_eq!(before.bytes_total_freed, after.bytes_total_freed);

    alloc.free(ptr.as_ptr());
}

#[test]
fn move_preserves_content_prefix_and_invalidates_source() {
    let alloc = uncapped();
    let ptr = alloc.allocate(2 * MIB, PlacementHint::Hot).unwrap();
    let size = alloc.size_of(ptr.as_ptr()).unwrap();

    unsafe {
        let data = std::slice::from_raw_parts_mut(ptr.as_ptr(), size);
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = (i * 7 % 256) as u8;
        }
    }

    let moved = alloc
        .move_to_tier(ptr.as_ptr(), Tier::Slow)
        .expect("move failed");

    assert_eq!(alloc.tier_of(moved.as_ptr()), Ok(Tier::Slow));
    assert_eq!(alloc.tier_of(ptr.as_ptr()), Err(Error::NotRegistered));
    assert_eq!(alloc.size_of(moved.as_ptr()), Ok(size));

    unsafe {
        let data = std::slice::from_raw_parts(moved.as_ptr() as *const u8, size);
        assert!(data
            .iter()
            .enumerate()
            .all(|(i, &b)| b == (i * 7 % 256) as u8));
    }

    alloc.free(moved.as_ptr());
}

#[test]
fn fast_hard_cap_downshifts_exactly_once_per_request() {
    let alloc = TieredAllocator::new(
        CapacityConfig::default().hard_cap(Tier::Fast, (8 * MIB) as u64),
        quiet_buckets(),
        TopologyInfo::simulated(),
    );

    let ptr = alloc.allocate(16 * MIB, PlacementHint::Hot).unwrap();
    let tier = alloc.tier_of(ptr.as_ptr()).unwrap();
    assert!(tier == Tier::Normal || tier == Tier::Slow);

    let snapshot = alloc.snapshot();
    assert_eq!(snapshot.capacity_violations[Tier::Fast.index()], 1);

    alloc.free(ptr.as_ptr());
}

#[test]
fn charge_with_deficit_accumulates_wait_per_tier() {
    let alloc = TieredAllocator::new(
        CapacityConfig::default(),
        [BucketConfig { rate_bps: 1e9, base_latency_ns: 1_000 }; Tier::COUNT],
        TopologyInfo::simulated(),
    );

    // Zero-byte charges only ever pay base latency.
    let wait = alloc.charge(Tier::Fast, 0);
    assert_eq!(wait, 1_000);

    // A charge far past burst capacity must strictly grow the accumulator.
    let before = alloc.snapshot().simulated_wait_ns[Tier::Normal.index()];
    alloc.charge(Tier::Normal, 5_000_000_000);
    let after = alloc.snapshot().simulated_wait_ns[Tier::Normal.index()];
    assert!(after > before + 1_000);
}

#[test]
fn stats_json_two_phase_lengths_agree() {
    let alloc = uncapped();
    let ptr = alloc.allocate(MIB, PlacementHint::Cold).unwrap();

    let needed = alloc.stats_json(&mut []);
    let mut buf = vec![0u8; needed + 1];
    let written = alloc.stats_json(&mut buf);

    assert_eq!(needed, written);
    assert_eq!(buf[needed], 0);

    let json: serde_json::Value =
        serde_json::from_slice(&buf[..needed]).expect("stats surface must parse");
    assert_eq!(json["alloc_calls"].as_array().map(|a| a.len()), Some(3));
    assert_eq!(json["backend"], "simulated");
    assert_eq!(json["node_count"], 1);
    assert_eq!(json["node_bytes"].as_array().map(|a| a.len()), Some(1));
    assert!(json["migrations"]["attempted"].is_u64());

    alloc.free(ptr.as_ptr());
}

#[test]
fn node_residency_follows_tier_mapping() {
    let mut topology = TopologyInfo::simulated();
    topology.max_node = 2;
    topology.node_count = 3;
    topology.tier_node = [0, 1, 2];

    let alloc = TieredAllocator::new(CapacityConfig::default(), quiet_buckets(), topology);

    let hot = alloc.allocate(MIB, PlacementHint::Hot).unwrap();
    let cold = alloc.allocate(3 * MIB, PlacementHint::Cold).unwrap();

    let snapshot = alloc.snapshot();
    let hot_size = alloc.size_of(hot.as_ptr()).unwrap() as u64;
    let cold_size = alloc.size_of(cold.as_ptr()).unwrap() as u64;
    assert_eq!(snapshot.node_bytes[0], hot_size);
    assert_eq!(snapshot.node_bytes[1], 0);
    assert_eq!(snapshot.node_bytes[2], cold_size);

    alloc.free(hot.as_ptr());
    alloc.free(cold.as_ptr());
    assert_eq!(alloc.snapshot().node_bytes, vec![0, 0, 0]);
}

#[test]
fn concurrent_churn_is_safe_and_balanced() {
    use std::sync::Arc;

    let alloc = Arc::new(uncapped());
    let mut handles = Vec::new();

    for worker in 0..8 {
        let alloc = Arc::clone(&alloc);
        handles.push(std::thread::spawn(move || {
            let hints = [PlacementHint::Hot, PlacementHint::Warm, PlacementHint::Cold];
            for i in 0..50 {
                let ptr = alloc
                    .allocate(64 * 1024 * (i % 4 + 1), hints[(worker + i) % 3])
                    .expect("allocation failed under contention");
                if i % 2 == 0 {
                    alloc.free(ptr.as_ptr());
                } else if let Some(moved) = alloc.move_to_tier(ptr.as_ptr(), Tier::Normal) {
                    alloc.free(moved.as_ptr());
                }
            }
        }));
    }

    for handle in handles {
        handle.join().expect("worker panicked");
    }

    let snapshot = alloc.snapshot();
    assert_eq!(snapshot.bytes_current, [0, 0, 0]);
    for t in 0..Tier::COUNT {
        assert_eq!(
            snapshot.bytes_current[t],
            snapshot.bytes_total_alloc[t] - snapshot.bytes_total_freed[t]
        );
    }
}
