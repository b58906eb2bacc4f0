//! Per-tier token-bucket charge model
//!
//! Each tier has an independent token bucket refilled lazily from elapsed
//! wall time. Charging bytes against a bucket produces a *simulated* wait in
//! nanoseconds: requests covered by available tokens pay only the tier's
//! fixed base latency, larger requests additionally pay `deficit / rate`.
//! The caller records the wait as data; nothing here ever sleeps.

use std::time::Instant;

use parking_lot::Mutex;

use crate::tier::Tier;

/// Burst window used to derive bucket capacity from the refill rate.
const BURST_WINDOW_SECS: f64 = 0.010;

/// Rate and latency parameters for one tier's bucket.
#[derive(Debug, Clone, Copy)]
pub struct BucketConfig {
    /// Refill rate in bytes per second.
    pub rate_bps: f64,
    /// Fixed latency added to every charge, in nanoseconds.
    pub base_latency_ns: u64,
}

impl BucketConfig {
    /// Default simulated bandwidth/latency per tier: 50 GiB/s + 2 µs for
    /// fast, 20 GiB/s + 8 µs for normal, 5 GiB/s + 40 µs for slow.
    pub fn defaults() -> [BucketConfig; Tier::COUNT] {
        const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
        [
            BucketConfig { rate_bps: 50.0 * GIB, base_latency_ns: 2_000 },
            BucketConfig { rate_bps: 20.0 * GIB, base_latency_ns: 8_000 },
            BucketConfig { rate_bps: 5.0 * GIB, base_latency_ns: 40_000 },
        ]
    }
}

/// Mutable bucket state; refill-then-consume runs as one critical section.
#[derive(Debug)]
struct Bucket {
    rate_bps: f64,
    capacity: f64,
    tokens: f64,
    last_refill: Instant,
    base_latency_ns: u64,
}

impl Bucket {
    fn new(config: BucketConfig) -> Self {
        let capacity = (config.rate_bps * BURST_WINDOW_SECS).max(1.0);
        Self {
            rate_bps: config.rate_bps,
            capacity,
            tokens: capacity,
            last_refill: Instant::now(),
            base_latency_ns: config.base_latency_ns,
        }
    }

    fn charge(&mut self, bytes: u64) -> u64 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;

        self.tokens = (self.tokens + self.rate_bps * elapsed).min(self.capacity);

        let mut wait_ns = self.base_latency_ns;
        let requested = bytes as f64;

        if requested <= self.tokens {
            self.tokens -= requested;
        } else {
            let deficit = requested - self.tokens;
            if self.rate_bps > 0.0 {
                wait_ns += (deficit / self.rate_bps * 1e9) as u64;
            }
            self.tokens = 0.0;
        }

        wait_ns
    }
}

/// Per-tier rate limiter; tiers never block each other.
#[derive(Debug)]
pub struct Throttle {
    buckets: [Mutex<Bucket>; Tier::COUNT],
}

impl Throttle {
    /// Create a throttle from per-tier bucket parameters.
    pub fn new(configs: [BucketConfig; Tier::COUNT]) -> Self {
        let [fast, normal, slow] = configs;
        Self {
            buckets: [
                Mutex::new(Bucket::new(fast)),
                Mutex::new(Bucket::new(normal)),
                Mutex::new(Bucket::new(slow)),
            ],
        }
    }

    /// Charge `bytes` against one tier's bucket, returning the simulated
    /// wait in nanoseconds. Never sleeps.
    pub fn charge(&self, tier: Tier, bytes: u64) -> u64 {
        self.buckets[tier.index()].lock().charge(bytes)
    }

    #[cfg(test)]
    fn tokens(&self, tier: Tier) -> f64 {
        self.buckets[tier.index()].lock().tokens
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(BucketConfig::defaults())
    }
}
