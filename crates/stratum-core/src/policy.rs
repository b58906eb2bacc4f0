//! Placement policy
//!
//! Resolution happens in two stages. The hint stage is a pure table lookup.
//! The capacity stage reads live per-tier residency from [`Stats`] and tests
//! the wanted tier against its soft and hard caps, searching a fixed
//! downshift order when the wanted tier is full. Capacity pressure is never
//! an error: the worst case is decided by the configured hard-cap action.

use crate::config::{CapacityConfig, HardCapAction};
use crate::stats::Stats;
use crate::tier::{PlacementHint, Tier};

/// Fixed downshift order searched when the wanted tier does not fit,
/// indexed by wanted tier.
const DOWNSHIFT: [[Tier; 2]; Tier::COUNT] = [
    [Tier::Normal, Tier::Slow], // wanted FAST
    [Tier::Fast, Tier::Slow],   // wanted NORMAL
    [Tier::Normal, Tier::Fast], // wanted SLOW
];

/// Outcome of capacity resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Tier the request should be placed in.
    pub tier: Tier,
    /// Whether the wanted tier's capacity-violation counter must increment:
    /// either the request was downshifted, or it only passed with caps
    /// relaxed.
    pub violated: bool,
}

/// Capacity-aware placement policy.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    config: CapacityConfig,
}

impl Policy {
    /// Create a policy over a fixed capacity configuration.
    pub fn new(config: CapacityConfig) -> Self {
        Self { config }
    }

    /// The capacity configuration this policy enforces.
    pub fn config(&self) -> &CapacityConfig {
        &self.config
    }

    /// Stateless hint resolution.
    pub fn tier_for_hint(hint: PlacementHint) -> Tier {
        match hint {
            PlacementHint::Hot | PlacementHint::PinFast | PlacementHint::PreferFast => Tier::Fast,
            PlacementHint::Cold => Tier::Slow,
            PlacementHint::Warm | PlacementHint::Default => Tier::Normal,
        }
    }

    /// Capacity-adjust a wanted tier for a request of `bytes`.
    ///
    /// A cap of 0 always passes. The search tries the wanted tier against
    /// both caps, then the downshift order against both caps, then relaxes
    /// to hard caps only (wanted first, same order after). If nothing fits
    /// even the hard caps, the configured overflow action decides.
    pub fn resolve(&self, wanted: Tier, bytes: u64, stats: &Stats) -> Resolution {
        if self.fits(wanted, bytes, stats, true) {
            return Resolution { tier: wanted, violated: false };
        }

        for candidate in DOWNSHIFT[wanted.index()] {
            if self.fits(candidate, bytes, stats, true) {
                return Resolution { tier: candidate, violated: true };
            }
        }

        if self.fits(wanted, bytes, stats, false) {
            return Resolution { tier: wanted, violated: true };
        }

        for candidate in DOWNSHIFT[wanted.index()] {
            if self.fits(candidate, bytes, stats, false) {
                return Resolution { tier: candidate, violated: true };
            }
        }

        let tier = match self.config.action {
            HardCapAction::RouteToSlow => Tier::Slow,
            HardCapAction::AllowOverCap => wanted,
        };
        Resolution { tier, violated: true }
    }

    fn fits(&self, tier: Tier, bytes: u64, stats: &Stats, include_soft: bool) -> bool {
        let current = stats.bytes_current(tier);

        let within = |cap: u64| cap == 0 || current.saturating_add(bytes) <= cap;

        let hard_ok = within(self.config.hard[tier.index()]);
        if include_soft {
            hard_ok && within(self.config.soft[tier.index()])
        } else {
            hard_ok
        }
    }
}
