//! Capacity configuration
//!
//! Per-tier soft and hard byte ceilings plus the action taken when even the
//! hard caps cannot be satisfied. A cap of `0` means unlimited. Configuration
//! is read from the environment once, at allocator construction, and is
//! immutable for the life of the allocator.
//!
//! Malformed values are never an error: they log a warning and fall back to
//! the default, favoring availability over strictness.

use tracing::{debug, warn};

use crate::tier::Tier;

/// What to do when a request fits no tier's hard cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HardCapAction {
    /// Route the request to the slow tier unconditionally.
    #[default]
    RouteToSlow,
    /// Keep the originally wanted tier, letting its hard cap be exceeded.
    AllowOverCap,
}

/// Per-tier capacity ceilings.
#[derive(Debug, Clone, Default)]
pub struct CapacityConfig {
    /// Soft caps in bytes, indexed by tier (0 = unlimited).
    pub soft: [u64; Tier::COUNT],
    /// Hard caps in bytes, indexed by tier (0 = unlimited).
    pub hard: [u64; Tier::COUNT],
    /// Overflow behavior when no hard cap fits.
    pub action: HardCapAction,
}

impl CapacityConfig {
    /// Set the soft cap for one tier.
    pub fn soft_cap(mut self, tier: Tier, bytes: u64) -> Self {
        self.soft[tier.index()] = bytes;
        self
    }

    /// Set the hard cap for one tier.
    pub fn hard_cap(mut self, tier: Tier, bytes: u64) -> Self {
        self.hard[tier.index()] = bytes;
        self
    }

    /// Set the hard-cap overflow action.
    pub fn action(mut self, action: HardCapAction) -> Self {
        self.action = action;
        self
    }

    /// Load capacity ceilings from `TA_{FAST,NORMAL,SLOW}_{SOFT,HARD}` and
    /// the overflow action from `TA_HARD_ACTION` (`slow` | `allow`).
    pub fn from_env() -> Self {
        let mut config = Self::default();

        const KEYS: [(Tier, &str, &str); Tier::COUNT] = [
            (Tier::Fast, "TA_FAST_SOFT", "TA_FAST_HARD"),
            (Tier::Normal, "TA_NORMAL_SOFT", "TA_NORMAL_HARD"),
            (Tier::Slow, "TA_SLOW_SOFT", "TA_SLOW_HARD"),
        ];

        for (tier, soft_key, hard_key) in KEYS {
            config.soft[tier.index()] = env_size(soft_key);
            config.hard[tier.index()] = env_size(hard_key);
        }

        if let Ok(value) = std::env::var("TA_HARD_ACTION") {
            config.action = match value.as_str() {
                "slow" => HardCapAction::RouteToSlow,
                "allow" => HardCapAction::AllowOverCap,
                other => {
                    warn!(key = "TA_HARD_ACTION", value = other, "unrecognized hard-cap action, using default");
                    HardCapAction::default()
                }
            };
        }

        debug!(
            soft = ?config.soft,
            hard = ?config.hard,
            action = ?config.action,
            "capacity configuration loaded"
        );

        config
    }
}

/// Read one size-valued environment variable, defaulting to 0 (unlimited).
fn env_size(key: &str) -> u64 {
    match std::env::var(key) {
        Ok(value) => parse_size(&value).unwrap_or_else(|| {
            warn!(key, value = value.as_str(), "unparseable size literal, treating as unlimited");
            0
        }),
        Err(_) => 0,
    }
}

/// Parse a size literal: a decimal integer with an optional `k`/`m`/`g`
/// suffix (case-insensitive, 1024-based).
pub fn parse_size(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (digits, shift) = match trimmed.as_bytes()[trimmed.len() - 1].to_ascii_lowercase() {
        b'k' => (&trimmed[..trimmed.len() - 1], 10),
        b'm' => (&trimmed[..trimmed.len() - 1], 20),
        b'g' => (&trimmed[..trimmed.len() - 1], 30),
        _ => (trimmed, 0),
    };

    let value: u64 = digits.trim().parse().ok()?;
    value.checked_mul(1u64 << shift)
}
