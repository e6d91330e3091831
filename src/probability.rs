use crate::prizes::Rarity;
use serde::{
    Deserialize,
    Serialize,
};

/// Number of loot cards in each rarity tier.
pub const VARIANTS_PER_RARITY: u32 = 3;

/// Fixed-point thresholds the coprocessor uses to bucket a random roll.
///
/// A roll is `random % precision`; rolls below `ssr_cutoff` are SSR, rolls
/// below `sr_cutoff` are SR, everything else is R.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbabilityConfig {
    pub precision: u16,
    pub sr_cutoff: u16,
    pub ssr_cutoff: u16,
}

pub const PROBABILITY_CONFIG: ProbabilityConfig = ProbabilityConfig {
    precision: 10_000,
    sr_cutoff: 1_000,
    ssr_cutoff: 100,
};

/// Per-tier odds in basis points of `precision`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Odds {
    pub r: u16,
    pub sr: u16,
    pub ssr: u16,
}

impl ProbabilityConfig {
    pub fn rarity_for_roll(&self, roll: u16) -> Rarity {
        if roll < self.ssr_cutoff {
            Rarity::SSR
        } else if roll < self.sr_cutoff {
            Rarity::SR
        } else {
            Rarity::R
        }
    }

    /// Split a raw 32-bit random value into a (rarity, variant) pair.
    pub fn evaluate(&self, random: u32) -> (Rarity, u32) {
        let precision = u32::from(self.precision.max(1));
        let roll = (random % precision) as u16;
        let variant = (random / precision) % VARIANTS_PER_RARITY;
        (self.rarity_for_roll(roll), variant)
    }

    pub fn odds(&self) -> Odds {
        Odds {
            r: self.precision.saturating_sub(self.sr_cutoff),
            sr: self.sr_cutoff.saturating_sub(self.ssr_cutoff),
            ssr: self.ssr_cutoff,
        }
    }

    /// Percentage of draws landing in `rarity`.
    pub fn percent(&self, rarity: Rarity) -> f64 {
        let odds = self.odds();
        let bucket = match rarity {
            Rarity::R => odds.r,
            Rarity::SR => odds.sr,
            Rarity::SSR => odds.ssr,
        };
        f64::from(bucket) * 100.0 / f64::from(self.precision.max(1))
    }
}
