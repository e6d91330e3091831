// Loot catalogue that decrypted rarity/variant codes resolve against.
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

#[allow(clippy::upper_case_acronyms)]
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash, Serialize, Deserialize)]
pub enum Rarity {
    R,
    SR,
    SSR,
}

impl Rarity {
    pub const ALL: [Rarity; 3] = [Rarity::SSR, Rarity::SR, Rarity::R];

    /// Unknown codes resolve to the common tier.
    pub fn from_code(code: u64) -> Self {
        match code {
            1 => Rarity::SR,
            2 => Rarity::SSR,
            _ => Rarity::R,
        }
    }

    pub fn code(self) -> u64 {
        match self {
            Rarity::R => 0,
            Rarity::SR => 1,
            Rarity::SSR => 2,
        }
    }

    pub fn meta(self) -> &'static RarityMeta {
        match self {
            Rarity::R => &ROGUE_FINDS,
            Rarity::SR => &SPECTRUM_ARTIFACTS,
            Rarity::SSR => &SINGULARITY_RELICS,
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self {
            Rarity::R => "R",
            Rarity::SR => "SR",
            Rarity::SSR => "SSR",
        };
        write!(f, "{key}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LootCard {
    pub id: u8,
    pub name: &'static str,
    pub codename: &'static str,
    pub description: &'static str,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RarityMeta {
    pub rarity: Rarity,
    pub title: &'static str,
    pub tagline: &'static str,
    pub probability_percent: u8,
    pub cards: [LootCard; 3],
}

pub static SINGULARITY_RELICS: RarityMeta = RarityMeta {
    rarity: Rarity::SSR,
    title: "Singularity Relics",
    tagline: "One percent chance. Fully encrypted brilliance.",
    probability_percent: 1,
    cards: [
        LootCard {
            id: 0,
            name: "Celestial Prism",
            codename: "SSR-00",
            description: "Refracts hostile signals into harmless auroras. Rumored to whisper the next winning strategy.",
        },
        LootCard {
            id: 1,
            name: "Chrono Bloom",
            codename: "SSR-01",
            description: "Suspends time for one encrypted heartbeat, letting strategists glimpse every branch of fate.",
        },
        LootCard {
            id: 2,
            name: "Mythic Parallax",
            codename: "SSR-02",
            description: "A relic that mirrors your intent with perfect clarity. Favorite trophy of Sepolia speed-runners.",
        },
    ],
};

pub static SPECTRUM_ARTIFACTS: RarityMeta = RarityMeta {
    rarity: Rarity::SR,
    title: "Spectrum Artifacts",
    tagline: "Nine percent to pull a strat-shifting artifact.",
    probability_percent: 9,
    cards: [
        LootCard {
            id: 0,
            name: "Aurora Edge",
            codename: "SR-00",
            description: "Slices through dark data fog, revealing a single encrypted insight.",
        },
        LootCard {
            id: 1,
            name: "Echo Crown",
            codename: "SR-01",
            description: "Stores three victorious calls and replays them when morale fades.",
        },
        LootCard {
            id: 2,
            name: "Graviton Loom",
            codename: "SR-02",
            description: "Weaves defensive fields around fragile intel, perfect for secret raids.",
        },
    ],
};

pub static ROGUE_FINDS: RarityMeta = RarityMeta {
    rarity: Rarity::R,
    title: "Rogue Finds",
    tagline: "Ninety percent odds, still encrypted treasures.",
    probability_percent: 90,
    cards: [
        LootCard {
            id: 0,
            name: "Rustlight Token",
            codename: "R-00",
            description: "Common chip traded across Cipher Loot taverns for tactical rumors.",
        },
        LootCard {
            id: 1,
            name: "Nightglass Charm",
            codename: "R-01",
            description: "Glows faintly when a decrypted message is authentic.",
        },
        LootCard {
            id: 2,
            name: "Null Bloom",
            codename: "R-02",
            description: "Absorbs stray noise inside the vault, keeping re-encryption crisp.",
        },
    ],
};

/// Resolve decrypted codes to a card. Out-of-range variants fall back to the
/// tier's first card.
pub fn resolve_loot_card(rarity_code: u64, variant: u64) -> (&'static RarityMeta, &'static LootCard) {
    let meta = Rarity::from_code(rarity_code).meta();
    let card = usize::try_from(variant)
        .ok()
        .and_then(|index| meta.cards.get(index))
        .unwrap_or(&meta.cards[0]);
    (meta, card)
}
