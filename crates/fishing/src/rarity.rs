use std::fmt::Display;

use serde::Serialize;

/// Rarity of a species relative to the mean weight of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RarityTier {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
    Mythic,
}

impl RarityTier {
    /// Tier for `weight / mean_weight`.
    pub fn from_ratio(ratio: f64) -> Self {
        match ratio {
            r if r < 0.05 => Self::Mythic,
            r if r < 0.20 => Self::Legendary,
            r if r < 0.50 => Self::Epic,
            r if r < 1.00 => Self::Rare,
            r if r < 1.50 => Self::Uncommon,
            _ => Self::Common,
        }
    }

    /// Display color as `0xRRGGBB`.
    pub const fn color(self) -> u32 {
        match self {
            Self::Mythic => 0xE74C3C,
            Self::Legendary => 0xF1C40F,
            Self::Epic => 0x9B59B6,
            Self::Rare => 0x3498DB,
            Self::Uncommon => 0x2ECC71,
            Self::Common => 0x95A5A6,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Common => "Common",
            Self::Uncommon => "Uncommon",
            Self::Rare => "Rare",
            Self::Epic => "Epic",
            Self::Legendary => "Legendary",
            Self::Mythic => "Mythic",
        }
    }
}

impl Display for RarityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
