use crate::types::CiphertextHandle;
use serde::{
    Deserialize,
    Serialize,
};

/// One stored draw. Never mutated after it is appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw {
    pub rarity_handle: CiphertextHandle,
    pub variant_handle: CiphertextHandle,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedResult {
    pub rarity: CiphertextHandle,
    pub variant: CiphertextHandle,
    pub timestamp: u64,
}

/// Newest draw of a player. All fields are zero when the player has never
/// drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestEncryptedResult {
    pub rarity: CiphertextHandle,
    pub variant: CiphertextHandle,
    pub timestamp: u64,
    pub draw_id: u64,
}

/// A page of history as three parallel columns of equal length.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedHistory {
    pub rarities: Vec<CiphertextHandle>,
    pub variants: Vec<CiphertextHandle>,
    pub timestamps: Vec<u64>,
}

impl From<Draw> for EncryptedResult {
    fn from(draw: Draw) -> Self {
        Self {
            rarity: draw.rarity_handle,
            variant: draw.variant_handle,
            timestamp: draw.timestamp,
        }
    }
}

impl EncryptedHistory {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

impl FromIterator<Draw> for EncryptedHistory {
    fn from_iter<I: IntoIterator<Item = Draw>>(iter: I) -> Self {
        let mut history = EncryptedHistory::default();
        for draw in iter {
            history.rarities.push(draw.rarity_handle);
            history.variants.push(draw.variant_handle);
            history.timestamps.push(draw.timestamp);
        }
        history
    }
}
