use crate::types::{
    Address,
    CiphertextHandle,
};
use serde::{
    Deserialize,
    Serialize,
};

/// Emitted once per successful draw so off-chain consumers can rebuild a
/// player's history without replaying reads.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct LootDrawn {
    pub player: Address,
    pub draw_id: u64,
    pub rarity_handle: CiphertextHandle,
    pub variant_handle: CiphertextHandle,
    pub timestamp: u64,
}

/// An event together with the block that produced it.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub event: LootDrawn,
    pub block_height: u64,
}
