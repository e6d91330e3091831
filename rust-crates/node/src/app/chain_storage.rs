use cipher_loot::events::EventRecord;
use serde::{
    Deserialize,
    Serialize,
};

/// Height and timestamp of the newest block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHead {
    pub block_height: u64,
    pub timestamp: u64,
}

pub trait ChainStorage {
    /// retrieve the newest block, if any has been produced
    fn chain_head(&self) -> crate::Result<Option<ChainHead>>;

    /// persist a produced block together with the event it emitted
    fn record_block(&mut self, head: &ChainHead, record: &EventRecord) -> crate::Result<()>;

    /// undo `record_block` for `reverted`, making `previous` the head again;
    /// a `previous` at height 0 means no block remains
    fn revert_block(&mut self, reverted: &ChainHead, previous: &ChainHead) -> crate::Result<()>;

    /// events emitted at or after `from_block`, oldest first
    fn events_from(&self, from_block: u64) -> crate::Result<Vec<EventRecord>>;
}
