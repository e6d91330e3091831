use crate::app::chain_storage::ChainHead;
use cipher_loot::{
    Address,
    TxContext,
};

/// Every transaction is mined in its own block. Block timestamps follow the
/// wall clock but always move forward by at least one second.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockClock {
    head: ChainHead,
}

impl BlockClock {
    pub fn resume(head: ChainHead) -> Self {
        Self { head }
    }

    pub fn head(&self) -> ChainHead {
        self.head
    }

    /// Context for the next block. The head only moves once `commit` is
    /// called, so a failed transaction does not consume a block.
    pub fn next_tx(&self, caller: Address, now: u64) -> (TxContext, ChainHead) {
        let head = ChainHead {
            block_height: self.head.block_height + 1,
            timestamp: now.max(self.head.timestamp + 1),
        };
        let tx = TxContext {
            caller,
            block_height: head.block_height,
            timestamp: head.timestamp,
        };
        (tx, head)
    }

    pub fn commit(&mut self, head: ChainHead) {
        self.head = head;
    }
}
