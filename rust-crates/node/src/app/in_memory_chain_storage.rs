use crate::app::chain_storage::{
    ChainHead,
    ChainStorage,
};
use cipher_loot::events::EventRecord;
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
    PoisonError,
};

#[derive(Clone, Default)]
pub struct InMemoryChainStorage {
    head: Arc<Mutex<Option<ChainHead>>>,
    events: Arc<Mutex<Vec<EventRecord>>>,
}

impl InMemoryChainStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Arc<Mutex<Vec<EventRecord>>> {
        self.events.clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ChainStorage for InMemoryChainStorage {
    fn chain_head(&self) -> crate::Result<Option<ChainHead>> {
        Ok(*lock(&self.head))
    }

    fn record_block(&mut self, head: &ChainHead, record: &EventRecord) -> crate::Result<()> {
        *lock(&self.head) = Some(*head);
        lock(&self.events).push(record.clone());
        Ok(())
    }

    fn revert_block(&mut self, reverted: &ChainHead, previous: &ChainHead) -> crate::Result<()> {
        lock(&self.events).retain(|record| record.block_height != reverted.block_height);
        *lock(&self.head) = (previous.block_height > 0).then_some(*previous);
        Ok(())
    }

    fn events_from(&self, from_block: u64) -> crate::Result<Vec<EventRecord>> {
        let guard = lock(&self.events);
        Ok(guard
            .iter()
            .filter(|record| record.block_height >= from_block)
            .cloned()
            .collect())
    }
}
