use crate::{
    draw::Draw,
    storage::DrawStorage,
    types::Address,
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
};

#[derive(Default)]
struct Ledgers {
    draws: HashMap<Address, Vec<Draw>>,
    total_draws: u64,
}

#[derive(Clone, Default)]
pub struct InMemoryDrawStorage {
    inner: Arc<Mutex<Ledgers>>,
}

impl InMemoryDrawStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every player that has drawn at least once.
    pub fn players(&self) -> Vec<Address> {
        self.lock().draws.keys().copied().collect()
    }

    fn lock(&self) -> MutexGuard<'_, Ledgers> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DrawStorage for InMemoryDrawStorage {
    fn draw_count(&self, player: &Address) -> anyhow::Result<u64> {
        let guard = self.lock();
        Ok(guard.draws.get(player).map_or(0, |draws| draws.len() as u64))
    }

    fn draw_at(&self, player: &Address, index: u64) -> anyhow::Result<Option<Draw>> {
        let guard = self.lock();
        let draw = guard
            .draws
            .get(player)
            .and_then(|draws| draws.get(usize::try_from(index).ok()?))
            .copied();
        Ok(draw)
    }

    fn draws_in_range(
        &self,
        player: &Address,
        start: u64,
        end: u64,
    ) -> anyhow::Result<Vec<Draw>> {
        let guard = self.lock();
        let Some(draws) = guard.draws.get(player) else {
            return Ok(Vec::new());
        };
        let len = draws.len();
        let start = usize::try_from(start).unwrap_or(len).min(len);
        let end = usize::try_from(end).unwrap_or(len).clamp(start, len);
        Ok(draws[start..end].to_vec())
    }

    fn append_draw(&mut self, player: &Address, draw: &Draw) -> anyhow::Result<u64> {
        let mut guard = self.lock();
        guard.total_draws += 1;
        let draws = guard.draws.entry(*player).or_default();
        draws.push(*draw);
        Ok(draws.len() as u64)
    }

    fn total_draws(&self) -> anyhow::Result<u64> {
        Ok(self.lock().total_draws)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::types::CiphertextHandle;

    fn draw(seed: u8, timestamp: u64) -> Draw {
        Draw {
            rarity_handle: CiphertextHandle::new([seed; 32]),
            variant_handle: CiphertextHandle::new([seed.wrapping_add(1); 32]),
            timestamp,
        }
    }

    #[test]
    fn append_draw__returns_sequential_counts_per_player() {
        // given
        let mut storage = InMemoryDrawStorage::new();
        let alice = Address::new([1; 20]);
        let bob = Address::new([2; 20]);

        // when
        let first = storage.append_draw(&alice, &draw(1, 10)).unwrap();
        let other = storage.append_draw(&bob, &draw(2, 11)).unwrap();
        let second = storage.append_draw(&alice, &draw(3, 12)).unwrap();

        // then
        assert_eq!((first, other, second), (1, 1, 2));
        assert_eq!(storage.total_draws().unwrap(), 3);
        assert_eq!(storage.draw_at(&alice, 1).unwrap(), Some(draw(3, 12)));
    }

    #[test]
    fn draws_in_range__clips_to_existing_entries() {
        // given
        let mut storage = InMemoryDrawStorage::new();
        let alice = Address::new([1; 20]);
        for i in 0..3 {
            storage.append_draw(&alice, &draw(i, u64::from(i))).unwrap();
        }

        // when
        let tail = storage.draws_in_range(&alice, 1, 100).unwrap();
        let past_end = storage.draws_in_range(&alice, 5, 9).unwrap();
        let huge = storage.draws_in_range(&alice, u64::MAX, u64::MAX).unwrap();

        // then
        assert_eq!(tail, vec![draw(1, 1), draw(2, 2)]);
        assert!(past_end.is_empty());
        assert!(huge.is_empty());
    }
}
