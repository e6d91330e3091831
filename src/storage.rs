use crate::{
    draw::Draw,
    types::Address,
};

pub mod in_memory;

pub use in_memory::InMemoryDrawStorage;

/// Append-only per-player draw sequences plus a global counter.
pub trait DrawStorage {
    /// number of draws the player has made
    fn draw_count(&self, player: &Address) -> anyhow::Result<u64>;

    /// draw at the 0-based `index` of the player's sequence
    fn draw_at(&self, player: &Address, index: u64) -> anyhow::Result<Option<Draw>>;

    /// draws in `start..end`, clipped to what exists
    fn draws_in_range(
        &self,
        player: &Address,
        start: u64,
        end: u64,
    ) -> anyhow::Result<Vec<Draw>>;

    /// Append a draw and bump both the player's and the global counter in one
    /// step. Returns the player's new count, which is the draw's id.
    fn append_draw(&mut self, player: &Address, draw: &Draw) -> anyhow::Result<u64>;

    fn total_draws(&self) -> anyhow::Result<u64>;
}
