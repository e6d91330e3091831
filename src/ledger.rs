use crate::{
    Result,
    coprocessor::Coprocessor,
    draw::{
        Draw,
        EncryptedHistory,
        EncryptedResult,
        LatestEncryptedResult,
    },
    error::LedgerError,
    events::LootDrawn,
    probability::{
        PROBABILITY_CONFIG,
        ProbabilityConfig,
    },
    storage::DrawStorage,
    types::Address,
};

/// Identifier of the FHE host configuration the ledger was built against.
pub const CONFIDENTIAL_PROTOCOL_ID: u64 = 1;

/// Host-provided context of the transaction being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxContext {
    pub caller: Address,
    pub block_height: u64,
    pub timestamp: u64,
}

/// A draw whose ciphertexts exist but which is not stored yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingDraw {
    player: Address,
    draw_id: u64,
    block_height: u64,
    draw: Draw,
}

impl PendingDraw {
    /// The event the draw emits once committed.
    pub fn event(&self) -> LootDrawn {
        LootDrawn {
            player: self.player,
            draw_id: self.draw_id,
            rarity_handle: self.draw.rarity_handle,
            variant_handle: self.draw.variant_handle,
            timestamp: self.draw.timestamp,
        }
    }
}

/// The draw ledger.
///
/// Mutations take `&mut self`; the host is expected to run them one at a
/// time, which is what makes a draw atomic.
pub struct DrawLedger<S, C> {
    address: Address,
    storage: S,
    coprocessor: C,
}

impl<S, C> DrawLedger<S, C> {
    pub fn new(address: Address, storage: S, coprocessor: C) -> Self {
        Self {
            address,
            storage,
            coprocessor,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn coprocessor(&self) -> &C {
        &self.coprocessor
    }

    pub const fn probability_config() -> ProbabilityConfig {
        PROBABILITY_CONFIG
    }

    pub const fn confidential_protocol_id() -> u64 {
        CONFIDENTIAL_PROTOCOL_ID
    }
}

impl<S: DrawStorage, C: Coprocessor> DrawLedger<S, C> {
    /// Record a new encrypted draw for `tx.caller`.
    pub fn draw(&mut self, tx: &TxContext) -> Result<LootDrawn> {
        let pending = self.prepare_draw(tx)?;
        self.commit_draw(pending)
    }

    /// First half of `draw`: obtain the ciphertexts and grant access to them,
    /// without touching storage. A failing coprocessor therefore leaves the
    /// ledger untouched, and the host can persist its block before the draw.
    pub fn prepare_draw(&mut self, tx: &TxContext) -> Result<PendingDraw> {
        let player = tx.caller;
        let config = Self::probability_config();

        let random = self.coprocessor.random()?;
        let outcome = self.coprocessor.derive_outcome(&random, &config)?;
        for handle in [&outcome.rarity, &outcome.variant] {
            self.coprocessor.allow(handle, &self.address)?;
            self.coprocessor.allow(handle, &player)?;
        }

        Ok(PendingDraw {
            player,
            draw_id: self.storage.draw_count(&player)? + 1,
            block_height: tx.block_height,
            draw: Draw {
                rarity_handle: outcome.rarity,
                variant_handle: outcome.variant,
                timestamp: tx.timestamp,
            },
        })
    }

    /// Append a prepared draw. Fails if another draw for the player was
    /// stored in between.
    pub fn commit_draw(&mut self, pending: PendingDraw) -> Result<LootDrawn> {
        let player = pending.player;
        let draw_id = self.storage.append_draw(&player, &pending.draw)?;
        if draw_id != pending.draw_id {
            return Err(anyhow::anyhow!(
                "draw of {player} stored as {draw_id}, prepared as {}",
                pending.draw_id
            )
            .into());
        }

        tracing::info!(
            %player,
            draw_id,
            block_height = pending.block_height,
            "loot drawn"
        );

        Ok(pending.event())
    }

    pub fn get_encrypted_result(
        &self,
        player: &Address,
        draw_id: u64,
    ) -> Result<EncryptedResult> {
        let count = self.storage.draw_count(player)?;
        if draw_id == 0 || draw_id > count {
            return Err(LedgerError::InvalidDrawId {
                player: *player,
                draw_id,
            });
        }
        let draw = self.storage.draw_at(player, draw_id - 1)?.ok_or_else(|| {
            anyhow::anyhow!("draw {draw_id} of {player} missing below count {count}")
        })?;
        Ok(draw.into())
    }

    /// Zero-valued result when the player has not drawn yet.
    pub fn get_latest_encrypted_result(
        &self,
        player: &Address,
    ) -> Result<LatestEncryptedResult> {
        let count = self.storage.draw_count(player)?;
        if count == 0 {
            return Ok(LatestEncryptedResult::default());
        }
        let latest = self.get_encrypted_result(player, count)?;
        Ok(LatestEncryptedResult {
            rarity: latest.rarity,
            variant: latest.variant,
            timestamp: latest.timestamp,
            draw_id: count,
        })
    }

    /// Up to `limit` draws starting at the 0-based `offset`, oldest first.
    pub fn get_encrypted_history(
        &self,
        player: &Address,
        offset: u64,
        limit: u64,
    ) -> Result<EncryptedHistory> {
        let count = self.storage.draw_count(player)?;
        let start = offset.min(count);
        let end = start.saturating_add(limit).min(count);
        if start == end {
            return Ok(EncryptedHistory::default());
        }
        let draws = self.storage.draws_in_range(player, start, end)?;
        tracing::debug!(%player, offset, limit, returned = draws.len(), "history read");
        Ok(draws.into_iter().collect())
    }

    pub fn get_draw_count(&self, player: &Address) -> Result<u64> {
        Ok(self.storage.draw_count(player)?)
    }

    pub fn total_draws(&self) -> Result<u64> {
        Ok(self.storage.total_draws()?)
    }
}
