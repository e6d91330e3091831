use crate::{
    Result,
    app::{
        block_clock::BlockClock,
        chain_storage::ChainStorage,
        query_api::{
            Query,
            QueryAPI,
            QueryError,
            Responder,
            Stats,
        },
    },
};
use cipher_loot::{
    Address,
    DrawLedger,
    auth::{
        self,
        Authorization,
    },
    coprocessor::{
        Coprocessor,
        DecryptRequest,
        DecryptionService,
    },
    events::EventRecord,
    storage::DrawStorage,
};
use tracing_subscriber::EnvFilter;

pub mod actix_query_api;
pub mod block_clock;
pub mod chain_storage;
pub mod in_memory_chain_storage;
pub mod query_api;
pub mod sled_storage;

#[cfg(test)]
mod tests;

pub enum RunState {
    Continue,
    Exit,
}

pub fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

/// Owns the ledger and answers queries one at a time.
pub struct App<API, S, C, Chain> {
    api: API,
    ledger: DrawLedger<S, C>,
    chain: Chain,
    clock: BlockClock,
    now: fn() -> u64,
}

impl<API, S, C, Chain: ChainStorage> App<API, S, C, Chain> {
    pub fn new(api: API, ledger: DrawLedger<S, C>, chain: Chain) -> Result<Self> {
        let head = chain.chain_head()?.unwrap_or_default();
        if head.block_height > 0 {
            tracing::info!(
                "Resuming chain at block height {} (timestamp {})",
                head.block_height,
                head.timestamp
            );
        }
        Ok(Self {
            api,
            ledger,
            chain,
            clock: BlockClock::resume(head),
            now: unix_now,
        })
    }

    pub fn with_clock(mut self, now: fn() -> u64) -> Self {
        self.now = now;
        self
    }
}

impl<API, S, C, Chain> App<API, S, C, Chain>
where
    API: QueryAPI,
    S: DrawStorage,
    C: Coprocessor + DecryptionService,
    Chain: ChainStorage,
{
    pub async fn run(
        &mut self,
        interrupt: impl Future<Output = ()>,
    ) -> Result<RunState> {
        tokio::select! {
            _ = interrupt => {
                tracing::info!("Interrupt received, stopping ledger task");
                Ok(RunState::Exit)
            }
            query = self.api.query() => {
                match query {
                    Ok(query) => {
                        self.handle_query(query);
                        Ok(RunState::Continue)
                    }
                    Err(e) => {
                        tracing::error!("Error receiving query: {:?}", e);
                        Err(e)
                    }
                }
            }
        }
    }

    fn handle_query(&mut self, query: Query) {
        match query {
            Query::Draw {
                player,
                authorization,
                sender,
            } => {
                let result = self.draw(player, &authorization);
                respond(sender, result, "draw");
            }
            Query::EncryptedResult {
                player,
                draw_id,
                sender,
            } => {
                let result = self
                    .ledger
                    .get_encrypted_result(&player, draw_id)
                    .map_err(QueryError::from);
                respond(sender, result, "encrypted result");
            }
            Query::LatestEncryptedResult { player, sender } => {
                let result = self
                    .ledger
                    .get_latest_encrypted_result(&player)
                    .map_err(QueryError::from);
                respond(sender, result, "latest result");
            }
            Query::EncryptedHistory {
                player,
                offset,
                limit,
                sender,
            } => {
                let result = self
                    .ledger
                    .get_encrypted_history(&player, offset, limit)
                    .map_err(QueryError::from);
                respond(sender, result, "history");
            }
            Query::DrawCount { player, sender } => {
                let result = self
                    .ledger
                    .get_draw_count(&player)
                    .map_err(QueryError::from);
                respond(sender, result, "draw count");
            }
            Query::Stats(sender) => {
                let result = self.stats();
                respond(sender, result, "stats");
            }
            Query::ProbabilityConfig(sender) => {
                respond(
                    sender,
                    Ok(DrawLedger::<S, C>::probability_config()),
                    "probability config",
                );
            }
            Query::Events { from_block, sender } => {
                let result = self
                    .chain
                    .events_from(from_block)
                    .map_err(|e| QueryError::Internal(format!("{e:#}")));
                respond(sender, result, "events");
            }
            Query::Decrypt {
                user,
                handles,
                authorization,
                sender,
            } => {
                let request = DecryptRequest {
                    handles,
                    contract: self.ledger.address(),
                    user,
                    authorization,
                };
                let result = self
                    .ledger
                    .coprocessor()
                    .user_decrypt(&request)
                    .map_err(QueryError::from);
                if let Err(e) = &result {
                    tracing::warn!(%user, "decrypt refused: {e}");
                }
                respond(sender, result, "decrypt");
            }
        }
    }

    /// Mine one block holding a single draw transaction, signed by `player`
    /// over their next draw id.
    ///
    /// The block is persisted before the draw is stored and reverted if the
    /// store fails, so the chain head never trails the stored draws.
    fn draw(
        &mut self,
        player: Address,
        authorization: &Authorization,
    ) -> Result<EventRecord, QueryError> {
        let next_draw_id = self.ledger.get_draw_count(&player)? + 1;
        let digest = auth::draw_digest(&self.ledger.address(), &player, next_draw_id);
        authorization.verify(&player, &digest).map_err(|e| {
            tracing::warn!(%player, "draw refused: {e}");
            QueryError::from(e)
        })?;

        let (tx, head) = self.clock.next_tx(player, (self.now)());
        let pending = self.ledger.prepare_draw(&tx).map_err(|e| {
            tracing::error!(%player, "draw failed: {e}");
            QueryError::from(e)
        })?;
        let record = EventRecord {
            event: pending.event(),
            block_height: head.block_height,
        };
        self.chain.record_block(&head, &record).map_err(|e| {
            tracing::error!("block {} was not recorded: {e:#}", head.block_height);
            QueryError::Internal(format!("{e:#}"))
        })?;

        if let Err(e) = self.ledger.commit_draw(pending) {
            tracing::error!(%player, "draw failed, reverting block {}: {e}", head.block_height);
            if let Err(revert) = self.chain.revert_block(&head, &self.clock.head()) {
                tracing::error!("block {} was not reverted: {revert:#}", head.block_height);
            }
            return Err(QueryError::from(e));
        }
        self.clock.commit(head);
        Ok(record)
    }

    fn stats(&self) -> Result<Stats, QueryError> {
        Ok(Stats {
            total_draws: self.ledger.total_draws()?,
            protocol_id: DrawLedger::<S, C>::confidential_protocol_id(),
            contract: self.ledger.address(),
            block_height: self.clock.head().block_height,
        })
    }
}

fn respond<T>(sender: Responder<T>, result: Result<T, QueryError>, label: &str) {
    if sender.send(result).is_err() {
        tracing::warn!("Requester dropped before the {label} response was sent");
    }
}

pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
