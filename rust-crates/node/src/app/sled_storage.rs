// Sled-backed storage for the draw ledger and the block/event log.
use crate::app::chain_storage::{
    ChainHead,
    ChainStorage,
};
use anyhow::{
    Context,
    anyhow,
};
use cipher_loot::{
    Address,
    draw::Draw,
    events::EventRecord,
    storage::DrawStorage,
};
use serde::{
    Serialize,
    de::DeserializeOwned,
};
use sled::{
    Config,
    Db,
    Transactional,
    Tree,
    transaction::{
        ConflictableTransactionError,
        TransactionError,
    },
};
use std::{
    convert::TryInto,
    path::Path,
};

const TOTAL_DRAWS_KEY: &[u8] = b"total_draws";
const CHAIN_HEAD_KEY: &[u8] = b"chain_head";

#[derive(Clone)]
pub struct SledDrawStorage {
    draws: Tree,
    draw_counts: Tree,
    ledger_meta: Tree,
}

#[derive(Clone)]
pub struct SledChainStorage {
    events: Tree,
    chain_meta: Tree,
}

impl SledDrawStorage {
    pub fn new(db: &Db) -> crate::Result<Self> {
        let draws = db.open_tree("draws").context("open draws tree")?;
        let draw_counts = db
            .open_tree("draw_counts")
            .context("open draw_counts tree")?;
        let ledger_meta = db
            .open_tree("ledger_meta")
            .context("open ledger_meta tree")?;

        Ok(Self {
            draws,
            draw_counts,
            ledger_meta,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<(Self, SledChainStorage)> {
        let config = Config::default().path(path);
        let db = config.open().context("open sled database")?;
        let draws = Self::new(&db)?;
        let chain = SledChainStorage::new(&db)?;
        Ok((draws, chain))
    }

    /// `player ‖ index` with a big-endian index, so a player's draws are
    /// contiguous and ordered in the tree.
    fn draw_key(player: &Address, index: u64) -> Vec<u8> {
        let mut key = Vec::with_capacity(28);
        key.extend_from_slice(player.as_bytes());
        key.extend_from_slice(&index.to_be_bytes());
        key
    }
}

impl DrawStorage for SledDrawStorage {
    fn draw_count(&self, player: &Address) -> anyhow::Result<u64> {
        match self.draw_counts.get(player.as_bytes())? {
            Some(bytes) => decode_u64(bytes.as_ref()).context("draw count should be 8 bytes"),
            None => Ok(0),
        }
    }

    fn draw_at(&self, player: &Address, index: u64) -> anyhow::Result<Option<Draw>> {
        let key = Self::draw_key(player, index);
        let value = match self.draws.get(key)? {
            Some(value) => value,
            None => return Ok(None),
        };
        let draw = deserialize::<Draw>(value.as_ref())?;
        Ok(Some(draw))
    }

    fn draws_in_range(
        &self,
        player: &Address,
        start: u64,
        end: u64,
    ) -> anyhow::Result<Vec<Draw>> {
        let end = end.min(self.draw_count(player)?);
        if start >= end {
            return Ok(Vec::new());
        }
        let mut draws = Vec::new();
        let range = Self::draw_key(player, start)..Self::draw_key(player, end);
        for entry in self.draws.range(range) {
            let (_, value) = entry.context("iterate player draws")?;
            draws.push(deserialize::<Draw>(value.as_ref())?);
        }
        Ok(draws)
    }

    fn append_draw(&mut self, player: &Address, draw: &Draw) -> anyhow::Result<u64> {
        let bytes = serialize_record(draw, "draw record")?;
        let player_key = player.as_bytes();

        let result = (&self.draws, &self.draw_counts, &self.ledger_meta).transaction(
            |(draws, draw_counts, ledger_meta)| -> Result<u64, ConflictableTransactionError<String>> {
                let count = match draw_counts.get(player_key)? {
                    Some(raw) => decode_u64(raw.as_ref()).map_err(|_| {
                        ConflictableTransactionError::Abort("corrupt draw count".to_string())
                    })?,
                    None => 0,
                };
                let total = match ledger_meta.get(TOTAL_DRAWS_KEY)? {
                    Some(raw) => decode_u64(raw.as_ref()).map_err(|_| {
                        ConflictableTransactionError::Abort("corrupt total draws".to_string())
                    })?,
                    None => 0,
                };
                let next = count + 1;
                draws.insert(Self::draw_key(player, count), bytes.as_slice())?;
                draw_counts.insert(player_key.as_slice(), next.to_be_bytes().as_slice())?;
                ledger_meta.insert(TOTAL_DRAWS_KEY, (total + 1).to_be_bytes().as_slice())?;
                Ok(next)
            },
        );
        let draw_id = result.map_err(|err| match err {
            TransactionError::Abort(reason) => anyhow!("append draw aborted: {reason}"),
            TransactionError::Storage(err) => {
                anyhow::Error::new(err).context("append draw transaction")
            }
        })?;
        self.draws.flush().context("flush draws")?;
        Ok(draw_id)
    }

    fn total_draws(&self) -> anyhow::Result<u64> {
        match self.ledger_meta.get(TOTAL_DRAWS_KEY)? {
            Some(bytes) => decode_u64(bytes.as_ref()).context("total draws should be 8 bytes"),
            None => Ok(0),
        }
    }
}

impl SledChainStorage {
    pub fn new(db: &Db) -> crate::Result<Self> {
        let events = db.open_tree("events").context("open events tree")?;
        let chain_meta = db.open_tree("chain_meta").context("open chain_meta tree")?;
        Ok(Self { events, chain_meta })
    }
}

impl ChainStorage for SledChainStorage {
    fn chain_head(&self) -> crate::Result<Option<ChainHead>> {
        let value = match self.chain_meta.get(CHAIN_HEAD_KEY)? {
            Some(value) => value,
            None => return Ok(None),
        };
        Ok(Some(deserialize::<ChainHead>(value.as_ref())?))
    }

    fn record_block(&mut self, head: &ChainHead, record: &EventRecord) -> crate::Result<()> {
        let head_bytes = serialize_record(head, "chain head")?;
        let event_bytes = serialize_record(record, "event record")?;
        let event_key = record.block_height.to_be_bytes();

        (&self.events, &self.chain_meta)
            .transaction(
                |(events, chain_meta)| -> Result<(), ConflictableTransactionError<()>> {
                    events.insert(event_key.as_slice(), event_bytes.as_slice())?;
                    chain_meta.insert(CHAIN_HEAD_KEY, head_bytes.as_slice())?;
                    Ok(())
                },
            )
            .map_err(|err| anyhow!("record block {}: {err:?}", head.block_height))?;
        self.events.flush().context("flush events")?;
        Ok(())
    }

    fn revert_block(&mut self, reverted: &ChainHead, previous: &ChainHead) -> crate::Result<()> {
        let event_key = reverted.block_height.to_be_bytes();
        let previous_bytes = match previous.block_height {
            0 => None,
            _ => Some(serialize_record(previous, "chain head")?),
        };

        (&self.events, &self.chain_meta)
            .transaction(
                |(events, chain_meta)| -> Result<(), ConflictableTransactionError<()>> {
                    events.remove(event_key.as_slice())?;
                    match &previous_bytes {
                        Some(bytes) => chain_meta.insert(CHAIN_HEAD_KEY, bytes.as_slice())?,
                        None => chain_meta.remove(CHAIN_HEAD_KEY)?,
                    };
                    Ok(())
                },
            )
            .map_err(|err| anyhow!("revert block {}: {err:?}", reverted.block_height))?;
        self.events.flush().context("flush events")?;
        Ok(())
    }

    fn events_from(&self, from_block: u64) -> crate::Result<Vec<EventRecord>> {
        let mut records = Vec::new();
        for entry in self.events.range(from_block.to_be_bytes()..) {
            let (_, value) = entry.context("iterate events")?;
            records.push(deserialize::<EventRecord>(value.as_ref())?);
        }
        Ok(records)
    }
}

fn decode_u64(bytes: &[u8]) -> anyhow::Result<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| anyhow!("expected 8 bytes, got {}", bytes.len()))?;
    Ok(u64::from_be_bytes(arr))
}

fn serialize_record<T: Serialize>(value: &T, label: &str) -> crate::Result<Vec<u8>> {
    serde_json::to_vec(value).with_context(|| format!("serialize {label}"))
}

fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> crate::Result<T> {
    serde_json::from_slice(bytes).context("deserialize sled record")
}
