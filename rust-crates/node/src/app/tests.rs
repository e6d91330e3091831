#![allow(non_snake_case)]

use super::*;
use crate::app::{
    chain_storage::ChainHead,
    in_memory_chain_storage::InMemoryChainStorage,
};
use cipher_loot::{
    coprocessor::SimulatedCoprocessor,
    draw::{
        Draw,
        LatestEncryptedResult,
    },
    prizes::Rarity,
    storage::InMemoryDrawStorage,
};
use ed25519_dalek::SigningKey;
use std::{
    future::pending,
    sync::{
        Arc,
        atomic::{
            AtomicBool,
            Ordering,
        },
    },
};
use tokio::sync::{
    mpsc,
    oneshot,
};

const CONTRACT: Address = Address::new([0xc1; 20]);

fn alice() -> SigningKey {
    SigningKey::from_bytes(&[0xa1; 32])
}

fn bob() -> SigningKey {
    SigningKey::from_bytes(&[0xb0; 32])
}

fn address(key: &SigningKey) -> Address {
    auth::address_of(&key.verifying_key())
}

pub struct FakeQueryApi {
    recv: mpsc::Receiver<Query>,
}

impl FakeQueryApi {
    pub fn new_with_sender() -> (Self, mpsc::Sender<Query>) {
        let (send, recv) = mpsc::channel(10);
        (FakeQueryApi { recv }, send)
    }
}

impl QueryAPI for FakeQueryApi {
    async fn query(&mut self) -> crate::Result<Query> {
        match self.recv.recv().await {
            Some(query) => Ok(query),
            None => Err(anyhow::anyhow!("No more queries")),
        }
    }
}

/// Chain storage whose writes can be made to fail.
#[derive(Clone, Default)]
struct FlakyChainStorage {
    inner: InMemoryChainStorage,
    failing: Arc<AtomicBool>,
}

impl ChainStorage for FlakyChainStorage {
    fn chain_head(&self) -> crate::Result<Option<ChainHead>> {
        self.inner.chain_head()
    }

    fn record_block(&mut self, head: &ChainHead, record: &EventRecord) -> crate::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("chain disk full"));
        }
        self.inner.record_block(head, record)
    }

    fn revert_block(&mut self, reverted: &ChainHead, previous: &ChainHead) -> crate::Result<()> {
        self.inner.revert_block(reverted, previous)
    }

    fn events_from(&self, from_block: u64) -> crate::Result<Vec<EventRecord>> {
        self.inner.events_from(from_block)
    }
}

/// Draw storage whose appends can be made to fail.
#[derive(Clone, Default)]
struct FlakyDrawStorage {
    inner: InMemoryDrawStorage,
    failing: Arc<AtomicBool>,
}

impl DrawStorage for FlakyDrawStorage {
    fn draw_count(&self, player: &Address) -> anyhow::Result<u64> {
        self.inner.draw_count(player)
    }

    fn draw_at(&self, player: &Address, index: u64) -> anyhow::Result<Option<Draw>> {
        self.inner.draw_at(player, index)
    }

    fn draws_in_range(
        &self,
        player: &Address,
        start: u64,
        end: u64,
    ) -> anyhow::Result<Vec<Draw>> {
        self.inner.draws_in_range(player, start, end)
    }

    fn append_draw(&mut self, player: &Address, draw: &Draw) -> anyhow::Result<u64> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("draw disk full"));
        }
        self.inner.append_draw(player, draw)
    }

    fn total_draws(&self) -> anyhow::Result<u64> {
        self.inner.total_draws()
    }
}

type TestApp<S = InMemoryDrawStorage, Chain = InMemoryChainStorage> =
    App<FakeQueryApi, S, SimulatedCoprocessor, Chain>;

fn fixed_now() -> u64 {
    1_730_000_000
}

fn app_with_storage<S: DrawStorage, Chain: ChainStorage>(
    storage: S,
    chain: Chain,
) -> (TestApp<S, Chain>, mpsc::Sender<Query>, SimulatedCoprocessor) {
    let (api, sender) = FakeQueryApi::new_with_sender();
    let coprocessor = SimulatedCoprocessor::new(7);
    let ledger = DrawLedger::new(CONTRACT, storage, coprocessor.clone());
    let app = App::new(api, ledger, chain).unwrap().with_clock(fixed_now);
    (app, sender, coprocessor)
}

fn app_with(chain: InMemoryChainStorage) -> (TestApp, mpsc::Sender<Query>, SimulatedCoprocessor) {
    app_with_storage(InMemoryDrawStorage::new(), chain)
}

fn app() -> (TestApp, mpsc::Sender<Query>, SimulatedCoprocessor) {
    app_with(InMemoryChainStorage::new())
}

/// Authorization of `key` for the draw that would get `draw_id`.
fn sign_draw(key: &SigningKey, draw_id: u64) -> Authorization {
    let digest = auth::draw_digest(&CONTRACT, &address(key), draw_id);
    Authorization::sign(key, &digest)
}

async fn send_draw<S: DrawStorage, Chain: ChainStorage>(
    app: &mut TestApp<S, Chain>,
    sender: &mpsc::Sender<Query>,
    player: Address,
    authorization: Authorization,
) -> Result<EventRecord, QueryError> {
    let (tx, rx) = oneshot::channel();
    sender
        .send(Query::Draw {
            player,
            authorization,
            sender: tx,
        })
        .await
        .unwrap();
    app.run(pending()).await.unwrap();
    rx.await.unwrap()
}

async fn try_draw<S: DrawStorage, Chain: ChainStorage>(
    app: &mut TestApp<S, Chain>,
    sender: &mpsc::Sender<Query>,
    key: &SigningKey,
) -> Result<EventRecord, QueryError> {
    let player = address(key);
    let draw_id = app.ledger.get_draw_count(&player).unwrap() + 1;
    send_draw(app, sender, player, sign_draw(key, draw_id)).await
}

async fn draw(app: &mut TestApp, sender: &mpsc::Sender<Query>, key: &SigningKey) -> EventRecord {
    try_draw(app, sender, key).await.unwrap()
}

async fn decrypt(
    app: &mut TestApp,
    sender: &mpsc::Sender<Query>,
    request: DecryptRequest,
) -> Result<std::collections::BTreeMap<cipher_loot::CiphertextHandle, u64>, QueryError> {
    let (tx, rx) = oneshot::channel();
    sender
        .send(Query::Decrypt {
            user: request.user,
            handles: request.handles,
            authorization: request.authorization,
            sender: tx,
        })
        .await
        .unwrap();
    app.run(pending()).await.unwrap();
    rx.await.unwrap()
}

#[tokio::test]
async fn run__draw_query__mines_a_block_and_records_the_event() {
    // given
    let chain = InMemoryChainStorage::new();
    let events = chain.events();
    let (mut app, sender, _) = app_with(chain);

    // when
    let record = draw(&mut app, &sender, &alice()).await;

    // then
    assert_eq!(record.block_height, 1);
    assert_eq!(record.event.player, address(&alice()));
    assert_eq!(record.event.draw_id, 1);
    assert_eq!(record.event.timestamp, fixed_now());
    assert_eq!(events.lock().unwrap().clone(), vec![record]);
}

#[tokio::test]
async fn run__consecutive_draws__get_strictly_increasing_timestamps() {
    // given
    let (mut app, sender, _) = app();

    // when
    let first = draw(&mut app, &sender, &alice()).await;
    let second = draw(&mut app, &sender, &bob()).await;
    let third = draw(&mut app, &sender, &alice()).await;

    // then
    assert_eq!(
        (first.block_height, second.block_height, third.block_height),
        (1, 2, 3)
    );
    assert!(first.event.timestamp < second.event.timestamp);
    assert!(second.event.timestamp < third.event.timestamp);
    assert_eq!((second.event.draw_id, third.event.draw_id), (1, 2));
}

#[tokio::test]
async fn run__failed_draw__does_not_consume_a_block() {
    // given
    let (mut app, sender, coprocessor) = app();
    coprocessor.set_available(false);

    // when
    let failed = try_draw(&mut app, &sender, &alice()).await;
    coprocessor.set_available(true);
    let record = draw(&mut app, &sender, &alice()).await;

    // then
    assert!(matches!(failed, Err(QueryError::Unavailable(_))));
    assert_eq!(record.block_height, 1);
    assert_eq!(record.event.draw_id, 1);
}

#[tokio::test]
async fn run__encrypted_result_for_missing_draw__returns_invalid_draw_id() {
    // given
    let (mut app, sender, _) = app();
    draw(&mut app, &sender, &alice()).await;

    // when
    let (tx, rx) = oneshot::channel();
    sender
        .send(Query::EncryptedResult {
            player: address(&alice()),
            draw_id: 2,
            sender: tx,
        })
        .await
        .unwrap();
    app.run(pending()).await.unwrap();

    // then
    let actual = rx.await.unwrap();
    assert_eq!(
        actual,
        Err(QueryError::InvalidDrawId {
            player: address(&alice()),
            draw_id: 2
        })
    );
}

#[tokio::test]
async fn run__latest_without_draws__returns_zero_result() {
    // given
    let (mut app, sender, _) = app();

    // when
    let (tx, rx) = oneshot::channel();
    sender
        .send(Query::LatestEncryptedResult {
            player: address(&bob()),
            sender: tx,
        })
        .await
        .unwrap();
    app.run(pending()).await.unwrap();

    // then
    let actual = rx.await.unwrap().unwrap();
    assert_eq!(actual, LatestEncryptedResult::default());
}

#[tokio::test]
async fn run__history_query__pages_through_draws_oldest_first() {
    // given
    let (mut app, sender, _) = app();
    let mut drawn = Vec::new();
    for _ in 0..4 {
        drawn.push(draw(&mut app, &sender, &alice()).await);
    }

    // when
    let (tx, rx) = oneshot::channel();
    sender
        .send(Query::EncryptedHistory {
            player: address(&alice()),
            offset: 1,
            limit: 2,
            sender: tx,
        })
        .await
        .unwrap();
    app.run(pending()).await.unwrap();

    // then
    let history = rx.await.unwrap().unwrap();
    assert_eq!(
        history.rarities,
        vec![drawn[1].event.rarity_handle, drawn[2].event.rarity_handle]
    );
    assert_eq!(
        history.timestamps,
        vec![drawn[1].event.timestamp, drawn[2].event.timestamp]
    );
}

#[tokio::test]
async fn run__decrypt__player_reads_own_draw_but_not_anothers() {
    // given
    let (mut app, sender, coprocessor) = app();
    coprocessor.force_next_random(42);
    let record = draw(&mut app, &sender, &alice()).await;
    let handles = vec![record.event.rarity_handle, record.event.variant_handle];

    // when
    let own = decrypt(
        &mut app,
        &sender,
        DecryptRequest::signed(&alice(), CONTRACT, handles.clone()),
    )
    .await;
    let foreign = decrypt(
        &mut app,
        &sender,
        DecryptRequest::signed(&bob(), CONTRACT, handles),
    )
    .await;

    // then
    let values = own.unwrap();
    assert_eq!(values[&record.event.rarity_handle], Rarity::SSR.code());
    assert_eq!(values[&record.event.variant_handle], 0);
    assert!(matches!(foreign, Err(QueryError::NotAuthorized(_))));
}

#[tokio::test]
async fn run__decrypt_claiming_another_user__is_not_authorized() {
    // given
    let (mut app, sender, _) = app();
    let record = draw(&mut app, &sender, &alice()).await;
    let mut forged =
        DecryptRequest::signed(&alice(), CONTRACT, vec![record.event.rarity_handle]);
    forged.authorization = Authorization::sign(&bob(), &forged.digest());

    // when
    let result = decrypt(&mut app, &sender, forged).await;

    // then
    assert!(matches!(result, Err(QueryError::NotAuthorized(_))));
}

#[tokio::test]
async fn run__draw_signed_by_another_key__is_refused_without_mining() {
    // given
    let chain = InMemoryChainStorage::new();
    let events = chain.events();
    let (mut app, sender, _) = app_with(chain);
    let victim = address(&alice());
    let digest = auth::draw_digest(&CONTRACT, &victim, 1);

    // when
    let result = send_draw(
        &mut app,
        &sender,
        victim,
        Authorization::sign(&bob(), &digest),
    )
    .await;

    // then
    assert!(matches!(result, Err(QueryError::NotAuthorized(_))));
    assert_eq!(app.ledger.get_draw_count(&victim).unwrap(), 0);
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn run__replayed_draw_signature__is_refused() {
    // given
    let (mut app, sender, _) = app();
    let player = address(&alice());
    let first = sign_draw(&alice(), 1);
    send_draw(&mut app, &sender, player, first).await.unwrap();

    // when
    let replayed = send_draw(&mut app, &sender, player, first).await;

    // then
    assert!(matches!(replayed, Err(QueryError::NotAuthorized(_))));
    assert_eq!(app.ledger.get_draw_count(&player).unwrap(), 1);
}

#[tokio::test]
async fn run__block_not_recorded__stores_no_draw_and_keeps_the_height() {
    // given
    let chain = FlakyChainStorage::default();
    let failing = chain.failing.clone();
    let events = chain.inner.events();
    let (mut app, sender, _) = app_with_storage(InMemoryDrawStorage::new(), chain);
    failing.store(true, Ordering::SeqCst);

    // when
    let failed = try_draw(&mut app, &sender, &alice()).await;
    failing.store(false, Ordering::SeqCst);
    let record = try_draw(&mut app, &sender, &alice()).await.unwrap();

    // then
    assert!(matches!(failed, Err(QueryError::Internal(_))));
    assert_eq!((record.block_height, record.event.draw_id), (1, 1));
    assert_eq!(app.ledger.total_draws().unwrap(), 1);
    assert_eq!(events.lock().unwrap().clone(), vec![record]);
}

#[tokio::test]
async fn run__draw_not_stored__reverts_the_recorded_block() {
    // given
    let storage = FlakyDrawStorage::default();
    let failing = storage.failing.clone();
    let chain = InMemoryChainStorage::new();
    let events = chain.events();
    let (mut app, sender, _) = app_with_storage(storage, chain.clone());
    let first = try_draw(&mut app, &sender, &alice()).await.unwrap();
    failing.store(true, Ordering::SeqCst);

    // when
    let failed = try_draw(&mut app, &sender, &bob()).await;

    // then
    assert!(matches!(failed, Err(QueryError::Internal(_))));
    assert_eq!(
        chain.chain_head().unwrap(),
        Some(ChainHead {
            block_height: 1,
            timestamp: first.event.timestamp,
        })
    );
    assert_eq!(events.lock().unwrap().clone(), vec![first]);
    failing.store(false, Ordering::SeqCst);
    let retried = try_draw(&mut app, &sender, &bob()).await.unwrap();
    assert_eq!((retried.block_height, retried.event.draw_id), (2, 1));
}

#[tokio::test]
async fn run__events_query__filters_blocks_before_from_block() {
    // given
    let (mut app, sender, _) = app();
    draw(&mut app, &sender, &alice()).await;
    let second = draw(&mut app, &sender, &bob()).await;

    // when
    let (tx, rx) = oneshot::channel();
    sender
        .send(Query::Events {
            from_block: 2,
            sender: tx,
        })
        .await
        .unwrap();
    app.run(pending()).await.unwrap();

    // then
    assert_eq!(rx.await.unwrap().unwrap(), vec![second]);
}

#[tokio::test]
async fn run__stats_query__reports_totals_and_head() {
    // given
    let (mut app, sender, _) = app();
    draw(&mut app, &sender, &alice()).await;
    draw(&mut app, &sender, &bob()).await;

    // when
    let (tx, rx) = oneshot::channel();
    sender.send(Query::Stats(tx)).await.unwrap();
    app.run(pending()).await.unwrap();

    // then
    let expected = Stats {
        total_draws: 2,
        protocol_id: 1,
        contract: CONTRACT,
        block_height: 2,
    };
    assert_eq!(rx.await.unwrap().unwrap(), expected);
}

#[tokio::test]
async fn new__resumes_block_height_from_stored_head() {
    // given
    let mut chain = InMemoryChainStorage::new();
    let head = ChainHead {
        block_height: 41,
        timestamp: fixed_now() + 100,
    };
    let seed_record = EventRecord {
        event: cipher_loot::events::LootDrawn {
            player: address(&bob()),
            draw_id: 1,
            rarity_handle: Default::default(),
            variant_handle: Default::default(),
            timestamp: head.timestamp,
        },
        block_height: head.block_height,
    };
    chain.record_block(&head, &seed_record).unwrap();
    let (mut app, sender, _) = app_with(chain);

    // when
    let record = draw(&mut app, &sender, &alice()).await;

    // then
    assert_eq!(record.block_height, 42);
    assert_eq!(record.event.timestamp, head.timestamp + 1);
}

#[tokio::test]
async fn run__interrupt__exits() {
    // given
    let (mut app, _sender, _) = app();

    // when
    let state = app.run(async {}).await.unwrap();

    // then
    assert!(matches!(state, RunState::Exit));
}

#[tokio::test]
async fn run__closed_query_channel__returns_error() {
    // given
    let (mut app, sender, _) = app();
    drop(sender);

    // when
    let result = app.run(pending()).await;

    // then
    assert!(result.is_err());
}
