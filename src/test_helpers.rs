use crate::{
    Address,
    CiphertextHandle,
    DrawLedger,
    TxContext,
    auth::address_of,
    coprocessor::{
        DecryptRequest,
        DecryptionService,
        SimulatedCoprocessor,
    },
    events::LootDrawn,
    prizes::Rarity,
    storage::InMemoryDrawStorage,
};
use ed25519_dalek::SigningKey;

pub const CONTRACT: Address = Address::new([0xc1; 20]);
pub const GENESIS_TIMESTAMP: u64 = 1_730_000_000;

pub type TestLedger = DrawLedger<InMemoryDrawStorage, SimulatedCoprocessor>;

/// Ledger wired to in-memory storage and a seeded simulated coprocessor,
/// with a block clock that advances one block (and at least one second) per
/// transaction.
pub struct TestContext {
    ledger: TestLedger,
    storage: InMemoryDrawStorage,
    coprocessor: SimulatedCoprocessor,
    alice: SigningKey,
    bob: SigningKey,
    block_height: u64,
    timestamp: u64,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    pub fn new() -> Self {
        Self::new_with_seed(0)
    }

    pub fn new_with_seed(seed: u64) -> Self {
        let storage = InMemoryDrawStorage::new();
        let coprocessor = SimulatedCoprocessor::new(seed);
        let ledger = DrawLedger::new(CONTRACT, storage.clone(), coprocessor.clone());
        Self {
            ledger,
            storage,
            coprocessor,
            alice: SigningKey::from_bytes(&[0xa1; 32]),
            bob: SigningKey::from_bytes(&[0xb0; 32]),
            block_height: 0,
            timestamp: GENESIS_TIMESTAMP,
        }
    }

    pub fn alice(&self) -> Address {
        address_of(&self.alice.verifying_key())
    }

    pub fn bob(&self) -> Address {
        address_of(&self.bob.verifying_key())
    }

    /// Key of a known account. Any other address gets a key that does not
    /// own it, so its requests fail to authenticate.
    pub fn key_of(&self, account: Address) -> SigningKey {
        if account == self.alice() {
            self.alice.clone()
        } else if account == self.bob() {
            self.bob.clone()
        } else {
            let mut secret = [0u8; 32];
            secret[..20].copy_from_slice(account.as_bytes());
            SigningKey::from_bytes(&secret)
        }
    }

    pub fn ledger(&self) -> &TestLedger {
        &self.ledger
    }

    pub fn storage(&self) -> &InMemoryDrawStorage {
        &self.storage
    }

    pub fn coprocessor(&self) -> &SimulatedCoprocessor {
        &self.coprocessor
    }

    /// Produce `blocks` empty blocks.
    pub fn mine(&mut self, blocks: u64) {
        self.block_height += blocks;
        self.timestamp += blocks;
    }

    fn next_tx(&mut self, caller: Address) -> TxContext {
        self.mine(1);
        TxContext {
            caller,
            block_height: self.block_height,
            timestamp: self.timestamp,
        }
    }

    pub fn draw_as(&mut self, player: Address) -> crate::Result<LootDrawn> {
        let tx = self.next_tx(player);
        self.ledger.draw(&tx)
    }

    /// Draw with a chosen raw random value.
    pub fn draw_with_random(
        &mut self,
        player: Address,
        random: u32,
    ) -> crate::Result<LootDrawn> {
        self.coprocessor.force_next_random(random);
        self.draw_as(player)
    }

    /// Decrypt request signed by `user`'s key.
    pub fn decrypt_request(
        &self,
        user: Address,
        contract: Address,
        handles: Vec<CiphertextHandle>,
    ) -> DecryptRequest {
        DecryptRequest::signed(&self.key_of(user), contract, handles)
    }

    /// Decrypt both handles of a draw as `user`.
    pub fn decrypt_as(
        &self,
        user: Address,
        event: &LootDrawn,
    ) -> Result<(Rarity, u64), crate::CoprocessorError> {
        let request = self.decrypt_request(
            user,
            CONTRACT,
            vec![event.rarity_handle, event.variant_handle],
        );
        let values = self.coprocessor.user_decrypt(&request)?;
        let rarity = Rarity::from_code(values[&event.rarity_handle]);
        Ok((rarity, values[&event.variant_handle]))
    }
}
