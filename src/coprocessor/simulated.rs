// In-process stand-in for the FHE coprocessor. Cleartexts stay behind
// their handles and only leave through `user_decrypt`.
use crate::{
    coprocessor::{
        Coprocessor,
        DecryptRequest,
        DecryptionService,
        Outcome,
    },
    error::CoprocessorError,
    probability::ProbabilityConfig,
    types::{
        Address,
        CiphertextHandle,
    },
};
use rand::{
    Rng,
    SeedableRng,
    rngs::StdRng,
};
use sha2::{
    Digest,
    Sha256,
};
use std::{
    collections::{
        BTreeMap,
        HashMap,
        HashSet,
        VecDeque,
    },
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
};

const HANDLE_DOMAIN: &[u8] = b"cipher-loot/simulated-handle";

#[derive(Clone, Copy)]
#[repr(u8)]
enum HandleKind {
    Random = 0,
    Rarity = 1,
    Variant = 2,
}

struct SimulatorState {
    rng: StdRng,
    // Fresh per instance, so a restarted coprocessor never reissues a handle.
    salt: [u8; 32],
    nonce: u64,
    cleartexts: HashMap<CiphertextHandle, u64>,
    acl: HashSet<(CiphertextHandle, Address)>,
    forced: VecDeque<u32>,
    available: bool,
}

/// Cloning shares the underlying state.
#[derive(Clone)]
pub struct SimulatedCoprocessor {
    state: Arc<Mutex<SimulatorState>>,
}

impl SimulatedCoprocessor {
    pub fn new(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    fn with_rng(rng: StdRng) -> Self {
        let state = SimulatorState {
            rng,
            salt: rand::rng().random(),
            nonce: 0,
            cleartexts: HashMap::new(),
            acl: HashSet::new(),
            forced: VecDeque::new(),
            available: true,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Queue a value to be returned by the next `random` call instead of the
    /// rng output.
    pub fn force_next_random(&self, value: u32) {
        self.lock().forced.push_back(value);
    }

    /// Make every subsequent request fail with `Unavailable` (or recover).
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Peek at the cleartext behind a handle, bypassing the access list.
    pub fn cleartext(&self, handle: &CiphertextHandle) -> Option<u64> {
        self.lock().cleartexts.get(handle).copied()
    }

    fn lock(&self) -> MutexGuard<'_, SimulatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SimulatorState {
    fn ensure_available(&self) -> Result<(), CoprocessorError> {
        if self.available {
            Ok(())
        } else {
            Err(CoprocessorError::Unavailable(
                "simulated coprocessor is offline".to_string(),
            ))
        }
    }

    fn store(&mut self, kind: HandleKind, value: u64) -> CiphertextHandle {
        self.nonce += 1;
        let mut hasher = Sha256::new();
        hasher.update(HANDLE_DOMAIN);
        hasher.update(self.salt);
        hasher.update(self.nonce.to_be_bytes());
        hasher.update([kind as u8]);
        let handle = CiphertextHandle::new(hasher.finalize().into());
        self.cleartexts.insert(handle, value);
        handle
    }

    fn cleartext(&self, handle: &CiphertextHandle) -> Result<u64, CoprocessorError> {
        self.cleartexts
            .get(handle)
            .copied()
            .ok_or(CoprocessorError::UnknownHandle(*handle))
    }

    fn check_access(
        &self,
        handle: &CiphertextHandle,
        account: &Address,
    ) -> Result<(), CoprocessorError> {
        if self.acl.contains(&(*handle, *account)) {
            Ok(())
        } else {
            Err(CoprocessorError::NotAuthorized {
                handle: *handle,
                account: *account,
            })
        }
    }
}

impl Coprocessor for SimulatedCoprocessor {
    fn random(&mut self) -> Result<CiphertextHandle, CoprocessorError> {
        let mut state = self.lock();
        state.ensure_available()?;
        let value = match state.forced.pop_front() {
            Some(value) => value,
            None => state.rng.random::<u32>(),
        };
        Ok(state.store(HandleKind::Random, u64::from(value)))
    }

    fn derive_outcome(
        &mut self,
        random: &CiphertextHandle,
        config: &ProbabilityConfig,
    ) -> Result<Outcome, CoprocessorError> {
        let mut state = self.lock();
        state.ensure_available()?;
        let value = state.cleartext(random)?;
        let (rarity, variant) = config.evaluate(value as u32);
        let rarity = state.store(HandleKind::Rarity, rarity.code());
        let variant = state.store(HandleKind::Variant, u64::from(variant));
        Ok(Outcome { rarity, variant })
    }

    fn allow(
        &mut self,
        handle: &CiphertextHandle,
        account: &Address,
    ) -> Result<(), CoprocessorError> {
        let mut state = self.lock();
        state.ensure_available()?;
        state.cleartext(handle)?;
        state.acl.insert((*handle, *account));
        Ok(())
    }

    fn is_allowed(&self, handle: &CiphertextHandle, account: &Address) -> bool {
        self.lock().acl.contains(&(*handle, *account))
    }
}

impl DecryptionService for SimulatedCoprocessor {
    fn user_decrypt(
        &self,
        request: &DecryptRequest,
    ) -> Result<BTreeMap<CiphertextHandle, u64>, CoprocessorError> {
        request.authorization.verify(&request.user, &request.digest())?;
        let state = self.lock();
        state.ensure_available()?;
        let mut values = BTreeMap::new();
        for handle in &request.handles {
            let value = state.cleartext(handle)?;
            state.check_access(handle, &request.contract)?;
            state.check_access(handle, &request.user)?;
            values.insert(*handle, value);
        }
        Ok(values)
    }
}
