//! Seam to the confidential-computing coprocessor.
//!
//! The ledger only asks for handles and grants access to them; producing
//! ciphertexts and decrypting them is the coprocessor's business.
use crate::{
    auth::{
        self,
        Authorization,
    },
    error::CoprocessorError,
    probability::ProbabilityConfig,
    types::{
        Address,
        CiphertextHandle,
    },
};
use ed25519_dalek::SigningKey;
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;

pub mod simulated;

pub use simulated::SimulatedCoprocessor;

/// Encrypted rarity/variant pair derived from one random value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub rarity: CiphertextHandle,
    pub variant: CiphertextHandle,
}

pub trait Coprocessor {
    /// Request one encrypted random value.
    fn random(&mut self) -> Result<CiphertextHandle, CoprocessorError>;

    /// Bucket an encrypted random value into rarity and variant ciphertexts.
    fn derive_outcome(
        &mut self,
        random: &CiphertextHandle,
        config: &ProbabilityConfig,
    ) -> Result<Outcome, CoprocessorError>;

    /// Add `account` to the handle's access list.
    fn allow(
        &mut self,
        handle: &CiphertextHandle,
        account: &Address,
    ) -> Result<(), CoprocessorError>;

    fn is_allowed(&self, handle: &CiphertextHandle, account: &Address) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptRequest {
    pub handles: Vec<CiphertextHandle>,
    pub contract: Address,
    pub user: Address,
    pub authorization: Authorization,
}

impl DecryptRequest {
    /// Request on behalf of the account that owns `key`.
    pub fn signed(key: &SigningKey, contract: Address, handles: Vec<CiphertextHandle>) -> Self {
        let user = auth::address_of(&key.verifying_key());
        let digest = auth::decrypt_digest(&contract, &user, &handles);
        Self {
            handles,
            contract,
            user,
            authorization: Authorization::sign(key, &digest),
        }
    }

    pub fn digest(&self) -> [u8; 32] {
        auth::decrypt_digest(&self.contract, &self.user, &self.handles)
    }
}

/// Out-of-band decryption on behalf of a user, as the relayer offers it.
pub trait DecryptionService {
    /// The request must be signed by `user`, and both `contract` and `user`
    /// must be on every handle's access list.
    fn user_decrypt(
        &self,
        request: &DecryptRequest,
    ) -> Result<BTreeMap<CiphertextHandle, u64>, CoprocessorError>;
}
