//! Signed requests.
//!
//! An account is the last 20 bytes of the SHA-256 of its ed25519 public key,
//! so a request that carries a key and a signature names its own sender.
use crate::types::{
    Address,
    CiphertextHandle,
    ParseHexError,
    decode_fixed,
};
use ed25519_dalek::{
    Signature,
    Signer,
    SigningKey,
    Verifier,
    VerifyingKey,
};
use serde::{
    Deserialize,
    Serialize,
};
use sha2::{
    Digest,
    Sha256,
};

const DRAW_DOMAIN: &[u8] = b"cipher-loot/draw";
const DECRYPT_DOMAIN: &[u8] = b"cipher-loot/user-decrypt";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("public key is not a valid ed25519 point")]
    MalformedKey,
    #[error("signature does not match the request")]
    BadSignature,
    #[error("request claims {claimed} but was signed by {signer}")]
    SignerMismatch { claimed: Address, signer: Address },
}

pub fn address_of(key: &VerifyingKey) -> Address {
    let digest: [u8; 32] = Sha256::digest(key.as_bytes()).into();
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[12..]);
    Address::new(bytes)
}

/// Accepts the 32-byte secret as hex, with or without `0x`.
pub fn parse_signing_key(raw: &str) -> Result<SigningKey, ParseHexError> {
    decode_fixed::<32>(raw).map(|secret| SigningKey::from_bytes(&secret))
}

/// Digest a player signs to authorize their next draw. Binding the draw id
/// makes a captured signature useless once that draw exists.
pub fn draw_digest(contract: &Address, player: &Address, draw_id: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(DRAW_DOMAIN);
    hasher.update(contract.as_bytes());
    hasher.update(player.as_bytes());
    hasher.update(draw_id.to_be_bytes());
    hasher.finalize().into()
}

pub fn decrypt_digest(
    contract: &Address,
    user: &Address,
    handles: &[CiphertextHandle],
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(DECRYPT_DOMAIN);
    hasher.update(contract.as_bytes());
    hasher.update(user.as_bytes());
    for handle in handles {
        hasher.update(handle.as_bytes());
    }
    hasher.finalize().into()
}

/// Public key and signature over a request digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    #[serde(with = "hex_array")]
    pub public_key: [u8; 32],
    #[serde(with = "hex_array")]
    pub signature: [u8; 64],
}

impl Authorization {
    pub fn sign(key: &SigningKey, digest: &[u8; 32]) -> Self {
        Self {
            public_key: key.verifying_key().to_bytes(),
            signature: key.sign(digest).to_bytes(),
        }
    }

    /// Account whose key produced the signature over `digest`.
    pub fn signer(&self, digest: &[u8; 32]) -> Result<Address, AuthError> {
        let key =
            VerifyingKey::from_bytes(&self.public_key).map_err(|_| AuthError::MalformedKey)?;
        let signature = Signature::from_bytes(&self.signature);
        key.verify(digest, &signature)
            .map_err(|_| AuthError::BadSignature)?;
        Ok(address_of(&key))
    }

    pub fn verify(&self, claimed: &Address, digest: &[u8; 32]) -> Result<(), AuthError> {
        let signer = self.signer(digest)?;
        if signer != *claimed {
            return Err(AuthError::SignerMismatch {
                claimed: *claimed,
                signer,
            });
        }
        Ok(())
    }
}

mod hex_array {
    use crate::types::decode_fixed;
    use serde::{
        Deserialize,
        Deserializer,
        Serializer,
        de::Error as _,
    };

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&format_args!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let raw = String::deserialize(deserializer)?;
        decode_fixed::<N>(&raw).map_err(D::Error::custom)
    }
}
