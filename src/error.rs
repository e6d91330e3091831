use crate::{
    auth::AuthError,
    types::{
        Address,
        CiphertextHandle,
    },
};

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The only failure a read can produce: a direct lookup of a draw that
    /// does not exist for the player.
    #[error("InvalidDrawId: player {player} has no draw {draw_id}")]
    InvalidDrawId { player: Address, draw_id: u64 },
    #[error(transparent)]
    Coprocessor(#[from] CoprocessorError),
    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoprocessorError {
    #[error("{account} is not allowed to decrypt {handle}")]
    NotAuthorized {
        handle: CiphertextHandle,
        account: Address,
    },
    #[error("unknown ciphertext handle {0}")]
    UnknownHandle(CiphertextHandle),
    #[error("coprocessor unavailable: {0}")]
    Unavailable(String),
    #[error("decrypt request rejected: {0}")]
    Unauthenticated(#[from] AuthError),
}
