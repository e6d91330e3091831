use cipher_loot::{
    Address,
    CiphertextHandle,
    CoprocessorError,
    LedgerError,
    auth::{
        AuthError,
        Authorization,
    },
    draw::{
        EncryptedHistory,
        EncryptedResult,
        LatestEncryptedResult,
    },
    events::EventRecord,
    probability::ProbabilityConfig,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;
use tokio::sync::oneshot;

pub trait QueryAPI {
    fn query(&mut self) -> impl Future<Output = crate::Result<Query>>;
}

pub type Responder<T> = oneshot::Sender<Result<T, QueryError>>;

/// Requests forwarded to the single task that owns the ledger.
#[derive(Debug)]
pub enum Query {
    Draw {
        player: Address,
        authorization: Authorization,
        sender: Responder<EventRecord>,
    },
    EncryptedResult {
        player: Address,
        draw_id: u64,
        sender: Responder<EncryptedResult>,
    },
    LatestEncryptedResult {
        player: Address,
        sender: Responder<LatestEncryptedResult>,
    },
    EncryptedHistory {
        player: Address,
        offset: u64,
        limit: u64,
        sender: Responder<EncryptedHistory>,
    },
    DrawCount {
        player: Address,
        sender: Responder<u64>,
    },
    Stats(Responder<Stats>),
    ProbabilityConfig(Responder<ProbabilityConfig>),
    Events {
        from_block: u64,
        sender: Responder<Vec<EventRecord>>,
    },
    Decrypt {
        user: Address,
        handles: Vec<CiphertextHandle>,
        authorization: Authorization,
        sender: Responder<BTreeMap<CiphertextHandle, u64>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_draws: u64,
    pub protocol_id: u64,
    pub contract: Address,
    pub block_height: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("player {player} has no draw {draw_id}")]
    InvalidDrawId { player: Address, draw_id: u64 },
    #[error("{0}")]
    NotAuthorized(String),
    #[error("{0}")]
    UnknownHandle(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Internal(String),
}

impl QueryError {
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::InvalidDrawId { .. } => "InvalidDrawId",
            QueryError::NotAuthorized(_) => "NotAuthorized",
            QueryError::UnknownHandle(_) => "UnknownHandle",
            QueryError::Unavailable(_) => "Unavailable",
            QueryError::Internal(_) => "Internal",
        }
    }
}

impl From<CoprocessorError> for QueryError {
    fn from(err: CoprocessorError) -> Self {
        match err {
            CoprocessorError::NotAuthorized { .. } | CoprocessorError::Unauthenticated(_) => {
                QueryError::NotAuthorized(err.to_string())
            }
            CoprocessorError::UnknownHandle(_) => QueryError::UnknownHandle(err.to_string()),
            CoprocessorError::Unavailable(_) => QueryError::Unavailable(err.to_string()),
        }
    }
}

impl From<AuthError> for QueryError {
    fn from(err: AuthError) -> Self {
        QueryError::NotAuthorized(err.to_string())
    }
}

impl From<LedgerError> for QueryError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidDrawId { player, draw_id } => {
                QueryError::InvalidDrawId { player, draw_id }
            }
            LedgerError::Coprocessor(inner) => inner.into(),
            LedgerError::Storage(inner) => QueryError::Internal(format!("{inner:#}")),
        }
    }
}
