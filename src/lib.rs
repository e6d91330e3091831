pub mod auth;
pub mod coprocessor;
pub mod draw;
pub mod error;
pub mod events;
pub mod ledger;
pub mod prizes;
pub mod probability;
pub mod storage;
pub mod types;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use error::{
    CoprocessorError,
    LedgerError,
    Result,
};
pub use ledger::{
    DrawLedger,
    TxContext,
};
pub use types::{
    Address,
    CiphertextHandle,
};
