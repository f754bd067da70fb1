//! Lifecycle tracker for the Magnet <-> BSC native token bridge.
//!
//! Submits deposit and withdrawal transactions, keeps a per-account ledger
//! of everything submitted, and polls chain state to fold two chains' notions
//! of "confirmed" (block depth on one side, multisig execution on the other)
//! into a single user-facing status. All fee, limit and quorum enforcement
//! lives in the on-chain contracts; this crate observes and reports.

pub mod bindings;
pub mod chain;
pub mod cli;
pub mod config;
pub mod error;
pub mod ledger;
pub mod params;
pub mod poll;
pub mod service;
pub mod submit;
pub mod telemetry;

pub use chain::{ChainReader, ExecutionEvent, RawParameters, ReceiptInfo, WalletClient};
pub use ledger::{ChainName, Ledger, TransactionRecord, TxId, TxKind, TxStatus};
pub use params::{AmountLimit, BridgeParameters, ParametersReader};
pub use service::BridgeService;

#[cfg(test)]
pub(crate) mod test_utils;
