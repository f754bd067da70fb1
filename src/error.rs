//! Error taxonomy for the bridge tracker.
//!
//! Validation and connectivity problems are detected before any chain I/O
//! and never retried. Submission failures carry the underlying message
//! through to the caller. Polling and persistence failures are contained
//! where they occur; nothing in this crate is fatal to the process.

use alloy::transports::{RpcError, TransportErrorKind};
use rust_decimal::Decimal;

use crate::ledger::ChainName;

/// Capability-level chain failures: transport, contract call, or batched
/// read errors from whichever client backs the capability traits.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("RPC transport error: {0}")]
    Rpc(#[from] RpcError<TransportErrorKind>),
    #[error("Contract call error: {0}")]
    Contract(#[from] alloy::contract::Error),
    #[error("Multicall error: {0}")]
    Multicall(#[from] alloy::providers::MulticallError),
    #[error("Pending transaction error: {0}")]
    PendingTransaction(#[from] alloy::providers::PendingTransactionError),
    #[error("{0}")]
    Capability(String),
}

/// Input problems caught before any chain I/O.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("deposit amount must be at least {minimum} MAG")]
    BelowDepositMinimum { minimum: Decimal },
    #[error("withdrawal amount must be at least {minimum} MAG")]
    BelowBridgeMinimum { minimum: Decimal },
    #[error("withdrawal amount must not exceed {maximum} MAG")]
    AboveBridgeMaximum { maximum: Decimal },
    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),
    #[error("the bridge is currently paused")]
    BridgePaused,
    #[error("insufficient balance: have {balance} MAG, need {required} MAG")]
    InsufficientBalance {
        balance: Decimal,
        required: Decimal,
    },
}

/// Wallet or network preconditions that are not met. The messages double as
/// user guidance (connect the wallet, switch chain).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConnectivityError {
    #[error("no wallet connected")]
    WalletNotConnected,
    #[error("wrong network: switch to the {expected} chain (currently on chain {actual})")]
    WrongChain { expected: ChainName, actual: u64 },
}

/// Failures of `deposit` / `withdraw`. A submission that never produced a
/// transaction hash leaves no ledger record behind.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),
    #[error("submission failed: {0}")]
    Wallet(#[from] ChainError),
}

/// The only polling failures that escape the poll loop itself. Transient
/// RPC errors mid-poll are logged and swallowed because the underlying
/// transaction may still succeed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PollError {
    #[error(
        "transaction status is only observable on the {expected} chain; \
         switch networks and retry (currently on chain {actual})"
    )]
    WrongChain { expected: ChainName, actual: u64 },
}

/// Failure to refresh the bridge parameter snapshot. The previous snapshot,
/// if any, stays available to callers.
#[derive(Debug, thiserror::Error)]
#[error("failed to refresh bridge parameters: {source}")]
pub struct ParametersError {
    #[from]
    pub source: ChainError,
}

/// Storage-layer failures. Contained inside the ledger: an upsert that hits
/// one of these logs it and reports failure through its return value.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ledger serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
