//! Per-account persisted ledger of bridge transactions.
//!
//! Each account owns an independent collection of [`TransactionRecord`]s,
//! keyed by the lower-cased account address. Records are stored as a flat
//! ordered array (insertion order) and looked up by a linear scan on the
//! transaction hash; `get` sorts newest-first for display. A second write
//! with the same hash merges field-wise into the existing record instead of
//! duplicating it.
//!
//! Storage failures never propagate: an upsert that cannot be persisted is
//! logged and reported through its `bool` return, degrading to
//! "status visible this session only".

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use alloy::primitives::{Address, TxHash};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::LedgerError;

/// Direction of a bridge transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Deposit,
    Withdraw,
}

impl TxKind {
    /// Chain the transaction is submitted on.
    pub fn from_chain(self) -> ChainName {
        match self {
            Self::Deposit => ChainName::Magnet,
            Self::Withdraw => ChainName::Bsc,
        }
    }

    /// Chain the bridged value arrives on.
    pub fn to_chain(self) -> ChainName {
        match self {
            Self::Deposit => ChainName::Bsc,
            Self::Withdraw => ChainName::Magnet,
        }
    }

    /// Confirmation threshold for the kind: deposits wait out source-chain
    /// block depth, withdrawals track destination multisig progress.
    pub fn required_confirmations(self) -> u64 {
        match self {
            Self::Deposit => 12,
            Self::Withdraw => 2,
        }
    }
}

impl std::fmt::Display for TxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deposit => write!(f, "deposit"),
            Self::Withdraw => write!(f, "withdraw"),
        }
    }
}

impl FromStr for TxKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "deposit" => Ok(Self::Deposit),
            "withdraw" => Ok(Self::Withdraw),
            other => Err(format!("unknown transaction kind: {other}")),
        }
    }
}

/// The two chains the bridge spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainName {
    Magnet,
    Bsc,
}

impl std::fmt::Display for ChainName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Magnet => write!(f, "Magnet POW"),
            Self::Bsc => write!(f, "BSC"),
        }
    }
}

/// User-facing lifecycle stage.
///
/// Deposits move `Pending -> Confirming -> Completed`; withdrawals move
/// `Pending -> Verifying -> Executing -> Completed`. `Failed` is reachable
/// from any non-terminal stage on an on-chain revert. Terminal stages are
/// never overwritten by a later non-terminal poll result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirming,
    Verifying,
    Executing,
    Completed,
    Failed,
}

impl TxStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Confirming => "confirming",
            Self::Verifying => "verifying",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Ledger key for a transaction.
///
/// Usually a well-formed 32-byte transaction hash, but the ledger also has
/// to carry demo/placeholder entries whose "hash" never came from a chain,
/// so the stored form is a string. [`TxId::as_tx_hash`] is the gate between
/// the two worlds: only identifiers that parse as `0x` + 64 hex chars are
/// ever sent to a chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(String);

impl TxId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier as a real transaction hash, if it is one.
    pub fn as_tx_hash(&self) -> Option<TxHash> {
        if self.0.len() != 66 || !self.0.starts_with("0x") {
            return None;
        }
        self.0.parse().ok()
    }

    /// Test/placeholder identifiers get a synthesized confirmation
    /// progression instead of chain polling.
    pub fn is_placeholder(&self) -> bool {
        self.0.contains("test") || self.0.len() < 20
    }
}

impl From<TxHash> for TxId {
    fn from(hash: TxHash) -> Self {
        Self(format!("{hash:#x}"))
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One bridge transaction as the user sees it.
///
/// Serialized field names match the historical browser-local format so
/// exported ledgers stay readable by the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub tx_hash: TxId,
    /// List-rendering key only; never used for correctness.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TxKind,
    pub from_chain: ChainName,
    pub to_chain: ChainName,
    pub from_address: Address,
    pub to_address: Address,
    pub amount: Decimal,
    pub fee: Decimal,
    pub status: TxStatus,
    pub confirmations: u64,
    pub required_confirmations: u64,
    pub timestamp: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial write against a record, merged by `tx_hash`.
///
/// `None` fields leave the stored value untouched. On insert, missing
/// fields fall back to kind-derived defaults.
#[derive(Debug, Clone, Default)]
pub struct RecordUpdate {
    pub kind: Option<TxKind>,
    pub from_address: Option<Address>,
    pub to_address: Option<Address>,
    pub amount: Option<Decimal>,
    pub fee: Option<Decimal>,
    pub status: Option<TxStatus>,
    pub confirmations: Option<u64>,
    pub required_confirmations: Option<u64>,
}

impl RecordUpdate {
    fn into_record(self, tx_hash: TxId, now: DateTime<Utc>) -> TransactionRecord {
        let kind = self.kind.unwrap_or(TxKind::Deposit);
        TransactionRecord {
            tx_hash,
            id: format!("{kind}-{}", now.timestamp_millis()),
            kind,
            from_chain: kind.from_chain(),
            to_chain: kind.to_chain(),
            from_address: self.from_address.unwrap_or(Address::ZERO),
            to_address: self.to_address.unwrap_or(Address::ZERO),
            amount: self.amount.unwrap_or(Decimal::ZERO),
            fee: self.fee.unwrap_or(Decimal::ZERO),
            status: self.status.unwrap_or(TxStatus::Pending),
            confirmations: self.confirmations.unwrap_or(0),
            required_confirmations: self
                .required_confirmations
                .unwrap_or_else(|| kind.required_confirmations()),
            timestamp: now,
            updated_at: now,
        }
    }

    fn apply(self, record: &mut TransactionRecord, now: DateTime<Utc>) {
        if let Some(kind) = self.kind {
            record.kind = kind;
            record.from_chain = kind.from_chain();
            record.to_chain = kind.to_chain();
        }
        if let Some(from) = self.from_address {
            record.from_address = from;
        }
        if let Some(to) = self.to_address {
            record.to_address = to;
        }
        if let Some(amount) = self.amount {
            record.amount = amount;
        }
        if let Some(fee) = self.fee {
            record.fee = fee;
        }
        if let Some(status) = self.status {
            // Monotonic status guard: an out-of-order poll result must not
            // pull a terminal record back to a non-terminal stage.
            if !record.status.is_terminal() || status.is_terminal() {
                record.status = status;
            } else {
                debug!(
                    tx_hash = %record.tx_hash,
                    current = %record.status,
                    rejected = %status,
                    "ignoring non-terminal status over terminal record"
                );
            }
        }
        if let Some(confirmations) = self.confirmations {
            record.confirmations = confirmations;
        }
        if let Some(required) = self.required_confirmations {
            record.required_confirmations = required;
        }
        record.updated_at = now;
    }
}

/// Storage backend for one ledger collection per account key.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Vec<TransactionRecord>, LedgerError>;
    async fn save(&self, key: &str, records: &[TransactionRecord]) -> Result<(), LedgerError>;
}

/// One JSON file per account under a data directory, each holding a flat
/// array of records.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl LedgerStore for JsonFileStore {
    async fn load(&self, key: &str) -> Result<Vec<TransactionRecord>, LedgerError> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, key: &str, records: &[TransactionRecord]) -> Result<(), LedgerError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let bytes = serde_json::to_vec_pretty(records)?;
        tokio::fs::write(self.path(key), bytes).await?;
        Ok(())
    }
}

/// Ephemeral store for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: Mutex<HashMap<String, Vec<TransactionRecord>>>,
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn load(&self, key: &str) -> Result<Vec<TransactionRecord>, LedgerError> {
        let collections = self.collections.lock().expect("ledger store lock poisoned");
        Ok(collections.get(key).cloned().unwrap_or_default())
    }

    async fn save(&self, key: &str, records: &[TransactionRecord]) -> Result<(), LedgerError> {
        let mut collections = self.collections.lock().expect("ledger store lock poisoned");
        collections.insert(key.to_string(), records.to_vec());
        Ok(())
    }
}

/// The per-account transaction ledger.
pub struct Ledger<S: LedgerStore> {
    store: S,
    // Serializes load-merge-save cycles so concurrent upserts for the same
    // account cannot drop each other's writes.
    write_lock: tokio::sync::Mutex<()>,
}

impl<S: LedgerStore> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn key(account: Address) -> String {
        format!("{account:#x}")
    }

    /// All records for `account`, newest first.
    pub async fn get(&self, account: Address) -> Vec<TransactionRecord> {
        match self.store.load(&Self::key(account)).await {
            Ok(mut records) => {
                records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                records
            }
            Err(e) => {
                error!(account = %account, "failed to load ledger: {e}");
                Vec::new()
            }
        }
    }

    /// Find one record by transaction id.
    pub async fn find(&self, account: Address, tx_hash: &TxId) -> Option<TransactionRecord> {
        self.get(account)
            .await
            .into_iter()
            .find(|r| r.tx_hash == *tx_hash)
    }

    /// Merge `update` into the record with the same hash, or insert a new
    /// record. Returns whether the write reached storage.
    pub async fn upsert(&self, account: Address, tx_hash: TxId, update: RecordUpdate) -> bool {
        let _guard = self.write_lock.lock().await;
        let key = Self::key(account);
        let now = Utc::now();

        let mut records = match self.store.load(&key).await {
            Ok(records) => records,
            Err(e) => {
                error!(account = %account, tx_hash = %tx_hash, "ledger load failed: {e}");
                return false;
            }
        };

        match records.iter_mut().find(|r| r.tx_hash == tx_hash) {
            Some(existing) => update.apply(existing, now),
            None => records.push(update.into_record(tx_hash.clone(), now)),
        }

        if let Err(e) = self.store.save(&key, &records).await {
            error!(account = %account, tx_hash = %tx_hash, "ledger save failed: {e}");
            return false;
        }
        true
    }
}
