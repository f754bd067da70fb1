//! Bridge parameter snapshots.
//!
//! One batched read against the bridge contract yields the paused flag, fee
//! ratio and transaction limits at approximately the same block. The reader
//! keeps the last good snapshot around: a failed refresh returns an error
//! but never clears data a caller could still validate against.

use std::str::FromStr;

use alloy::primitives::U256;
use alloy::primitives::utils::format_ether;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::chain::{ChainReader, RawParameters};
use crate::error::ParametersError;

/// On-chain amounts above this are treated as "no limit configured".
const UNLIMITED_THRESHOLD: u64 = 100_000_000_000;

/// Basis-point denominator for the contract's `feePercentage`.
const FEE_DENOMINATOR: u64 = 10_000;

/// A transaction limit that may be effectively unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountLimit {
    Finite(Decimal),
    Unlimited,
}

impl AmountLimit {
    fn from_amount(amount: Decimal) -> Self {
        if amount > Decimal::from(UNLIMITED_THRESHOLD) {
            Self::Unlimited
        } else {
            Self::Finite(amount)
        }
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, Self::Unlimited)
    }
}

impl std::fmt::Display for AmountLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Finite(amount) => write!(f, "{amount}"),
            Self::Unlimited => write!(f, "unlimited"),
        }
    }
}

/// Read-only snapshot of the bridge's global parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeParameters {
    pub paused: bool,
    /// Decimal fraction, e.g. 0.005 for 0.5%.
    pub fee_ratio: Decimal,
    pub min_amount: Decimal,
    pub max_amount: AmountLimit,
    pub daily_limit: AmountLimit,
}

impl BridgeParameters {
    fn from_raw(raw: RawParameters) -> Self {
        if raw.paused.is_none() {
            // Optimistic fallback: a failed paused read does not block
            // operations. Flagged as a possible safety defect upstream.
            warn!("paused flag unreadable, assuming not paused");
        }
        let fee_ratio = raw
            .fee_basis_points
            .and_then(|bps| u64::try_from(bps).ok())
            .map(|bps| Decimal::from(bps) / Decimal::from(FEE_DENOMINATOR))
            .unwrap_or(Decimal::ZERO);

        let min_amount = raw
            .min_amount_wei
            .and_then(wei_to_decimal)
            .unwrap_or(Decimal::ZERO);
        let max_amount = raw
            .max_amount_wei
            .and_then(wei_to_decimal)
            .map(AmountLimit::from_amount)
            .unwrap_or(AmountLimit::Finite(Decimal::ZERO));
        let daily_limit = raw
            .daily_limit_wei
            .and_then(wei_to_decimal)
            .map(AmountLimit::from_amount)
            .unwrap_or(AmountLimit::Finite(Decimal::ZERO));

        if let AmountLimit::Finite(max) = max_amount {
            if min_amount > max && max > Decimal::ZERO {
                warn!(%min_amount, %max, "bridge reports min amount above max amount");
            }
        }

        Self {
            paused: raw.paused.unwrap_or(false),
            fee_ratio,
            min_amount,
            max_amount,
            daily_limit,
        }
    }
}

/// Converts a wei quantity to a whole-token decimal amount.
///
/// Returns `None` when the value has more significant digits than a
/// `Decimal` can carry; callers treat that like a failed read.
pub(crate) fn wei_to_decimal(value: U256) -> Option<Decimal> {
    let formatted = format_ether(value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    let normalized = if trimmed.is_empty() { "0" } else { trimmed };
    Decimal::from_str(normalized).ok()
}

/// Fetches and caches [`BridgeParameters`].
pub struct ParametersReader<C: ChainReader> {
    chain: C,
    snapshot: RwLock<Option<BridgeParameters>>,
}

impl<C: ChainReader> ParametersReader<C> {
    pub fn new(chain: C) -> Self {
        Self {
            chain,
            snapshot: RwLock::new(None),
        }
    }

    /// Refresh the snapshot with one batched read. On failure the previous
    /// snapshot stays in place, stale but available.
    pub async fn fetch(&self) -> Result<BridgeParameters, ParametersError> {
        let raw = self.chain.bridge_parameters().await?;
        let parameters = BridgeParameters::from_raw(raw);
        info!(
            paused = parameters.paused,
            fee_ratio = %parameters.fee_ratio,
            min = %parameters.min_amount,
            max = %parameters.max_amount,
            "refreshed bridge parameters"
        );
        *self.snapshot.write().await = Some(parameters.clone());
        Ok(parameters)
    }

    /// Last successfully fetched snapshot, if any.
    pub async fn snapshot(&self) -> Option<BridgeParameters> {
        self.snapshot.read().await.clone()
    }
}
