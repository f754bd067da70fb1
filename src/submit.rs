//! Deposit and withdrawal submission.
//!
//! Every input problem is caught before the wallet is asked to sign
//! anything, and a submission that never produced a transaction hash leaves
//! no ledger record. Submissions are never retried automatically; a retry
//! is an explicit user action, because a duplicate send moves real value
//! twice.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::primitives::utils::parse_ether;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::chain::WalletClient;
use crate::error::{ConnectivityError, SubmitError, ValidationError};
use crate::ledger::{ChainName, Ledger, LedgerStore, RecordUpdate, TxId, TxKind, TxStatus};
use crate::params::{AmountLimit, BridgeParameters, wei_to_decimal};

/// UX floor for deposits, stricter than the contract minimum.
const MIN_DEPOSIT_MAG: u64 = 10_000;

/// Fee ratio assumed when no parameter snapshot is available (0.5%).
const FALLBACK_FEE_RATIO: Decimal = Decimal::from_parts(5, 0, 0, false, 3);

/// Gas allowance for the withdraw call, sized for worst-case contract
/// branching.
const WITHDRAW_GAS_LIMIT: u64 = 300_000;

/// Builds and sends bridge operations, seeding the ledger with the
/// optimistic initial record for each accepted submission.
pub struct Submitter<W: WalletClient, S: LedgerStore> {
    wallet: W,
    ledger: Arc<Ledger<S>>,
    magnet_chain_id: u64,
    bsc_chain_id: u64,
    /// Deposit collection address: the bridge multisig on Magnet.
    deposit_address: Address,
}

impl<W: WalletClient, S: LedgerStore> Submitter<W, S> {
    pub fn new(
        wallet: W,
        ledger: Arc<Ledger<S>>,
        magnet_chain_id: u64,
        bsc_chain_id: u64,
        deposit_address: Address,
    ) -> Self {
        Self {
            wallet,
            ledger,
            magnet_chain_id,
            bsc_chain_id,
            deposit_address,
        }
    }

    /// Deposit native MAG on Magnet for release on BSC.
    ///
    /// Sends a native-value transfer to the bridge's collection multisig
    /// and records the transaction as `Confirming` with the 12-block
    /// deposit threshold.
    pub async fn deposit(
        &self,
        amount: Decimal,
        params: Option<&BridgeParameters>,
    ) -> Result<TxId, SubmitError> {
        let account = self.connected_account()?;
        self.require_chain(ChainName::Magnet, self.magnet_chain_id)?;

        if amount <= Decimal::ZERO {
            return Err(ValidationError::InvalidAmount(amount.to_string()).into());
        }
        let minimum = Decimal::from(MIN_DEPOSIT_MAG);
        if amount < minimum {
            return Err(ValidationError::BelowDepositMinimum { minimum }.into());
        }

        let amount_wei = to_wei(amount)?;
        let balance_wei = self.wallet.native_balance(account).await?;
        if balance_wei < amount_wei {
            return Err(ValidationError::InsufficientBalance {
                balance: wei_to_decimal(balance_wei).unwrap_or(Decimal::ZERO),
                required: amount,
            }
            .into());
        }

        let hash = self
            .wallet
            .send_native_transfer(self.deposit_address, amount_wei)
            .await?;
        let tx = TxId::from(hash);
        info!(tx = %tx, %amount, "deposit submitted");

        let fee = amount * params.map_or(FALLBACK_FEE_RATIO, |p| p.fee_ratio);
        self.ledger
            .upsert(
                account,
                tx.clone(),
                RecordUpdate {
                    kind: Some(TxKind::Deposit),
                    from_address: Some(account),
                    to_address: Some(account),
                    amount: Some(amount),
                    fee: Some(fee),
                    status: Some(TxStatus::Confirming),
                    confirmations: Some(1),
                    required_confirmations: Some(TxKind::Deposit.required_confirmations()),
                },
            )
            .await;

        Ok(tx)
    }

    /// Request a withdrawal on BSC for release of native MAG on Magnet.
    ///
    /// Validates against the parameter snapshot when one exists, then
    /// records the transaction as `Verifying`; if a receipt is already
    /// obtainable the record is immediately upgraded to `Executing`.
    pub async fn withdraw(
        &self,
        recipient: Address,
        amount: Decimal,
        params: Option<&BridgeParameters>,
    ) -> Result<TxId, SubmitError> {
        let account = self.connected_account()?;
        self.require_chain(ChainName::Bsc, self.bsc_chain_id)?;

        if amount <= Decimal::ZERO {
            return Err(ValidationError::InvalidAmount(amount.to_string()).into());
        }
        if let Some(params) = params {
            if params.paused {
                return Err(ValidationError::BridgePaused.into());
            }
            if amount < params.min_amount {
                return Err(ValidationError::BelowBridgeMinimum {
                    minimum: params.min_amount,
                }
                .into());
            }
            if let AmountLimit::Finite(maximum) = params.max_amount {
                if maximum > Decimal::ZERO && amount > maximum {
                    return Err(ValidationError::AboveBridgeMaximum { maximum }.into());
                }
            }
        }

        let amount_wei = to_wei(amount)?;
        let hash = self
            .wallet
            .send_bridge_withdraw(recipient, amount_wei, WITHDRAW_GAS_LIMIT)
            .await?;
        let tx = TxId::from(hash);
        info!(tx = %tx, %amount, %recipient, "withdrawal submitted");

        let fee = amount * params.map_or(FALLBACK_FEE_RATIO, |p| p.fee_ratio);
        self.ledger
            .upsert(
                account,
                tx.clone(),
                RecordUpdate {
                    kind: Some(TxKind::Withdraw),
                    from_address: Some(account),
                    to_address: Some(recipient),
                    amount: Some(amount),
                    fee: Some(fee),
                    status: Some(TxStatus::Verifying),
                    confirmations: Some(0),
                    required_confirmations: Some(TxKind::Withdraw.required_confirmations()),
                },
            )
            .await;

        // Best-effort synchronous upgrade; the transaction is already sent,
        // so a receipt failure here must not surface as a submit failure.
        match self.wallet.transaction_receipt(hash).await {
            Ok(Some(receipt)) if receipt.succeeded => {
                self.ledger
                    .upsert(
                        account,
                        tx.clone(),
                        RecordUpdate {
                            status: Some(TxStatus::Executing),
                            confirmations: Some(1),
                            ..Default::default()
                        },
                    )
                    .await;
            }
            Ok(_) => {}
            Err(e) => warn!(tx = %tx, "withdrawal receipt wait failed: {e}"),
        }

        Ok(tx)
    }

    fn connected_account(&self) -> Result<Address, ConnectivityError> {
        self.wallet
            .account()
            .ok_or(ConnectivityError::WalletNotConnected)
    }

    fn require_chain(&self, expected: ChainName, expected_id: u64) -> Result<(), ConnectivityError> {
        let actual = self.wallet.chain_id();
        if actual == expected_id {
            Ok(())
        } else {
            Err(ConnectivityError::WrongChain { expected, actual })
        }
    }
}

fn to_wei(amount: Decimal) -> Result<U256, ValidationError> {
    parse_ether(&amount.normalize().to_string())
        .map_err(|e| ValidationError::InvalidAmount(format!("{amount}: {e}")))
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::ledger::InMemoryStore;
    use crate::test_utils::{MockWallet, test_parameters};

    const RECIPIENT: Address = address!("0x9999999999999999999999999999999999999999");

    fn submitter(wallet: MockWallet) -> Submitter<MockWallet, InMemoryStore> {
        Submitter::new(
            wallet,
            Arc::new(Ledger::new(InMemoryStore::default())),
            114514,
            97,
            address!("0x4444444444444444444444444444444444444444"),
        )
    }

    #[tokio::test]
    async fn deposit_below_floor_is_rejected_before_any_chain_call() {
        let submitter = submitter(MockWallet::on_magnet());

        let err = submitter.deposit(dec!(9999), None).await.unwrap_err();
        assert!(matches!(
            err,
            SubmitError::Validation(ValidationError::BelowDepositMinimum { .. })
        ));
        assert_eq!(submitter.wallet.balance_calls(), 0);
        assert!(submitter.wallet.sent().is_empty());

        let account = submitter.wallet.account().unwrap();
        assert!(submitter.ledger.get(account).await.is_empty());
    }

    #[tokio::test]
    async fn deposit_at_floor_submits_and_seeds_the_ledger() {
        let submitter = submitter(MockWallet::on_magnet());
        let params = test_parameters();

        let tx = submitter.deposit(dec!(10000), Some(&params)).await.unwrap();

        let sent = submitter.wallet.sent();
        assert_eq!(sent.len(), 1);

        let account = submitter.wallet.account().unwrap();
        let record = submitter.ledger.find(account, &tx).await.unwrap();
        assert_eq!(record.kind, TxKind::Deposit);
        assert_eq!(record.from_chain, ChainName::Magnet);
        assert_eq!(record.to_chain, ChainName::Bsc);
        assert_eq!(record.status, TxStatus::Confirming);
        assert_eq!(record.confirmations, 1);
        assert_eq!(record.required_confirmations, 12);
        assert_eq!(record.fee, dec!(10000) * params.fee_ratio);
    }

    #[tokio::test]
    async fn deposit_without_snapshot_uses_the_fallback_fee() {
        let submitter = submitter(MockWallet::on_magnet());

        let tx = submitter.deposit(dec!(20000), None).await.unwrap();

        let account = submitter.wallet.account().unwrap();
        let record = submitter.ledger.find(account, &tx).await.unwrap();
        assert_eq!(record.fee, dec!(100)); // 0.5% of 20000
    }

    #[tokio::test]
    async fn deposit_requires_the_magnet_chain() {
        let submitter = submitter(MockWallet::on_bsc());

        let err = submitter.deposit(dec!(10000), None).await.unwrap_err();
        assert!(matches!(
            err,
            SubmitError::Connectivity(ConnectivityError::WrongChain {
                expected: ChainName::Magnet,
                actual: 97,
            })
        ));
        assert!(submitter.wallet.sent().is_empty());
    }

    #[tokio::test]
    async fn deposit_requires_a_connected_wallet() {
        let submitter = submitter(MockWallet::disconnected());

        let err = submitter.deposit(dec!(10000), None).await.unwrap_err();
        assert!(matches!(
            err,
            SubmitError::Connectivity(ConnectivityError::WalletNotConnected)
        ));
    }

    #[tokio::test]
    async fn deposit_requires_sufficient_balance() {
        let wallet = MockWallet::on_magnet().with_balance_mag(5_000);
        let submitter = submitter(wallet);

        let err = submitter.deposit(dec!(10000), None).await.unwrap_err();
        assert!(matches!(
            err,
            SubmitError::Validation(ValidationError::InsufficientBalance { .. })
        ));
        assert!(submitter.wallet.sent().is_empty());
    }

    #[tokio::test]
    async fn failed_send_leaves_no_ledger_record() {
        let wallet = MockWallet::on_magnet().failing_sends();
        let submitter = submitter(wallet);

        let err = submitter.deposit(dec!(10000), None).await.unwrap_err();
        assert!(matches!(err, SubmitError::Wallet(_)));

        let account = submitter.wallet.account().unwrap();
        assert!(submitter.ledger.get(account).await.is_empty());
    }

    #[tokio::test]
    async fn withdraw_happy_path_upgrades_to_executing_with_a_receipt() {
        let wallet = MockWallet::on_bsc().with_successful_receipt(42);
        let submitter = submitter(wallet);
        let params = test_parameters();

        let tx = submitter
            .withdraw(RECIPIENT, dec!(500), Some(&params))
            .await
            .unwrap();

        let account = submitter.wallet.account().unwrap();
        let record = submitter.ledger.find(account, &tx).await.unwrap();
        assert_eq!(record.kind, TxKind::Withdraw);
        assert_eq!(record.to_address, RECIPIENT);
        assert_eq!(record.status, TxStatus::Executing);
        assert_eq!(record.confirmations, 1);
        assert_eq!(record.required_confirmations, 2);
    }

    #[tokio::test]
    async fn withdraw_without_a_receipt_stays_verifying() {
        let submitter = submitter(MockWallet::on_bsc());
        let params = test_parameters();

        let tx = submitter
            .withdraw(RECIPIENT, dec!(500), Some(&params))
            .await
            .unwrap();

        let account = submitter.wallet.account().unwrap();
        let record = submitter.ledger.find(account, &tx).await.unwrap();
        assert_eq!(record.status, TxStatus::Verifying);
        assert_eq!(record.confirmations, 0);
    }

    #[tokio::test]
    async fn withdraw_enforces_snapshot_limits() {
        let submitter = submitter(MockWallet::on_bsc());
        let params = test_parameters(); // min 100, max 50000

        let below = submitter
            .withdraw(RECIPIENT, dec!(50), Some(&params))
            .await
            .unwrap_err();
        assert!(matches!(
            below,
            SubmitError::Validation(ValidationError::BelowBridgeMinimum { .. })
        ));

        let above = submitter
            .withdraw(RECIPIENT, dec!(60000), Some(&params))
            .await
            .unwrap_err();
        assert!(matches!(
            above,
            SubmitError::Validation(ValidationError::AboveBridgeMaximum { .. })
        ));

        assert!(submitter.wallet.sent().is_empty());
    }

    #[tokio::test]
    async fn withdraw_skips_the_upper_bound_when_unlimited() {
        let submitter = submitter(MockWallet::on_bsc());
        let mut params = test_parameters();
        params.max_amount = AmountLimit::Unlimited;

        submitter
            .withdraw(RECIPIENT, dec!(90000000), Some(&params))
            .await
            .unwrap();
        assert_eq!(submitter.wallet.sent().len(), 1);
    }

    #[tokio::test]
    async fn withdraw_refuses_a_paused_bridge() {
        let submitter = submitter(MockWallet::on_bsc());
        let mut params = test_parameters();
        params.paused = true;

        let err = submitter
            .withdraw(RECIPIENT, dec!(500), Some(&params))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SubmitError::Validation(ValidationError::BridgePaused)
        ));
        assert!(submitter.wallet.sent().is_empty());
    }

    #[tokio::test]
    async fn withdraw_without_snapshot_validates_amount_only() {
        let submitter = submitter(MockWallet::on_bsc());

        let err = submitter.withdraw(RECIPIENT, dec!(0), None).await.unwrap_err();
        assert!(matches!(
            err,
            SubmitError::Validation(ValidationError::InvalidAmount(_))
        ));

        submitter.withdraw(RECIPIENT, dec!(1), None).await.unwrap();
        assert_eq!(submitter.wallet.sent().len(), 1);
    }

    #[tokio::test]
    async fn withdraw_requires_the_bsc_chain() {
        let submitter = submitter(MockWallet::on_magnet());

        let err = submitter.withdraw(RECIPIENT, dec!(500), None).await.unwrap_err();
        assert!(matches!(
            err,
            SubmitError::Connectivity(ConnectivityError::WrongChain {
                expected: ChainName::Bsc,
                actual: 114514,
            })
        ));
    }
}
