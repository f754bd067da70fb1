//! The single entry point the UI talks to.
//!
//! [`BridgeService`] wires the parameter reader, submitter, poller and
//! ledger together behind the exposed interface: submit, query status,
//! manual re-poll, list history. Status queries answer from the ledger
//! immediately and refresh in the background; callers always get a
//! displayable record even for hashes the ledger has never seen.

use std::sync::Arc;

use alloy::primitives::Address;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;

use crate::chain::{ChainReader, WalletClient};
use crate::error::{ParametersError, PollError, SubmitError, ValidationError};
use crate::ledger::{
    Ledger, LedgerStore, TransactionRecord, TxId, TxKind, TxStatus,
};
use crate::params::{BridgeParameters, ParametersReader};
use crate::poll::{
    DEFAULT_POLL_ATTEMPTS, LifecyclePoller, MANUAL_POLL_ATTEMPTS, PollerConfig,
};
use crate::submit::Submitter;

/// Chain topology and contract addresses the tracker operates against.
#[derive(Debug, Clone)]
pub struct BridgeCtx {
    pub magnet_chain_id: u64,
    pub bsc_chain_id: u64,
    /// Bridge contract on BSC.
    pub bridge_address: Address,
    /// Multisig wallet on Magnet: deposit collection target and source of
    /// `Execution` events.
    pub multisig_address: Address,
}

/// Facade over the full transaction lifecycle tracker.
pub struct BridgeService<W, C, S>
where
    W: WalletClient + 'static,
    C: ChainReader + 'static,
    S: LedgerStore + 'static,
{
    wallet: Arc<W>,
    reader: ParametersReader<Arc<C>>,
    submitter: Submitter<Arc<W>, S>,
    poller: Arc<LifecyclePoller<Arc<C>, S>>,
    ledger: Arc<Ledger<S>>,
}

impl<W, C, S> BridgeService<W, C, S>
where
    W: WalletClient + 'static,
    C: ChainReader + 'static,
    S: LedgerStore + 'static,
{
    pub fn new(wallet: W, chain: C, store: S, ctx: BridgeCtx) -> Self {
        Self::with_poller_config(wallet, chain, store, ctx, PollerConfig::default())
    }

    pub fn with_poller_config(
        wallet: W,
        chain: C,
        store: S,
        ctx: BridgeCtx,
        poller_config: PollerConfig,
    ) -> Self {
        let wallet = Arc::new(wallet);
        let chain = Arc::new(chain);
        let ledger = Arc::new(Ledger::new(store));

        Self {
            wallet: wallet.clone(),
            reader: ParametersReader::new(chain.clone()),
            submitter: Submitter::new(
                wallet,
                ledger.clone(),
                ctx.magnet_chain_id,
                ctx.bsc_chain_id,
                ctx.multisig_address,
            ),
            poller: Arc::new(LifecyclePoller::new(
                chain,
                ledger.clone(),
                ctx.magnet_chain_id,
                poller_config,
            )),
            ledger,
        }
    }

    /// Refresh the bridge parameter snapshot. On failure the previous
    /// snapshot stays available through [`Self::parameters`].
    pub async fn refresh_parameters(&self) -> Result<BridgeParameters, ParametersError> {
        self.reader.fetch().await
    }

    /// Last good parameter snapshot, possibly stale.
    pub async fn parameters(&self) -> Option<BridgeParameters> {
        self.reader.snapshot().await
    }

    /// Submit a Magnet -> BSC deposit and start tracking it.
    pub async fn submit_deposit(&self, amount: Decimal) -> Result<TxId, SubmitError> {
        let params = self.reader.snapshot().await;
        let tx = self.submitter.deposit(amount, params.as_ref()).await?;
        self.spawn_background_poll(&tx, TxKind::Deposit);
        Ok(tx)
    }

    /// Submit a BSC -> Magnet withdrawal and start tracking it. The
    /// recipient is validated as a Magnet address before any chain I/O.
    pub async fn submit_withdraw(
        &self,
        recipient: &str,
        amount: Decimal,
    ) -> Result<TxId, SubmitError> {
        let recipient: Address = recipient
            .parse()
            .map_err(|_| ValidationError::InvalidRecipient(recipient.to_string()))?;
        let params = self.reader.snapshot().await;
        let tx = self
            .submitter
            .withdraw(recipient, amount, params.as_ref())
            .await?;
        self.spawn_background_poll(&tx, TxKind::Withdraw);
        Ok(tx)
    }

    /// Best-known status for a transaction. A ledger hit is returned as-is
    /// and refreshed by a fire-and-forget background poll; a miss yields an
    /// unpersisted placeholder so the caller always has something to show.
    pub async fn get_status(&self, tx: &TxId, kind: TxKind) -> TransactionRecord {
        let Some(account) = self.wallet.account() else {
            return placeholder_record(tx, kind, None);
        };

        if let Some(record) = self.ledger.find(account, tx).await {
            self.spawn_background_poll(tx, record.kind);
            return record;
        }

        placeholder_record(tx, kind, Some(account))
    }

    /// User-initiated re-poll with the larger attempt budget. Refused
    /// without chain I/O when the active chain cannot observe the
    /// authoritative status signal.
    pub async fn manual_poll(
        &self,
        tx: &TxId,
        kind: TxKind,
    ) -> Result<TransactionRecord, PollError> {
        self.poller.require_authoritative_chain()?;

        info!(tx = %tx, %kind, "manual status poll requested");
        let poller = self.poller.clone();
        if let Some(account) = self.wallet.account() {
            let tx = tx.clone();
            tokio::spawn(async move {
                poller.poll(account, &tx, kind, MANUAL_POLL_ATTEMPTS).await;
            });
        }

        Ok(self.get_status(tx, kind).await)
    }

    /// Run a full poll series to completion and return the final record.
    /// Same chain requirement as [`Self::manual_poll`], but awaited rather
    /// than fire-and-forget; used where the caller wants to block on the
    /// outcome (e.g. the CLI).
    pub async fn poll_to_completion(
        &self,
        tx: &TxId,
        kind: TxKind,
    ) -> Result<TransactionRecord, PollError> {
        self.poller.require_authoritative_chain()?;

        let Some(account) = self.wallet.account() else {
            return Ok(placeholder_record(tx, kind, None));
        };
        self.poller
            .poll(account, tx, kind, MANUAL_POLL_ATTEMPTS)
            .await;
        Ok(self
            .ledger
            .find(account, tx)
            .await
            .unwrap_or_else(|| placeholder_record(tx, kind, Some(account))))
    }

    /// Full history for `account`, newest first.
    pub async fn list_transactions(&self, account: Address) -> Vec<TransactionRecord> {
        self.ledger.get(account).await
    }

    fn spawn_background_poll(&self, tx: &TxId, kind: TxKind) {
        let Some(account) = self.wallet.account() else {
            return;
        };
        let poller = self.poller.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            poller.poll(account, &tx, kind, DEFAULT_POLL_ATTEMPTS).await;
        });
    }
}

/// Displayable stand-in for a transaction the ledger does not know.
/// Never persisted; a real poll result replaces it.
fn placeholder_record(tx: &TxId, kind: TxKind, account: Option<Address>) -> TransactionRecord {
    let now = Utc::now();
    let account = account.unwrap_or(Address::ZERO);
    TransactionRecord {
        tx_hash: tx.clone(),
        id: format!("{kind}-{}", now.timestamp_millis()),
        kind,
        from_chain: kind.from_chain(),
        to_chain: kind.to_chain(),
        from_address: account,
        to_address: account,
        amount: Decimal::ZERO,
        fee: Decimal::ZERO,
        status: TxStatus::Pending,
        confirmations: 0,
        required_confirmations: kind.required_confirmations(),
        timestamp: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::TxHash;

    use super::*;
    use crate::ledger::InMemoryStore;
    use crate::test_utils::{MockChainReader, MockWallet, test_ctx};

    fn service(
        wallet: MockWallet,
        chain: MockChainReader,
    ) -> BridgeService<MockWallet, MockChainReader, InMemoryStore> {
        BridgeService::new(wallet, chain, InMemoryStore::default(), test_ctx())
    }

    #[tokio::test]
    async fn unknown_hash_yields_a_pending_placeholder() {
        let service = service(MockWallet::on_magnet(), MockChainReader::on_magnet());
        let tx = TxId::from(TxHash::with_last_byte(1));

        let record = service.get_status(&tx, TxKind::Withdraw).await;
        assert_eq!(record.status, TxStatus::Pending);
        assert_eq!(record.confirmations, 0);
        assert_eq!(record.required_confirmations, 2);
        assert_eq!(record.kind, TxKind::Withdraw);

        // Placeholders are never persisted.
        let account = service.wallet.account().unwrap();
        assert!(service.ledger.get(account).await.is_empty());
    }

    #[tokio::test]
    async fn placeholder_works_without_a_connected_wallet() {
        let service = service(MockWallet::disconnected(), MockChainReader::on_magnet());
        let tx = TxId::from(TxHash::with_last_byte(2));

        let record = service.get_status(&tx, TxKind::Deposit).await;
        assert_eq!(record.status, TxStatus::Pending);
        assert_eq!(record.required_confirmations, 12);
        assert_eq!(record.from_address, Address::ZERO);
    }

    #[tokio::test]
    async fn manual_poll_is_refused_off_the_magnet_chain() {
        let service = service(MockWallet::on_bsc(), MockChainReader::on_bsc());
        let tx = TxId::from(TxHash::with_last_byte(3));

        let err = service.manual_poll(&tx, TxKind::Deposit).await.unwrap_err();
        assert!(matches!(err, PollError::WrongChain { .. }));
        assert_eq!(service.poller.chain.block_number_calls(), 0);
    }

    #[tokio::test]
    async fn invalid_recipient_is_rejected_before_submission() {
        let service = service(MockWallet::on_bsc(), MockChainReader::on_bsc());

        let err = service
            .submit_withdraw("not-an-address", Decimal::from(500))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SubmitError::Validation(ValidationError::InvalidRecipient(_))
        ));
        assert!(service.wallet.sent().is_empty());
    }
}
