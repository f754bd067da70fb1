//! Shared test fixtures: programmable mock capabilities and canned
//! parameter snapshots.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy::primitives::{Address, TxHash, U256, address};
use alloy::primitives::utils::parse_ether;
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::chain::{
    ChainReader, ExecutionEvent, RawParameters, ReceiptInfo, WalletClient,
};
use crate::error::ChainError;
use crate::params::{AmountLimit, BridgeParameters};
use crate::service::BridgeCtx;

pub(crate) const MAGNET_CHAIN_ID: u64 = 114514;
pub(crate) const BSC_CHAIN_ID: u64 = 97;

pub(crate) const TEST_ACCOUNT: Address = address!("0x1111111111111111111111111111111111111111");

pub(crate) fn test_ctx() -> BridgeCtx {
    BridgeCtx {
        magnet_chain_id: MAGNET_CHAIN_ID,
        bsc_chain_id: BSC_CHAIN_ID,
        bridge_address: address!("0x5555555555555555555555555555555555555555"),
        multisig_address: address!("0x4444444444444444444444444444444444444444"),
    }
}

/// Snapshot with a 0.5% fee, 100 MAG minimum and 50000 MAG maximum.
pub(crate) fn test_parameters() -> BridgeParameters {
    BridgeParameters {
        paused: false,
        fee_ratio: Decimal::new(5, 3),
        min_amount: Decimal::from(100),
        max_amount: AmountLimit::Finite(Decimal::from(50_000)),
        daily_limit: AmountLimit::Finite(Decimal::from(1_000_000)),
    }
}

/// Programmable [`ChainReader`]: a settable head height, a receipt table,
/// an execution event log filtered by the queried block window, and a
/// parameter batch that can be made to fail wholesale.
pub(crate) struct MockChainReader {
    chain_id: u64,
    head: Mutex<u64>,
    receipts: Mutex<Vec<(TxHash, ReceiptInfo)>>,
    events: Mutex<Vec<ExecutionEvent>>,
    parameters: Mutex<RawParameters>,
    read_failure: Mutex<Option<String>>,
    block_number_calls: AtomicUsize,
    receipt_calls: AtomicUsize,
}

impl MockChainReader {
    pub(crate) fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            head: Mutex::new(0),
            receipts: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            parameters: Mutex::new(RawParameters::default()),
            read_failure: Mutex::new(None),
            block_number_calls: AtomicUsize::new(0),
            receipt_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn on_magnet() -> Self {
        Self::new(MAGNET_CHAIN_ID)
    }

    pub(crate) fn on_bsc() -> Self {
        Self::new(BSC_CHAIN_ID)
    }

    pub(crate) fn set_head(&self, head: u64) {
        *self.head.lock().unwrap() = head;
    }

    pub(crate) fn insert_receipt(&self, tx: TxHash, receipt: ReceiptInfo) {
        self.receipts.lock().unwrap().push((tx, receipt));
    }

    pub(crate) fn push_execution_event(&self, event: ExecutionEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub(crate) fn set_parameters(&self, raw: RawParameters) {
        *self.parameters.lock().unwrap() = raw;
    }

    /// Make every read fail with the given message.
    pub(crate) fn fail_reads(&self, message: &str) {
        *self.read_failure.lock().unwrap() = Some(message.to_string());
    }

    /// Make only the parameter batch fail.
    pub(crate) fn fail_parameters(&self, message: &str) {
        self.fail_reads(message);
    }

    pub(crate) fn block_number_calls(&self) -> usize {
        self.block_number_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn receipt_calls(&self) -> usize {
        self.receipt_calls.load(Ordering::SeqCst)
    }

    fn failure(&self) -> Option<ChainError> {
        self.read_failure
            .lock()
            .unwrap()
            .as_ref()
            .map(|msg| ChainError::Capability(msg.clone()))
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        self.block_number_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failure() {
            return Err(err);
        }
        Ok(*self.head.lock().unwrap())
    }

    async fn receipt(&self, tx: TxHash) -> Result<Option<ReceiptInfo>, ChainError> {
        self.receipt_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failure() {
            return Err(err);
        }
        Ok(self
            .receipts
            .lock()
            .unwrap()
            .iter()
            .find(|(hash, _)| *hash == tx)
            .map(|(_, receipt)| *receipt))
    }

    async fn execution_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ExecutionEvent>, ChainError> {
        if let Some(err) = self.failure() {
            return Err(err);
        }
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.block_number >= from_block && event.block_number <= to_block)
            .copied()
            .collect())
    }

    async fn bridge_parameters(&self) -> Result<RawParameters, ChainError> {
        if let Some(err) = self.failure() {
            return Err(err);
        }
        Ok(*self.parameters.lock().unwrap())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SentTx {
    NativeTransfer { to: Address, value: U256 },
    BridgeWithdraw {
        recipient: Address,
        amount: U256,
        gas_limit: u64,
    },
}

/// Programmable [`WalletClient`] that records every send.
pub(crate) struct MockWallet {
    account: Option<Address>,
    chain_id: u64,
    balance: U256,
    receipt: Option<ReceiptInfo>,
    fail_sends: bool,
    sent: Mutex<Vec<SentTx>>,
    next_hash: Mutex<u8>,
    balance_calls: AtomicUsize,
}

impl MockWallet {
    fn new(account: Option<Address>, chain_id: u64) -> Self {
        Self {
            account,
            chain_id,
            balance: parse_ether("1000000").unwrap(),
            receipt: None,
            fail_sends: false,
            sent: Mutex::new(Vec::new()),
            next_hash: Mutex::new(0),
            balance_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn on_magnet() -> Self {
        Self::new(Some(TEST_ACCOUNT), MAGNET_CHAIN_ID)
    }

    pub(crate) fn on_bsc() -> Self {
        Self::new(Some(TEST_ACCOUNT), BSC_CHAIN_ID)
    }

    pub(crate) fn disconnected() -> Self {
        Self::new(None, MAGNET_CHAIN_ID)
    }

    pub(crate) fn with_account(mut self, account: Address) -> Self {
        self.account = Some(account);
        self
    }

    pub(crate) fn with_balance_mag(mut self, mag: u64) -> Self {
        self.balance = parse_ether(&mag.to_string()).unwrap();
        self
    }

    pub(crate) fn with_successful_receipt(mut self, block_number: u64) -> Self {
        self.receipt = Some(ReceiptInfo {
            block_number,
            succeeded: true,
        });
        self
    }

    pub(crate) fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    pub(crate) fn sent(&self) -> Vec<SentTx> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    fn next_hash(&self) -> TxHash {
        let mut counter = self.next_hash.lock().unwrap();
        *counter += 1;
        TxHash::with_last_byte(*counter)
    }
}

#[async_trait]
impl WalletClient for MockWallet {
    fn account(&self) -> Option<Address> {
        self.account
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn native_balance(&self, _account: Address) -> Result<U256, ChainError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.balance)
    }

    async fn send_native_transfer(
        &self,
        to: Address,
        value: U256,
    ) -> Result<TxHash, ChainError> {
        if self.fail_sends {
            return Err(ChainError::Capability("signature rejected".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push(SentTx::NativeTransfer { to, value });
        Ok(self.next_hash())
    }

    async fn send_bridge_withdraw(
        &self,
        recipient: Address,
        amount: U256,
        gas_limit: u64,
    ) -> Result<TxHash, ChainError> {
        if self.fail_sends {
            return Err(ChainError::Capability("node reverted".into()));
        }
        self.sent.lock().unwrap().push(SentTx::BridgeWithdraw {
            recipient,
            amount,
            gas_limit,
        });
        Ok(self.next_hash())
    }

    async fn transaction_receipt(&self, _tx: TxHash) -> Result<Option<ReceiptInfo>, ChainError> {
        Ok(self.receipt)
    }
}
