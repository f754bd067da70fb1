//! Wallet and chain-read capabilities.
//!
//! The tracker never owns an RPC client or a key: it is handed a
//! [`WalletClient`] (sign and broadcast on the active chain) and a
//! [`ChainReader`] (read-only queries against the active chain) at
//! construction. Switching accounts or chains means constructing new
//! capabilities, not mutating shared globals.
//!
//! Every chain read comes back as an explicit shape ([`ReceiptInfo`],
//! [`ExecutionEvent`], [`RawParameters`]) rather than a raw provider type,
//! so the rest of the crate never inspects duck-typed receipts.

use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;

use crate::bindings::{MagBridge, MagnetMultiSig};
use crate::error::ChainError;

/// What the tracker needs to know about a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptInfo {
    pub block_number: u64,
    /// On-chain status bit: `false` means the transaction reverted.
    pub succeeded: bool,
}

/// An `Execution` event observed on the Magnet multisig wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionEvent {
    pub transaction_id: U256,
    pub block_number: u64,
}

/// Raw results of the batched bridge-parameter read. `None` marks a call
/// that failed inside the batch; the reader decides the fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawParameters {
    pub paused: Option<bool>,
    pub fee_basis_points: Option<U256>,
    pub min_amount_wei: Option<U256>,
    pub max_amount_wei: Option<U256>,
    pub daily_limit_wei: Option<U256>,
}

/// Signing capability on the currently active chain.
#[async_trait]
pub trait WalletClient: Send + Sync {
    /// Connected account, if any.
    fn account(&self) -> Option<Address>;

    /// Chain id the wallet is currently on.
    fn chain_id(&self) -> u64;

    async fn native_balance(&self, account: Address) -> Result<U256, ChainError>;

    /// Plain native-value transfer (the deposit path).
    async fn send_native_transfer(&self, to: Address, value: U256) -> Result<TxHash, ChainError>;

    /// Invoke the bridge contract's withdraw entry point with an explicit
    /// gas allowance.
    async fn send_bridge_withdraw(
        &self,
        recipient: Address,
        amount: U256,
        gas_limit: u64,
    ) -> Result<TxHash, ChainError>;

    /// One-shot receipt lookup for a transaction this wallet sent.
    async fn transaction_receipt(&self, tx: TxHash) -> Result<Option<ReceiptInfo>, ChainError>;
}

/// Read-only capability on the currently active chain.
#[async_trait]
pub trait ChainReader: Send + Sync {
    fn chain_id(&self) -> u64;

    async fn block_number(&self) -> Result<u64, ChainError>;

    /// `Ok(None)` means not yet mined; that is not an error.
    async fn receipt(&self, tx: TxHash) -> Result<Option<ReceiptInfo>, ChainError>;

    /// Multisig `Execution` events in the inclusive block window.
    async fn execution_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ExecutionEvent>, ChainError>;

    /// The five bridge parameter getters, batched into one round trip.
    async fn bridge_parameters(&self) -> Result<RawParameters, ChainError>;
}

#[async_trait]
impl<T: WalletClient + ?Sized> WalletClient for std::sync::Arc<T> {
    fn account(&self) -> Option<Address> {
        (**self).account()
    }

    fn chain_id(&self) -> u64 {
        (**self).chain_id()
    }

    async fn native_balance(&self, account: Address) -> Result<U256, ChainError> {
        (**self).native_balance(account).await
    }

    async fn send_native_transfer(
        &self,
        to: Address,
        value: U256,
    ) -> Result<TxHash, ChainError> {
        (**self).send_native_transfer(to, value).await
    }

    async fn send_bridge_withdraw(
        &self,
        recipient: Address,
        amount: U256,
        gas_limit: u64,
    ) -> Result<TxHash, ChainError> {
        (**self).send_bridge_withdraw(recipient, amount, gas_limit).await
    }

    async fn transaction_receipt(&self, tx: TxHash) -> Result<Option<ReceiptInfo>, ChainError> {
        (**self).transaction_receipt(tx).await
    }
}

#[async_trait]
impl<T: ChainReader + ?Sized> ChainReader for std::sync::Arc<T> {
    fn chain_id(&self) -> u64 {
        (**self).chain_id()
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        (**self).block_number().await
    }

    async fn receipt(&self, tx: TxHash) -> Result<Option<ReceiptInfo>, ChainError> {
        (**self).receipt(tx).await
    }

    async fn execution_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ExecutionEvent>, ChainError> {
        (**self).execution_events(from_block, to_block).await
    }

    async fn bridge_parameters(&self) -> Result<RawParameters, ChainError> {
        (**self).bridge_parameters().await
    }
}

/// [`WalletClient`] over an alloy provider. Built with a signing provider
/// and `Some(account)` for submission paths, or read-only with no account
/// (every send then fails the connectivity check before reaching here).
#[derive(Debug, Clone)]
pub struct AlloyWallet<P: Provider + Clone> {
    provider: P,
    account: Option<Address>,
    chain_id: u64,
    bridge_address: Address,
}

impl<P: Provider + Clone> AlloyWallet<P> {
    pub fn new(provider: P, account: Option<Address>, chain_id: u64, bridge_address: Address) -> Self {
        Self {
            provider,
            account,
            chain_id,
            bridge_address,
        }
    }
}

#[async_trait]
impl<P: Provider + Clone> WalletClient for AlloyWallet<P> {
    fn account(&self) -> Option<Address> {
        self.account
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn native_balance(&self, account: Address) -> Result<U256, ChainError> {
        Ok(self.provider.get_balance(account).await?)
    }

    async fn send_native_transfer(
        &self,
        to: Address,
        value: U256,
    ) -> Result<TxHash, ChainError> {
        let request = TransactionRequest::default().to(to).value(value);
        let pending = self.provider.send_transaction(request).await?;
        Ok(*pending.tx_hash())
    }

    async fn send_bridge_withdraw(
        &self,
        recipient: Address,
        amount: U256,
        gas_limit: u64,
    ) -> Result<TxHash, ChainError> {
        let bridge = MagBridge::new(self.bridge_address, &self.provider);
        // The contract takes the Magnet recipient as a string and decodes
        // it bridge-side.
        let pending = bridge
            .withdraw(recipient.to_string(), amount)
            .gas(gas_limit)
            .send()
            .await?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_receipt(&self, tx: TxHash) -> Result<Option<ReceiptInfo>, ChainError> {
        let Some(receipt) = self.provider.get_transaction_receipt(tx).await? else {
            return Ok(None);
        };
        let Some(block_number) = receipt.block_number else {
            return Ok(None);
        };
        Ok(Some(ReceiptInfo {
            block_number,
            succeeded: receipt.status(),
        }))
    }
}

/// [`ChainReader`] over an alloy provider.
#[derive(Debug, Clone)]
pub struct AlloyChainReader<P: Provider + Clone> {
    provider: P,
    chain_id: u64,
    bridge_address: Address,
    multisig_address: Address,
}

impl<P: Provider + Clone> AlloyChainReader<P> {
    pub fn new(
        provider: P,
        chain_id: u64,
        bridge_address: Address,
        multisig_address: Address,
    ) -> Self {
        Self {
            provider,
            chain_id,
            bridge_address,
            multisig_address,
        }
    }
}

#[async_trait]
impl<P: Provider + Clone> ChainReader for AlloyChainReader<P> {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn receipt(&self, tx: TxHash) -> Result<Option<ReceiptInfo>, ChainError> {
        let Some(receipt) = self.provider.get_transaction_receipt(tx).await? else {
            return Ok(None);
        };
        let Some(block_number) = receipt.block_number else {
            return Ok(None);
        };
        Ok(Some(ReceiptInfo {
            block_number,
            succeeded: receipt.status(),
        }))
    }

    async fn execution_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ExecutionEvent>, ChainError> {
        let multisig = MagnetMultiSig::new(self.multisig_address, &self.provider);
        let logs = multisig
            .Execution_filter()
            .from_block(from_block)
            .to_block(to_block)
            .query()
            .await?;
        Ok(logs
            .into_iter()
            .map(|(event, log)| ExecutionEvent {
                transaction_id: event.transactionId,
                block_number: log.block_number.unwrap_or(from_block),
            })
            .collect())
    }

    async fn bridge_parameters(&self) -> Result<RawParameters, ChainError> {
        let bridge = MagBridge::new(self.bridge_address, &self.provider);
        let (paused, fee, min, max, daily) = self
            .provider
            .multicall()
            .add(bridge.paused())
            .add(bridge.feePercentage())
            .add(bridge.minTransactionAmount())
            .add(bridge.maxTransactionAmount())
            .add(bridge.dailyTransactionLimit())
            .aggregate3()
            .await?;
        Ok(RawParameters {
            paused: paused.ok(),
            fee_basis_points: fee.ok(),
            min_amount_wei: min.ok(),
            max_amount_wei: max.ok(),
            daily_limit_wei: daily.ok(),
        })
    }
}
