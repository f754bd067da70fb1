//! Solidity ABI bindings for the bridge contract on BSC and the
//! multisig wallet on Magnet.
//!
//! Only the entry points this crate actually touches are declared: the five
//! parameter getters and `withdraw` on the bridge, and the `Execution` event
//! the multisig emits when a quorum of owners has executed a queued
//! transaction. `withdraw` takes the Magnet recipient as a string; the
//! contract performs its own decoding on the other side of the bridge.

use alloy::sol;

sol! {
    #[sol(rpc)]
    contract MagBridge {
        function paused() external view returns (bool);
        function feePercentage() external view returns (uint256);
        function minTransactionAmount() external view returns (uint256);
        function maxTransactionAmount() external view returns (uint256);
        function dailyTransactionLimit() external view returns (uint256);
        function withdraw(string magnetAddress, uint256 amount) external;
    }
}

sol! {
    #[sol(rpc)]
    contract MagnetMultiSig {
        event Execution(uint256 indexed transactionId);
    }
}
