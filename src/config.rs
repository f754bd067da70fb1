//! Configuration: CLI environment, TOML file, and the assembled runtime
//! context.
//!
//! Non-secret settings live in a TOML file; the signing key comes in
//! through the environment (or flag) and never touches the config file.

use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use url::Url;

use crate::service::BridgeCtx;

const DEFAULT_MAGNET_CHAIN_ID: u64 = 114514;
const DEFAULT_BSC_CHAIN_ID: u64 = 97;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;

#[derive(Parser, Debug, Clone)]
pub struct Env {
    /// Path to the TOML configuration file
    #[clap(long, default_value = "mag-bridge.toml")]
    pub config: PathBuf,
    /// Hex-encoded private key for submission commands
    #[clap(long, env = "MAG_BRIDGE_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,
}

/// Raw shape of the config TOML.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Config {
    /// Directory holding the per-account ledger files.
    data_dir: PathBuf,
    log_level: Option<String>,
    magnet: MagnetConfig,
    bsc: BscConfig,
    poll_interval_secs: Option<u64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MagnetConfig {
    rpc_url: Url,
    chain_id: Option<u64>,
    /// Bridge multisig wallet: deposit collection target and `Execution`
    /// event source.
    multisig: Address,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct BscConfig {
    rpc_url: Url,
    chain_id: Option<u64>,
    /// Bridge contract address.
    bridge: Address,
}

/// Assembled runtime context.
#[derive(Debug, Clone)]
pub struct Ctx {
    pub data_dir: PathBuf,
    pub log_level: String,
    pub magnet_rpc_url: Url,
    pub bsc_rpc_url: Url,
    pub bridge: BridgeCtx,
    pub poll_interval: Duration,
    pub private_key: Option<String>,
}

impl Env {
    pub fn into_ctx(self) -> anyhow::Result<Ctx> {
        let raw = std::fs::read_to_string(&self.config)
            .with_context(|| format!("reading config file {}", self.config.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", self.config.display()))?;

        Ok(Ctx {
            data_dir: config.data_dir,
            log_level: config.log_level.unwrap_or_else(|| "info".to_string()),
            magnet_rpc_url: config.magnet.rpc_url,
            bsc_rpc_url: config.bsc.rpc_url,
            bridge: BridgeCtx {
                magnet_chain_id: config.magnet.chain_id.unwrap_or(DEFAULT_MAGNET_CHAIN_ID),
                bsc_chain_id: config.bsc.chain_id.unwrap_or(DEFAULT_BSC_CHAIN_ID),
                bridge_address: config.bsc.bridge,
                multisig_address: config.magnet.multisig,
            },
            poll_interval: Duration::from_secs(
                config.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            private_key: self.private_key,
        })
    }
}
