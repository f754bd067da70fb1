//! Command-line front end for the tracker.
//!
//! Submission commands need a signing key (`MAG_BRIDGE_PRIVATE_KEY` or
//! `--private-key`); query commands run read-only. Each command connects
//! to the chain that can answer it: deposits sign on Magnet, withdrawals
//! on BSC, and status polling reads Magnet, where the multisig execution
//! signal lives.

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use crate::chain::{AlloyChainReader, AlloyWallet};
use crate::config::{Ctx, Env};
use crate::ledger::{JsonFileStore, TransactionRecord, TxId, TxKind};
use crate::poll::PollerConfig;
use crate::service::BridgeService;
use crate::telemetry;

#[derive(Debug, Parser)]
#[command(name = "mag-bridge")]
#[command(about = "Submit and track Magnet <-> BSC bridge transactions")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub env: Env,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the bridge's global parameters
    Params,
    /// Deposit native MAG on Magnet for release on BSC
    Deposit {
        /// Amount in whole MAG
        #[arg(long)]
        amount: Decimal,
    },
    /// Withdraw MAG on BSC back to a Magnet address
    Withdraw {
        /// Magnet recipient address (0x-prefixed)
        #[arg(long)]
        recipient: String,
        /// Amount in whole MAG
        #[arg(long)]
        amount: Decimal,
    },
    /// Show the best-known status of a tracked transaction
    Status {
        #[arg(long = "tx-hash")]
        tx_hash: String,
        /// "deposit" or "withdraw"
        #[arg(long)]
        kind: TxKind,
    },
    /// Re-poll a transaction against the Magnet chain until it settles
    Poll {
        #[arg(long = "tx-hash")]
        tx_hash: String,
        /// "deposit" or "withdraw"
        #[arg(long)]
        kind: TxKind,
    },
    /// List tracked transactions for an account
    History {
        /// Account to list; defaults to the signing key's address
        #[arg(long)]
        account: Option<Address>,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = cli.env.into_ctx()?;
    telemetry::init(&ctx.log_level);

    match cli.command {
        Commands::Params => params(&ctx).await,
        Commands::Deposit { amount } => deposit(&ctx, amount).await,
        Commands::Withdraw { recipient, amount } => withdraw(&ctx, &recipient, amount).await,
        Commands::Status { tx_hash, kind } => status(&ctx, tx_hash, kind).await,
        Commands::Poll { tx_hash, kind } => poll(&ctx, tx_hash, kind).await,
        Commands::History { account } => history(&ctx, account).await,
    }
}

/// Wires a connected provider into the full service stack.
async fn build_service<P: Provider + Clone + 'static>(
    provider: P,
    account: Option<Address>,
    ctx: &Ctx,
) -> anyhow::Result<BridgeService<AlloyWallet<P>, AlloyChainReader<P>, JsonFileStore>> {
    let chain_id = provider
        .get_chain_id()
        .await
        .context("querying chain id")?;
    let wallet = AlloyWallet::new(
        provider.clone(),
        account,
        chain_id,
        ctx.bridge.bridge_address,
    );
    let reader = AlloyChainReader::new(
        provider,
        chain_id,
        ctx.bridge.bridge_address,
        ctx.bridge.multisig_address,
    );
    Ok(BridgeService::with_poller_config(
        wallet,
        reader,
        JsonFileStore::new(&ctx.data_dir),
        ctx.bridge.clone(),
        PollerConfig {
            interval: ctx.poll_interval,
        },
    ))
}

fn signer_from(ctx: &Ctx) -> anyhow::Result<(EthereumWallet, Address)> {
    let key = ctx.private_key.as_deref().ok_or_else(|| {
        anyhow!("no signing key: set MAG_BRIDGE_PRIVATE_KEY or pass --private-key")
    })?;
    let signer: PrivateKeySigner = key.trim().parse().context("parsing private key")?;
    let account = signer.address();
    Ok((EthereumWallet::from(signer), account))
}

fn signer_address(ctx: &Ctx) -> Option<Address> {
    let key = ctx.private_key.as_deref()?;
    let signer: PrivateKeySigner = key.trim().parse().ok()?;
    Some(signer.address())
}

async fn params(ctx: &Ctx) -> anyhow::Result<()> {
    let provider = ProviderBuilder::new()
        .connect(ctx.bsc_rpc_url.as_str())
        .await
        .context("connecting to the BSC RPC endpoint")?;
    let service = build_service(provider, None, ctx).await?;

    let parameters = service.refresh_parameters().await?;
    println!("paused:      {}", parameters.paused);
    println!("fee ratio:   {}", parameters.fee_ratio);
    println!("min amount:  {} MAG", parameters.min_amount);
    println!("max amount:  {}", parameters.max_amount);
    println!("daily limit: {}", parameters.daily_limit);
    Ok(())
}

async fn deposit(ctx: &Ctx, amount: Decimal) -> anyhow::Result<()> {
    let (wallet, account) = signer_from(ctx)?;
    let provider = ProviderBuilder::new()
        .wallet(wallet)
        .connect(ctx.magnet_rpc_url.as_str())
        .await
        .context("connecting to the Magnet RPC endpoint")?;
    let service = build_service(provider, Some(account), ctx).await?;

    let tx = service.submit_deposit(amount).await?;
    println!("deposit submitted: {tx}");
    println!("track it with: mag-bridge poll --tx-hash {tx} --kind deposit");
    Ok(())
}

async fn withdraw(ctx: &Ctx, recipient: &str, amount: Decimal) -> anyhow::Result<()> {
    let (wallet, account) = signer_from(ctx)?;
    let provider = ProviderBuilder::new()
        .wallet(wallet)
        .connect(ctx.bsc_rpc_url.as_str())
        .await
        .context("connecting to the BSC RPC endpoint")?;
    let service = build_service(provider, Some(account), ctx).await?;

    // Best effort: validate against live limits when the bridge answers.
    if let Err(e) = service.refresh_parameters().await {
        tracing::warn!("proceeding without a parameter snapshot: {e}");
    }

    let tx = service.submit_withdraw(recipient, amount).await?;
    println!("withdrawal submitted: {tx}");
    println!("track it with: mag-bridge poll --tx-hash {tx} --kind withdraw");
    Ok(())
}

async fn status(ctx: &Ctx, tx_hash: String, kind: TxKind) -> anyhow::Result<()> {
    let provider = ProviderBuilder::new()
        .connect(ctx.magnet_rpc_url.as_str())
        .await
        .context("connecting to the Magnet RPC endpoint")?;
    let service = build_service(provider, signer_address(ctx), ctx).await?;

    let record = service.get_status(&TxId::new(tx_hash), kind).await;
    print_record(&record);
    Ok(())
}

async fn poll(ctx: &Ctx, tx_hash: String, kind: TxKind) -> anyhow::Result<()> {
    let provider = ProviderBuilder::new()
        .connect(ctx.magnet_rpc_url.as_str())
        .await
        .context("connecting to the Magnet RPC endpoint")?;
    let service = build_service(provider, signer_address(ctx), ctx).await?;

    let record = service
        .poll_to_completion(&TxId::new(tx_hash), kind)
        .await?;
    print_record(&record);
    Ok(())
}

async fn history(ctx: &Ctx, account: Option<Address>) -> anyhow::Result<()> {
    let account = account
        .or_else(|| signer_address(ctx))
        .ok_or_else(|| anyhow!("pass --account or provide a signing key"))?;

    let provider = ProviderBuilder::new()
        .connect(ctx.magnet_rpc_url.as_str())
        .await
        .context("connecting to the Magnet RPC endpoint")?;
    let service = build_service(provider, Some(account), ctx).await?;

    let records = service.list_transactions(account).await;
    if records.is_empty() {
        println!("no tracked transactions for {account}");
        return Ok(());
    }
    for record in records {
        print_record(&record);
        println!();
    }
    Ok(())
}

fn print_record(record: &TransactionRecord) {
    println!(
        "{} {} ({} -> {})",
        record.tx_hash, record.kind, record.from_chain, record.to_chain
    );
    println!(
        "  status:       {} ({}/{} confirmations)",
        record.status, record.confirmations, record.required_confirmations
    );
    println!("  amount:       {} MAG (fee {})", record.amount, record.fee);
    println!("  submitted:    {}", record.timestamp);
    println!("  last updated: {}", record.updated_at);
}
