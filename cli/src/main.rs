//! ChainPool CLI — inspect provider health and call RPC methods through the
//! same failover pool the scanner services use.
//!
//! # Commands
//! ```text
//! chainpool chains
//! chainpool status       [--chain <slug>] [--probe] [--json]
//! chainpool block-number --chain <slug>
//! chainpool balance      --chain <slug> --address <0x...>
//! chainpool chain-id     --chain <slug>
//! chainpool call         --chain <slug> --method <name> [--params <json array>]
//! chainpool watch        [--chain <slug>] [--every <secs>]
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use chainpool_chains::{Chain, ChainPools, ChainsConfig};
use chainpool_core::provider::report_endpoint;
use chainpool_core::PoolStatus;

mod logging;

use logging::{init_tracing, LogConfig};

#[derive(Parser)]
#[command(
    name = "chainpool",
    about = "Health-checked, failover JSON-RPC pools for Ethereum, BSC and Polygon",
    long_about = "
ChainPool CLI: call JSON-RPC methods through a prioritised provider pool and
inspect each provider's health.

ENVIRONMENT VARIABLES (used when --config is not given):
  ETHEREUM_RPC_URL / ETH_RPC_URL     Ethereum primary endpoint
  ETHEREUM_RPC_URL_BACKUP            Ethereum backup endpoint
  BSC_RPC_URL, BSC_RPC_URL_BACKUP    BSC endpoints
  POLYGON_RPC_URL, POLYGON_RPC_URL_BACKUP
  RPC_POOL_HEALTH_CHECK_INTERVAL_SECS, RPC_POOL_CIRCUIT_BREAKER_THRESHOLD,
  RPC_POOL_CIRCUIT_BREAKER_TIMEOUT_SECS, RPC_POOL_MAX_RETRIES
",
    version
)]
struct Cli {
    /// JSON config file (chains + pool settings); defaults to the environment
    #[arg(long, global = true, env = "CHAINPOOL_CONFIG")]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Per-crate log level, e.g. chainpool-core=debug (repeatable)
    #[arg(long = "log", global = true, value_name = "CRATE=LEVEL", value_parser = parse_component)]
    log_components: Vec<(String, String)>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Chain selection plus optional endpoint overrides.
#[derive(Args)]
struct Target {
    /// Chain: ethereum, bsc or polygon (aliases: eth, bnb, matic)
    #[arg(long)]
    chain: Chain,

    /// Use these endpoints (in priority order) instead of the configured ones
    #[arg(long = "url")]
    urls: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured chains and their endpoints
    Chains,

    /// Print the health of every provider
    Status {
        /// Only this chain
        #[arg(long)]
        chain: Option<Chain>,
        /// Probe every provider before reporting
        #[arg(long)]
        probe: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Current block height
    #[command(name = "block-number")]
    BlockNumber {
        #[command(flatten)]
        target: Target,
    },

    /// Balance of an address in wei
    Balance {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        address: String,
    },

    /// Verify that the endpoints serve the expected chain
    #[command(name = "chain-id")]
    ChainId {
        #[command(flatten)]
        target: Target,
    },

    /// Send an arbitrary JSON-RPC method through the pool
    Call {
        #[command(flatten)]
        target: Target,
        /// Method name, e.g. eth_getBlockByNumber
        #[arg(long)]
        method: String,
        /// JSON array of params, e.g. '["latest", false]'
        #[arg(long, default_value = "[]")]
        params: String,
    },

    /// Run background health checks and print status until Ctrl-C
    Watch {
        /// Only this chain
        #[arg(long)]
        chain: Option<Chain>,
        /// Seconds between status reports
        #[arg(long, default_value_t = 10)]
        every: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&LogConfig {
        level: cli.log_level.clone(),
        components: cli.log_components.iter().cloned().collect(),
        json: cli.json_logs,
    });

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Chains => cmd_chains(&config),
        Commands::Status { chain, probe, json } => cmd_status(&config, chain, probe, json).await,
        Commands::BlockNumber { target } => {
            let pools = target_pools(&config, &target)?;
            let block = pools.require(target.chain)?.get_block_number().await?;
            println!("{block}");
            Ok(())
        }
        Commands::Balance { target, address } => {
            let pools = target_pools(&config, &target)?;
            let wei = pools.require(target.chain)?.get_balance(&address).await?;
            println!("{wei}");
            Ok(())
        }
        Commands::ChainId { target } => cmd_chain_id(&config, &target).await,
        Commands::Call {
            target,
            method,
            params,
        } => cmd_call(&config, &target, &method, &params).await,
        Commands::Watch { chain, every } => cmd_watch(&config, chain, every).await,
    }
}

fn parse_component(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((component, level)) if !component.is_empty() && !level.is_empty() => {
            Ok((component.to_string(), level.to_string()))
        }
        _ => Err(format!("expected CRATE=LEVEL, got '{s}'")),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<ChainsConfig> {
    match path {
        Some(path) => ChainsConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => ChainsConfig::from_env().context("reading RPC settings from the environment"),
    }
}

/// Pools for the target chain only, with `--url` overrides applied.
fn target_pools(config: &ChainsConfig, target: &Target) -> Result<ChainPools> {
    let endpoints = if target.urls.is_empty() {
        config.endpoints(target.chain).to_vec()
    } else {
        target.urls.clone()
    };
    if endpoints.is_empty() {
        bail!(
            "no endpoints for {}: set {} or pass --url",
            target.chain,
            target.chain.primary_env_vars()[0]
        );
    }
    let scoped = ChainsConfig {
        pool: config.pool.clone(),
        ..ChainsConfig::default()
    }
    .with_endpoints(target.chain, endpoints);
    Ok(ChainPools::from_config(&scoped)?)
}

/// Pools for every configured chain, or just `chain`.
fn selected_pools(config: &ChainsConfig, chain: Option<Chain>) -> Result<ChainPools> {
    let pools = match chain {
        Some(chain) => target_pools(
            config,
            &Target {
                chain,
                urls: Vec::new(),
            },
        )?,
        None => ChainPools::from_config(config)?,
    };
    if pools.is_empty() {
        bail!("no chains configured: pass --config or set *_RPC_URL variables");
    }
    Ok(pools)
}

fn cmd_chains(config: &ChainsConfig) -> Result<()> {
    if config.chains.is_empty() {
        println!("No chains configured.");
        return Ok(());
    }
    for (chain, endpoints) in &config.chains {
        println!("{chain} (chain id {})", chain.chain_id());
        for (priority, endpoint) in endpoints.iter().enumerate() {
            println!("  [{priority}] {}", report_endpoint(endpoint));
        }
    }
    Ok(())
}

async fn cmd_status(config: &ChainsConfig, chain: Option<Chain>, probe: bool, json: bool) -> Result<()> {
    let pools = selected_pools(config, chain)?;
    if probe {
        for chain in pools.chains() {
            pools.require(chain)?.check_health_now().await;
        }
    }

    let status = pools.status();
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        for (chain, status) in &status {
            print_status(*chain, status);
        }
    }
    Ok(())
}

async fn cmd_chain_id(config: &ChainsConfig, target: &Target) -> Result<()> {
    let pools = target_pools(config, target)?;
    let id = pools.require(target.chain)?.get_chain_id().await?;
    if id != target.chain.chain_id() {
        bail!(
            "{} endpoints report chain id {id}, expected {}",
            target.chain,
            target.chain.chain_id()
        );
    }
    println!("{id}");
    Ok(())
}

async fn cmd_call(config: &ChainsConfig, target: &Target, method: &str, params: &str) -> Result<()> {
    let params: Vec<Value> =
        serde_json::from_str(params).context("--params must be a JSON array")?;
    let pools = target_pools(config, target)?;
    let result = pools.require(target.chain)?.execute(method, params).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn cmd_watch(config: &ChainsConfig, chain: Option<Chain>, every: u64) -> Result<()> {
    let pools = selected_pools(config, chain)?;
    pools.start_all();

    let mut ticker = tokio::time::interval(Duration::from_secs(every.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for (chain, status) in &pools.status() {
                    print_status(*chain, status);
                }
                println!();
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::error!(error = %e, "failed to listen for Ctrl-C");
                }
                break;
            }
        }
    }

    pools.stop_all().await;
    Ok(())
}

fn print_status(chain: Chain, status: &PoolStatus) {
    println!(
        "{chain}: {} providers, {} healthy, {} degraded, {} failed, {} circuit open",
        status.total_providers, status.healthy, status.degraded, status.failed, status.circuit_open
    );
    if let Some(current) = &status.current_provider {
        println!("  current: {current}");
    }
    for p in &status.providers {
        let checked = p
            .last_checked_at
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "never".into());
        println!(
            "  [{}] {:<13} failures={:<3} checked={checked}  {}",
            p.priority,
            p.status.to_string(),
            p.failure_count,
            p.endpoint
        );
    }
}
