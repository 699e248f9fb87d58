use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mint_policy::{Blueprint, KeyHash, MintingPolicy, PolicyConfiguration, ValidatorTemplate};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use tokio::runtime::Builder as RuntimeBuilder;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wallet::api::{serve_mint_api, ApiState};
use wallet::config::{ProviderConfig, WalletConfig, ROOT_SECRET_ENV};
use wallet::keys::RootSecret;
use wallet::ledger::{TxId, UtxoRef, Value};
use wallet::{Minter, Network};

#[derive(Parser)]
#[command(name = "wallet", version, about = "Admin wallet for a single-token minting policy")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct WalletArgs {
    /// Hex-encoded 32-byte root secret of the administrator key.
    #[arg(long, env = ROOT_SECRET_ENV, hide_env_values = true)]
    root: String,
    #[arg(long, env = "MINT_TOKEN_NAME", default_value = "CO2 Tonne")]
    token_name: String,
    #[arg(long, env = "MINT_NETWORK", default_value = "testnet")]
    network: Network,
}

#[derive(Args)]
struct ProviderArgs {
    /// `emulator` or the base URL of a chain-data provider.
    #[arg(long, env = "MINT_PROVIDER", default_value = "emulator")]
    provider: String,
    #[arg(long, env = "MINT_PROVIDER_TOKEN", hide_env_values = true)]
    provider_token: Option<String>,
    #[arg(long, env = "MINT_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,
    /// Pin the collateral output, as `<tx_id>#<index>`.
    #[arg(long, env = "MINT_COLLATERAL")]
    collateral: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new root secret and print its address and key hash.
    Generate {
        #[arg(long, default_value = "testnet")]
        network: Network,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Address {
        #[command(flatten)]
        wallet: WalletArgs,
    },
    /// Export the policy blueprint for the wallet's key and token name.
    Blueprint {
        #[command(flatten)]
        wallet: WalletArgs,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Mint {
        #[command(flatten)]
        wallet: WalletArgs,
        #[command(flatten)]
        provider: ProviderArgs,
        #[arg(long)]
        amount: i64,
    },
    Burn {
        #[command(flatten)]
        wallet: WalletArgs,
        #[command(flatten)]
        provider: ProviderArgs,
        #[arg(long, allow_negative_numbers = true)]
        amount: i64,
    },
    Balance {
        #[command(flatten)]
        wallet: WalletArgs,
        #[command(flatten)]
        provider: ProviderArgs,
    },
    /// Serve the mint/burn HTTP endpoint.
    Serve {
        #[command(flatten)]
        wallet: WalletArgs,
        #[command(flatten)]
        provider: ProviderArgs,
        #[arg(long, env = "MINT_API_ADDR", default_value = "127.0.0.1:8090")]
        listen: SocketAddr,
        #[arg(long, env = "MINT_API_TOKEN", hide_env_values = true)]
        api_token: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Generate { network, out } => cmd_generate(network, out.as_deref()),
        Commands::Address { wallet } => cmd_address(&wallet),
        Commands::Blueprint { wallet, out } => cmd_blueprint(&wallet, out.as_deref()),
        Commands::Mint {
            wallet,
            provider,
            amount,
        } => cmd_mint(&wallet, &provider, amount, Direction::Mint),
        Commands::Burn {
            wallet,
            provider,
            amount,
        } => cmd_mint(&wallet, &provider, amount, Direction::Burn),
        Commands::Balance { wallet, provider } => cmd_balance(&wallet, &provider),
        Commands::Serve {
            wallet,
            provider,
            listen,
            api_token,
        } => cmd_serve(&wallet, &provider, listen, api_token),
    }
}

fn cmd_generate(network: Network, out: Option<&Path>) -> Result<()> {
    let mut rng = StdRng::from_entropy();
    let root = RootSecret::from_rng(&mut rng);
    let keys = root.derive();
    let export = KeyExport {
        root_secret: root.to_hex(),
        address: keys.address(network).encode()?,
        key_hash: keys.key_hash().to_hex(),
    };
    match out {
        Some(path) => write_json(path, &export),
        None => print_json(&export),
    }
}

fn cmd_address(args: &WalletArgs) -> Result<()> {
    let root = parse_root(&args.root)?;
    let address = root.derive().address(args.network);
    println!("{}", address.encode()?);
    Ok(())
}

fn cmd_blueprint(args: &WalletArgs, out: Option<&Path>) -> Result<()> {
    let root = parse_root(&args.root)?;
    let policy = instantiate_policy(root.derive().key_hash(), &args.token_name)?;
    let blueprint = Blueprint::from_policy(&policy).context("failed to build blueprint")?;
    match out {
        Some(path) => write_json(path, &blueprint),
        None => print_json(&blueprint),
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Mint,
    Burn,
}

fn cmd_mint(
    wallet: &WalletArgs,
    provider: &ProviderArgs,
    amount: i64,
    direction: Direction,
) -> Result<()> {
    let minter = open_minter(wallet, provider)?;
    let tx_id = match direction {
        Direction::Mint => minter.mint(amount),
        Direction::Burn => minter.burn(amount),
    }
    .context("transaction failed")?;
    let token_balance = minter.token_balance().context("failed to query balance")?;
    print_json(&TxReport {
        tx_id,
        policy_id: minter.policy().policy_id().to_hex(),
        token_balance,
    })
}

fn cmd_balance(wallet: &WalletArgs, provider: &ProviderArgs) -> Result<()> {
    let minter = open_minter(wallet, provider)?;
    let value = minter.balance().context("failed to query balance")?;
    print_json(&BalanceReport {
        address: minter.address().encode()?,
        token_balance: value.quantity_of(
            &minter.policy().policy_id(),
            &minter.policy().config().token_name,
        ),
        value,
    })
}

fn cmd_serve(
    wallet: &WalletArgs,
    provider: &ProviderArgs,
    listen: SocketAddr,
    api_token: Option<String>,
) -> Result<()> {
    // The blocking HTTP provider must be created and dropped outside the runtime.
    let minter = Arc::new(open_minter(wallet, provider)?);
    info!(
        address = %minter.address(),
        policy_id = %minter.policy().policy_id(),
        "serving mint endpoint"
    );
    let runtime = RuntimeBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let state = ApiState::new(Arc::clone(&minter), api_token);
    let result = runtime.block_on(serve_mint_api(listen, state));
    drop(runtime);
    drop(minter);
    result
}

fn open_minter(wallet: &WalletArgs, provider: &ProviderArgs) -> Result<Minter> {
    let config = WalletConfig {
        network: wallet.network,
        provider: ProviderConfig::parse(&provider.provider)?,
        provider_token: provider.provider_token.clone(),
        request_timeout_secs: provider.timeout_secs,
        token_name: wallet.token_name.clone(),
        collateral: provider
            .collateral
            .as_deref()
            .map(UtxoRef::parse)
            .transpose()
            .context("invalid collateral reference")?,
        root_secret: Some(wallet.root.clone()),
        ..WalletConfig::default()
    };
    let root = config.root_secret().context("invalid root secret")?;
    let keys = root.derive();
    let policy = instantiate_policy(keys.key_hash(), &config.token_name)?;
    let address = keys.address(config.network);
    let chain = config
        .connect(Some(address))
        .context("failed to connect to provider")?;
    Ok(Minter::new(chain, keys, policy, config.network).with_collateral(config.collateral))
}

fn instantiate_policy(admin: KeyHash, token_name: &str) -> Result<MintingPolicy> {
    let config = PolicyConfiguration::new(admin, token_name).context("invalid token name")?;
    // Compiled once per process and passed in explicitly.
    let template = ValidatorTemplate::compile();
    MintingPolicy::instantiate(&template, config).context("failed to instantiate policy")
}

fn parse_root(hex: &str) -> Result<RootSecret> {
    RootSecret::from_hex(hex).context("root secret must be 32 bytes of hex")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_vec_pretty(value)?;
    fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))
}

#[derive(Serialize)]
struct KeyExport {
    root_secret: String,
    address: String,
    key_hash: String,
}

#[derive(Serialize)]
struct TxReport {
    tx_id: TxId,
    policy_id: String,
    token_balance: u64,
}

#[derive(Serialize)]
struct BalanceReport {
    address: String,
    token_balance: u64,
    value: Value,
}
