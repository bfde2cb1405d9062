//! satchel — command-line front end for the self-custodial send pipeline.
//!
//! Keys live in PIN-sealed JSON files; chain data comes from the providers
//! listed in the config file (or the network defaults).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use satchel_core::address::parse_address;
use satchel_core::constants::sats_to_btc;
use satchel_wallet::{
    EncryptedKeyMaterial, Pin, SendRequest, SendState, SigningKeypair, WalletConfig,
    WalletOrchestrator, generate_secret_key, seal, unlock,
};
use tracing::info;

/// Self-custodial bitcoin sending.
#[derive(Parser)]
#[command(name = "satchel")]
#[command(version, about = "Send bitcoin from a PIN-sealed key.")]
struct Cli {
    /// Config file (default: <config dir>/satchel/config.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new key and seal it under a PIN.
    Keygen(KeygenArgs),
    /// Show the address of a sealed key.
    Address(KeyArgs),
    /// Query the spendable balance of an address.
    Balance(AddressArg),
    /// Pay an address from a sealed key.
    Send(SendArgs),
    /// Poll the balance of an address until interrupted.
    Watch(AddressArg),
}

#[derive(Args)]
struct KeygenArgs {
    /// Where to write the sealed key.
    #[arg(short, long)]
    out: PathBuf,
}

#[derive(Args)]
struct KeyArgs {
    /// Sealed key file.
    #[arg(short, long)]
    key: PathBuf,
}

#[derive(Args)]
struct AddressArg {
    address: String,
}

#[derive(Args)]
struct SendArgs {
    /// Sealed key file.
    #[arg(short, long)]
    key: PathBuf,

    /// Recipient address.
    #[arg(short, long)]
    to: String,

    /// Amount in sats.
    #[arg(short, long)]
    amount: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = WalletConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Commands::Keygen(args) => keygen(&config, args),
        Commands::Address(args) => show_address(&config, args).await,
        Commands::Balance(args) => balance(&config, args).await,
        Commands::Send(args) => send(&config, args).await,
        Commands::Watch(args) => watch(&config, args).await,
    }
}

/// Generate a key, seal it, and print its address.
fn keygen(config: &WalletConfig, args: KeygenArgs) -> Result<()> {
    if args.out.exists() {
        bail!("Key file already exists: {}", args.out.display());
    }

    let pin = prompt_pin("New PIN")?;
    let confirm = prompt_pin("Confirm PIN")?;
    if pin != confirm {
        bail!("PINs do not match");
    }

    let mut secret = generate_secret_key();
    let sealed = seal(&secret, &pin, config.kdf);
    let address = SigningKeypair::take_secret_key(&mut secret, config.network).address();
    let sealed = sealed.context("Failed to seal key")?;

    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let json = sealed.to_json().context("Failed to encode key file")?;
    std::fs::write(&args.out, json)
        .with_context(|| format!("Failed to write key file: {}", args.out.display()))?;

    println!("\n=== KEY CREATED ===");
    println!("Network: {}", config.network);
    println!("Address: {address}");
    println!("Key file: {}", args.out.display());
    println!("\nWARNING: the key cannot be recovered without this file and its PIN.");
    Ok(())
}

async fn show_address(config: &WalletConfig, args: KeyArgs) -> Result<()> {
    let material = read_key_file(&args.key)?;
    let pin = prompt_pin("PIN")?;
    let network = config.network;
    let keypair = tokio::task::spawn_blocking(move || unlock(&material, &pin, network))
        .await
        .context("Unlock task failed")?
        .context("Failed to unlock key")?;
    println!("{}", keypair.address());
    Ok(())
}

async fn balance(config: &WalletConfig, args: AddressArg) -> Result<()> {
    let address = parse_address(&args.address, config.network).context("Invalid address")?;
    let orchestrator = WalletOrchestrator::from_config(config);
    let sats = orchestrator
        .spendable_balance(&address)
        .await
        .context("Balance query failed")?;

    println!("Address: {address}");
    println!("Spendable: {sats} sats ({:.8} BTC)", sats_to_btc(sats));
    Ok(())
}

async fn send(config: &WalletConfig, args: SendArgs) -> Result<()> {
    let material = read_key_file(&args.key)?;
    let pin = prompt_pin("PIN")?;
    let orchestrator = WalletOrchestrator::from_config(config);

    let mut events = orchestrator.subscribe();
    let progress = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match &event.state {
                SendState::Stage(stage) => info!(send_id = event.send_id, %stage, "send progress"),
                _ => break,
            }
        }
    });

    let result = orchestrator
        .send_transaction(SendRequest {
            key_material: material,
            pin,
            recipient: args.to.clone(),
            amount: args.amount,
        })
        .await;
    progress.abort();

    let receipt = match result {
        Ok(receipt) => receipt,
        Err(failure) => {
            if let Some(signed) = &failure.finalized {
                eprintln!("Signed transaction (retry with any broadcaster):");
                eprintln!("{}", signed.to_hex());
            }
            if failure.kind().is_retryable() {
                eprintln!("This failure is temporary; the same send may succeed later.");
            }
            return Err(failure).context("Send failed");
        }
    };

    println!("\n=== TRANSACTION SENT ===");
    println!("TxID: {}", receipt.txid);
    println!("To: {}", args.to);
    println!("Amount: {} sats ({:.8} BTC)", args.amount, sats_to_btc(args.amount));
    println!("Fee: {} sats", receipt.fee);
    println!("Inputs: {}", receipt.input_count);
    if receipt.change > 0 {
        println!("Change: {} sats", receipt.change);
    }
    if let Some(balance) = receipt.balance_after {
        println!("Balance: {balance} sats");
    }
    Ok(())
}

async fn watch(config: &WalletConfig, args: AddressArg) -> Result<()> {
    let address = parse_address(&args.address, config.network).context("Invalid address")?;
    let orchestrator = WalletOrchestrator::from_config(config);
    let mut balance = orchestrator.watch_address(address.clone());
    println!(
        "Watching {address} every {}s (Ctrl-C to stop)",
        config.refresh_interval().as_secs()
    );

    loop {
        tokio::select! {
            changed = balance.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(sats) = *balance.borrow_and_update() {
                    println!("{address}: {sats} sats ({:.8} BTC)", sats_to_btc(sats));
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    orchestrator.stop_watching();
    Ok(())
}

fn read_key_file(path: &Path) -> Result<EncryptedKeyMaterial> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read key file: {}", path.display()))?;
    EncryptedKeyMaterial::from_json(&json).context("Malformed key file")
}

/// Prompt for a PIN securely (no echo).
fn prompt_pin(prompt: &str) -> Result<Pin> {
    rpassword::prompt_password(format!("{prompt}: "))
        .map(Pin::from)
        .context("Failed to read PIN")
}
