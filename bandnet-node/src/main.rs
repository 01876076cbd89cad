//! BandNet node entry point: provider and client modes over plain TCP.
//! Transport encryption is left to whatever tunnels the connection; the
//! ledger core only sees a byte stream.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{error, info};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use bandnet_ledger::{run_session, Ledger, NodeConfig, TxKind, DEPOSIT_FIELD_LEN};

#[derive(Parser)]
#[command(
    name = "bandnet-node",
    about = "Rent out bandwidth as a provider, or consume it as a client"
)]
struct Cli {
    /// Ledger file location (overrides BANDNET_LEDGER_PATH).
    #[arg(long)]
    ledger: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Listen for clients and meter their sessions.
    Provider {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        #[arg(long, default_value_t = 9000)]
        port: u16,
        /// Tokens per MB charged for relayed traffic.
        #[arg(long)]
        rate: Option<f64>,
    },
    /// Connect to a provider, deposit tokens, then relay stdin lines.
    Client {
        #[arg(long)]
        host: String,
        #[arg(long, default_value_t = 9000)]
        port: u16,
        /// Deposit amount sent to the provider up front.
        #[arg(long, default_value_t = 100.0)]
        deposit: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = NodeConfig::from_env();
    if let Some(path) = cli.ledger {
        config.ledger_path = path;
    }

    match cli.command {
        Command::Provider { host, port, rate } => {
            if let Some(rate) = rate {
                config.rate_per_mb = rate;
            }
            run_provider(&host, port, config).await
        }
        Command::Client {
            host,
            port,
            deposit,
        } => run_client(&host, port, deposit, config).await,
    }
}

async fn run_provider(host: &str, port: u16, config: NodeConfig) -> anyhow::Result<()> {
    let ledger = Ledger::open(&config.ledger_path, config.difficulty)
        .with_context(|| format!("opening ledger {}", config.ledger_path.display()))?;
    info!(
        "loaded ledger {} ({} blocks)",
        config.ledger_path.display(),
        ledger.chain().len()
    );
    let ledger = Arc::new(Mutex::new(ledger));

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context("invalid bind address")?;
    let listener = TcpListener::bind(addr).await?;
    info!(
        "provider listening on {addr}, rate {} tokens/MB",
        config.rate_per_mb
    );

    loop {
        let (stream, peer) = listener.accept().await?;
        let client_identity = peer.ip().to_string();
        info!("client connected: {client_identity}");

        let ledger = Arc::clone(&ledger);
        let rate = config.rate_per_mb;
        tokio::spawn(async move {
            match run_session(stream, &client_identity, ledger, rate).await {
                Ok(summary) => info!(
                    "sealed session with {}: {} bytes, {:.3} tokens",
                    summary.client, summary.bytes_metered, summary.cost
                ),
                Err(e) => error!("session with {client_identity} aborted: {e}"),
            }
        });
    }
}

async fn run_client(host: &str, port: u16, deposit: f64, config: NodeConfig) -> anyhow::Result<()> {
    let mut ledger = Ledger::open(&config.ledger_path, config.difficulty)
        .with_context(|| format!("opening ledger {}", config.ledger_path.display()))?;

    // record the deposit intent locally; the provider meters actual usage
    ledger.record_transaction("client", host, deposit, TxKind::Deposit)?;
    ledger.seal_block()?;

    let mut stream = TcpStream::connect((host, port))
        .await
        .with_context(|| format!("connecting to provider {host}:{port}"))?;
    info!("connected to provider {host}:{port}");

    let field = format!("{deposit:<width$}", width = DEPOSIT_FIELD_LEN);
    stream.write_all(field.as_bytes()).await?;

    println!("Type messages. Empty line to end.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut echo = vec![0u8; 4096];
    let mut total: u64 = 0;
    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            break;
        }
        stream.write_all(line.as_bytes()).await?;
        total += line.len() as u64;
        let n = stream.read(&mut echo).await?;
        println!("< {}", String::from_utf8_lossy(&echo[..n]));
    }

    stream.shutdown().await?;
    println!(
        "sent {:.3} MB this session",
        total as f64 / (1024.0 * 1024.0)
    );
    Ok(())
}
