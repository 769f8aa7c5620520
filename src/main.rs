use clap::Parser;
use eyre::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt::Subscriber};

mod aggregator;
mod client;
mod error;
mod fetcher;
mod models;
mod ranker;

use client::{ChainClient, RpcClient};
use error::Error;
use models::wei_to_ether;

#[derive(Parser, Debug)]
#[command(name = "wtop", version)]
#[command(about = "Reports the top gainer and top spender wallets over a window of recent blocks")]
struct Cli {
    /// Number of look-behind blocks
    #[arg(short = 'n', long = "blocks", default_value_t = 100,
          value_parser = clap::value_parser!(u64).range(1..=fetcher::MAX_BLOCKS))]
    blocks: u64,

    /// API token (see https://getblock.io/docs/get-started/auth-with-api-key/)
    #[arg(short = 't', long = "token", env = "GETBLOCK_API_TOKEN")]
    token: String,

    /// JSON-RPC endpoint override
    #[arg(long, env = "ETH_RPC_URL", default_value = client::ENDPOINT)]
    endpoint: String,

    /// Log every transaction as it streams in
    #[arg(short, long)]
    verbose: bool,

    /// Target block height; defaults to the current chain head
    block_number: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("wtop=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    Subscriber::builder().with_env_filter(filter).init();

    let client = Arc::new(RpcClient::with_endpoint(cli.endpoint, cli.token));

    let head = client.head_number().await?;
    let target = match cli.block_number {
        Some(t) if t > head => {
            return Err(Error::Validation(format!(
                "block number {t} is out of range: chain head is {head}"
            ))
            .into());
        }
        Some(t) => t,
        None => head,
    };

    info!(
        "blocks {}..{}",
        fetcher::block_range(target, cli.blocks).start(),
        target
    );

    let totals = fetcher::scan(client, target, cli.blocks).await?;
    match ranker::rank(totals) {
        None => info!("there are no transactions"),
        Some((min, max)) => {
            info!("{} ETH {}", wei_to_ether(&max.net), max.address);
            info!("{} ETH {}", wei_to_ether(&min.net), min.address);
        }
    }

    Ok(())
}
