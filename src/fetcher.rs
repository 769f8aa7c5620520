use num_bigint::BigInt;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinSet;
use tracing::debug;

use crate::aggregator;
use crate::client::ChainClient;
use crate::error::Error;
use crate::models::{Transaction, wei_to_ether};

/// Largest allowed look-behind window.
pub const MAX_BLOCKS: u64 = 500;

/// Heights scanned for a window of `count` blocks ending at `target`,
/// clamped so nothing below genesis is scheduled.
pub fn block_range(target: u64, count: u64) -> RangeInclusive<u64> {
    target.saturating_sub(count.saturating_sub(1))..=target
}

/// Fetches the window in parallel and aggregates every transaction it
/// contains into address → net balance change.
///
/// One task per height runs against the chain client; all of them feed a
/// shared channel consumed by a single aggregator. The first task failure
/// aborts the remaining tasks and fails the whole scan; the partial
/// aggregate is discarded, never reported.
pub async fn scan<C: ChainClient>(
    client: Arc<C>,
    target: u64,
    count: u64,
) -> Result<BTreeMap<String, BigInt>, Error> {
    if count < 1 || count > MAX_BLOCKS {
        return Err(Error::Validation(format!(
            "block count must be between 1 and {MAX_BLOCKS}, got {count}"
        )));
    }

    let (sender, receiver) = mpsc::unbounded_channel();
    let (fetched, totals) = tokio::join!(
        fetch_blocks(client, block_range(target, count), sender),
        aggregator::aggregate(receiver),
    );
    fetched?;
    Ok(totals)
}

async fn fetch_blocks<C: ChainClient>(
    client: Arc<C>,
    heights: RangeInclusive<u64>,
    sender: UnboundedSender<Transaction>,
) -> Result<(), Error> {
    let mut tasks = JoinSet::new();
    for number in heights.rev() {
        let client = Arc::clone(&client);
        let sender = sender.clone();
        tasks.spawn(async move {
            let block = client.block_by_number(number).await?;
            debug!(block = number, transactions = block.transactions.len(), "fetched");
            for tx in block.transactions {
                debug!(
                    "{} ETH {} -> {}",
                    wei_to_ether(&BigInt::from(tx.value.clone())),
                    tx.from,
                    tx.to
                );
                if sender.send(tx).is_err() {
                    break;
                }
            }
            Ok::<_, Error>(())
        });
    }
    // The aggregator sees end-of-stream once every task's sender is gone.
    drop(sender);

    // Drain every task even after a failure, so no in-flight send races the
    // decision to discard the aggregate. First error wins; the rest are
    // cancelled best-effort and their outcomes ignored.
    let mut first_err = None;
    while let Some(settled) = tasks.join_next().await {
        match settled {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                if first_err.is_none() {
                    first_err = Some(e);
                    tasks.abort_all();
                }
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                if first_err.is_none() {
                    first_err = Some(Error::Task(e.to_string()));
                    tasks.abort_all();
                }
            }
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
