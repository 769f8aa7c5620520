use num_bigint::BigInt;
use std::collections::BTreeMap;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::models::Transaction;

/// Folds the transaction stream into address → net balance change, debiting
/// senders and crediting receivers, until the channel closes.
///
/// Single writer: nothing else touches the map while this runs. Per-address
/// updates commute, so the result does not depend on how transactions from
/// concurrent fetch tasks interleaved. The sum over all entries is exactly
/// zero after every transaction, self-transfers included.
pub async fn aggregate(mut stream: UnboundedReceiver<Transaction>) -> BTreeMap<String, BigInt> {
    let mut totals = BTreeMap::new();
    while let Some(tx) = stream.recv().await {
        let value = BigInt::from(tx.value);
        *totals.entry(tx.from).or_insert_with(BigInt::default) -= &value;
        *totals.entry(tx.to).or_insert_with(BigInt::default) += &value;
    }
    totals
}
