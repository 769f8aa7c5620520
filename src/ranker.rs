use num_bigint::BigInt;
use std::collections::BTreeMap;

use crate::models::Wallet;

/// Picks the biggest loser and the biggest gainer out of the finished
/// aggregate. `None` means the scanned window held no transactions at all,
/// which is a legitimate outcome, not a failure.
///
/// Wallets are ordered by net amount with the address as a deliberate
/// deterministic tie-break: among equal net amounts, the minimum goes to the
/// lexicographically smallest address and the maximum to the largest.
pub fn rank(totals: BTreeMap<String, BigInt>) -> Option<(Wallet, Wallet)> {
    let mut wallets: Vec<Wallet> = totals
        .into_iter()
        .map(|(address, net)| Wallet { address, net })
        .collect();
    wallets.sort_by(|a, b| a.net.cmp(&b.net).then_with(|| a.address.cmp(&b.address)));

    let max = wallets.pop()?;
    let min = wallets.into_iter().next().unwrap_or_else(|| max.clone());
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(entries: &[(&str, i64)]) -> BTreeMap<String, BigInt> {
        entries
            .iter()
            .map(|(a, n)| (a.to_string(), BigInt::from(*n)))
            .collect()
    }

    #[test]
    fn empty_mapping_ranks_to_none() {
        assert!(rank(BTreeMap::new()).is_none());
    }

    #[test]
    fn extremes_are_extracted() {
        let (min, max) = rank(totals(&[("A", -100), ("B", 70), ("C", 30)])).unwrap();
        assert_eq!(min.address, "A");
        assert_eq!(min.net, BigInt::from(-100));
        assert_eq!(max.address, "B");
        assert_eq!(max.net, BigInt::from(70));
    }

    #[test]
    fn single_entry_is_both_extremes() {
        let (min, max) = rank(totals(&[("A", 0)])).unwrap();
        assert_eq!(min.address, "A");
        assert_eq!(max.address, "A");
    }

    #[test]
    fn ties_break_on_address() {
        let (min, max) = rank(totals(&[("B", -5), ("A", -5), ("C", 9), ("D", 9)])).unwrap();
        assert_eq!(min.address, "A");
        assert_eq!(max.address, "D");
    }
}
