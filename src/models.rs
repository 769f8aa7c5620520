use num_bigint::{BigInt, BigUint, Sign};

/// A value transfer inside a block. `value` is denominated in wei and stays
/// arbitrary-precision through the whole pipeline.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub from: String,
    // Contract creations carry no recipient on the wire; the chain client maps
    // that to the empty string so the sender's debit stays balanced.
    pub to: String,
    pub value: BigUint,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub number: u64,
    pub transactions: Vec<Transaction>,
}

/// An address together with its net balance change over the scanned window:
/// total received minus total sent, in wei.
#[derive(Debug, Clone)]
pub struct Wallet {
    pub address: String,
    pub net: BigInt,
}

const WEI_PER_ETHER_DIGITS: usize = 18;

/// Converts a signed wei amount to an ether string for display, e.g. `+0.5`
/// or `-1.000000000000000001`. Integer div/mod only, so no precision is lost;
/// trailing fractional zeros are trimmed.
pub fn wei_to_ether(wei: &BigInt) -> String {
    let sign = if wei.sign() == Sign::Minus { '-' } else { '+' };
    let scale = BigUint::from(10u32).pow(WEI_PER_ETHER_DIGITS as u32);
    let magnitude = wei.magnitude();
    let whole = magnitude / &scale;
    let frac = magnitude % &scale;

    let frac = format!("{:0>width$}", frac.to_str_radix(10), width = WEI_PER_ETHER_DIGITS);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        format!("{sign}{whole}")
    } else {
        format!("{sign}{whole}.{frac}")
    }
}
