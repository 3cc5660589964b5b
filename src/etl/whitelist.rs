//! Fixed reference set of tracked token ids. Only pairs whose both
//! underlying tokens appear here are eligible for dimension resolution;
//! swaps on any other pair are dropped before they reach the warehouse.

const TOKENS: &[&str] = &[
    // WAVAX
    "0xb31f66aa3c1e785363f0875a1b74e27b85fd66c7",
    // USDC
    "0xb97ef9ef8734c71904d8002f8b6bc66dd9c48a6e",
    // USDC.e
    "0xa7d7079b0fead91f3e65f86e8915cb59c1a4c664",
    // USDT.e
    "0xc7198437980c041c805a1edcba50c1ce5db95118",
    // WETH.e
    "0x49d5c2bdffac6ce2bfdb6640f4f80f226bc10bab",
    // WBTC.e
    "0x50b7545627a5162f82a992c33b87adc75187b218",
    // DAI.e
    "0xd586e7f844cea2f87f50152665bcbc2c279d8d70",
    // MIM
    "0x130966628846bfd36ff31a822705796e8cb8c18d",
    // JOE
    "0x6e84a6216ea6dacc71ee8e6b0a5b7322eebc0fdd",
    // LINK.e
    "0x5947bb275c521040051d82396192181b413227a3",
];

pub fn contains(token_id: &str) -> bool {
    let id = token_id.to_ascii_lowercase();
    TOKENS.iter().any(|t| *t == id)
}

/// A pair is eligible only when both underlying tokens are whitelisted.
pub fn pair_eligible(token0_id: &str, token1_id: &str) -> bool {
    contains(token0_id) && contains(token1_id)
}
