//! Known Base Sepolia tokens.
//!
//! Lookups accept a symbol ("usdc", "eth", "weth") or a hex address. Tokens
//! not listed here are resolved through on-chain metadata.

use alloy::primitives::{Address, address};

use crate::chain::parse_address;
use crate::error::ChainError;

/// A token with fixed, known metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownToken {
    pub symbol: &'static str,
    pub address: Address,
    pub decimals: u8,
}

pub const USDC: KnownToken = KnownToken {
    symbol: "USDC",
    address: address!("036CbD53842c5426634e7929541eC2318f3dCF7e"),
    decimals: 6,
};

/// Wrapped ether; also stands in for native ETH in swaps.
pub const WETH: KnownToken = KnownToken {
    symbol: "WETH",
    address: address!("4200000000000000000000000000000000000006"),
    decimals: 18,
};

pub const KNOWN_TOKENS: &[KnownToken] = &[USDC, WETH];

/// Look up a known token by symbol, case-insensitively.
pub fn by_symbol(symbol: &str) -> Option<KnownToken> {
    let symbol = symbol.trim().to_ascii_uppercase();
    let symbol = if symbol == "ETH" { "WETH" } else { symbol.as_str() };
    KNOWN_TOKENS.iter().copied().find(|t| t.symbol == symbol)
}

pub fn by_address(address: Address) -> Option<KnownToken> {
    KNOWN_TOKENS.iter().copied().find(|t| t.address == address)
}

/// Resolve a symbol or hex address to an address.
pub fn resolve(token: &str) -> Result<Address, ChainError> {
    match by_symbol(token) {
        Some(known) => Ok(known.address),
        None => parse_address(token),
    }
}
