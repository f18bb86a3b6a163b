//! Fixed-rate oracle and chain reader.
//!
//! In-memory implementations with settable state, used by the daemon in
//! development deployments and by tests everywhere. A real deployment
//! substitutes HTTP-backed clients behind the same traits.

use std::collections::HashMap;
use std::sync::Mutex;

use rust_decimal::Decimal;

use crate::{ChainReader, OracleError, PriceOracle, Result};

/// A price oracle backed by a fixed rate table.
#[derive(Debug, Default)]
pub struct FixedOracle {
    rates: Mutex<HashMap<String, Decimal>>,
}

impl FixedOracle {
    /// Create an empty oracle (every quote returns `None`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the quote for a symbol.
    pub fn set_rate(&self, symbol: &str, price: Decimal) {
        if let Ok(mut rates) = self.rates.lock() {
            rates.insert(symbol.to_string(), price);
        }
    }

    /// Drop the quote for a symbol.
    pub fn clear_rate(&self, symbol: &str) {
        if let Ok(mut rates) = self.rates.lock() {
            rates.remove(symbol);
        }
    }
}

impl PriceOracle for FixedOracle {
    fn quote(&self, symbol: &str) -> Result<Option<Decimal>> {
        let rates = self
            .rates
            .lock()
            .map_err(|_| OracleError::Unavailable("rate table poisoned".to_string()))?;
        Ok(rates.get(symbol).copied())
    }
}

/// A chain reader backed by a fixed balance table keyed by
/// (contract, address).
#[derive(Debug, Default)]
pub struct FixedChainReader {
    balances: Mutex<HashMap<(String, String), Decimal>>,
}

impl FixedChainReader {
    /// Create an empty reader (every balance reads as zero).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the raw balance reported for (contract, address).
    pub fn set_balance(&self, contract: &str, address: &str, raw: Decimal) {
        if let Ok(mut balances) = self.balances.lock() {
            balances.insert((contract.to_string(), address.to_string()), raw);
        }
    }
}

impl ChainReader for FixedChainReader {
    fn token_balance(&self, contract: &str, address: &str) -> Result<Decimal> {
        let balances = self
            .balances
            .lock()
            .map_err(|_| OracleError::Unavailable("balance table poisoned".to_string()))?;
        Ok(balances
            .get(&(contract.to_string(), address.to_string()))
            .copied()
            .unwrap_or(Decimal::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oracle_rates() {
        let oracle = FixedOracle::new();
        assert_eq!(oracle.quote("ZYX").expect("quote"), None);

        oracle.set_rate("ZYX", "4.25".parse().expect("dec"));
        assert_eq!(
            oracle.quote("ZYX").expect("quote"),
            Some("4.25".parse().expect("dec"))
        );

        oracle.clear_rate("ZYX");
        assert_eq!(oracle.quote("ZYX").expect("quote"), None);
    }

    #[test]
    fn test_chain_reader_balances() {
        let reader = FixedChainReader::new();
        assert_eq!(
            reader.token_balance("0xc", "0xa").expect("read"),
            Decimal::ZERO
        );

        reader.set_balance("0xc", "0xa", Decimal::from(135_499));
        assert_eq!(
            reader.token_balance("0xc", "0xa").expect("read"),
            Decimal::from(135_499)
        );
        // Other addresses are unaffected.
        assert_eq!(
            reader.token_balance("0xc", "0xb").expect("read"),
            Decimal::ZERO
        );
    }
}
