//! # idopad-oracle
//!
//! Interfaces to the external market collaborators: the price oracle that
//! quotes coins in the platform quote currency, and the chain reader that
//! reports raw on-chain token balances. Both are best-effort — a failed
//! poll leaves stored state unchanged.
//!
//! ## Modules
//!
//! - [`fixed`] — in-memory fixed-rate implementations for tests and dev
//! - [`refresh`] — the price-refresh pass over the coin table

pub mod fixed;
pub mod refresh;

use rust_decimal::Decimal;

/// Error types for oracle operations.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// The upstream service failed or timed out.
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Db(#[from] idopad_db::DbError),
}

pub type Result<T> = std::result::Result<T, OracleError>;

/// A quote-currency price feed.
pub trait PriceOracle: Send + Sync {
    /// Unit price of `symbol` in the quote currency, if the oracle knows
    /// the symbol.
    fn quote(&self, symbol: &str) -> Result<Option<Decimal>>;
}

/// An on-chain token balance reader.
pub trait ChainReader: Send + Sync {
    /// Raw token balance (integer units, unscaled) of `address` for the
    /// token contract at `contract`.
    fn token_balance(&self, contract: &str, address: &str) -> Result<Decimal>;
}
