//! Price refresh pass.
//!
//! Polls the oracle for every coin and stores the returned quote prices.
//! The quote coin is refreshed first; other coins are priced relative to
//! it. Failures leave the stored price unchanged.

use rusqlite::Connection;
use rust_decimal::Decimal;

use idopad_db::queries::coins;
use idopad_types::QUOTE_SYMBOL;

use crate::{PriceOracle, Result};

/// Outcome of one refresh pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub updated: usize,
    pub skipped: usize,
}

/// Refresh stored quote prices from the oracle.
pub fn refresh_prices(
    conn: &Connection,
    oracle: &dyn PriceOracle,
    now: u64,
) -> Result<RefreshSummary> {
    let mut summary = RefreshSummary::default();

    // Quote coin first; everything else is priced through it.
    let quote = coins::quote_coin(conn)?;
    let quote_price = match oracle.quote(QUOTE_SYMBOL) {
        Ok(Some(price)) if !price.is_zero() => {
            coins::set_quote_price(conn, quote.id, price, now)?;
            summary.updated += 1;
            price
        }
        Ok(_) => quote.quote_price.unwrap_or(Decimal::ONE),
        Err(e) => {
            tracing::warn!(symbol = QUOTE_SYMBOL, error = %e, "quote coin poll failed");
            quote.quote_price.unwrap_or(Decimal::ONE)
        }
    };

    for coin in coins::all(conn)? {
        if coin.id == quote.id {
            continue;
        }
        match oracle.quote(&coin.symbol) {
            Ok(Some(price)) => {
                coins::set_quote_price(conn, coin.id, price * quote_price, now)?;
                summary.updated += 1;
            }
            Ok(None) => {
                summary.skipped += 1;
            }
            Err(e) => {
                tracing::warn!(symbol = %coin.symbol, error = %e, "price poll failed");
                summary.skipped += 1;
            }
        }
    }

    tracing::debug!(
        updated = summary.updated,
        skipped = summary.skipped,
        "price refresh complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::FixedOracle;

    fn test_db() -> Connection {
        idopad_db::open_memory().expect("open test db")
    }

    #[test]
    fn test_refresh_updates_known_coins() {
        let conn = test_db();
        let token = coins::upsert(&conn, "ZYX", "BEP20").expect("token");

        let oracle = FixedOracle::new();
        oracle.set_rate(QUOTE_SYMBOL, Decimal::ONE);
        oracle.set_rate("ZYX", "4.25".parse().expect("dec"));

        let summary = refresh_prices(&conn, &oracle, 1_700_000_000).expect("refresh");
        assert_eq!(summary.updated, 2);
        assert_eq!(summary.skipped, 0);

        let token = coins::by_id(&conn, token.id).expect("fetch");
        assert_eq!(token.quote_price, Some("4.25".parse().expect("dec")));
        assert_eq!(token.updated_at, 1_700_000_000);
    }

    #[test]
    fn test_unknown_symbol_leaves_price_unchanged() {
        let conn = test_db();
        let token = coins::upsert(&conn, "ZYX", "BEP20").expect("token");
        coins::set_quote_price(&conn, token.id, Decimal::from(3), 100).expect("seed");

        let oracle = FixedOracle::new();
        let summary = refresh_prices(&conn, &oracle, 200).expect("refresh");
        assert_eq!(summary.updated, 0);
        assert_eq!(summary.skipped, 1);

        let token = coins::by_id(&conn, token.id).expect("fetch");
        assert_eq!(token.quote_price, Some(Decimal::from(3)));
        assert_eq!(token.updated_at, 100);
    }

    #[test]
    fn test_relative_pricing_through_quote_coin() {
        let conn = test_db();
        let quote = coins::quote_coin(&conn).expect("quote");
        let token = coins::upsert(&conn, "ZYX", "BEP20").expect("token");

        let oracle = FixedOracle::new();
        oracle.set_rate(QUOTE_SYMBOL, "2".parse().expect("dec"));
        oracle.set_rate("ZYX", "4".parse().expect("dec"));

        refresh_prices(&conn, &oracle, 0).expect("refresh");

        assert_eq!(
            coins::by_id(&conn, quote.id).expect("quote").quote_price,
            Some(Decimal::from(2))
        );
        assert_eq!(
            coins::by_id(&conn, token.id).expect("token").quote_price,
            Some(Decimal::from(8))
        );
    }
}
