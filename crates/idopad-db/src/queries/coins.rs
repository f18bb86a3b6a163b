//! Coin query functions.

use rusqlite::{Connection, OptionalExtension};
use rust_decimal::Decimal;

use idopad_types::{CoinId, QUOTE_NETWORK, QUOTE_SYMBOL};

use crate::queries::dec_sql;
use crate::{DbError, Result};

/// A coin row.
#[derive(Clone, Debug)]
pub struct CoinRow {
    pub id: CoinId,
    pub symbol: String,
    pub network: String,
    pub quote_price: Option<Decimal>,
    pub updated_at: u64,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CoinRow> {
    let price_text: Option<String> = row.get(3)?;
    let quote_price = match price_text {
        Some(text) => Some(text.parse().map_err(|e: rust_decimal::Error| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };
    Ok(CoinRow {
        id: row.get(0)?,
        symbol: row.get(1)?,
        network: row.get(2)?,
        quote_price,
        updated_at: row.get::<_, i64>(4)? as u64,
    })
}

const COLUMNS: &str = "id, symbol, network, quote_price, updated_at";

/// Fetch a coin by (symbol, network), creating it when absent.
pub fn upsert(conn: &Connection, symbol: &str, network: &str) -> Result<CoinRow> {
    conn.execute(
        "INSERT OR IGNORE INTO coins (symbol, network) VALUES (?1, ?2)",
        rusqlite::params![symbol, network],
    )?;
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM coins WHERE symbol = ?1 AND network = ?2"),
        rusqlite::params![symbol, network],
        map_row,
    )
    .map_err(DbError::Sqlite)
}

/// The platform quote coin (seeded by migration).
pub fn quote_coin(conn: &Connection) -> Result<CoinRow> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM coins WHERE symbol = ?1 AND network = ?2"),
        rusqlite::params![QUOTE_SYMBOL, QUOTE_NETWORK],
        map_row,
    )
    .optional()?
    .ok_or_else(|| DbError::NotFound("quote coin".to_string()))
}

/// Fetch a coin by symbol (any network), if present.
pub fn find_by_symbol(conn: &Connection, symbol: &str) -> Result<Option<CoinRow>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM coins WHERE symbol = ?1"),
            [symbol],
            map_row,
        )
        .optional()?)
}

/// Fetch a coin by id.
pub fn by_id(conn: &Connection, id: CoinId) -> Result<CoinRow> {
    conn.query_row(&format!("SELECT {COLUMNS} FROM coins WHERE id = ?1"), [id], map_row)
        .optional()?
        .ok_or_else(|| DbError::NotFound(format!("coin {id}")))
}

/// All coins.
pub fn all(conn: &Connection) -> Result<Vec<CoinRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM coins ORDER BY id"))?;
    let rows = stmt
        .query_map([], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Store a freshly polled quote price.
pub fn set_quote_price(conn: &Connection, id: CoinId, price: Decimal, updated_at: u64) -> Result<()> {
    conn.execute(
        "UPDATE coins SET quote_price = ?1, updated_at = ?2 WHERE id = ?3",
        rusqlite::params![dec_sql(price), updated_at as i64, id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    #[test]
    fn test_quote_coin_present() {
        let conn = test_db();
        let coin = quote_coin(&conn).expect("quote coin");
        assert_eq!(coin.symbol, QUOTE_SYMBOL);
        assert_eq!(coin.quote_price, Some(Decimal::ONE));
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let conn = test_db();
        let a = upsert(&conn, "ZYX", "BEP20").expect("first");
        let b = upsert(&conn, "ZYX", "BEP20").expect("second");
        assert_eq!(a.id, b.id);
        assert!(a.quote_price.is_none());
    }

    #[test]
    fn test_set_quote_price() {
        let conn = test_db();
        let coin = upsert(&conn, "ZYX", "BEP20").expect("upsert");
        set_quote_price(&conn, coin.id, "4.25".parse().expect("dec"), 1_700_000_000)
            .expect("set price");

        let coin = by_id(&conn, coin.id).expect("fetch");
        assert_eq!(coin.quote_price, Some("4.25".parse().expect("dec")));
        assert_eq!(coin.updated_at, 1_700_000_000);
    }
}
