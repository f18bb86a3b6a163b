//! Ledger transaction query functions.
//!
//! Rows are immutable after insert, with two sanctioned exceptions: the
//! received/visible flags consumed by the token-takeoff flow, and deletion
//! for rollback correction in the refund path.

use rusqlite::{Connection, OptionalExtension};
use rust_decimal::Decimal;

use idopad_types::{AddressId, CoinId, TxId};

use crate::queries::{dec_col, dec_sql};
use crate::{DbError, Result};

/// Classification flags carried by a ledger row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TxFlags {
    pub commission: bool,
    pub referral: bool,
    pub received: bool,
    pub fill_up: bool,
}

/// A ledger row.
#[derive(Clone, Debug)]
pub struct TxRow {
    pub id: TxId,
    pub address_from_id: AddressId,
    pub address_to_id: AddressId,
    pub coin_id: CoinId,
    pub amount: Decimal,
    pub flags: TxFlags,
    pub visible: bool,
    pub correlation_id: Option<String>,
    pub created_at: u64,
}

/// Fields required to insert a ledger row.
#[derive(Debug)]
pub struct NewTransaction<'a> {
    pub address_from_id: AddressId,
    pub address_to_id: AddressId,
    pub coin_id: CoinId,
    pub amount: Decimal,
    pub flags: TxFlags,
    pub correlation_id: Option<&'a str>,
    pub created_at: u64,
}

const COLUMNS: &str = "id, address_from_id, address_to_id, coin_id, amount, is_commission, \
                       is_referral, is_received, is_fill_up, visible, correlation_id, created_at";

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TxRow> {
    Ok(TxRow {
        id: row.get(0)?,
        address_from_id: row.get(1)?,
        address_to_id: row.get(2)?,
        coin_id: row.get(3)?,
        amount: dec_col(row, 4)?,
        flags: TxFlags {
            commission: row.get(5)?,
            referral: row.get(6)?,
            received: row.get(7)?,
            fill_up: row.get(8)?,
        },
        visible: row.get(9)?,
        correlation_id: row.get(10)?,
        created_at: row.get::<_, i64>(11)? as u64,
    })
}

/// Insert a ledger row.
pub fn insert(conn: &Connection, tx: &NewTransaction<'_>) -> Result<TxId> {
    conn.execute(
        "INSERT INTO transactions (address_from_id, address_to_id, coin_id, amount, \
                                   is_commission, is_referral, is_received, is_fill_up, \
                                   correlation_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
            tx.address_from_id,
            tx.address_to_id,
            tx.coin_id,
            dec_sql(tx.amount),
            tx.flags.commission,
            tx.flags.referral,
            tx.flags.received,
            tx.flags.fill_up,
            tx.correlation_id,
            tx.created_at as i64,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Fetch a ledger row by id.
pub fn by_id(conn: &Connection, id: TxId) -> Result<TxRow> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM transactions WHERE id = ?1"),
        [id],
        map_row,
    )
    .optional()?
    .ok_or_else(|| DbError::NotFound(format!("transaction {id}")))
}

/// Every row carrying the given correlation id.
pub fn by_correlation(conn: &Connection, correlation_id: &str) -> Result<Vec<TxRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM transactions WHERE correlation_id = ?1 ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([correlation_id], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Pending (not yet received) rows paying the given address in a coin.
pub fn pending_to_address(
    conn: &Connection,
    address_id: AddressId,
    coin_id: CoinId,
) -> Result<Vec<TxRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM transactions \
         WHERE address_to_id = ?1 AND coin_id = ?2 AND is_received = 0 ORDER BY id"
    ))?;
    let rows = stmt
        .query_map(rusqlite::params![address_id, coin_id], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every visible row paying the given address in a coin.
pub fn to_address(conn: &Connection, address_id: AddressId, coin_id: CoinId) -> Result<Vec<TxRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM transactions \
         WHERE address_to_id = ?1 AND coin_id = ?2 AND visible = 1 ORDER BY id"
    ))?;
    let rows = stmt
        .query_map(rusqlite::params![address_id, coin_id], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Rows in a coin created inside `[from, to)`, for report bucketing.
pub fn in_range(conn: &Connection, coin_id: CoinId, from: u64, to: u64) -> Result<Vec<TxRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM transactions \
         WHERE coin_id = ?1 AND created_at >= ?2 AND created_at < ?3 ORDER BY id"
    ))?;
    let rows = stmt
        .query_map(rusqlite::params![coin_id, from as i64, to as i64], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Mark a row received, optionally hiding it (superseded by a recalculated
/// payout in the token-takeoff flow).
pub fn mark_received(conn: &Connection, id: TxId, visible: bool) -> Result<()> {
    let updated = conn.execute(
        "UPDATE transactions SET is_received = 1, visible = ?1 WHERE id = ?2",
        rusqlite::params![visible, id],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("transaction {id}")));
    }
    Ok(())
}

/// Delete a row (rollback correction only).
pub fn delete(conn: &Connection, id: TxId) -> Result<()> {
    let deleted = conn.execute("DELETE FROM transactions WHERE id = ?1", [id])?;
    if deleted == 0 {
        return Err(DbError::NotFound(format!("transaction {id}")));
    }
    Ok(())
}
