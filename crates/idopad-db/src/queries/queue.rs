//! Queue-entry query functions.
//!
//! Numbers form a dense 1-based ordering per offering; the renumbering
//! itself is driven by the queue manager crate.

use rusqlite::{Connection, OptionalExtension};

use idopad_types::{AccountId, OfferingId};

use crate::{constraint, DbError, Result};

/// A queue entry row.
#[derive(Clone, Debug)]
pub struct QueueEntryRow {
    pub id: i64,
    pub offering_id: OfferingId,
    pub account_id: AccountId,
    pub number: i64,
    pub permanent: bool,
    pub created_at: u64,
}

const COLUMNS: &str = "id, offering_id, account_id, number, permanent, created_at";

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueEntryRow> {
    Ok(QueueEntryRow {
        id: row.get(0)?,
        offering_id: row.get(1)?,
        account_id: row.get(2)?,
        number: row.get(3)?,
        permanent: row.get(4)?,
        created_at: row.get::<_, i64>(5)? as u64,
    })
}

/// Insert a queue entry. A second entry for the same (offering, account)
/// pair is a constraint error.
pub fn insert(
    conn: &Connection,
    offering_id: OfferingId,
    account_id: AccountId,
    number: i64,
    permanent: bool,
    created_at: u64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO queue_entries (offering_id, account_id, number, permanent, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![offering_id, account_id, number, permanent, created_at as i64],
    )
    .map_err(|e| constraint(e, "account already queued for this offering"))?;
    Ok(conn.last_insert_rowid())
}

/// Fetch the entry of an account in an offering queue, if any.
pub fn find(
    conn: &Connection,
    offering_id: OfferingId,
    account_id: AccountId,
) -> Result<Option<QueueEntryRow>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM queue_entries WHERE offering_id = ?1 AND account_id = ?2"),
            rusqlite::params![offering_id, account_id],
            map_row,
        )
        .optional()?)
}

/// All entries of an offering queue, ordered by number.
pub fn by_offering(conn: &Connection, offering_id: OfferingId) -> Result<Vec<QueueEntryRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM queue_entries WHERE offering_id = ?1 ORDER BY number"
    ))?;
    let rows = stmt
        .query_map([offering_id], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every queue entry held by the account, across offerings.
pub fn by_account(conn: &Connection, account_id: AccountId) -> Result<Vec<QueueEntryRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM queue_entries WHERE account_id = ?1 ORDER BY offering_id"
    ))?;
    let rows = stmt
        .query_map([account_id], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Highest occupied number in an offering queue.
pub fn max_number(conn: &Connection, offering_id: OfferingId) -> Result<Option<i64>> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(number) FROM queue_entries WHERE offering_id = ?1",
        [offering_id],
        |row| row.get(0),
    )?;
    Ok(max)
}

/// Shift every number at or above `from_number` by `delta`.
pub fn shift_from(
    conn: &Connection,
    offering_id: OfferingId,
    from_number: i64,
    delta: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE queue_entries SET number = number + ?1 WHERE offering_id = ?2 AND number >= ?3",
        rusqlite::params![delta, offering_id, from_number],
    )?;
    Ok(())
}

/// Shift every number strictly above `number` by `delta`.
pub fn shift_above(
    conn: &Connection,
    offering_id: OfferingId,
    number: i64,
    delta: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE queue_entries SET number = number + ?1 WHERE offering_id = ?2 AND number > ?3",
        rusqlite::params![delta, offering_id, number],
    )?;
    Ok(())
}

/// Reposition a single entry.
pub fn set_position(conn: &Connection, id: i64, number: i64, permanent: bool) -> Result<()> {
    let updated = conn.execute(
        "UPDATE queue_entries SET number = ?1, permanent = ?2 WHERE id = ?3",
        rusqlite::params![number, permanent, id],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("queue entry {id}")));
    }
    Ok(())
}

/// Lowest transient (non-permanent) number at or above `from_number`.
pub fn min_transient_from(
    conn: &Connection,
    offering_id: OfferingId,
    from_number: i64,
) -> Result<Option<i64>> {
    let min: Option<i64> = conn.query_row(
        "SELECT MIN(number) FROM queue_entries \
         WHERE offering_id = ?1 AND permanent = 0 AND number >= ?2",
        rusqlite::params![offering_id, from_number],
        |row| row.get(0),
    )?;
    Ok(min)
}

/// Delete a queue entry.
pub fn delete(conn: &Connection, id: i64) -> Result<()> {
    let deleted = conn.execute("DELETE FROM queue_entries WHERE id = ?1", [id])?;
    if deleted == 0 {
        return Err(DbError::NotFound(format!("queue entry {id}")));
    }
    Ok(())
}

/// Number of distinct accounts present in any queue.
pub fn distinct_queued_accounts(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT account_id) FROM queue_entries",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}
