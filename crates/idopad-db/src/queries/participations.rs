//! Participation query functions.

use rusqlite::{Connection, OptionalExtension};
use rust_decimal::Decimal;

use idopad_types::{AccountId, OfferingId, ParticipationId};

use crate::queries::{dec_col, dec_sql};
use crate::{constraint, DbError, Result};

/// A participation row: one account's committed stake in one offering.
#[derive(Clone, Debug)]
pub struct ParticipationRow {
    pub id: ParticipationId,
    pub offering_id: OfferingId,
    pub account_id: AccountId,
    pub allocation: Decimal,
    pub refund_allocation: Decimal,
    pub income_from_income: Decimal,
    pub correlation_id: String,
    pub created_at: u64,
}

const COLUMNS: &str = "id, offering_id, account_id, allocation, refund_allocation, \
                       income_from_income, correlation_id, created_at";

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ParticipationRow> {
    Ok(ParticipationRow {
        id: row.get(0)?,
        offering_id: row.get(1)?,
        account_id: row.get(2)?,
        allocation: dec_col(row, 3)?,
        refund_allocation: dec_col(row, 4)?,
        income_from_income: dec_col(row, 5)?,
        correlation_id: row.get(6)?,
        created_at: row.get::<_, i64>(7)? as u64,
    })
}

/// Insert a participation. A second row for the same (offering, account)
/// pair is a constraint error.
pub fn insert(
    conn: &Connection,
    offering_id: OfferingId,
    account_id: AccountId,
    allocation: Decimal,
    correlation_id: &str,
    created_at: u64,
) -> Result<ParticipationId> {
    conn.execute(
        "INSERT INTO participations (offering_id, account_id, allocation, correlation_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            offering_id,
            account_id,
            dec_sql(allocation),
            correlation_id,
            created_at as i64,
        ],
    )
    .map_err(|e| constraint(e, "account already participates in this offering"))?;
    Ok(conn.last_insert_rowid())
}

/// Fetch a participation by id.
pub fn by_id(conn: &Connection, id: ParticipationId) -> Result<ParticipationRow> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM participations WHERE id = ?1"),
        [id],
        map_row,
    )
    .optional()?
    .ok_or_else(|| DbError::NotFound(format!("participation {id}")))
}

/// Fetch the participation of an account in an offering, if any.
pub fn find(
    conn: &Connection,
    offering_id: OfferingId,
    account_id: AccountId,
) -> Result<Option<ParticipationRow>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM participations WHERE offering_id = ?1 AND account_id = ?2"),
            rusqlite::params![offering_id, account_id],
            map_row,
        )
        .optional()?)
}

/// All participations in an offering, in insertion order.
pub fn by_offering(conn: &Connection, offering_id: OfferingId) -> Result<Vec<ParticipationRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM participations WHERE offering_id = ?1 ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([offering_id], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// All participations of an account.
pub fn by_account(conn: &Connection, account_id: AccountId) -> Result<Vec<ParticipationRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM participations WHERE account_id = ?1 ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([account_id], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Whether the account holds any participation.
pub fn any_for_account(conn: &Connection, account_id: AccountId) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM participations WHERE account_id = ?1",
        [account_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Sum of allocations committed to an offering.
pub fn total_allocated(conn: &Connection, offering_id: OfferingId) -> Result<Decimal> {
    let rows = by_offering(conn, offering_id)?;
    Ok(rows.iter().map(|p| p.allocation).sum())
}

/// Store a new cumulative refund allocation.
pub fn set_refund_allocation(
    conn: &Connection,
    id: ParticipationId,
    refund_allocation: Decimal,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE participations SET refund_allocation = ?1 WHERE id = ?2",
        rusqlite::params![dec_sql(refund_allocation), id],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("participation {id}")));
    }
    Ok(())
}

/// Store a new cumulative upline-income figure.
pub fn set_income_from_income(
    conn: &Connection,
    id: ParticipationId,
    income_from_income: Decimal,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE participations SET income_from_income = ?1 WHERE id = ?2",
        rusqlite::params![dec_sql(income_from_income), id],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("participation {id}")));
    }
    Ok(())
}

/// Delete a participation (refund path).
pub fn delete(conn: &Connection, id: ParticipationId) -> Result<()> {
    let deleted = conn.execute("DELETE FROM participations WHERE id = ?1", [id])?;
    if deleted == 0 {
        return Err(DbError::NotFound(format!("participation {id}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{accounts, offerings};

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    fn setup(conn: &Connection) -> (OfferingId, AccountId) {
        let offering = offerings::insert(
            conn,
            &offerings::NewOffering {
                name: "Round",
                description: "",
                general_allocation: Decimal::from(1000),
                person_allocation: Decimal::from(100),
                vesting: "",
                created_at: 0,
                ..Default::default()
            },
        )
        .expect("offering");
        let account = accounts::insert(
            conn,
            &accounts::NewAccount {
                email: "a@example.com",
                first_name: None,
                last_name: None,
                invite_code: "code-a",
                inviter_id: None,
                line: 1,
                created_at: 0,
            },
        )
        .expect("account");
        (offering, account)
    }

    #[test]
    fn test_insert_and_find() {
        let conn = test_db();
        let (offering, account) = setup(&conn);
        let id = insert(&conn, offering, account, Decimal::from(100), "corr-1", 0)
            .expect("insert");

        let row = find(&conn, offering, account).expect("query").expect("found");
        assert_eq!(row.id, id);
        assert_eq!(row.allocation, Decimal::from(100));
        assert_eq!(row.refund_allocation, Decimal::ZERO);
        assert_eq!(row.correlation_id, "corr-1");
    }

    #[test]
    fn test_duplicate_rejected() {
        let conn = test_db();
        let (offering, account) = setup(&conn);
        insert(&conn, offering, account, Decimal::from(100), "corr-1", 0).expect("first");
        let result = insert(&conn, offering, account, Decimal::from(50), "corr-2", 0);
        assert!(matches!(result, Err(DbError::Constraint(_))));
    }

    #[test]
    fn test_total_allocated() {
        let conn = test_db();
        let (offering, account) = setup(&conn);
        let other = accounts::insert(
            &conn,
            &accounts::NewAccount {
                email: "b@example.com",
                first_name: None,
                last_name: None,
                invite_code: "code-b",
                inviter_id: None,
                line: 1,
                created_at: 0,
            },
        )
        .expect("account");

        insert(&conn, offering, account, Decimal::from(100), "corr-1", 0).expect("a");
        insert(&conn, offering, other, Decimal::from(250), "corr-2", 0).expect("b");
        assert_eq!(total_allocated(&conn, offering).expect("sum"), Decimal::from(350));
    }

    #[test]
    fn test_refund_allocation_update() {
        let conn = test_db();
        let (offering, account) = setup(&conn);
        let id = insert(&conn, offering, account, Decimal::from(100), "corr-1", 0)
            .expect("insert");
        set_refund_allocation(&conn, id, Decimal::from(650)).expect("set");
        assert_eq!(
            by_id(&conn, id).expect("fetch").refund_allocation,
            Decimal::from(650)
        );
    }

    #[test]
    fn test_delete() {
        let conn = test_db();
        let (offering, account) = setup(&conn);
        let id = insert(&conn, offering, account, Decimal::from(100), "corr-1", 0)
            .expect("insert");
        delete(&conn, id).expect("delete");
        assert!(find(&conn, offering, account).expect("query").is_none());
    }
}
