//! Account query functions.

use rusqlite::{Connection, OptionalExtension};
use rust_decimal::Decimal;

use idopad_types::{AccountId, AccountStatus};

use crate::queries::{dec_col, dec_sql};
use crate::{constraint, DbError, Result};

/// A full account row.
#[derive(Clone, Debug)]
pub struct AccountRow {
    pub id: AccountId,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub invite_code: String,
    pub can_invite: bool,
    pub inviter_id: Option<AccountId>,
    pub line: i64,
    pub status: AccountStatus,
    pub balance: Decimal,
    pub referral_balance: Decimal,
    pub hold: Decimal,
    pub permanent_place: Option<i64>,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub created_at: u64,
}

/// Fields required to create an account.
#[derive(Debug)]
pub struct NewAccount<'a> {
    pub email: &'a str,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub invite_code: &'a str,
    pub inviter_id: Option<AccountId>,
    pub line: i64,
    pub created_at: u64,
}

const COLUMNS: &str = "id, email, first_name, last_name, invite_code, can_invite, inviter_id, \
                       line, status, balance, referral_balance, hold, permanent_place, \
                       is_staff, is_superuser, created_at";

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AccountRow> {
    let status_text: String = row.get(8)?;
    let status = AccountStatus::parse(&status_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(AccountRow {
        id: row.get(0)?,
        email: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        invite_code: row.get(4)?,
        can_invite: row.get(5)?,
        inviter_id: row.get(6)?,
        line: row.get(7)?,
        status,
        balance: dec_col(row, 9)?,
        referral_balance: dec_col(row, 10)?,
        hold: dec_col(row, 11)?,
        permanent_place: row.get(12)?,
        is_staff: row.get(13)?,
        is_superuser: row.get(14)?,
        created_at: row.get::<_, i64>(15)? as u64,
    })
}

/// Insert a new account. Duplicate email or invite code is a constraint error.
pub fn insert(conn: &Connection, account: &NewAccount<'_>) -> Result<AccountId> {
    conn.execute(
        "INSERT INTO accounts (email, first_name, last_name, invite_code, inviter_id, line, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            account.email,
            account.first_name,
            account.last_name,
            account.invite_code,
            account.inviter_id,
            account.line,
            account.created_at as i64,
        ],
    )
    .map_err(|e| constraint(e, "account with this email or invite code already exists"))?;
    Ok(conn.last_insert_rowid())
}

/// Fetch an account by id.
pub fn by_id(conn: &Connection, id: AccountId) -> Result<AccountRow> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM accounts WHERE id = ?1"),
        [id],
        map_row,
    )
    .optional()?
    .ok_or_else(|| DbError::NotFound(format!("account {id}")))
}

/// Fetch an account by email, if present.
pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<AccountRow>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM accounts WHERE email = ?1"),
            [email],
            map_row,
        )
        .optional()?)
}

/// Fetch an account by invite code, if present.
pub fn find_by_invite_code(conn: &Connection, code: &str) -> Result<Option<AccountRow>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM accounts WHERE invite_code = ?1"),
            [code],
            map_row,
        )
        .optional()?)
}

/// All accounts directly invited by the given account, in insertion order.
pub fn invited_by(conn: &Connection, id: AccountId) -> Result<Vec<AccountRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM accounts WHERE inviter_id = ?1 ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([id], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// All accounts, ordered by email.
pub fn all(conn: &Connection) -> Result<Vec<AccountRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM accounts ORDER BY email"))?;
    let rows = stmt
        .query_map([], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Update the three denormalized balances in one statement.
pub fn set_balances(
    conn: &Connection,
    id: AccountId,
    balance: Decimal,
    referral_balance: Decimal,
    hold: Decimal,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE accounts SET balance = ?1, referral_balance = ?2, hold = ?3 WHERE id = ?4",
        rusqlite::params![dec_sql(balance), dec_sql(referral_balance), dec_sql(hold), id],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("account {id}")));
    }
    Ok(())
}

/// Update the derived status.
pub fn set_status(conn: &Connection, id: AccountId, status: AccountStatus) -> Result<()> {
    conn.execute(
        "UPDATE accounts SET status = ?1 WHERE id = ?2",
        rusqlite::params![status.as_str(), id],
    )?;
    Ok(())
}

/// Update the referral-tree depth.
pub fn set_line(conn: &Connection, id: AccountId, line: i64) -> Result<()> {
    conn.execute(
        "UPDATE accounts SET line = ?1 WHERE id = ?2",
        rusqlite::params![line, id],
    )?;
    Ok(())
}

/// Rebind the inviter reference. Cycle checking happens at the service layer.
pub fn set_inviter(conn: &Connection, id: AccountId, inviter_id: Option<AccountId>) -> Result<()> {
    conn.execute(
        "UPDATE accounts SET inviter_id = ?1 WHERE id = ?2",
        rusqlite::params![inviter_id, id],
    )?;
    Ok(())
}

/// Toggle the invite capability.
pub fn set_can_invite(conn: &Connection, id: AccountId, can_invite: bool) -> Result<()> {
    conn.execute(
        "UPDATE accounts SET can_invite = ?1 WHERE id = ?2",
        rusqlite::params![can_invite, id],
    )?;
    Ok(())
}

/// Set or clear the admin-assigned priority slot.
pub fn set_permanent_place(conn: &Connection, id: AccountId, place: Option<i64>) -> Result<()> {
    conn.execute(
        "UPDATE accounts SET permanent_place = ?1 WHERE id = ?2",
        rusqlite::params![place, id],
    )?;
    Ok(())
}

/// Shift every assigned priority slot at or above `number` by `delta`.
pub fn shift_permanent_places(conn: &Connection, number: i64, delta: i64) -> Result<()> {
    conn.execute(
        "UPDATE accounts SET permanent_place = permanent_place + ?1 \
         WHERE permanent_place IS NOT NULL AND permanent_place >= ?2",
        rusqlite::params![delta, number],
    )?;
    Ok(())
}

/// Accounts holding a priority slot, ordered by slot.
pub fn with_permanent_place(conn: &Connection) -> Result<Vec<AccountRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM accounts WHERE permanent_place IS NOT NULL ORDER BY permanent_place"
    ))?;
    let rows = stmt
        .query_map([], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Update staff/superuser capability flags.
pub fn set_admin_flags(
    conn: &Connection,
    id: AccountId,
    is_staff: bool,
    is_superuser: bool,
) -> Result<()> {
    conn.execute(
        "UPDATE accounts SET is_staff = ?1, is_superuser = ?2 WHERE id = ?3",
        rusqlite::params![is_staff, is_superuser, id],
    )?;
    Ok(())
}

/// Grant a named permission (idempotent).
pub fn grant_permission(conn: &Connection, id: AccountId, permission: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO account_permissions (account_id, permission) VALUES (?1, ?2)",
        rusqlite::params![id, permission],
    )?;
    Ok(())
}

/// Remove every named permission.
pub fn clear_permissions(conn: &Connection, id: AccountId) -> Result<()> {
    conn.execute(
        "DELETE FROM account_permissions WHERE account_id = ?1",
        [id],
    )?;
    Ok(())
}

/// Named permissions held by the account.
pub fn permissions(conn: &Connection, id: AccountId) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT permission FROM account_permissions WHERE account_id = ?1 ORDER BY permission",
    )?;
    let rows = stmt
        .query_map([id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Whether the account holds the named permission.
pub fn has_permission(conn: &Connection, id: AccountId, permission: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM account_permissions WHERE account_id = ?1 AND permission = ?2",
        rusqlite::params![id, permission],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    fn create(conn: &Connection, email: &str, inviter: Option<AccountId>, line: i64) -> AccountId {
        insert(
            conn,
            &NewAccount {
                email,
                first_name: None,
                last_name: None,
                invite_code: &format!("code-{email}"),
                inviter_id: inviter,
                line,
                created_at: 1_700_000_000,
            },
        )
        .expect("insert account")
    }

    #[test]
    fn test_insert_and_fetch() {
        let conn = test_db();
        let id = create(&conn, "a@example.com", None, 1);
        let row = by_id(&conn, id).expect("fetch");
        assert_eq!(row.email, "a@example.com");
        assert_eq!(row.line, 1);
        assert_eq!(row.status, AccountStatus::NotActive);
        assert_eq!(row.balance, Decimal::ZERO);
        assert!(row.inviter_id.is_none());
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let conn = test_db();
        create(&conn, "a@example.com", None, 1);
        let result = insert(
            &conn,
            &NewAccount {
                email: "a@example.com",
                first_name: None,
                last_name: None,
                invite_code: "other-code",
                inviter_id: None,
                line: 1,
                created_at: 0,
            },
        );
        assert!(matches!(result, Err(DbError::Constraint(_))));
    }

    #[test]
    fn test_invited_by() {
        let conn = test_db();
        let root = create(&conn, "root@example.com", None, 1);
        let a = create(&conn, "a@example.com", Some(root), 2);
        let b = create(&conn, "b@example.com", Some(root), 2);
        create(&conn, "c@example.com", Some(a), 3);

        let invited = invited_by(&conn, root).expect("invited");
        assert_eq!(invited.len(), 2);
        assert_eq!(invited[0].id, a);
        assert_eq!(invited[1].id, b);
    }

    #[test]
    fn test_balances_update() {
        let conn = test_db();
        let id = create(&conn, "a@example.com", None, 1);
        set_balances(
            &conn,
            id,
            Decimal::from(1000),
            Decimal::from(25),
            Decimal::from(100),
        )
        .expect("set balances");

        let row = by_id(&conn, id).expect("fetch");
        assert_eq!(row.balance, Decimal::from(1000));
        assert_eq!(row.referral_balance, Decimal::from(25));
        assert_eq!(row.hold, Decimal::from(100));
    }

    #[test]
    fn test_permanent_place_shift() {
        let conn = test_db();
        let a = create(&conn, "a@example.com", None, 1);
        let b = create(&conn, "b@example.com", None, 1);
        set_permanent_place(&conn, a, Some(2)).expect("set");
        set_permanent_place(&conn, b, Some(3)).expect("set");

        shift_permanent_places(&conn, 2, 1).expect("shift");
        assert_eq!(by_id(&conn, a).expect("a").permanent_place, Some(3));
        assert_eq!(by_id(&conn, b).expect("b").permanent_place, Some(4));
    }

    #[test]
    fn test_permissions() {
        let conn = test_db();
        let id = create(&conn, "a@example.com", None, 1);
        grant_permission(&conn, id, "ido").expect("grant");
        grant_permission(&conn, id, "ido").expect("grant twice is fine");
        grant_permission(&conn, id, "news").expect("grant");

        assert!(has_permission(&conn, id, "ido").expect("check"));
        assert!(!has_permission(&conn, id, "transaction").expect("check"));
        assert_eq!(permissions(&conn, id).expect("list"), vec!["ido", "news"]);

        clear_permissions(&conn, id).expect("clear");
        assert!(permissions(&conn, id).expect("list").is_empty());
    }

    #[test]
    fn test_missing_account() {
        let conn = test_db();
        assert!(matches!(by_id(&conn, 42), Err(DbError::NotFound(_))));
    }
}
