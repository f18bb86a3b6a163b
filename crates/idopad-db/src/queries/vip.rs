//! VIP override query functions.

use rusqlite::{Connection, OptionalExtension};
use rust_decimal::Decimal;

use idopad_types::AccountId;

use crate::queries::{dec_col, dec_sql};
use crate::{DbError, Result};

/// A VIP row: an admin-configured referral percentage override.
#[derive(Clone, Debug)]
pub struct VipRow {
    pub account_id: AccountId,
    pub profit_pct: Decimal,
}

/// Set (or replace) an account's VIP referral percentage.
pub fn set(conn: &Connection, account_id: AccountId, profit_pct: Decimal) -> Result<()> {
    conn.execute(
        "INSERT INTO vip_accounts (account_id, profit_pct) VALUES (?1, ?2)
         ON CONFLICT(account_id) DO UPDATE SET profit_pct = excluded.profit_pct",
        rusqlite::params![account_id, dec_sql(profit_pct)],
    )?;
    Ok(())
}

/// Remove an account's VIP status.
pub fn remove(conn: &Connection, account_id: AccountId) -> Result<()> {
    let deleted = conn.execute("DELETE FROM vip_accounts WHERE account_id = ?1", [account_id])?;
    if deleted == 0 {
        return Err(DbError::NotFound(format!("vip account {account_id}")));
    }
    Ok(())
}

/// The configured override, if the account is VIP.
pub fn profit_pct(conn: &Connection, account_id: AccountId) -> Result<Option<Decimal>> {
    Ok(conn
        .query_row(
            "SELECT account_id, profit_pct FROM vip_accounts WHERE account_id = ?1",
            [account_id],
            |row| {
                Ok(VipRow {
                    account_id: row.get(0)?,
                    profit_pct: dec_col(row, 1)?,
                })
            },
        )
        .optional()?
        .map(|row| row.profit_pct))
}

/// All VIP rows.
pub fn all(conn: &Connection) -> Result<Vec<VipRow>> {
    let mut stmt =
        conn.prepare("SELECT account_id, profit_pct FROM vip_accounts ORDER BY account_id")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(VipRow {
                account_id: row.get(0)?,
                profit_pct: dec_col(row, 1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::accounts;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    fn test_account(conn: &Connection) -> AccountId {
        accounts::insert(
            conn,
            &accounts::NewAccount {
                email: "vip@example.com",
                first_name: None,
                last_name: None,
                invite_code: "code-vip",
                inviter_id: None,
                line: 1,
                created_at: 0,
            },
        )
        .expect("account")
    }

    #[test]
    fn test_set_and_get() {
        let conn = test_db();
        let id = test_account(&conn);
        assert_eq!(profit_pct(&conn, id).expect("query"), None);

        set(&conn, id, Decimal::from(10)).expect("set");
        assert_eq!(profit_pct(&conn, id).expect("query"), Some(Decimal::from(10)));

        // Replacing updates in place.
        set(&conn, id, Decimal::from(12)).expect("replace");
        assert_eq!(profit_pct(&conn, id).expect("query"), Some(Decimal::from(12)));
        assert_eq!(all(&conn).expect("all").len(), 1);
    }

    #[test]
    fn test_remove() {
        let conn = test_db();
        let id = test_account(&conn);
        set(&conn, id, Decimal::from(10)).expect("set");
        remove(&conn, id).expect("remove");
        assert_eq!(profit_pct(&conn, id).expect("query"), None);
        assert!(matches!(remove(&conn, id), Err(DbError::NotFound(_))));
    }
}
