//! Derived account status.
//!
//! Recomputed after every ledger mutation: `active` with at least one
//! participation, `passive` with a balance at or above the queue floor,
//! `not_active` otherwise.

use rusqlite::Connection;

use idopad_db::queries::{accounts, participations};
use idopad_types::{money, AccountId, AccountStatus};

use crate::Result;

/// Recompute and store the status of an account. Returns the new status.
pub fn recompute(conn: &Connection, account_id: AccountId) -> Result<AccountStatus> {
    let account = accounts::by_id(conn, account_id)?;

    let status = if participations::any_for_account(conn, account_id)? {
        AccountStatus::Active
    } else if account.balance >= money::queue_min_balance() {
        AccountStatus::Passive
    } else {
        AccountStatus::NotActive
    };

    if status != account.status {
        accounts::set_status(conn, account_id, status)?;
    }
    Ok(status)
}
