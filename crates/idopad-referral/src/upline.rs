//! Upline resolution and inviter assignment.
//!
//! The inviter relationship is a weak back-reference (account id). Cycles
//! are rejected at write time; the walkers themselves assume an acyclic
//! graph.

use rusqlite::Connection;

use idopad_db::queries::accounts::{self, AccountRow};
use idopad_types::AccountId;

use crate::{ReferralError, Result};

/// The ordered inviter chain of an account, nearest first, up to the root.
pub fn upline_chain(conn: &Connection, account: AccountId) -> Result<Vec<AccountRow>> {
    let mut chain = Vec::new();
    let mut current = accounts::by_id(conn, account)?.inviter_id;

    while let Some(id) = current {
        let inviter = accounts::by_id(conn, id)?;
        current = inviter.inviter_id;
        chain.push(inviter);
    }

    Ok(chain)
}

/// The `line` an account gets under the given inviter.
pub fn line_under(inviter: Option<&AccountRow>) -> i64 {
    inviter.map_or(1, |row| row.line + 1)
}

/// Rebind an account's inviter, maintaining the `line` invariant for the
/// account and its whole downline.
///
/// # Errors
///
/// - [`ReferralError::SelfInvite`] when `inviter == account`
/// - [`ReferralError::CycleDetected`] when the account is reachable from
///   the candidate inviter's own upline chain
pub fn assign_inviter(
    conn: &Connection,
    account: AccountId,
    inviter: Option<AccountId>,
) -> Result<()> {
    let inviter_row = match inviter {
        Some(id) => {
            if id == account {
                return Err(ReferralError::SelfInvite(account));
            }
            let row = accounts::by_id(conn, id)?;
            if row.id == account || upline_chain(conn, id)?.iter().any(|u| u.id == account) {
                return Err(ReferralError::CycleDetected {
                    account,
                    inviter: id,
                });
            }
            Some(row)
        }
        None => None,
    };

    accounts::set_inviter(conn, account, inviter)?;
    let line = line_under(inviter_row.as_ref());
    accounts::set_line(conn, account, line)?;
    reline_downline(conn, account, line)?;

    tracing::debug!(account, ?inviter, line, "inviter reassigned");
    Ok(())
}

/// Recompute `line` for every downline member after the root moved.
fn reline_downline(conn: &Connection, root: AccountId, root_line: i64) -> Result<()> {
    let mut stack: Vec<(AccountId, i64)> = accounts::invited_by(conn, root)?
        .into_iter()
        .map(|row| (row.id, root_line + 1))
        .collect();

    while let Some((id, line)) = stack.pop() {
        accounts::set_line(conn, id, line)?;
        stack.extend(
            accounts::invited_by(conn, id)?
                .into_iter()
                .map(|row| (row.id, line + 1)),
        );
    }

    Ok(())
}
