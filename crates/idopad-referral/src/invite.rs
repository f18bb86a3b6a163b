//! Invite-code resolution for registration.

use rusqlite::Connection;

use idopad_db::queries::accounts::{self, AccountRow};

use crate::{ReferralError, Result};

/// Resolve an invite code to its owner, enforcing the invite capability.
///
/// # Errors
///
/// - [`ReferralError::InviterNotFound`] when no account owns the code
/// - [`ReferralError::InviteNotAllowed`] when the owner lacks `can_invite`
pub fn resolve_invite_code(conn: &Connection, code: &str) -> Result<AccountRow> {
    let owner = accounts::find_by_invite_code(conn, code)?
        .ok_or_else(|| ReferralError::InviterNotFound(code.to_string()))?;

    if !owner.can_invite {
        return Err(ReferralError::InviteNotAllowed(owner.id));
    }

    Ok(owner)
}
