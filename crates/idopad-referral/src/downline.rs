//! Downline traversal.
//!
//! The downline of an account is every account directly or transitively
//! invited by it. Traversal is an explicit work-stack loop: the account's
//! direct invitees seed the stack, each popped account is accumulated and
//! its own invitees pushed. Processing order is therefore depth-first,
//! last-discovered-first.

use std::collections::BTreeMap;

use rusqlite::Connection;
use serde::Serialize;

use idopad_db::queries::accounts::{self, AccountRow};
use idopad_types::{AccountId, AccountStatus};

use crate::Result;

/// One downline member, serialized with identity and aggregate metrics.
#[derive(Clone, Debug, Serialize)]
pub struct DownlineMember {
    pub id: AccountId,
    pub email: String,
    pub line: i64,
    pub status: AccountStatus,
    pub can_invite: bool,
}

impl From<&AccountRow> for DownlineMember {
    fn from(row: &AccountRow) -> Self {
        Self {
            id: row.id,
            email: row.email.clone(),
            line: row.line,
            status: row.status,
            can_invite: row.can_invite,
        }
    }
}

/// The downline of an account: members grouped by tree depth, plus status
/// counts across the whole tree.
#[derive(Clone, Debug, Default, Serialize)]
pub struct DownlineReport {
    /// Members keyed by `line`, in discovery order within each depth.
    pub by_line: BTreeMap<i64, Vec<DownlineMember>>,
    pub active: usize,
    pub passive: usize,
    pub not_active: usize,
}

impl DownlineReport {
    /// Total number of downline members.
    pub fn total(&self) -> usize {
        self.by_line.values().map(Vec::len).sum()
    }
}

/// Walk the downline of `root`.
pub fn downline(conn: &Connection, root: AccountId) -> Result<DownlineReport> {
    let mut report = DownlineReport::default();
    let mut stack = accounts::invited_by(conn, root)?;

    while let Some(member) = stack.pop() {
        match member.status {
            AccountStatus::Active => report.active += 1,
            AccountStatus::Passive => report.passive += 1,
            AccountStatus::NotActive => report.not_active += 1,
        }
        report
            .by_line
            .entry(member.line)
            .or_default()
            .push(DownlineMember::from(&member));

        stack.extend(accounts::invited_by(conn, member.id)?);
    }

    Ok(report)
}
