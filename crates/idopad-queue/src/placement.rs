//! Joining an offering queue and acting from a queue position.

use rusqlite::Connection;

use idopad_db::queries::accounts::AccountRow;
use idopad_db::queries::offerings::OfferingRow;
use idopad_db::queries::queue::{self, QueueEntryRow};
use idopad_types::money;

use crate::{QueueError, Result};

/// Append an account to an offering's queue.
///
/// An account holding a `permanent_place` is inserted at exactly that
/// number and everything at or above it shifts up by one; otherwise the
/// account lands at the current tail.
///
/// Callers provide the surrounding SQLite transaction.
pub fn join(
    conn: &Connection,
    offering: &OfferingRow,
    account: &AccountRow,
    now: u64,
) -> Result<QueueEntryRow> {
    if offering.without_pay {
        return Err(QueueError::ManualQueue(offering.id));
    }
    if account.balance < money::queue_min_balance() {
        return Err(QueueError::BalanceTooLow {
            required: money::queue_min_balance().to_string(),
            available: account.balance.to_string(),
        });
    }
    if queue::find(conn, offering.id, account.id)?.is_some() {
        return Err(QueueError::AlreadyQueued {
            offering: offering.id,
            account: account.id,
        });
    }

    let tail = queue::max_number(conn, offering.id)?.unwrap_or(0) + 1;
    let (number, permanent) = match account.permanent_place {
        // A permanent slot past the tail still lands at the tail; numbers
        // stay dense.
        Some(place) => (place.min(tail), true),
        None => (tail, false),
    };

    queue::shift_from(conn, offering.id, number, 1)?;
    let id = queue::insert(conn, offering.id, account.id, number, permanent, now)?;

    tracing::debug!(
        offering = offering.id,
        account = account.id,
        number,
        permanent,
        "queue join"
    );

    Ok(QueueEntryRow {
        id,
        offering_id: offering.id,
        account_id: account.id,
        number,
        permanent,
        created_at: now,
    })
}

/// Whether a queue position is within the offering's participant capacity.
pub fn position_allows_participation(entry_number: i64, offering: &OfferingRow) -> bool {
    entry_number <= offering.max_participants()
}

/// Reject positions past the participant capacity.
pub fn require_eligible_position(entry_number: i64, offering: &OfferingRow) -> Result<()> {
    let limit = offering.max_participants();
    if entry_number > limit {
        return Err(QueueError::PositionIneligible {
            number: entry_number,
            limit,
        });
    }
    Ok(())
}

/// Assert the dense-numbering invariant of an offering queue (test aid).
pub fn numbers_are_dense(conn: &Connection, offering_id: idopad_types::OfferingId) -> Result<bool> {
    let entries = queue::by_offering(conn, offering_id)?;
    Ok(entries
        .iter()
        .enumerate()
        .all(|(index, entry)| entry.number == index as i64 + 1))
}
