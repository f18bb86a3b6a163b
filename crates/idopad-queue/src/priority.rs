//! Permanent-slot management.
//!
//! Granting a slot shifts other slot holders up, then refreshes the
//! account's existing queue entries so each queue stays dense. Clearing a
//! slot shifts holders down and re-queues the account's entries as
//! transient.

use rusqlite::Connection;

use idopad_db::queries::accounts;
use idopad_db::queries::queue::{self, QueueEntryRow};
use idopad_types::AccountId;

use crate::{QueueError, Result};

/// Grant (or move) an account's permanent priority slot.
pub fn set_permanent_place(conn: &Connection, account_id: AccountId, number: i64) -> Result<()> {
    if number < 1 {
        return Err(QueueError::InvalidNumber(number));
    }

    let account = accounts::by_id(conn, account_id)?;

    // Moving an existing slot first releases it.
    if let Some(old) = account.permanent_place {
        accounts::set_permanent_place(conn, account_id, None)?;
        accounts::shift_permanent_places(conn, old + 1, -1)?;
    }

    accounts::shift_permanent_places(conn, number, 1)?;
    accounts::set_permanent_place(conn, account_id, Some(number))?;

    for entry in queue::by_account(conn, account_id)? {
        move_entry(conn, &entry, number, true)?;
    }

    tracing::info!(account = account_id, number, "permanent place granted");
    Ok(())
}

/// Clear an account's permanent priority slot.
///
/// The account's queue entries become transient, re-inserted at the lowest
/// transient position at or after the vacated slot (or the tail when none
/// exists).
pub fn clear_permanent_place(conn: &Connection, account_id: AccountId) -> Result<()> {
    let account = accounts::by_id(conn, account_id)?;
    let Some(place) = account.permanent_place else {
        return Err(QueueError::NoPermanentPlace(account_id));
    };

    accounts::shift_permanent_places(conn, place + 1, -1)?;
    accounts::set_permanent_place(conn, account_id, None)?;

    for entry in queue::by_account(conn, account_id)? {
        let vacated = entry.number;
        // Remove from the current slot, keeping the queue dense.
        queue::set_position(conn, entry.id, 0, false)?;
        queue::shift_above(conn, entry.offering_id, vacated, -1)?;

        let target = match queue::min_transient_from(conn, entry.offering_id, vacated)? {
            Some(min_transient) => min_transient,
            None => queue::max_number(conn, entry.offering_id)?.unwrap_or(0) + 1,
        };
        queue::shift_from(conn, entry.offering_id, target, 1)?;
        queue::set_position(conn, entry.id, target, false)?;
    }

    tracing::info!(account = account_id, place, "permanent place cleared");
    Ok(())
}

/// Move a queue entry to `target`, keeping numbering dense.
fn move_entry(conn: &Connection, entry: &QueueEntryRow, target: i64, permanent: bool) -> Result<()> {
    // Park the entry outside the ordering, close the gap, then re-insert.
    queue::set_position(conn, entry.id, 0, permanent)?;
    queue::shift_above(conn, entry.offering_id, entry.number, -1)?;

    let tail = queue::max_number(conn, entry.offering_id)?.unwrap_or(0) + 1;
    let number = target.min(tail);
    queue::shift_from(conn, entry.offering_id, number, 1)?;
    queue::set_position(conn, entry.id, number, permanent)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::{join, numbers_are_dense};
    use idopad_db::queries::offerings::{self, OfferingRow};
    use idopad_db::queries::{accounts as accq, queue as qq};
    use rust_decimal::Decimal;

    fn test_db() -> Connection {
        idopad_db::open_memory().expect("open test db")
    }

    fn offering(conn: &Connection) -> OfferingRow {
        let id = offerings::insert(
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
        offerings::by_id(conn, id).expect("fetch")
    }

    fn member(conn: &Connection, email: &str) -> AccountId {
        let id = accq::insert(
            conn,
            &accq::NewAccount {
                email,
                first_name: None,
                last_name: None,
                invite_code: &format!("code-{email}"),
                inviter_id: None,
                line: 1,
                created_at: 0,
            },
        )
        .expect("account");
        accq::set_balances(conn, id, Decimal::from(1000), Decimal::ZERO, Decimal::ZERO)
            .expect("fund");
        id
    }

    fn queue_numbers(conn: &Connection, offering: &OfferingRow) -> Vec<(AccountId, i64, bool)> {
        qq::by_offering(conn, offering.id)
            .expect("list")
            .iter()
            .map(|e| (e.account_id, e.number, e.permanent))
            .collect()
    }

    /// Five queued accounts; granting place 2 to the one at number 3 moves
    /// it to 2 and keeps the numbering dense with no duplicate 2s.
    #[test]
    fn test_grant_moves_entry_densely() {
        let conn = test_db();
        let offering = offering(&conn);
        let ids: Vec<AccountId> = (0..5)
            .map(|i| member(&conn, &format!("u{i}@example.com")))
            .collect();
        for id in &ids {
            let row = accq::by_id(&conn, *id).expect("row");
            join(&conn, &offering, &row, 0).expect("join");
        }

        set_permanent_place(&conn, ids[2], 2).expect("grant");

        let placed = queue_numbers(&conn, &offering);
        assert_eq!(placed.len(), 5);
        assert!(numbers_are_dense(&conn, offering.id).expect("dense"));

        let moved = qq::find(&conn, offering.id, ids[2]).expect("find").expect("entry");
        assert_eq!(moved.number, 2);
        assert!(moved.permanent);

        // No duplicate numbers.
        let mut seen: Vec<i64> = placed.iter().map(|(_, n, _)| *n).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);

        assert_eq!(
            accq::by_id(&conn, ids[2]).expect("row").permanent_place,
            Some(2)
        );
    }

    #[test]
    fn test_grant_shifts_other_slot_holders() {
        let conn = test_db();
        let a = member(&conn, "a@example.com");
        let b = member(&conn, "b@example.com");
        set_permanent_place(&conn, a, 2).expect("grant a");
        set_permanent_place(&conn, b, 2).expect("grant b");

        assert_eq!(accq::by_id(&conn, b).expect("b").permanent_place, Some(2));
        assert_eq!(accq::by_id(&conn, a).expect("a").permanent_place, Some(3));
    }

    #[test]
    fn test_grant_rejects_zero() {
        let conn = test_db();
        let a = member(&conn, "a@example.com");
        assert!(matches!(
            set_permanent_place(&conn, a, 0),
            Err(QueueError::InvalidNumber(0))
        ));
    }

    #[test]
    fn test_clear_requeues_transiently() {
        let conn = test_db();
        let offering = offering(&conn);
        let ids: Vec<AccountId> = (0..4)
            .map(|i| member(&conn, &format!("u{i}@example.com")))
            .collect();
        for id in &ids {
            let row = accq::by_id(&conn, *id).expect("row");
            join(&conn, &offering, &row, 0).expect("join");
        }

        set_permanent_place(&conn, ids[3], 1).expect("grant");
        assert_eq!(
            qq::find(&conn, offering.id, ids[3]).expect("find").expect("e").number,
            1
        );

        clear_permanent_place(&conn, ids[3]).expect("clear");

        assert!(numbers_are_dense(&conn, offering.id).expect("dense"));
        let entry = qq::find(&conn, offering.id, ids[3]).expect("find").expect("e");
        assert!(!entry.permanent);
        // The vacated head slot backfills with the first transient entry;
        // the cleared account re-queues at the lowest transient position.
        assert_eq!(entry.number, 1);
        assert_eq!(accq::by_id(&conn, ids[3]).expect("row").permanent_place, None);
    }

    #[test]
    fn test_clear_without_slot_rejected() {
        let conn = test_db();
        let a = member(&conn, "a@example.com");
        assert!(matches!(
            clear_permanent_place(&conn, a),
            Err(QueueError::NoPermanentPlace(_))
        ));
    }

    #[test]
    fn test_move_between_slots() {
        let conn = test_db();
        let offering = offering(&conn);
        let ids: Vec<AccountId> = (0..3)
            .map(|i| member(&conn, &format!("u{i}@example.com")))
            .collect();
        for id in &ids {
            let row = accq::by_id(&conn, *id).expect("row");
            join(&conn, &offering, &row, 0).expect("join");
        }

        set_permanent_place(&conn, ids[0], 3).expect("to tail");
        assert!(numbers_are_dense(&conn, offering.id).expect("dense"));
        set_permanent_place(&conn, ids[0], 1).expect("back to head");
        assert!(numbers_are_dense(&conn, offering.id).expect("dense"));

        let entry = qq::find(&conn, offering.id, ids[0]).expect("find").expect("e");
        assert_eq!(entry.number, 1);
    }
}
