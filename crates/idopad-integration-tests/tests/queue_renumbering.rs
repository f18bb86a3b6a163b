//! Integration test: queue numbers stay dense through every operation.

use rusqlite::Connection;
use rust_decimal::Decimal;

use idopad_db::queries::{accounts, queue};
use idopad_integration_tests::{member_with_wallet, standard_offering, test_db};
use idopad_queue::{placement, priority};
use idopad_types::AccountId;

fn join(conn: &Connection, offering_id: i64, account_id: AccountId) {
    let offering = idopad_db::queries::offerings::by_id(conn, offering_id).expect("offering");
    let account = accounts::by_id(conn, account_id).expect("account");
    placement::join(conn, &offering, &account, 0).expect("join");
}

fn numbers(conn: &Connection, offering_id: i64) -> Vec<i64> {
    queue::by_offering(conn, offering_id)
        .expect("entries")
        .iter()
        .map(|e| e.number)
        .collect()
}

#[test]
fn numbers_stay_dense_through_grants_and_clears() {
    let conn = test_db();
    let offering = standard_offering(&conn);
    let ids: Vec<AccountId> = (0..5)
        .map(|i| member_with_wallet(&conn, &format!("u{i}@example.com"), 1000, None))
        .collect();
    for id in &ids {
        join(&conn, offering, *id);
    }
    assert_eq!(numbers(&conn, offering), vec![1, 2, 3, 4, 5]);

    // Grant place 2 to the account at number 3.
    priority::set_permanent_place(&conn, ids[2], 2).expect("grant");
    assert_eq!(numbers(&conn, offering), vec![1, 2, 3, 4, 5]);
    let moved = queue::find(&conn, offering, ids[2]).expect("find").expect("entry");
    assert_eq!(moved.number, 2);
    assert!(moved.permanent);

    // Grant place 1 to another account; both permanent holders remain
    // dense and ordered.
    priority::set_permanent_place(&conn, ids[4], 1).expect("grant head");
    assert_eq!(numbers(&conn, offering), vec![1, 2, 3, 4, 5]);
    assert_eq!(
        queue::find(&conn, offering, ids[4]).expect("find").expect("e").number,
        1
    );
    // The earlier grantee was pushed by the slot shift.
    assert_eq!(
        accounts::by_id(&conn, ids[2]).expect("row").permanent_place,
        Some(3)
    );

    // Clearing a slot keeps density and demotes to transient.
    priority::clear_permanent_place(&conn, ids[4]).expect("clear");
    assert_eq!(numbers(&conn, offering), vec![1, 2, 3, 4, 5]);
    let cleared = queue::find(&conn, offering, ids[4]).expect("find").expect("entry");
    assert!(!cleared.permanent);
}

#[test]
fn permanent_holder_joins_at_slot() {
    let conn = test_db();
    let offering = standard_offering(&conn);
    for i in 0..3 {
        let id = member_with_wallet(&conn, &format!("u{i}@example.com"), 1000, None);
        join(&conn, offering, id);
    }

    let vip = member_with_wallet(&conn, "vip@example.com", 1000, None);
    priority::set_permanent_place(&conn, vip, 2).expect("grant before joining");
    join(&conn, offering, vip);

    assert_eq!(numbers(&conn, offering), vec![1, 2, 3, 4]);
    let entry = queue::find(&conn, offering, vip).expect("find").expect("entry");
    assert_eq!(entry.number, 2);
    assert!(entry.permanent);
}

#[test]
fn balance_drain_does_not_disturb_queue() {
    // Queue entries persist independently of later balance changes; only
    // join-time enforces the floor.
    let conn = test_db();
    let offering = standard_offering(&conn);
    let id = member_with_wallet(&conn, "u@example.com", 1000, None);
    join(&conn, offering, id);

    accounts::set_balances(&conn, id, Decimal::from(10), Decimal::ZERO, Decimal::ZERO)
        .expect("drain");
    assert_eq!(numbers(&conn, offering), vec![1]);
}
