//! Shared fixtures for the idopad integration tests.

use rusqlite::Connection;
use rust_decimal::Decimal;

use idopad_db::queries::accounts::{self, NewAccount};
use idopad_db::queries::offerings::{self, NewOffering};
use idopad_db::queries::{coins, wallets};
use idopad_types::AccountId;

/// Base timestamp for test scenarios.
pub const BASE_TIME: u64 = 1_700_000_000;

/// Open a fresh in-memory database.
pub fn test_db() -> Connection {
    idopad_db::open_memory().expect("open in-memory db")
}

/// Create the main platform wallet for the quote coin.
pub fn setup_platform(conn: &Connection) -> i64 {
    let quote = coins::quote_coin(conn).expect("quote coin");
    let addr =
        wallets::create_address(conn, "0xplatform", Some(quote.id), true).expect("platform addr");
    wallets::create_admin_wallet(conn, addr, 8).expect("platform wallet")
}

/// Create an account with a bound wallet and the given balance.
pub fn member_with_wallet(
    conn: &Connection,
    email: &str,
    balance: i64,
    inviter: Option<AccountId>,
) -> AccountId {
    let line = match inviter {
        Some(id) => accounts::by_id(conn, id).expect("inviter").line + 1,
        None => 1,
    };
    let id = accounts::insert(
        conn,
        &NewAccount {
            email,
            first_name: None,
            last_name: None,
            invite_code: &format!("code-{email}"),
            inviter_id: inviter,
            line,
            created_at: BASE_TIME,
        },
    )
    .expect("insert account");
    let addr = wallets::create_address(conn, &format!("0x{email}"), None, false)
        .expect("member address");
    wallets::bind_member_wallet(conn, id, addr).expect("bind wallet");
    accounts::set_balances(conn, id, Decimal::from(balance), Decimal::ZERO, Decimal::ZERO)
        .expect("fund");
    id
}

/// Create a standard offering: pool 1000, per-person 100.
pub fn standard_offering(conn: &Connection) -> i64 {
    offerings::insert(
        conn,
        &NewOffering {
            name: "Standard Round",
            description: "integration fixture",
            general_allocation: Decimal::from(1000),
            person_allocation: Decimal::from(100),
            vesting: "6 months",
            created_at: BASE_TIME,
            ..Default::default()
        },
    )
    .expect("offering")
}
