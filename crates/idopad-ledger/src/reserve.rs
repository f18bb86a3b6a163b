//! Reserve movements: deposits, withdrawals and referral-balance handling.

use rusqlite::Connection;
use rust_decimal::Decimal;

use idopad_db::queries::accounts;
use idopad_db::queries::transactions::{self, NewTransaction, TxFlags};
use idopad_db::queries::wallets::{self, AdminWalletRow};
use idopad_db::queries::{coins, offerings, queue};
use idopad_queue::placement;
use idopad_queue::QueueError;
use idopad_types::{money, AccountId, OfferingId};

use crate::{begin, bound_wallet, main_wallet, status, LedgerError, Result};

/// Outcome of a deposit.
#[derive(Clone, Debug)]
pub struct DepositOutcome {
    pub new_balance: Decimal,
    /// Queues the account was auto-enrolled into on crossing the floor.
    pub auto_enrolled: Vec<OfferingId>,
}

/// Outcome of a withdrawal.
#[derive(Clone, Debug)]
pub struct WithdrawOutcome {
    /// Amount paid out to the member wallet.
    pub paid: Decimal,
    /// Flat commission kept by the platform.
    pub fee: Decimal,
    pub new_balance: Decimal,
}

/// Deposit quote funds into the account reserve.
///
/// Records a fill-up transaction from the member wallet to the platform
/// wallet and credits both denormalized balances. Crossing the queue floor
/// from below auto-enrolls the account into every open queue.
pub fn deposit(
    conn: &mut Connection,
    account_id: AccountId,
    amount: Decimal,
    now: u64,
) -> Result<DepositOutcome> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(amount.to_string()));
    }

    let tx = begin(conn)?;
    let account = accounts::by_id(&tx, account_id)?;
    let wallet = bound_wallet(&tx, account_id)?;
    let admin = main_wallet(&tx)?;
    let quote = coins::quote_coin(&tx)?;

    transactions::insert(
        &tx,
        &NewTransaction {
            address_from_id: wallet.address_id,
            address_to_id: admin.address_id,
            coin_id: quote.id,
            amount,
            flags: TxFlags {
                fill_up: true,
                ..Default::default()
            },
            correlation_id: None,
            created_at: now,
        },
    )?;

    let new_balance = account.balance + amount;
    accounts::set_balances(&tx, account_id, new_balance, account.referral_balance, account.hold)?;
    wallets::set_admin_balance(&tx, admin.id, admin.balance + amount)?;

    let auto_enrolled = if account.balance < money::queue_min_balance()
        && new_balance >= money::queue_min_balance()
    {
        auto_enroll(&tx, account_id, now)?
    } else {
        Vec::new()
    };

    status::recompute(&tx, account_id)?;
    tx.commit().map_err(idopad_db::DbError::from)?;

    tracing::info!(account = account_id, %amount, %new_balance, "deposit");
    Ok(DepositOutcome {
        new_balance,
        auto_enrolled,
    })
}

/// Join every open queue the account is absent from.
fn auto_enroll(conn: &Connection, account_id: AccountId, now: u64) -> Result<Vec<OfferingId>> {
    let account = accounts::by_id(conn, account_id)?;
    let mut enrolled = Vec::new();

    for offering in offerings::open_for_queueing(conn)? {
        if queue::find(conn, offering.id, account_id)?.is_some() {
            continue;
        }
        match placement::join(conn, &offering, &account, now) {
            Ok(entry) => {
                tracing::debug!(
                    account = account_id,
                    offering = offering.id,
                    number = entry.number,
                    "auto-enrolled on crossing the queue floor"
                );
                enrolled.push(offering.id);
            }
            Err(QueueError::AlreadyQueued { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(enrolled)
}

fn withdraw_shape(
    conn: &Connection,
    admin: &AdminWalletRow,
    account_id: AccountId,
    amount: Decimal,
    now: u64,
) -> Result<Decimal> {
    let wallet = bound_wallet(conn, account_id)?;
    let quote = coins::quote_coin(conn)?;
    let fee = money::withdraw_fee();

    if admin.balance < amount {
        return Err(LedgerError::InsufficientReserve {
            required: amount.to_string(),
            available: admin.balance.to_string(),
        });
    }

    transactions::insert(
        conn,
        &NewTransaction {
            address_from_id: admin.address_id,
            address_to_id: wallet.address_id,
            coin_id: quote.id,
            amount,
            flags: TxFlags {
                received: true,
                ..Default::default()
            },
            correlation_id: None,
            created_at: now,
        },
    )?;
    transactions::insert(
        conn,
        &NewTransaction {
            address_from_id: wallet.address_id,
            address_to_id: admin.address_id,
            coin_id: quote.id,
            amount: fee,
            flags: TxFlags {
                commission: true,
                ..Default::default()
            },
            correlation_id: None,
            created_at: now,
        },
    )?;

    wallets::set_admin_balance(conn, admin.id, admin.balance - amount + fee)?;
    Ok(fee)
}

/// Withdraw from the main balance.
///
/// Requires `balance >= amount + fee`, with the frozen `hold` untouched.
/// Emits a received-flagged payout and a commission-flagged fee row.
pub fn withdraw(
    conn: &mut Connection,
    account_id: AccountId,
    amount: Decimal,
    now: u64,
) -> Result<WithdrawOutcome> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(amount.to_string()));
    }

    let tx = begin(conn)?;
    let account = accounts::by_id(&tx, account_id)?;
    let admin = main_wallet(&tx)?;
    let fee = money::withdraw_fee();

    if account.hold > Decimal::ZERO && account.balance < account.hold + amount + fee {
        return Err(LedgerError::HoldLocked {
            hold: account.hold.to_string(),
        });
    }
    if account.balance < amount + fee {
        return Err(LedgerError::InsufficientBalance {
            required: (amount + fee).to_string(),
            available: account.balance.to_string(),
        });
    }

    let fee = withdraw_shape(&tx, &admin, account_id, amount, now)?;
    let new_balance = account.balance - amount - fee;
    accounts::set_balances(&tx, account_id, new_balance, account.referral_balance, account.hold)?;
    status::recompute(&tx, account_id)?;
    tx.commit().map_err(idopad_db::DbError::from)?;

    tracing::info!(account = account_id, %amount, %fee, "withdrawal");
    Ok(WithdrawOutcome {
        paid: amount,
        fee,
        new_balance,
    })
}

/// Withdraw from the referral balance.
pub fn withdraw_referral(
    conn: &mut Connection,
    account_id: AccountId,
    amount: Decimal,
    now: u64,
) -> Result<WithdrawOutcome> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(amount.to_string()));
    }

    let tx = begin(conn)?;
    let account = accounts::by_id(&tx, account_id)?;
    let admin = main_wallet(&tx)?;
    let fee = money::withdraw_fee();

    if account.referral_balance < amount + fee {
        return Err(LedgerError::InsufficientReferral {
            required: (amount + fee).to_string(),
            available: account.referral_balance.to_string(),
        });
    }

    let fee = withdraw_shape(&tx, &admin, account_id, amount, now)?;
    let new_referral = account.referral_balance - amount - fee;
    accounts::set_balances(&tx, account_id, account.balance, new_referral, account.hold)?;
    status::recompute(&tx, account_id)?;
    tx.commit().map_err(idopad_db::DbError::from)?;

    tracing::info!(account = account_id, %amount, %fee, "referral withdrawal");
    Ok(WithdrawOutcome {
        paid: amount,
        fee,
        new_balance: new_referral,
    })
}

/// Reclassify referral credit as spendable balance. No ledger rows; this
/// is an internal movement between two figures of the same account.
pub fn convert_referral(
    conn: &mut Connection,
    account_id: AccountId,
    amount: Decimal,
    now: u64,
) -> Result<DepositOutcome> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(amount.to_string()));
    }

    let tx = begin(conn)?;
    let account = accounts::by_id(&tx, account_id)?;
    if account.referral_balance < amount {
        return Err(LedgerError::InsufficientReferral {
            required: amount.to_string(),
            available: account.referral_balance.to_string(),
        });
    }

    let new_balance = account.balance + amount;
    accounts::set_balances(
        &tx,
        account_id,
        new_balance,
        account.referral_balance - amount,
        account.hold,
    )?;

    let auto_enrolled = if account.balance < money::queue_min_balance()
        && new_balance >= money::queue_min_balance()
    {
        auto_enroll(&tx, account_id, now)?
    } else {
        Vec::new()
    };

    status::recompute(&tx, account_id)?;
    tx.commit().map_err(idopad_db::DbError::from)?;

    Ok(DepositOutcome {
        new_balance,
        auto_enrolled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use idopad_db::queries::accounts::NewAccount;
    use idopad_db::queries::offerings::NewOffering;
    use idopad_db::queries::transactions::TxRow;

    fn test_db() -> Connection {
        idopad_db::open_memory().expect("open test db")
    }

    fn setup_platform(conn: &Connection) -> AdminWalletRow {
        let quote = coins::quote_coin(conn).expect("quote");
        let addr = wallets::create_address(conn, "0xplatform", Some(quote.id), true)
            .expect("address");
        let id = wallets::create_admin_wallet(conn, addr, 8).expect("wallet");
        wallets::admin_wallet_by_id(conn, id).expect("row")
    }

    fn member(conn: &Connection, email: &str, balance: i64) -> AccountId {
        let id = accounts::insert(
            conn,
            &NewAccount {
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
        let addr = wallets::create_address(conn, &format!("0x{email}"), None, false)
            .expect("address");
        wallets::bind_member_wallet(conn, id, addr).expect("bind");
        accounts::set_balances(conn, id, Decimal::from(balance), Decimal::ZERO, Decimal::ZERO)
            .expect("fund");
        id
    }

    fn ledger_rows(conn: &Connection) -> Vec<TxRow> {
        let quote = coins::quote_coin(conn).expect("quote");
        transactions::in_range(conn, quote.id, 0, u64::MAX / 2).expect("rows")
    }

    #[test]
    fn test_deposit_credits_both_sides() {
        let mut conn = test_db();
        let admin = setup_platform(&conn);
        let id = member(&conn, "a@example.com", 0);

        let outcome = deposit(&mut conn, id, Decimal::from(100), 1).expect("deposit");
        assert_eq!(outcome.new_balance, Decimal::from(100));
        assert!(outcome.auto_enrolled.is_empty());

        let rows = ledger_rows(&conn);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].flags.fill_up);
        assert_eq!(rows[0].amount, Decimal::from(100));

        let admin = wallets::admin_wallet_by_id(&conn, admin.id).expect("admin");
        assert_eq!(admin.balance, Decimal::from(100));
    }

    #[test]
    fn test_deposit_rejects_nonpositive() {
        let mut conn = test_db();
        setup_platform(&conn);
        let id = member(&conn, "a@example.com", 0);
        assert!(matches!(
            deposit(&mut conn, id, Decimal::ZERO, 1),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_deposit_without_wallet_rejected() {
        let mut conn = test_db();
        setup_platform(&conn);
        let id = accounts::insert(
            &conn,
            &NewAccount {
                email: "nowallet@example.com",
                first_name: None,
                last_name: None,
                invite_code: "code-x",
                inviter_id: None,
                line: 1,
                created_at: 0,
            },
        )
        .expect("account");
        assert!(matches!(
            deposit(&mut conn, id, Decimal::from(10), 1),
            Err(LedgerError::WalletNotBound(_))
        ));
        // Nothing persisted.
        assert!(ledger_rows(&conn).is_empty());
    }

    #[test]
    fn test_deposit_crossing_floor_auto_enrolls() {
        let mut conn = test_db();
        setup_platform(&conn);
        let offering_id = offerings::insert(
            &conn,
            &NewOffering {
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
        let id = member(&conn, "a@example.com", 600);

        let outcome = deposit(&mut conn, id, Decimal::from(100), 1).expect("deposit");
        assert_eq!(outcome.auto_enrolled, vec![offering_id]);
        assert!(queue::find(&conn, offering_id, id).expect("find").is_some());

        // A second deposit does not re-enroll.
        let outcome = deposit(&mut conn, id, Decimal::from(100), 2).expect("deposit");
        assert!(outcome.auto_enrolled.is_empty());
    }

    #[test]
    fn test_withdraw_scenario() {
        let mut conn = test_db();
        let admin = setup_platform(&conn);
        let id = member(&conn, "a@example.com", 0);
        deposit(&mut conn, id, Decimal::from(500), 1).expect("fund");

        let outcome = withdraw(&mut conn, id, Decimal::from(100), 2).expect("withdraw");
        assert_eq!(outcome.paid, Decimal::from(100));
        assert_eq!(outcome.fee, Decimal::ONE);
        assert_eq!(outcome.new_balance, Decimal::from(399));

        let rows = ledger_rows(&conn);
        // fill-up + received + commission
        assert_eq!(rows.len(), 3);
        assert!(rows[1].flags.received);
        assert!(rows[2].flags.commission);
        assert_eq!(rows[2].amount, Decimal::ONE);

        let admin = wallets::admin_wallet_by_id(&conn, admin.id).expect("admin");
        assert_eq!(admin.balance, Decimal::from(401));
    }

    #[test]
    fn test_withdraw_respects_hold() {
        let mut conn = test_db();
        setup_platform(&conn);
        let id = member(&conn, "a@example.com", 0);
        deposit(&mut conn, id, Decimal::from(200), 1).expect("fund");
        let account = accounts::by_id(&conn, id).expect("row");
        accounts::set_balances(&conn, id, account.balance, account.referral_balance, Decimal::from(150))
            .expect("freeze");

        let before = ledger_rows(&conn).len();
        let result = withdraw(&mut conn, id, Decimal::from(100), 2);
        assert!(matches!(result, Err(LedgerError::HoldLocked { .. })));
        // Guarded withdrawals emit no ledger rows.
        assert_eq!(ledger_rows(&conn).len(), before);

        // Within the free portion it succeeds.
        withdraw(&mut conn, id, Decimal::from(40), 3).expect("withdraw");
    }

    #[test]
    fn test_withdraw_insufficient_balance() {
        let mut conn = test_db();
        setup_platform(&conn);
        let id = member(&conn, "a@example.com", 0);
        deposit(&mut conn, id, Decimal::from(50), 1).expect("fund");

        assert!(matches!(
            withdraw(&mut conn, id, Decimal::from(50), 2),
            Err(LedgerError::InsufficientBalance { .. })
        ));
    }

    #[test]
    fn test_withdraw_insufficient_reserve() {
        let mut conn = test_db();
        let admin = setup_platform(&conn);
        let id = member(&conn, "a@example.com", 500);
        // The account is funded out of band; the platform reserve is empty.
        assert_eq!(admin.balance, Decimal::ZERO);

        assert!(matches!(
            withdraw(&mut conn, id, Decimal::from(100), 1),
            Err(LedgerError::InsufficientReserve { .. })
        ));
    }

    #[test]
    fn test_referral_withdraw_and_convert() {
        let mut conn = test_db();
        setup_platform(&conn);
        let id = member(&conn, "a@example.com", 0);
        deposit(&mut conn, id, Decimal::from(300), 1).expect("seed reserve");
        let account = accounts::by_id(&conn, id).expect("row");
        accounts::set_balances(&conn, id, account.balance, Decimal::from(120), account.hold)
            .expect("credit referral");

        let outcome = withdraw_referral(&mut conn, id, Decimal::from(50), 2).expect("withdraw");
        assert_eq!(outcome.new_balance, Decimal::from(69));

        let outcome = convert_referral(&mut conn, id, Decimal::from(69), 3).expect("convert");
        assert_eq!(outcome.new_balance, Decimal::from(369));
        let account = accounts::by_id(&conn, id).expect("row");
        assert_eq!(account.referral_balance, Decimal::ZERO);
    }

    #[test]
    fn test_convert_insufficient() {
        let mut conn = test_db();
        setup_platform(&conn);
        let id = member(&conn, "a@example.com", 0);
        assert!(matches!(
            convert_referral(&mut conn, id, Decimal::from(10), 1),
            Err(LedgerError::InsufficientReferral { .. })
        ));
    }
}
