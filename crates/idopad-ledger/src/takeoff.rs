//! Token-income accrual and payout.
//!
//! Tokens distributed to a member wallet sit as pending (not yet received)
//! ledger rows. Taking them off accrues their quote value into the
//! participation's `refund_allocation`, capped at 650; the portion of
//! income that crosses the cap is routed through the commission
//! distributor and replaced by a recalculated payout row.

use rusqlite::Connection;
use rust_decimal::Decimal;

use idopad_db::queries::transactions::{self, NewTransaction, TxFlags};
use idopad_db::queries::wallets::{self, AdminWalletRow};
use idopad_db::queries::{accounts, coins, offerings, participations};
use idopad_commission::distribute::distribute_income;
use idopad_types::{money, AccountId, QUOTE_SYMBOL};

use crate::{begin, bound_wallet, status, LedgerError, Result};

/// Outcome of a takeoff attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TakeoffOutcome {
    /// Pending rows can be paid out as they stand.
    Ready,
    /// The referral threshold was crossed: pending rows were superseded by
    /// one recalculated payout of this many tokens.
    Recalculated { tokens: Decimal },
}

/// Receipt returned by a confirmed takeoff.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TakeoffReceipt {
    pub tokens: Decimal,
    pub quote_value: Decimal,
}

struct TakeoffContext {
    coin_id: i64,
    wallet_address_id: i64,
    contract_id: i64,
    admin: AdminWalletRow,
    price: Decimal,
    offering: idopad_db::queries::offerings::OfferingRow,
    participation: idopad_db::queries::participations::ParticipationRow,
    pending: Vec<idopad_db::queries::transactions::TxRow>,
}

fn load_context(conn: &Connection, account_id: AccountId, symbol: &str) -> Result<TakeoffContext> {
    if symbol == QUOTE_SYMBOL {
        return Err(LedgerError::QuoteCoinNotAllowed);
    }
    let coin = coins::find_by_symbol(conn, symbol)?
        .ok_or_else(|| LedgerError::CoinNotFound(symbol.to_string()))?;
    let wallet = bound_wallet(conn, account_id)?;

    let pending = transactions::pending_to_address(conn, wallet.address_id, coin.id)?;
    if pending.is_empty() {
        return Err(LedgerError::NoPendingTokens);
    }

    let offering = offerings::find_by_coin(conn, coin.id)?
        .ok_or_else(|| LedgerError::NoOfferingForCoin(symbol.to_string()))?;
    let contract_id = offering
        .smartcontract_id
        .ok_or_else(|| LedgerError::NoOfferingForCoin(symbol.to_string()))?;
    let participation = participations::find(conn, offering.id, account_id)?.ok_or(
        LedgerError::NotParticipating {
            offering: offering.id,
            account: account_id,
        },
    )?;
    let admin = wallets::admin_wallet_for_coin(conn, coin.id).map_err(|e| match e {
        idopad_db::DbError::NotFound(_) => LedgerError::AdminWalletMissing,
        other => LedgerError::Db(other),
    })?;
    let price = coin
        .quote_price
        .filter(|p| !p.is_zero())
        .ok_or_else(|| LedgerError::PriceUnavailable(symbol.to_string()))?;

    Ok(TakeoffContext {
        coin_id: coin.id,
        wallet_address_id: wallet.address_id,
        contract_id,
        admin,
        price,
        offering,
        participation,
        pending,
    })
}

/// Check whether pending token income can be paid out as-is, recalculating
/// it through the commission distributor when the referral threshold is
/// crossed by this income.
pub fn try_takeoff(
    conn: &mut Connection,
    account_id: AccountId,
    symbol: &str,
    now: u64,
) -> Result<TakeoffOutcome> {
    let tx = begin(conn)?;
    let ctx = load_context(&tx, account_id, symbol)?;

    let income_tokens: Decimal = ctx.pending.iter().map(|t| t.amount).sum();
    let income_quote = income_tokens * ctx.price;
    let cap = money::refund_allocation_cap();

    if ctx.participation.refund_allocation >= cap
        || ctx.participation.refund_allocation + income_quote < cap
    {
        // Either fully eligible already, or still accruing below the cap:
        // nothing to recalculate.
        return Ok(TakeoffOutcome::Ready);
    }

    // The income crosses the cap: the excess goes through the distributor.
    let over_quote = ctx.participation.refund_allocation + income_quote - cap;
    let over_tokens = (over_quote / ctx.price).round_dp(ctx.admin.decimals);

    participations::set_refund_allocation(&tx, ctx.participation.id, cap)?;

    let account = accounts::by_id(&tx, account_id)?;
    let outcome = distribute_income(&tx, &account, &ctx.admin, &ctx.offering, over_tokens, now)?;
    let tokens = income_tokens - over_tokens + outcome.net;

    transactions::insert(
        &tx,
        &NewTransaction {
            address_from_id: ctx.contract_id,
            address_to_id: ctx.wallet_address_id,
            coin_id: ctx.coin_id,
            amount: tokens,
            flags: TxFlags::default(),
            correlation_id: None,
            created_at: now,
        },
    )?;
    for row in &ctx.pending {
        transactions::mark_received(&tx, row.id, false)?;
    }

    status::recompute(&tx, account_id)?;
    tx.commit().map_err(idopad_db::DbError::from)?;

    tracing::info!(
        account = account_id,
        symbol,
        %tokens,
        "token income recalculated through referral program"
    );
    Ok(TakeoffOutcome::Recalculated { tokens })
}

/// Confirm a payout of the pending token income: accrue its quote value
/// into `refund_allocation` (capped) and release the tokens from the
/// platform wallet.
pub fn confirm_takeoff(
    conn: &mut Connection,
    account_id: AccountId,
    symbol: &str,
    now: u64,
) -> Result<TakeoffReceipt> {
    let tx = begin(conn)?;
    let ctx = load_context(&tx, account_id, symbol)?;

    let income_tokens: Decimal = ctx.pending.iter().map(|t| t.amount).sum();
    let income_quote = income_tokens * ctx.price;

    for row in &ctx.pending {
        transactions::mark_received(&tx, row.id, true)?;
    }

    let cap = money::refund_allocation_cap();
    let accrued = (ctx.participation.refund_allocation + income_quote).min(cap);
    participations::set_refund_allocation(&tx, ctx.participation.id, accrued)?;

    wallets::set_admin_balance(&tx, ctx.admin.id, ctx.admin.balance - income_tokens)?;

    status::recompute(&tx, account_id)?;
    tx.commit().map_err(idopad_db::DbError::from)?;

    tracing::info!(account = account_id, symbol, %income_tokens, at = now, "token takeoff");
    Ok(TakeoffReceipt {
        tokens: income_tokens,
        quote_value: income_quote,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use idopad_db::queries::accounts::NewAccount;
    use idopad_db::queries::offerings::NewOffering;
    use idopad_types::OfferingId;

    fn test_db() -> Connection {
        idopad_db::open_memory().expect("open test db")
    }

    struct Fixture {
        offering_id: OfferingId,
        admin_id: i64,
        coin_id: i64,
        contract_id: i64,
    }

    fn setup(conn: &Connection) -> Fixture {
        let coin = coins::upsert(conn, "ZYX", "BEP20").expect("coin");
        coins::set_quote_price(conn, coin.id, Decimal::from(2), 0).expect("price");

        let contract_id =
            wallets::create_address(conn, "0xcontract", Some(coin.id), false).expect("contract");
        let admin_addr =
            wallets::create_address(conn, "0xadmin", Some(coin.id), true).expect("addr");
        let admin_id = wallets::create_admin_wallet(conn, admin_addr, 8).expect("wallet");
        wallets::set_admin_balance(conn, admin_id, Decimal::from(10_000)).expect("seed");

        let offering_id = offerings::insert(
            conn,
            &NewOffering {
                name: "Round",
                description: "",
                general_allocation: Decimal::from(10_000),
                person_allocation: Decimal::from(100),
                vesting: "",
                smartcontract_id: Some(contract_id),
                coin_id: Some(coin.id),
                created_at: 0,
                ..Default::default()
            },
        )
        .expect("offering");

        Fixture {
            offering_id,
            admin_id,
            coin_id: coin.id,
            contract_id,
        }
    }

    fn participant(conn: &Connection, fx: &Fixture, refund_allocation: i64) -> AccountId {
        let id = accounts::insert(
            conn,
            &NewAccount {
                email: "holder@example.com",
                first_name: None,
                last_name: None,
                invite_code: "code-holder",
                inviter_id: None,
                line: 1,
                created_at: 0,
            },
        )
        .expect("account");
        let addr = wallets::create_address(conn, "0xholder", None, false).expect("address");
        wallets::bind_member_wallet(conn, id, addr).expect("bind");
        let part = participations::insert(
            conn,
            fx.offering_id,
            id,
            Decimal::from(100),
            "corr-holder",
            0,
        )
        .expect("participation");
        participations::set_refund_allocation(conn, part, Decimal::from(refund_allocation))
            .expect("refund");
        id
    }

    fn send_tokens(conn: &Connection, fx: &Fixture, account: AccountId, amount: i64) {
        let wallet = wallets::member_wallet(conn, account).expect("wallet").expect("bound");
        transactions::insert(
            conn,
            &NewTransaction {
                address_from_id: fx.contract_id,
                address_to_id: wallet.address_id,
                coin_id: fx.coin_id,
                amount: Decimal::from(amount),
                flags: TxFlags::default(),
                correlation_id: None,
                created_at: 1,
            },
        )
        .expect("tokens");
    }

    #[test]
    fn test_quote_coin_rejected() {
        let mut conn = test_db();
        assert!(matches!(
            try_takeoff(&mut conn, 1, QUOTE_SYMBOL, 0),
            Err(LedgerError::QuoteCoinNotAllowed)
        ));
    }

    #[test]
    fn test_no_pending_tokens() {
        let mut conn = test_db();
        let fx = setup(&conn);
        let account = participant(&conn, &fx, 0);
        assert!(matches!(
            try_takeoff(&mut conn, account, "ZYX", 0),
            Err(LedgerError::NoPendingTokens)
        ));
    }

    #[test]
    fn test_below_cap_is_ready_and_confirm_accrues() {
        let mut conn = test_db();
        let fx = setup(&conn);
        let account = participant(&conn, &fx, 0);
        // 100 tokens at price 2 = 200 quote units, below the 650 cap.
        send_tokens(&conn, &fx, account, 100);

        assert_eq!(
            try_takeoff(&mut conn, account, "ZYX", 2).expect("try"),
            TakeoffOutcome::Ready
        );

        let receipt = confirm_takeoff(&mut conn, account, "ZYX", 3).expect("confirm");
        assert_eq!(receipt.tokens, Decimal::from(100));
        assert_eq!(receipt.quote_value, Decimal::from(200));

        let part = participations::find(&conn, fx.offering_id, account)
            .expect("find")
            .expect("participation");
        assert_eq!(part.refund_allocation, Decimal::from(200));

        let admin = wallets::admin_wallet_by_id(&conn, fx.admin_id).expect("admin");
        assert_eq!(admin.balance, Decimal::from(9_900));

        // Confirmed rows are no longer pending.
        assert!(matches!(
            confirm_takeoff(&mut conn, account, "ZYX", 4),
            Err(LedgerError::NoPendingTokens)
        ));
    }

    #[test]
    fn test_confirm_caps_refund_allocation() {
        let mut conn = test_db();
        let fx = setup(&conn);
        let account = participant(&conn, &fx, 600);
        // 100 tokens * 2 = 200 quote units; 600 + 200 caps at 650.
        send_tokens(&conn, &fx, account, 100);

        confirm_takeoff(&mut conn, account, "ZYX", 2).expect("confirm");
        let part = participations::find(&conn, fx.offering_id, account)
            .expect("find")
            .expect("participation");
        assert_eq!(part.refund_allocation, Decimal::from(650));
    }

    #[test]
    fn test_crossing_cap_recalculates() {
        let mut conn = test_db();
        let fx = setup(&conn);
        let account = participant(&conn, &fx, 600);
        // 100 tokens * 2 = 200 quote units; 600 + 200 = 800, 150 over the
        // cap, i.e. 75 tokens pass through the distributor. No inviter, so
        // the distributor keeps 35% of 75 = 26.25 for the reserve.
        send_tokens(&conn, &fx, account, 100);

        let outcome = try_takeoff(&mut conn, account, "ZYX", 2).expect("try");
        let TakeoffOutcome::Recalculated { tokens } = outcome else {
            panic!("expected recalculation");
        };
        // 100 - 75 + 75 * 0.65 = 73.75
        assert_eq!(tokens, "73.75".parse::<Decimal>().expect("dec"));

        let part = participations::find(&conn, fx.offering_id, account)
            .expect("find")
            .expect("participation");
        assert_eq!(part.refund_allocation, Decimal::from(650));

        // The superseded row is hidden; the recalculated one is pending.
        let wallet = wallets::member_wallet(&conn, account).expect("wallet").expect("bound");
        let pending = transactions::pending_to_address(&conn, wallet.address_id, fx.coin_id)
            .expect("pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].amount, tokens);
    }
}
