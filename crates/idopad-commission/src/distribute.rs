//! Ledger application of a commission plan.
//!
//! All wallet bindings are resolved before the first row is written, so a
//! missing binding aborts the distribution with nothing persisted. Callers
//! provide the surrounding SQLite transaction.

use rusqlite::Connection;
use rust_decimal::Decimal;

use idopad_db::queries::accounts::{self, AccountRow};
use idopad_db::queries::offerings::OfferingRow;
use idopad_db::queries::transactions::{self, NewTransaction, TxFlags};
use idopad_db::queries::wallets::{self, AdminWalletRow};
use idopad_db::queries::{coins, participations, vip};
use idopad_referral::upline;
use idopad_types::{money, AccountId};

use crate::rates::{self, Upline};
use crate::{CommissionError, Result};

/// One executed upline payout.
#[derive(Clone, Debug)]
pub struct PaidShare {
    pub account_id: AccountId,
    pub level: usize,
    /// Payout in token units.
    pub amount: Decimal,
}

/// Outcome of a distribution.
#[derive(Clone, Debug)]
pub struct DistributionOutcome {
    /// Token amount retained by the paying account.
    pub net: Decimal,
    /// Whether the eligibility gate passed (below it, `net == gross`).
    pub eligible: bool,
    pub paid: Vec<PaidShare>,
    /// Commission-flagged token amount sent to the platform reserve.
    pub reserve_cut: Decimal,
}

/// Distribute a gross token income of `account` for `offering`.
///
/// Below the eligibility threshold (`refund_allocation < 650`) the gross
/// is returned untouched and nothing is written. Otherwise 35% of the
/// gross is split between the upline chain and the platform reserve, each
/// upline payout a referral-flagged transaction from the payer's wallet,
/// the remainder a commission-flagged transaction to the platform wallet.
pub fn distribute_income(
    conn: &Connection,
    account: &AccountRow,
    admin_wallet: &AdminWalletRow,
    offering: &OfferingRow,
    gross: Decimal,
    now: u64,
) -> Result<DistributionOutcome> {
    let ineligible = DistributionOutcome {
        net: gross,
        eligible: false,
        paid: Vec::new(),
        reserve_cut: Decimal::ZERO,
    };

    let Some(participation) = participations::find(conn, offering.id, account.id)? else {
        return Ok(ineligible);
    };
    if participation.refund_allocation < money::refund_allocation_cap() {
        return Ok(ineligible);
    }

    let coin_id = offering
        .coin_id
        .ok_or(CommissionError::OfferingNotDistributable(offering.id))?;
    let coin = coins::by_id(conn, coin_id)?;

    // Plan first: shares, then every wallet binding. Nothing is written
    // until the whole distribution is known to succeed.
    let chain = upline::upline_chain(conn, account.id)?;
    let mut uplines = Vec::with_capacity(chain.len());
    for row in &chain {
        uplines.push(Upline {
            account_id: row.id,
            vip_pct: vip::profit_pct(conn, row.id)?,
        });
    }
    let plan = rates::commission_plan(&uplines)?;
    let amounts = rates::plan_amounts(&plan, gross, admin_wallet.decimals)?;

    let payer_wallet = wallets::member_wallet(conn, account.id)?
        .ok_or(CommissionError::WalletNotBound(account.id))?;
    let mut share_wallets = Vec::with_capacity(plan.shares.len());
    for share in &plan.shares {
        let wallet = wallets::member_wallet(conn, share.account_id)?
            .ok_or(CommissionError::WalletNotBound(share.account_id))?;
        share_wallets.push(wallet);
    }

    let mut paid = Vec::with_capacity(plan.shares.len());
    let mut income_total = participation.income_from_income;

    for ((share, amount), wallet) in plan
        .shares
        .iter()
        .zip(amounts.paid.iter().copied())
        .zip(share_wallets.iter())
    {
        if amount.is_zero() {
            continue;
        }
        transactions::insert(
            conn,
            &NewTransaction {
                address_from_id: payer_wallet.address_id,
                address_to_id: wallet.address_id,
                coin_id: coin.id,
                amount,
                flags: TxFlags {
                    referral: true,
                    ..Default::default()
                },
                correlation_id: None,
                created_at: now,
            },
        )?;

        // Credit the upline and the payer's upline-income figure in quote
        // units, when the coin has a known price.
        if let Some(price) = coin.quote_price {
            let quoted = (amount * price).round_dp(admin_wallet.decimals);
            let upline_row = accounts::by_id(conn, share.account_id)?;
            accounts::set_balances(
                conn,
                upline_row.id,
                upline_row.balance,
                upline_row.referral_balance + quoted,
                upline_row.hold,
            )?;
            income_total += quoted;
        }

        paid.push(PaidShare {
            account_id: share.account_id,
            level: share.level,
            amount,
        });
    }

    if !amounts.reserve.is_zero() {
        transactions::insert(
            conn,
            &NewTransaction {
                address_from_id: payer_wallet.address_id,
                address_to_id: admin_wallet.address_id,
                coin_id: coin.id,
                amount: amounts.reserve,
                flags: TxFlags {
                    commission: true,
                    ..Default::default()
                },
                correlation_id: None,
                created_at: now,
            },
        )?;
    }

    if income_total != participation.income_from_income {
        participations::set_income_from_income(conn, participation.id, income_total)?;
    }

    tracing::info!(
        account = account.id,
        offering = offering.id,
        %gross,
        net = %(gross - amounts.total),
        levels = paid.len(),
        "commission distributed"
    );

    Ok(DistributionOutcome {
        net: gross - amounts.total,
        eligible: true,
        paid,
        reserve_cut: amounts.reserve,
    })
}
