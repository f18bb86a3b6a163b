//! Offering participation, refund and admin enrollment.
//!
//! A participation debits 1.3x the committed allocation (principal plus the
//! 30% reserve buffer), consuming any frozen hold first. Every ledger row
//! produced by the event carries the participation's correlation id, which
//! makes the refund unwind exact.

use rusqlite::Connection;
use rust_decimal::Decimal;

use idopad_db::queries::accounts::{self, AccountRow};
use idopad_db::queries::offerings::{self, OfferingRow};
use idopad_db::queries::transactions::{self, NewTransaction, TxFlags};
use idopad_db::queries::wallets::{self, AdminWalletRow};
use idopad_db::queries::{coins, participations, queue, vip};
use idopad_queue::placement;
use idopad_types::{money, token, AccountId, OfferingId, ParticipationId};

use crate::{begin, bound_wallet, main_wallet, status, LedgerError, Result};

/// Outcome of a participation.
#[derive(Clone, Debug)]
pub struct ParticipateOutcome {
    pub participation_id: ParticipationId,
    pub correlation_id: String,
    /// Total debit: 1.3x the allocation.
    pub debited: Decimal,
    /// The 30% buffer credited to the platform reserve.
    pub reserve_buffer: Decimal,
    /// Referral bonus paid to the immediate inviter, if any.
    pub inviter_bonus: Option<(AccountId, Decimal)>,
}

/// Participate in an offering at its per-person allocation.
pub fn participate(
    conn: &mut Connection,
    account_id: AccountId,
    offering_id: OfferingId,
    now: u64,
) -> Result<ParticipateOutcome> {
    let tx = begin(conn)?;
    let account = accounts::by_id(&tx, account_id)?;
    let offering = offerings::by_id(&tx, offering_id)?;
    let allocation = offering.person_allocation;
    let debit = money::reserve_factor() * allocation;

    // Gate: the queue floor, and room for the debit plus the withdrawal fee.
    let floor = money::queue_min_balance();
    if account.balance < floor || account.balance < debit + Decimal::ONE {
        return Err(LedgerError::InsufficientBalance {
            required: floor.max(debit + Decimal::ONE).to_string(),
            available: account.balance.to_string(),
        });
    }

    let entry = queue::find(&tx, offering_id, account_id)?.ok_or(LedgerError::NotQueued {
        offering: offering_id,
        account: account_id,
    })?;
    placement::require_eligible_position(entry.number, &offering)?;

    if participations::find(&tx, offering_id, account_id)?.is_some() {
        return Err(LedgerError::AlreadyParticipating {
            offering: offering_id,
            account: account_id,
        });
    }
    let used = participations::total_allocated(&tx, offering_id)?;
    if offering.general_allocation - used < allocation {
        return Err(LedgerError::AllocationExhausted(offering_id));
    }

    let outcome = enroll(&tx, &account, &offering, allocation, true, now)?;
    status::recompute(&tx, account_id)?;
    tx.commit().map_err(idopad_db::DbError::from)?;

    tracing::info!(
        account = account_id,
        offering = offering_id,
        debited = %outcome.debited,
        "participation"
    );
    Ok(outcome)
}

/// Admin enrollment for manually assigned (`without_pay`) offerings.
///
/// Balance gates are bypassed; the debit still happens, so the account
/// balance may go negative until topped up.
pub fn pre_approve(
    conn: &mut Connection,
    offering_id: OfferingId,
    account_id: AccountId,
    allocation: Decimal,
    now: u64,
) -> Result<ParticipateOutcome> {
    if allocation <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(allocation.to_string()));
    }

    let tx = begin(conn)?;
    let account = accounts::by_id(&tx, account_id)?;
    let offering = offerings::by_id(&tx, offering_id)?;
    if !offering.without_pay {
        return Err(LedgerError::ManualEnrollmentOnly(offering_id));
    }
    if participations::find(&tx, offering_id, account_id)?.is_some() {
        return Err(LedgerError::AlreadyParticipating {
            offering: offering_id,
            account: account_id,
        });
    }
    let used = participations::total_allocated(&tx, offering_id)?;
    if offering.general_allocation - used < allocation {
        return Err(LedgerError::AllocationExhausted(offering_id));
    }

    let outcome = enroll(&tx, &account, &offering, allocation, false, now)?;
    status::recompute(&tx, account_id)?;
    tx.commit().map_err(idopad_db::DbError::from)?;

    tracing::info!(account = account_id, offering = offering_id, "pre-approved enrollment");
    Ok(outcome)
}

/// Shared enrollment: debit, participation row, reserve buffer, inviter
/// bonus.
fn enroll(
    conn: &Connection,
    account: &AccountRow,
    offering: &OfferingRow,
    allocation: Decimal,
    ledger_buffer: bool,
    now: u64,
) -> Result<ParticipateOutcome> {
    let admin = main_wallet(conn)?;
    let quote = coins::quote_coin(conn)?;
    let debit = money::reserve_factor() * allocation;
    let buffer = money::reserve_buffer_factor() * allocation;
    let correlation_id = token::new_correlation_id();

    // The frozen hold is consumed first.
    let new_hold = (account.hold - debit).max(Decimal::ZERO);
    accounts::set_balances(
        conn,
        account.id,
        account.balance - debit,
        account.referral_balance,
        new_hold,
    )?;

    let participation_id = participations::insert(
        conn,
        offering.id,
        account.id,
        allocation,
        &correlation_id,
        now,
    )?;

    let mut admin_balance = admin.balance + buffer;
    if ledger_buffer {
        let wallet = bound_wallet(conn, account.id)?;
        transactions::insert(
            conn,
            &NewTransaction {
                address_from_id: wallet.address_id,
                address_to_id: admin.address_id,
                coin_id: quote.id,
                amount: buffer,
                flags: TxFlags {
                    commission: true,
                    ..Default::default()
                },
                correlation_id: Some(&correlation_id),
                created_at: now,
            },
        )?;
    }

    // The immediate inviter earns the level-0 share of the allocation out
    // of the reserve buffer.
    let mut inviter_bonus = None;
    if let Some(inviter_id) = account.inviter_id {
        let pct = vip::profit_pct(conn, inviter_id)?
            .or_else(|| money::tier_pct(0))
            .unwrap_or(Decimal::ZERO);
        let bonus = money::percent_of(allocation, pct).round_dp(admin.decimals);
        if !bonus.is_zero() {
            if admin_balance < bonus {
                return Err(LedgerError::InsufficientReserve {
                    required: bonus.to_string(),
                    available: admin_balance.to_string(),
                });
            }
            let inviter_wallet = wallets::member_wallet(conn, inviter_id)?
                .ok_or(LedgerError::WalletNotBound(inviter_id))?;
            transactions::insert(
                conn,
                &NewTransaction {
                    address_from_id: admin.address_id,
                    address_to_id: inviter_wallet.address_id,
                    coin_id: quote.id,
                    amount: bonus,
                    flags: TxFlags {
                        referral: true,
                        ..Default::default()
                    },
                    correlation_id: Some(&correlation_id),
                    created_at: now,
                },
            )?;

            let inviter = accounts::by_id(conn, inviter_id)?;
            accounts::set_balances(
                conn,
                inviter_id,
                inviter.balance,
                inviter.referral_balance + bonus,
                inviter.hold,
            )?;
            admin_balance -= bonus;
            inviter_bonus = Some((inviter_id, bonus));
        }
    }

    wallets::set_admin_balance(conn, admin.id, admin_balance)?;

    Ok(ParticipateOutcome {
        participation_id,
        correlation_id,
        debited: debit,
        reserve_buffer: buffer,
        inviter_bonus,
    })
}

/// Outcome of a refund.
#[derive(Clone, Debug)]
pub struct RefundOutcome {
    /// Amount credited back to the account: 1.3x the allocation.
    pub credited: Decimal,
    /// Referral rows unwound by correlation id.
    pub unwound_referrals: usize,
}

/// Reverse a participation: credit back 1.3x the allocation, delete the
/// row, and unwind the event's ledger rows by correlation id.
pub fn refund(
    conn: &mut Connection,
    offering_id: OfferingId,
    account_id: AccountId,
    now: u64,
) -> Result<RefundOutcome> {
    let tx = begin(conn)?;
    let outcome = unwind(&tx, offering_id, account_id, false)?;
    status::recompute(&tx, account_id)?;
    tx.commit().map_err(idopad_db::DbError::from)?;

    tracing::info!(
        account = account_id,
        offering = offering_id,
        credited = %outcome.credited,
        at = now,
        "participation refunded"
    );
    Ok(outcome)
}

/// Admin removal of a pre-approved participant. The principal is credited
/// back but re-frozen as hold.
pub fn unenroll(
    conn: &mut Connection,
    offering_id: OfferingId,
    account_id: AccountId,
    now: u64,
) -> Result<RefundOutcome> {
    let tx = begin(conn)?;
    let outcome = unwind(&tx, offering_id, account_id, true)?;
    status::recompute(&tx, account_id)?;
    tx.commit().map_err(idopad_db::DbError::from)?;

    tracing::info!(account = account_id, offering = offering_id, at = now, "unenrolled");
    Ok(outcome)
}

fn unwind(
    conn: &Connection,
    offering_id: OfferingId,
    account_id: AccountId,
    freeze_principal: bool,
) -> Result<RefundOutcome> {
    let participation =
        participations::find(conn, offering_id, account_id)?.ok_or(LedgerError::NotParticipating {
            offering: offering_id,
            account: account_id,
        })?;
    let account = accounts::by_id(conn, account_id)?;
    let admin = main_wallet(conn)?;
    let credit = money::reserve_factor() * participation.allocation;

    let mut admin_balance = admin.balance;
    let mut unwound_referrals = 0usize;
    let mut buffer_row_seen = false;

    for row in transactions::by_correlation(conn, &participation.correlation_id)? {
        if row.flags.referral {
            // The bonus returns from the inviter's referral balance to the
            // reserve.
            if let Some(inviter_wallet) = wallets::member_by_address(conn, row.address_to_id)? {
                let inviter = accounts::by_id(conn, inviter_wallet.account_id)?;
                accounts::set_balances(
                    conn,
                    inviter.id,
                    inviter.balance,
                    inviter.referral_balance - row.amount,
                    inviter.hold,
                )?;
            }
            admin_balance += row.amount;
            unwound_referrals += 1;
        } else if row.flags.commission {
            admin_balance -= row.amount;
            buffer_row_seen = true;
        }
        transactions::delete(conn, row.id)?;
    }

    // Pre-approved enrollments have no buffer row; reverse the reserve
    // credit directly.
    if !buffer_row_seen {
        admin_balance -= money::reserve_buffer_factor() * participation.allocation;
    }

    if admin_balance < Decimal::ZERO {
        return Err(LedgerError::InsufficientReserve {
            required: (Decimal::ZERO - admin_balance).to_string(),
            available: admin.balance.to_string(),
        });
    }

    let new_hold = if freeze_principal {
        account.hold + participation.allocation
    } else {
        account.hold
    };
    accounts::set_balances(
        conn,
        account_id,
        account.balance + credit,
        account.referral_balance,
        new_hold,
    )?;
    wallets::set_admin_balance(conn, admin.id, admin_balance)?;
    participations::delete(conn, participation.id)?;

    Ok(RefundOutcome {
        credited: credit,
        unwound_referrals,
    })
}
