//! Platform-wallet scan and pro-rata token distribution.
//!
//! The scan compares each custom-token platform wallet's stored balance
//! with the on-chain balance (scaled by the wallet's decimals). Growth is
//! recorded as a fill-up transaction from the offering's contract and then
//! fanned out to participants pro-rata by allocation share, each share
//! passing through the commission distributor.

use rusqlite::Connection;
use rust_decimal::Decimal;

use idopad_db::queries::accounts;
use idopad_db::queries::offerings::OfferingRow;
use idopad_db::queries::transactions::{self, NewTransaction, TxFlags};
use idopad_db::queries::wallets::{self, AdminWalletRow};
use idopad_db::queries::{coins, participations};
use idopad_oracle::ChainReader;
use idopad_types::AccountId;

use crate::distribute::distribute_income;
use crate::{CommissionError, Result};

/// One participant payout produced by a token distribution.
#[derive(Clone, Debug)]
pub struct TokenPayout {
    pub account_id: AccountId,
    /// Net tokens transferred after commission.
    pub amount: Decimal,
}

/// Outcome of one scan pass.
#[derive(Clone, Debug, Default)]
pub struct ScanSummary {
    pub wallets_scanned: usize,
    pub wallets_filled: usize,
    pub payouts: usize,
}

/// Distribute `amount` tokens received on a platform wallet among the
/// offering's participants, pro-rata by allocation.
///
/// A participant without a bound wallet (or whose own upline chain blocks
/// the commission pass) is skipped with a warning; the job is best-effort
/// and must not poison the whole batch.
pub fn distribute_tokens(
    conn: &Connection,
    admin_wallet: &AdminWalletRow,
    offering: &OfferingRow,
    amount: Decimal,
    now: u64,
) -> Result<Vec<TokenPayout>> {
    let contract_id = offering
        .smartcontract_id
        .ok_or(CommissionError::OfferingNotDistributable(offering.id))?;
    let coin_id = offering
        .coin_id
        .ok_or(CommissionError::OfferingNotDistributable(offering.id))?;

    let parts = participations::by_offering(conn, offering.id)?;
    let total: Decimal = parts.iter().map(|p| p.allocation).sum();
    if total.is_zero() {
        return Ok(Vec::new());
    }

    let scale = admin_wallet.decimals;
    let mut payouts = Vec::new();

    for part in &parts {
        let ratio = (part.allocation / total).round_dp(scale);
        let share = (amount * ratio).round_dp(scale);
        if share.is_zero() {
            continue;
        }

        let account = accounts::by_id(conn, part.account_id)?;
        let outcome = match distribute_income(conn, &account, admin_wallet, offering, share, now) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(
                    account = part.account_id,
                    offering = offering.id,
                    error = %e,
                    "participant skipped during token distribution"
                );
                continue;
            }
        };

        let Some(wallet) = wallets::member_wallet(conn, part.account_id)? else {
            tracing::warn!(
                account = part.account_id,
                "participant has no bound wallet, payout skipped"
            );
            continue;
        };

        transactions::insert(
            conn,
            &NewTransaction {
                address_from_id: contract_id,
                address_to_id: wallet.address_id,
                coin_id,
                amount: outcome.net,
                flags: TxFlags::default(),
                correlation_id: None,
                created_at: now,
            },
        )?;
        payouts.push(TokenPayout {
            account_id: part.account_id,
            amount: outcome.net,
        });
    }

    Ok(payouts)
}

/// Scan every custom-token platform wallet for externally received tokens.
pub fn scan_wallets(conn: &Connection, reader: &dyn ChainReader, now: u64) -> Result<ScanSummary> {
    let quote = coins::quote_coin(conn)?;
    let mut summary = ScanSummary::default();

    for wallet in wallets::custom_admin_wallets(conn, quote.id)? {
        summary.wallets_scanned += 1;

        let Some(coin_id) = wallet.coin_id else {
            continue;
        };
        let Some(offering) = idopad_db::queries::offerings::find_by_coin(conn, coin_id)? else {
            continue;
        };
        let Some(contract_id) = offering.smartcontract_id else {
            continue;
        };
        let contract = wallets::address_by_id(conn, contract_id)?;

        let raw = match reader.token_balance(&contract.address, &wallet.address) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(wallet = wallet.id, error = %e, "chain read failed");
                continue;
            }
        };
        // Scale raw integer units down by the wallet's decimals.
        let on_chain = (raw * Decimal::new(1, wallet.decimals)).normalize();
        if on_chain <= wallet.balance {
            continue;
        }

        let diff = on_chain - wallet.balance;
        transactions::insert(
            conn,
            &NewTransaction {
                address_from_id: contract_id,
                address_to_id: wallet.address_id,
                coin_id,
                amount: diff,
                flags: TxFlags {
                    fill_up: true,
                    ..Default::default()
                },
                correlation_id: None,
                created_at: now,
            },
        )?;

        let payouts = distribute_tokens(conn, &wallet, &offering, diff, now)?;
        summary.payouts += payouts.len();
        summary.wallets_filled += 1;

        wallets::set_admin_balance(conn, wallet.id, on_chain)?;
        tracing::info!(
            wallet = wallet.id,
            %diff,
            payouts = payouts.len(),
            "platform wallet filled and distributed"
        );
    }

    Ok(summary)
}
