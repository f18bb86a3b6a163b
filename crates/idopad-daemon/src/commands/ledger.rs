//! Reserve command handlers: deposits, withdrawals, referral credit.

use std::sync::Arc;

use serde_json::Value;

use idopad_db::queries::{coins, transactions, wallets};
use idopad_ledger::reserve;

use crate::commands::{caller, decimal_param, Result};
use crate::rpc::RpcError;
use crate::DaemonState;

/// Deposit quote funds into the caller's reserve.
pub async fn deposit(state: &Arc<DaemonState>, params: &Value) -> Result {
    let amount = decimal_param(params, "amount")?;
    let mut db = state.db.lock().await;
    let account = caller(&db, params)?;

    let outcome = reserve::deposit(&mut db, account.id, amount, idopad_types::clock::now())
        .map_err(|e| RpcError::from(&e))?;

    state.event_bus.emit(
        "DepositReceived",
        serde_json::json!({
            "account": account.email,
            "amount": amount.to_string(),
            "auto_enrolled": outcome.auto_enrolled,
        }),
    );

    Ok(serde_json::json!({
        "new_balance": outcome.new_balance.to_string(),
        "auto_enrolled": outcome.auto_enrolled,
    }))
}

/// Withdraw from the caller's main balance.
pub async fn withdraw(state: &Arc<DaemonState>, params: &Value) -> Result {
    let amount = decimal_param(params, "amount")?;
    let mut db = state.db.lock().await;
    let account = caller(&db, params)?;

    let outcome = reserve::withdraw(&mut db, account.id, amount, idopad_types::clock::now())
        .map_err(|e| RpcError::from(&e))?;

    state.event_bus.emit(
        "WithdrawalCompleted",
        serde_json::json!({
            "account": account.email,
            "paid": outcome.paid.to_string(),
            "fee": outcome.fee.to_string(),
        }),
    );

    Ok(serde_json::json!({
        "paid": outcome.paid.to_string(),
        "fee": outcome.fee.to_string(),
        "new_balance": outcome.new_balance.to_string(),
    }))
}

/// Withdraw from the caller's referral balance.
pub async fn withdraw_referral(state: &Arc<DaemonState>, params: &Value) -> Result {
    let amount = decimal_param(params, "amount")?;
    let mut db = state.db.lock().await;
    let account = caller(&db, params)?;

    let outcome =
        reserve::withdraw_referral(&mut db, account.id, amount, idopad_types::clock::now())
            .map_err(|e| RpcError::from(&e))?;

    Ok(serde_json::json!({
        "paid": outcome.paid.to_string(),
        "fee": outcome.fee.to_string(),
        "new_referral_balance": outcome.new_balance.to_string(),
    }))
}

/// Reclassify referral credit as spendable balance.
pub async fn convert_referral(state: &Arc<DaemonState>, params: &Value) -> Result {
    let amount = decimal_param(params, "amount")?;
    let mut db = state.db.lock().await;
    let account = caller(&db, params)?;

    let outcome =
        reserve::convert_referral(&mut db, account.id, amount, idopad_types::clock::now())
            .map_err(|e| RpcError::from(&e))?;

    Ok(serde_json::json!({
        "new_balance": outcome.new_balance.to_string(),
        "auto_enrolled": outcome.auto_enrolled,
    }))
}

/// The caller's balances.
pub async fn get_balance(state: &Arc<DaemonState>, params: &Value) -> Result {
    let db = state.db.lock().await;
    let account = caller(&db, params)?;

    Ok(serde_json::json!({
        "balance": account.balance.to_string(),
        "referral_balance": account.referral_balance.to_string(),
        "hold": account.hold.to_string(),
        "status": account.status.as_str(),
    }))
}

/// Visible ledger rows paying the caller's wallet, optionally filtered to
/// one coin symbol.
pub async fn get_transactions(state: &Arc<DaemonState>, params: &Value) -> Result {
    let db = state.db.lock().await;
    let account = caller(&db, params)?;
    let wallet = wallets::member_wallet(&db, account.id)
        .map_err(|e| RpcError::from(&e))?
        .ok_or_else(|| RpcError::wallet_not_bound(&account.email))?;

    let coin = match params.get("coin").and_then(|v| v.as_str()) {
        Some(symbol) => coins::find_by_symbol(&db, symbol)
            .map_err(|e| RpcError::from(&e))?
            .ok_or_else(|| RpcError::not_found(&format!("coin {symbol}")))?,
        None => coins::quote_coin(&db).map_err(|e| RpcError::from(&e))?,
    };

    let rows = transactions::to_address(&db, wallet.address_id, coin.id)
        .map_err(|e| RpcError::from(&e))?;
    let list: Vec<Value> = rows
        .iter()
        .map(|row| {
            serde_json::json!({
                "amount": row.amount.to_string(),
                "commission": row.flags.commission,
                "referral": row.flags.referral,
                "received": row.flags.received,
                "fill_up": row.flags.fill_up,
                "created_at": row.created_at,
            })
        })
        .collect();
    Ok(serde_json::json!({"coin": coin.symbol, "transactions": list}))
}
