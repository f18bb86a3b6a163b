//! Wallet command handlers: bindings, platform wallets and token takeoff.

use std::sync::Arc;

use serde_json::Value;

use idopad_db::queries::{coins, wallets};
use idopad_ledger::takeoff::{self, TakeoffOutcome};
use idopad_types::clock;

use crate::commands::{caller, i64_param, require_admin, str_param, Result};
use crate::rpc::RpcError;
use crate::DaemonState;

/// Bind the caller's external wallet address. Rebinding an existing wallet
/// is an admin-only correction.
pub async fn bind(state: &Arc<DaemonState>, params: &Value) -> Result {
    let address = str_param(params, "address")?;
    let db = state.db.lock().await;
    let account = caller(&db, params)?;

    let existing = wallets::member_wallet(&db, account.id).map_err(|e| RpcError::from(&e))?;
    match existing {
        None => {
            let address_id = wallets::create_address(&db, address, None, false)
                .map_err(|e| RpcError::from(&e))?;
            wallets::bind_member_wallet(&db, account.id, address_id)
                .map_err(|e| RpcError::from(&e))?;
            Ok(serde_json::json!({"status": "bound"}))
        }
        Some(old) => {
            if !account.is_superuser {
                return Err(RpcError::permission_denied());
            }
            let address_id = wallets::create_address(&db, address, None, false)
                .map_err(|e| RpcError::from(&e))?;
            wallets::rebind_member_wallet(&db, account.id, address_id)
                .map_err(|e| RpcError::from(&e))?;
            tracing::info!(account = account.id, old = %old.address, new = address, "wallet rebound");
            Ok(serde_json::json!({"status": "changed"}))
        }
    }
}

/// The caller's bound wallet address.
pub async fn get(state: &Arc<DaemonState>, params: &Value) -> Result {
    let db = state.db.lock().await;
    let account = caller(&db, params)?;
    let wallet = wallets::member_wallet(&db, account.id)
        .map_err(|e| RpcError::from(&e))?
        .ok_or_else(|| RpcError::wallet_not_bound(&account.email))?;
    Ok(serde_json::json!({"address": wallet.address}))
}

/// The main platform wallet address (deposit target).
pub async fn get_admin(state: &Arc<DaemonState>, _params: &Value) -> Result {
    let db = state.db.lock().await;
    let quote = coins::quote_coin(&db).map_err(|e| RpcError::from(&e))?;
    let wallet =
        wallets::admin_wallet_for_coin(&db, quote.id).map_err(|e| RpcError::from(&e))?;
    Ok(serde_json::json!({"address": wallet.address}))
}

/// Create a platform wallet for a custom token (admin only).
///
/// The coin is taken from the registered smart-contract address.
pub async fn create_token_wallet(state: &Arc<DaemonState>, params: &Value) -> Result {
    let contract = str_param(params, "smartcontract")?;
    let address = str_param(params, "address")?;
    let decimals = i64_param(params, "decimals")?;
    if !(1..=28).contains(&decimals) {
        return Err(RpcError::validation("decimals must be between 1 and 28"));
    }

    let db = state.db.lock().await;
    let admin = caller(&db, params)?;
    require_admin(&admin)?;

    let contract_row = wallets::find_address(&db, contract)
        .map_err(|e| RpcError::from(&e))?
        .ok_or_else(|| RpcError::not_found("smart contract address"))?;

    let address_id = wallets::create_address(&db, address, contract_row.coin_id, true)
        .map_err(|e| RpcError::from(&e))?;
    let wallet_id = wallets::create_admin_wallet(&db, address_id, decimals as u32)
        .map_err(|e| RpcError::from(&e))?;

    Ok(serde_json::json!({"wallet_id": wallet_id}))
}

/// Check whether the caller's pending token income can be paid out.
pub async fn try_takeoff(state: &Arc<DaemonState>, params: &Value) -> Result {
    let symbol = str_param(params, "coin")?;
    let mut db = state.db.lock().await;
    let account = caller(&db, params)?;

    let outcome = takeoff::try_takeoff(&mut db, account.id, symbol, clock::now())
        .map_err(|e| RpcError::from(&e))?;

    match outcome {
        TakeoffOutcome::Ready => Ok(serde_json::json!({"status": "ready"})),
        TakeoffOutcome::Recalculated { tokens } => {
            state.event_bus.emit(
                "CommissionDistributed",
                serde_json::json!({
                    "account": account.email,
                    "coin": symbol,
                    "tokens": tokens.to_string(),
                }),
            );
            Ok(serde_json::json!({
                "status": "recalculated",
                "tokens": tokens.to_string(),
            }))
        }
    }
}

/// Confirm a payout of the caller's pending token income.
pub async fn confirm_takeoff(state: &Arc<DaemonState>, params: &Value) -> Result {
    let symbol = str_param(params, "coin")?;
    let mut db = state.db.lock().await;
    let account = caller(&db, params)?;

    let receipt = takeoff::confirm_takeoff(&mut db, account.id, symbol, clock::now())
        .map_err(|e| RpcError::from(&e))?;

    Ok(serde_json::json!({
        "tokens": receipt.tokens.to_string(),
        "quote_value": receipt.quote_value.to_string(),
    }))
}
