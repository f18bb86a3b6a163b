//! Account command handlers: registration and referral-tree views.

use std::sync::Arc;

use serde_json::Value;

use idopad_db::queries::accounts::{self, AccountRow, NewAccount};
use idopad_referral::{downline, invite, upline};
use idopad_types::{clock, token};

use crate::commands::{account_by_email, str_param, validate_email, Result};
use crate::rpc::RpcError;
use crate::DaemonState;

fn profile_json(account: &AccountRow) -> Value {
    serde_json::json!({
        "id": account.id,
        "email": account.email,
        "first_name": account.first_name,
        "last_name": account.last_name,
        "invite_code": account.invite_code,
        "can_invite": account.can_invite,
        "line": account.line,
        "status": account.status.as_str(),
        "balance": account.balance.to_string(),
        "referral_balance": account.referral_balance.to_string(),
        "hold": account.hold.to_string(),
        "permanent_place": account.permanent_place,
    })
}

/// Register a new account, optionally under an invite code.
pub async fn register(state: &Arc<DaemonState>, params: &Value) -> Result {
    let email = str_param(params, "email")?;
    validate_email(email)?;
    let first_name = params.get("first_name").and_then(|v| v.as_str());
    let last_name = params.get("last_name").and_then(|v| v.as_str());
    let invite_code = params.get("invite_code").and_then(|v| v.as_str());

    let db = state.db.lock().await;

    if accounts::find_by_email(&db, email)
        .map_err(|e| RpcError::from(&e))?
        .is_some()
    {
        return Err(RpcError::conflict("account with this email already exists"));
    }

    let inviter = match invite_code {
        Some(code) => Some(invite::resolve_invite_code(&db, code).map_err(|e| RpcError::from(&e))?),
        None => None,
    };

    let account_id = accounts::insert(
        &db,
        &NewAccount {
            email,
            first_name,
            last_name,
            invite_code: &token::new_invite_code(),
            inviter_id: inviter.as_ref().map(|row| row.id),
            line: upline::line_under(inviter.as_ref()),
            created_at: clock::now(),
        },
    )
    .map_err(|e| RpcError::from(&e))?;

    let account = accounts::by_id(&db, account_id).map_err(|e| RpcError::from(&e))?;
    state
        .event_bus
        .emit("AccountRegistered", serde_json::json!({"id": account_id, "email": email}));
    state.notifier.send(
        email,
        "Welcome to the launchpad",
        &format!("Your invite code is {}.", account.invite_code),
    );

    Ok(profile_json(&account))
}

/// Fetch an account profile.
pub async fn get_profile(state: &Arc<DaemonState>, params: &Value) -> Result {
    let email = str_param(params, "email")?;
    let db = state.db.lock().await;
    let account = account_by_email(&db, email)?;
    Ok(profile_json(&account))
}

/// The caller's downline, grouped by line, with status counts.
pub async fn get_partners(state: &Arc<DaemonState>, params: &Value) -> Result {
    let email = str_param(params, "email")?;
    let db = state.db.lock().await;
    let account = account_by_email(&db, email)?;

    let report = downline::downline(&db, account.id).map_err(|e| RpcError::from(&e))?;
    let by_line: Value = report
        .by_line
        .iter()
        .map(|(line, members)| {
            (
                line.to_string(),
                serde_json::json!(members
                    .iter()
                    .map(|m| {
                        serde_json::json!({
                            "id": m.id,
                            "email": m.email,
                            "status": m.status.as_str(),
                            "can_invite": m.can_invite,
                        })
                    })
                    .collect::<Vec<_>>()),
            )
        })
        .collect::<serde_json::Map<String, Value>>()
        .into();

    Ok(serde_json::json!({
        "partners": by_line,
        "stats": {
            "total": report.total(),
            "active": report.active,
            "passive": report.passive,
            "not_active": report.not_active,
        },
    }))
}

/// The caller's inviter chain, nearest first.
pub async fn get_upline(state: &Arc<DaemonState>, params: &Value) -> Result {
    let email = str_param(params, "email")?;
    let db = state.db.lock().await;
    let account = account_by_email(&db, email)?;

    let chain = upline::upline_chain(&db, account.id).map_err(|e| RpcError::from(&e))?;
    let uplines: Vec<Value> = chain
        .iter()
        .map(|row| {
            serde_json::json!({
                "id": row.id,
                "email": row.email,
                "line": row.line,
            })
        })
        .collect();

    Ok(serde_json::json!({"upline": uplines}))
}
