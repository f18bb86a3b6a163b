//! Administrator command handlers: VIP overrides, priority slots,
//! capability grants, enrollment and reporting.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::Value;

use idopad_db::queries::transactions::TxRow;
use idopad_db::queries::{accounts, coins, participations, queue, transactions, vip};
use idopad_ledger::allocation;
use idopad_queue::priority;
use idopad_types::clock::{self, civil_from_unix, CivilDate};
use idopad_types::money;

use crate::commands::{
    account_by_email, caller, decimal_param, i64_param, require_admin, require_perm, str_param,
    Result,
};
use crate::rpc::RpcError;
use crate::DaemonState;

/// Grantable permission groups and the actions they expand to.
const PERMISSION_GROUPS: [&str; 4] = ["ido", "transaction", "user", "news"];
const PERMISSION_ACTIONS: [&str; 3] = ["add", "change", "delete"];

/// Configure a VIP referral override for an account.
pub async fn add_vip(state: &Arc<DaemonState>, params: &Value) -> Result {
    let email = str_param(params, "email")?;
    let profit = decimal_param(params, "profit")?;
    if profit <= Decimal::ZERO || profit > money::base_commission_pct() {
        return Err(RpcError::validation(
            "profit must be within (0, 35] percent",
        ));
    }

    let db = state.db.lock().await;
    let admin = caller(&db, params)?;
    require_admin(&admin)?;

    let account = account_by_email(&db, email)?;
    vip::set(&db, account.id, profit).map_err(|e| RpcError::from(&e))?;
    Ok(serde_json::json!({"email": email, "profit": profit.to_string()}))
}

/// Remove an account's VIP status.
pub async fn remove_vip(state: &Arc<DaemonState>, params: &Value) -> Result {
    let email = str_param(params, "email")?;
    let db = state.db.lock().await;
    let admin = caller(&db, params)?;
    require_admin(&admin)?;

    let account = account_by_email(&db, email)?;
    vip::remove(&db, account.id).map_err(|e| RpcError::from(&e))?;
    Ok(serde_json::json!({"status": "removed"}))
}

/// All VIP overrides.
pub async fn list_vips(state: &Arc<DaemonState>, params: &Value) -> Result {
    let db = state.db.lock().await;
    let admin = caller(&db, params)?;
    require_perm(&db, &admin, "user")?;

    let mut list = Vec::new();
    for row in vip::all(&db).map_err(|e| RpcError::from(&e))? {
        let account = accounts::by_id(&db, row.account_id).map_err(|e| RpcError::from(&e))?;
        list.push(serde_json::json!({
            "email": account.email,
            "profit": row.profit_pct.to_string(),
        }));
    }
    Ok(serde_json::json!({"vips": list}))
}

/// Set or clear an account's permanent queue slot.
pub async fn set_permanent_place(state: &Arc<DaemonState>, params: &Value) -> Result {
    let email = str_param(params, "email")?;
    let number = params.get("number").and_then(|v| v.as_i64());

    let mut db = state.db.lock().await;
    let admin = caller(&db, params)?;
    require_admin(&admin)?;
    let account = account_by_email(&db, email)?;

    let tx = db
        .transaction()
        .map_err(|e| RpcError::internal_error(&e.to_string()))?;
    match number {
        Some(number) => {
            priority::set_permanent_place(&tx, account.id, number)
                .map_err(|e| RpcError::from(&e))?;
        }
        None => {
            priority::clear_permanent_place(&tx, account.id).map_err(|e| RpcError::from(&e))?;
        }
    }
    tx.commit()
        .map_err(|e| RpcError::internal_error(&e.to_string()))?;

    Ok(serde_json::json!({"email": email, "permanent_place": number}))
}

/// All accounts holding a permanent slot, in slot order.
pub async fn list_permanent_places(state: &Arc<DaemonState>, params: &Value) -> Result {
    let db = state.db.lock().await;
    let admin = caller(&db, params)?;
    require_perm(&db, &admin, "user")?;

    let rows = accounts::with_permanent_place(&db).map_err(|e| RpcError::from(&e))?;
    let list: Vec<Value> = rows
        .iter()
        .map(|row| {
            serde_json::json!({
                "email": row.email,
                "permanent_place": row.permanent_place,
            })
        })
        .collect();
    Ok(serde_json::json!({"priorities": list}))
}

/// Grant permission groups to an account; the `admin` group toggles the
/// staff/superuser flags. An empty list clears everything.
pub async fn grant_permissions(state: &Arc<DaemonState>, params: &Value) -> Result {
    let email = str_param(params, "email")?;
    let groups: Vec<String> = params
        .get("permissions")
        .and_then(|v| v.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .ok_or_else(|| RpcError::invalid_params("permissions required"))?;

    let db = state.db.lock().await;
    let admin = caller(&db, params)?;
    require_admin(&admin)?;
    let account = account_by_email(&db, email)?;

    accounts::clear_permissions(&db, account.id).map_err(|e| RpcError::from(&e))?;
    let mut granted = Vec::new();
    for group in &groups {
        if PERMISSION_GROUPS.contains(&group.as_str()) {
            for action in PERMISSION_ACTIONS {
                let name = format!("{action}_{group}");
                accounts::grant_permission(&db, account.id, &name)
                    .map_err(|e| RpcError::from(&e))?;
                granted.push(name);
            }
            // The bare group name gates the matching admin views.
            accounts::grant_permission(&db, account.id, group).map_err(|e| RpcError::from(&e))?;
            granted.push(group.clone());
        }
    }

    let is_admin = groups.iter().any(|g| g == "admin");
    accounts::set_admin_flags(&db, account.id, is_admin, is_admin)
        .map_err(|e| RpcError::from(&e))?;

    Ok(serde_json::json!({"email": email, "granted": granted, "admin": is_admin}))
}

/// Open the invite capability for an account.
pub async fn allow_invite(state: &Arc<DaemonState>, params: &Value) -> Result {
    let email = str_param(params, "email")?;
    let db = state.db.lock().await;
    let admin = caller(&db, params)?;
    require_admin(&admin)?;

    let account = account_by_email(&db, email)?;
    if account.can_invite {
        return Err(RpcError::conflict("invite capability already open"));
    }
    accounts::set_can_invite(&db, account.id, true).map_err(|e| RpcError::from(&e))?;
    Ok(serde_json::json!({"email": email, "can_invite": true}))
}

/// Enroll a pre-approved participant into a manual offering.
pub async fn pre_approve(state: &Arc<DaemonState>, params: &Value) -> Result {
    let email = str_param(params, "email")?;
    let offering_id = i64_param(params, "offering_id")?;
    let allocation_amount = decimal_param(params, "allocation")?;

    let mut db = state.db.lock().await;
    let admin = caller(&db, params)?;
    require_perm(&db, &admin, "ido")?;
    let account = account_by_email(&db, email)?;

    let outcome = allocation::pre_approve(
        &mut db,
        offering_id,
        account.id,
        allocation_amount,
        clock::now(),
    )
    .map_err(|e| RpcError::from(&e))?;

    Ok(serde_json::json!({
        "participation_id": outcome.participation_id,
        "debited": outcome.debited.to_string(),
    }))
}

/// Remove a pre-approved participant.
pub async fn unenroll(state: &Arc<DaemonState>, params: &Value) -> Result {
    let email = str_param(params, "email")?;
    let offering_id = i64_param(params, "offering_id")?;

    let mut db = state.db.lock().await;
    let admin = caller(&db, params)?;
    require_perm(&db, &admin, "ido")?;
    let account = account_by_email(&db, email)?;

    let outcome = allocation::unenroll(&mut db, offering_id, account.id, clock::now())
        .map_err(|e| RpcError::from(&e))?;
    Ok(serde_json::json!({"credited": outcome.credited.to_string()}))
}

/// Sum of a user's committed allocations.
pub async fn user_allocations(state: &Arc<DaemonState>, params: &Value) -> Result {
    let email = str_param(params, "email")?;
    let db = state.db.lock().await;
    let admin = caller(&db, params)?;
    require_perm(&db, &admin, "user")?;

    let account = account_by_email(&db, email)?;
    let total: Decimal = participations::by_account(&db, account.id)
        .map_err(|e| RpcError::from(&e))?
        .iter()
        .map(|p| p.allocation)
        .sum();
    Ok(serde_json::json!({"email": email, "total_allocation": total.to_string()}))
}

/// Platform-wide dashboard figures.
pub async fn platform_stats(state: &Arc<DaemonState>, params: &Value) -> Result {
    let db = state.db.lock().await;
    let admin = caller(&db, params)?;
    require_perm(&db, &admin, "statistics")?;

    let users = accounts::all(&db).map_err(|e| RpcError::from(&e))?;
    let count_users = users.len();

    let mut investment = Decimal::ZERO;
    for user in &users {
        for part in
            participations::by_account(&db, user.id).map_err(|e| RpcError::from(&e))?
        {
            investment += part.allocation;
        }
    }

    // Pool: every queue-eligible account contributes one refund cap.
    let eligible = users
        .iter()
        .filter(|u| u.balance >= money::queue_min_balance())
        .count();
    let pool = Decimal::from(eligible as i64) * money::refund_allocation_cap();

    let users_in_queues =
        queue::distinct_queued_accounts(&db).map_err(|e| RpcError::from(&e))?;

    let reserve: Decimal = users.iter().map(|u| u.balance).sum();
    let referral_total: Decimal = users.iter().map(|u| u.referral_balance).sum();

    Ok(serde_json::json!({
        "investment": investment.to_string(),
        "count_users": count_users,
        "pool": pool.to_string(),
        "users_in_queues": users_in_queues,
        "balance": (reserve + referral_total).to_string(),
        "reserve": reserve.to_string(),
    }))
}

fn date_of(row: &TxRow) -> CivilDate {
    civil_from_unix(row.created_at)
}

fn in_civil_range(date: CivilDate, from: CivilDate, to: CivilDate) -> bool {
    let key = |d: CivilDate| (d.year, d.month, d.day);
    key(from) <= key(date) && key(date) <= key(to)
}

fn civil_param(params: &Value, key: &str) -> std::result::Result<CivilDate, RpcError> {
    let node = params
        .get(key)
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))?;
    let year = node.get("year").and_then(|v| v.as_i64());
    let month = node.get("month").and_then(|v| v.as_u64());
    let day = node.get("day").and_then(|v| v.as_u64());
    match (year, month, day) {
        (Some(year), Some(month @ 1..=12), Some(day @ 1..=31)) => Ok(CivilDate {
            year,
            month: month as u32,
            day: day as u32,
        }),
        _ => Err(RpcError::invalid_params(&format!("{key} must be a date"))),
    }
}

/// Reserve movement report over an inclusive civil-date range.
pub async fn report_range(state: &Arc<DaemonState>, params: &Value) -> Result {
    let from = civil_param(params, "from")?;
    let to = civil_param(params, "to")?;

    let db = state.db.lock().await;
    let admin = caller(&db, params)?;
    require_perm(&db, &admin, "statistics")?;

    let quote = coins::quote_coin(&db).map_err(|e| RpcError::from(&e))?;
    let rows = transactions::in_range(&db, quote.id, 0, i64::MAX as u64)
        .map_err(|e| RpcError::from(&e))?;

    let mut fill_reserve = Decimal::ZERO;
    let mut takeoff_reserve = Decimal::ZERO;
    let mut referrals = Decimal::ZERO;
    let mut commission_income = Decimal::ZERO;

    for row in rows.iter().filter(|r| in_civil_range(date_of(r), from, to)) {
        if row.flags.fill_up {
            fill_reserve += row.amount;
        }
        if row.flags.received {
            takeoff_reserve += row.amount;
        }
        if row.flags.referral {
            referrals += row.amount;
        }
        if row.flags.commission {
            commission_income += row.amount;
        }
    }

    Ok(serde_json::json!({
        "fill_reserve": fill_reserve.to_string(),
        "takeoff_reserve": takeoff_reserve.to_string(),
        "referrals": referrals.to_string(),
        "commission_income": commission_income.to_string(),
    }))
}

/// Commission income of the platform, bucketed by month of a year.
pub async fn monthly_commission_income(state: &Arc<DaemonState>, params: &Value) -> Result {
    let year = i64_param(params, "year")?;

    let db = state.db.lock().await;
    let admin = caller(&db, params)?;
    require_perm(&db, &admin, "statistics")?;

    let quote = coins::quote_coin(&db).map_err(|e| RpcError::from(&e))?;
    let rows = transactions::in_range(&db, quote.id, 0, i64::MAX as u64)
        .map_err(|e| RpcError::from(&e))?;

    let mut months = [Decimal::ZERO; 12];
    for row in rows.iter().filter(|r| r.flags.commission) {
        let date = date_of(row);
        if date.year == year {
            months[(date.month - 1) as usize] += row.amount;
        }
    }

    let report: serde_json::Map<String, Value> = months
        .iter()
        .enumerate()
        .map(|(i, total)| ((i + 1).to_string(), Value::String(total.to_string())))
        .collect();
    Ok(Value::Object(report))
}

/// Per-user overview with downline statistics.
pub async fn users_info(state: &Arc<DaemonState>, params: &Value) -> Result {
    let db = state.db.lock().await;
    let admin = caller(&db, params)?;
    require_perm(&db, &admin, "user")?;

    let mut list = Vec::new();
    for user in accounts::all(&db).map_err(|e| RpcError::from(&e))? {
        let report =
            idopad_referral::downline::downline(&db, user.id).map_err(|e| RpcError::from(&e))?;
        list.push(serde_json::json!({
            "email": user.email,
            "status": user.status.as_str(),
            "line": user.line,
            "balance": user.balance.to_string(),
            "referral_balance": user.referral_balance.to_string(),
            "partners": {
                "total": report.total(),
                "active": report.active,
                "passive": report.passive,
                "not_active": report.not_active,
            },
        }));
    }
    Ok(serde_json::json!({"users": list}))
}
