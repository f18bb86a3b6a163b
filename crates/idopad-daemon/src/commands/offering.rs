//! Offering command handlers: CRUD, queues and participation.

use std::sync::Arc;

use rusqlite::Connection;
use serde_json::Value;

use idopad_db::queries::offerings::{self, NewOffering, OfferingRow};
use idopad_db::queries::{accounts, coins, participations, queue, wallets};
use idopad_ledger::allocation;
use idopad_queue::placement;
use idopad_types::clock;

use crate::commands::{caller, decimal_param, i64_param, require_perm, str_param, Result};
use crate::rpc::RpcError;
use crate::DaemonState;

fn offering_json(conn: &Connection, offering: &OfferingRow) -> std::result::Result<Value, RpcError> {
    let coin = match offering.coin_id {
        Some(id) => Some(coins::by_id(conn, id).map_err(|e| RpcError::from(&e))?),
        None => None,
    };
    let contract = match offering.smartcontract_id {
        Some(id) => Some(wallets::address_by_id(conn, id).map_err(|e| RpcError::from(&e))?),
        None => None,
    };
    Ok(serde_json::json!({
        "id": offering.id,
        "name": offering.name,
        "description": offering.description,
        "general_allocation": offering.general_allocation.to_string(),
        "person_allocation": offering.person_allocation.to_string(),
        "buy_date": offering.buy_date,
        "tge": offering.tge,
        "vesting": offering.vesting,
        "coin": coin.map(|c| c.symbol),
        "smartcontract": contract.map(|a| a.address),
        "telegram": offering.telegram,
        "twitter": offering.twitter,
        "discord": offering.discord,
        "site": offering.site,
        "white_paper": offering.white_paper,
        "without_pay": offering.without_pay,
        "charge_manually": offering.charge_manually,
        "max_participants": offering.max_participants(),
    }))
}

/// Resolve the coin and smart-contract references of an offering payload.
///
/// The coin is created on first use; a contract address that already
/// belongs to something else is a state conflict.
fn resolve_references(
    conn: &Connection,
    params: &Value,
) -> std::result::Result<(Option<i64>, Option<i64>), RpcError> {
    let coin_id = match (
        params.get("coin").and_then(|v| v.as_str()),
        params.get("coin_network").and_then(|v| v.as_str()),
    ) {
        (Some(symbol), Some(network)) => Some(
            coins::upsert(conn, symbol, network)
                .map_err(|e| RpcError::from(&e))?
                .id,
        ),
        (Some(symbol), None) => Some(
            coins::upsert(conn, symbol, idopad_types::QUOTE_NETWORK)
                .map_err(|e| RpcError::from(&e))?
                .id,
        ),
        _ => None,
    };

    let contract_id = match params.get("smartcontract").and_then(|v| v.as_str()) {
        Some(address) => {
            let existing = wallets::find_address(conn, address).map_err(|e| RpcError::from(&e))?;
            match existing {
                Some(row) => Some(row.id),
                None => Some(
                    wallets::create_address(conn, address, coin_id, false)
                        .map_err(|e| RpcError::from(&e))?,
                ),
            }
        }
        None => None,
    };

    Ok((coin_id, contract_id))
}

fn new_offering_from<'a>(
    params: &'a Value,
    coin_id: Option<i64>,
    contract_id: Option<i64>,
    now: u64,
) -> std::result::Result<NewOffering<'a>, RpcError> {
    Ok(NewOffering {
        name: str_param(params, "name")?,
        description: params.get("description").and_then(|v| v.as_str()).unwrap_or(""),
        general_allocation: decimal_param(params, "general_allocation")?,
        person_allocation: decimal_param(params, "person_allocation")?,
        buy_date: params.get("buy_date").and_then(|v| v.as_u64()).unwrap_or(0),
        tge: params.get("tge").and_then(|v| v.as_u64()).unwrap_or(0),
        vesting: params.get("vesting").and_then(|v| v.as_str()).unwrap_or(""),
        smartcontract_id: contract_id,
        coin_id,
        telegram: params.get("telegram").and_then(|v| v.as_str()),
        twitter: params.get("twitter").and_then(|v| v.as_str()),
        discord: params.get("discord").and_then(|v| v.as_str()),
        site: params.get("site").and_then(|v| v.as_str()),
        white_paper: params.get("white_paper").and_then(|v| v.as_str()),
        without_pay: params.get("without_pay").and_then(|v| v.as_bool()).unwrap_or(false),
        charge_manually: params
            .get("charge_manually")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        created_at: now,
    })
}

/// Create an offering (requires the `ido` permission).
pub async fn create(state: &Arc<DaemonState>, params: &Value) -> Result {
    let db = state.db.lock().await;
    let admin = caller(&db, params)?;
    require_perm(&db, &admin, "ido")?;

    let (coin_id, contract_id) = resolve_references(&db, params)?;
    let new_offering = new_offering_from(params, coin_id, contract_id, clock::now())?;
    if new_offering.person_allocation.is_zero() || new_offering.general_allocation.is_zero() {
        return Err(RpcError::validation("allocations must be positive"));
    }

    let id = offerings::insert(&db, &new_offering).map_err(|e| RpcError::from(&e))?;
    let offering = offerings::by_id(&db, id).map_err(|e| RpcError::from(&e))?;

    state
        .event_bus
        .emit("OfferingCreated", serde_json::json!({"id": id, "name": offering.name}));
    offering_json(&db, &offering)
}

/// Update an offering (requires the `ido` permission).
pub async fn update(state: &Arc<DaemonState>, params: &Value) -> Result {
    let offering_id = i64_param(params, "offering_id")?;
    let db = state.db.lock().await;
    let admin = caller(&db, params)?;
    require_perm(&db, &admin, "ido")?;

    offerings::by_id(&db, offering_id).map_err(|e| RpcError::from(&e))?;
    let (coin_id, contract_id) = resolve_references(&db, params)?;
    let new_offering = new_offering_from(params, coin_id, contract_id, clock::now())?;

    // An update must not shrink the pool below what is already committed.
    let committed =
        participations::total_allocated(&db, offering_id).map_err(|e| RpcError::from(&e))?;
    if new_offering.general_allocation < committed {
        return Err(RpcError::allocation_exhausted(
            "general allocation below committed participations",
        ));
    }

    offerings::update(&db, offering_id, &new_offering).map_err(|e| RpcError::from(&e))?;
    let offering = offerings::by_id(&db, offering_id).map_err(|e| RpcError::from(&e))?;
    offering_json(&db, &offering)
}

/// Delete an offering (requires the `ido` permission). Outstanding
/// participations freeze their principal as hold.
pub async fn delete(state: &Arc<DaemonState>, params: &Value) -> Result {
    let offering_id = i64_param(params, "offering_id")?;
    let db = state.db.lock().await;
    let admin = caller(&db, params)?;
    require_perm(&db, &admin, "ido")?;

    let parts = participations::by_offering(&db, offering_id).map_err(|e| RpcError::from(&e))?;
    for part in &parts {
        let account = accounts::by_id(&db, part.account_id).map_err(|e| RpcError::from(&e))?;
        accounts::set_balances(
            &db,
            account.id,
            account.balance,
            account.referral_balance,
            account.hold + part.allocation,
        )
        .map_err(|e| RpcError::from(&e))?;
    }
    offerings::delete(&db, offering_id).map_err(|e| RpcError::from(&e))?;

    state
        .event_bus
        .emit("OfferingDeleted", serde_json::json!({"id": offering_id}));
    Ok(serde_json::json!({"deleted": offering_id, "participants_released": parts.len()}))
}

/// Fetch one offering.
pub async fn get(state: &Arc<DaemonState>, params: &Value) -> Result {
    let offering_id = i64_param(params, "offering_id")?;
    let db = state.db.lock().await;
    let offering = offerings::by_id(&db, offering_id).map_err(|e| RpcError::from(&e))?;
    offering_json(&db, &offering)
}

/// List all offerings, newest first.
pub async fn list(state: &Arc<DaemonState>, _params: &Value) -> Result {
    let db = state.db.lock().await;
    let rows = offerings::all(&db).map_err(|e| RpcError::from(&e))?;
    let list: std::result::Result<Vec<Value>, RpcError> =
        rows.iter().map(|o| offering_json(&db, o)).collect();
    Ok(serde_json::json!({"offerings": list?}))
}

/// Participate in an offering from the caller's queue position.
pub async fn participate(state: &Arc<DaemonState>, params: &Value) -> Result {
    let offering_id = i64_param(params, "offering_id")?;
    let mut db = state.db.lock().await;
    let account = caller(&db, params)?;

    let outcome = allocation::participate(&mut db, account.id, offering_id, clock::now())
        .map_err(|e| RpcError::from(&e))?;

    state.event_bus.emit(
        "ParticipationCreated",
        serde_json::json!({
            "account": account.email,
            "offering": offering_id,
            "debited": outcome.debited.to_string(),
        }),
    );

    Ok(serde_json::json!({
        "participation_id": outcome.participation_id,
        "debited": outcome.debited.to_string(),
        "reserve_buffer": outcome.reserve_buffer.to_string(),
        "inviter_bonus": outcome.inviter_bonus.map(|(_, b)| b.to_string()),
    }))
}

/// Refund the caller's participation.
pub async fn refund(state: &Arc<DaemonState>, params: &Value) -> Result {
    let offering_id = i64_param(params, "offering_id")?;
    let mut db = state.db.lock().await;
    let account = caller(&db, params)?;

    let outcome = allocation::refund(&mut db, offering_id, account.id, clock::now())
        .map_err(|e| RpcError::from(&e))?;

    state.event_bus.emit(
        "ParticipationRefunded",
        serde_json::json!({
            "account": account.email,
            "offering": offering_id,
            "credited": outcome.credited.to_string(),
        }),
    );

    Ok(serde_json::json!({
        "credited": outcome.credited.to_string(),
        "unwound_referrals": outcome.unwound_referrals,
    }))
}

/// Join an offering's waiting queue.
pub async fn join_queue(state: &Arc<DaemonState>, params: &Value) -> Result {
    let offering_id = i64_param(params, "offering_id")?;
    let mut db = state.db.lock().await;
    let account = caller(&db, params)?;
    let offering = offerings::by_id(&db, offering_id).map_err(|e| RpcError::from(&e))?;

    let tx = db.transaction().map_err(|e| RpcError::internal_error(&e.to_string()))?;
    let entry =
        placement::join(&tx, &offering, &account, clock::now()).map_err(|e| RpcError::from(&e))?;
    tx.commit().map_err(|e| RpcError::internal_error(&e.to_string()))?;

    state.event_bus.emit(
        "QueueJoined",
        serde_json::json!({
            "account": account.email,
            "offering": offering_id,
            "number": entry.number,
        }),
    );

    Ok(serde_json::json!({
        "number": entry.number,
        "permanent": entry.permanent,
    }))
}

/// The queue of an offering, in order.
pub async fn get_queue(state: &Arc<DaemonState>, params: &Value) -> Result {
    let offering_id = i64_param(params, "offering_id")?;
    let db = state.db.lock().await;
    offerings::by_id(&db, offering_id).map_err(|e| RpcError::from(&e))?;

    let entries = queue::by_offering(&db, offering_id).map_err(|e| RpcError::from(&e))?;
    let mut list = Vec::with_capacity(entries.len());
    for entry in &entries {
        let account = accounts::by_id(&db, entry.account_id).map_err(|e| RpcError::from(&e))?;
        list.push(serde_json::json!({
            "number": entry.number,
            "email": account.email,
            "permanent": entry.permanent,
        }));
    }
    Ok(serde_json::json!({"queue": list}))
}
