//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! JSON-RPC method calls to the appropriate command handlers. Service
//! errors map onto distinct error codes so callers can tell insufficient
//! funds from a missing wallet from an internal fault.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tracing::{debug, error, info, warn};

use idopad_commission::CommissionError;
use idopad_ledger::LedgerError;
use idopad_queue::QueueError;
use idopad_referral::ReferralError;

use crate::commands;
use crate::DaemonState;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Method name.
    pub method: String,
    /// Parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Result or error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    /// Error code.
    pub code: i32,
    /// Error name.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    // Standard JSON-RPC errors

    /// Parse error (-32700).
    pub fn parse_error() -> Self {
        Self {
            code: -32700,
            message: "PARSE_ERROR".to_string(),
            data: None,
        }
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: "METHOD_NOT_FOUND".to_string(),
            data: Some(serde_json::json!({"method": method})),
        }
    }

    /// Invalid params (-32602).
    pub fn invalid_params(detail: &str) -> Self {
        Self {
            code: -32602,
            message: "INVALID_PARAMS".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Internal error (-32603).
    pub fn internal_error(detail: &str) -> Self {
        Self {
            code: -32603,
            message: "INTERNAL_ERROR".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    // Taxonomy errors

    /// Validation error (-32000).
    pub fn validation(detail: &str) -> Self {
        Self {
            code: -32000,
            message: "VALIDATION_ERROR".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Resource absence (-32010).
    pub fn not_found(detail: &str) -> Self {
        Self {
            code: -32010,
            message: "NOT_FOUND".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// State conflict (-32020).
    pub fn conflict(detail: &str) -> Self {
        Self {
            code: -32020,
            message: "STATE_CONFLICT".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Authorization failure (-32030).
    pub fn permission_denied() -> Self {
        Self {
            code: -32030,
            message: "PERMISSION_DENIED".to_string(),
            data: None,
        }
    }

    /// Insufficient balance (-32040).
    pub fn insufficient_balance(detail: &str) -> Self {
        Self {
            code: -32040,
            message: "INSUFFICIENT_BALANCE".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Insufficient platform reserve (-32041).
    pub fn insufficient_reserve(detail: &str) -> Self {
        Self {
            code: -32041,
            message: "INSUFFICIENT_RESERVE".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Frozen funds (-32042).
    pub fn hold_locked(detail: &str) -> Self {
        Self {
            code: -32042,
            message: "HOLD_LOCKED".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Queue position past capacity (-32050).
    pub fn position_ineligible(detail: &str) -> Self {
        Self {
            code: -32050,
            message: "QUEUE_POSITION_INELIGIBLE".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Commission ceiling exceeded (-32051).
    pub fn commission_ceiling(detail: &str) -> Self {
        Self {
            code: -32051,
            message: "COMMISSION_CEILING_EXCEEDED".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Allocation pool exhausted (-32052).
    pub fn allocation_exhausted(detail: &str) -> Self {
        Self {
            code: -32052,
            message: "ALLOCATION_EXHAUSTED".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Missing wallet binding (-32060).
    pub fn wallet_not_bound(detail: &str) -> Self {
        Self {
            code: -32060,
            message: "WALLET_NOT_BOUND".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }
}

impl From<&idopad_db::DbError> for RpcError {
    fn from(e: &idopad_db::DbError) -> Self {
        match e {
            idopad_db::DbError::NotFound(_) => RpcError::not_found(&e.to_string()),
            idopad_db::DbError::Constraint(_) => RpcError::conflict(&e.to_string()),
            other => RpcError::internal_error(&other.to_string()),
        }
    }
}

impl From<&ReferralError> for RpcError {
    fn from(e: &ReferralError) -> Self {
        match e {
            ReferralError::Db(db) => db.into(),
            ReferralError::InviterNotFound(_) => RpcError::not_found(&e.to_string()),
            ReferralError::CycleDetected { .. }
            | ReferralError::SelfInvite(_)
            | ReferralError::InviteNotAllowed(_) => RpcError::validation(&e.to_string()),
        }
    }
}

impl From<&QueueError> for RpcError {
    fn from(e: &QueueError) -> Self {
        match e {
            QueueError::Db(db) => db.into(),
            QueueError::AlreadyQueued { .. } => RpcError::conflict(&e.to_string()),
            QueueError::BalanceTooLow { .. } => RpcError::insufficient_balance(&e.to_string()),
            QueueError::ManualQueue(_) | QueueError::InvalidNumber(_) => {
                RpcError::validation(&e.to_string())
            }
            QueueError::NoPermanentPlace(_) | QueueError::NotQueued { .. } => {
                RpcError::not_found(&e.to_string())
            }
            QueueError::PositionIneligible { .. } => RpcError::position_ineligible(&e.to_string()),
        }
    }
}

impl From<&CommissionError> for RpcError {
    fn from(e: &CommissionError) -> Self {
        match e {
            CommissionError::Db(db) => db.into(),
            CommissionError::Referral(r) => r.into(),
            CommissionError::CeilingExceeded { .. } => RpcError::commission_ceiling(&e.to_string()),
            CommissionError::WalletNotBound(_) => RpcError::wallet_not_bound(&e.to_string()),
            CommissionError::OfferingNotDistributable(_) => RpcError::validation(&e.to_string()),
        }
    }
}

impl From<&LedgerError> for RpcError {
    fn from(e: &LedgerError) -> Self {
        match e {
            LedgerError::Db(db) => db.into(),
            LedgerError::Commission(c) => c.into(),
            LedgerError::Queue(q) => q.into(),
            LedgerError::InvalidAmount(_)
            | LedgerError::QuoteCoinNotAllowed
            | LedgerError::ManualEnrollmentOnly(_) => RpcError::validation(&e.to_string()),
            LedgerError::WalletNotBound(_) => RpcError::wallet_not_bound(&e.to_string()),
            LedgerError::AdminWalletMissing
            | LedgerError::CoinNotFound(_)
            | LedgerError::NoOfferingForCoin(_)
            | LedgerError::NotParticipating { .. }
            | LedgerError::NotQueued { .. }
            | LedgerError::PriceUnavailable(_)
            | LedgerError::NoPendingTokens => RpcError::not_found(&e.to_string()),
            LedgerError::InsufficientBalance { .. } | LedgerError::InsufficientReferral { .. } => {
                RpcError::insufficient_balance(&e.to_string())
            }
            LedgerError::InsufficientReserve { .. } => {
                RpcError::insufficient_reserve(&e.to_string())
            }
            LedgerError::HoldLocked { .. } => RpcError::hold_locked(&e.to_string()),
            LedgerError::AllocationExhausted(_) => RpcError::allocation_exhausted(&e.to_string()),
            LedgerError::AlreadyParticipating { .. } => RpcError::conflict(&e.to_string()),
        }
    }
}

/// The RPC server.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    /// Create a new RPC server.
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove stale socket file
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("IPC server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream).await {
                            warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection.
async fn handle_connection(
    state: Arc<DaemonState>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // EOF
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => dispatch_request(state.clone(), request).await,
            Err(_) => RpcResponse::error(serde_json::Value::Null, RpcError::parse_error()),
        };

        let mut response_json = serde_json::to_string(&response)?;
        response_json.push('\n');
        writer.write_all(response_json.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
async fn dispatch_request(state: Arc<DaemonState>, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    let method = request.method.as_str();
    let params = &request.params;

    debug!("Dispatching RPC method: {}", method);

    let result = match method {
        // Account commands
        "register_account" => commands::account::register(&state, params).await,
        "get_profile" => commands::account::get_profile(&state, params).await,
        "get_partners" => commands::account::get_partners(&state, params).await,
        "get_upline" => commands::account::get_upline(&state, params).await,

        // Ledger commands
        "deposit" => commands::ledger::deposit(&state, params).await,
        "withdraw" => commands::ledger::withdraw(&state, params).await,
        "withdraw_referral" => commands::ledger::withdraw_referral(&state, params).await,
        "convert_referral" => commands::ledger::convert_referral(&state, params).await,
        "get_balance" => commands::ledger::get_balance(&state, params).await,
        "get_transactions" => commands::ledger::get_transactions(&state, params).await,

        // Offering commands
        "create_offering" => commands::offering::create(&state, params).await,
        "update_offering" => commands::offering::update(&state, params).await,
        "delete_offering" => commands::offering::delete(&state, params).await,
        "get_offering" => commands::offering::get(&state, params).await,
        "list_offerings" => commands::offering::list(&state, params).await,
        "participate" => commands::offering::participate(&state, params).await,
        "refund_participation" => commands::offering::refund(&state, params).await,
        "join_queue" => commands::offering::join_queue(&state, params).await,
        "get_queue" => commands::offering::get_queue(&state, params).await,

        // Wallet commands
        "bind_wallet" => commands::wallet::bind(&state, params).await,
        "get_wallet" => commands::wallet::get(&state, params).await,
        "get_admin_wallet" => commands::wallet::get_admin(&state, params).await,
        "create_token_wallet" => commands::wallet::create_token_wallet(&state, params).await,
        "try_takeoff" => commands::wallet::try_takeoff(&state, params).await,
        "confirm_takeoff" => commands::wallet::confirm_takeoff(&state, params).await,

        // Admin commands
        "add_vip" => commands::admin::add_vip(&state, params).await,
        "remove_vip" => commands::admin::remove_vip(&state, params).await,
        "list_vips" => commands::admin::list_vips(&state, params).await,
        "set_permanent_place" => commands::admin::set_permanent_place(&state, params).await,
        "list_permanent_places" => commands::admin::list_permanent_places(&state, params).await,
        "grant_permissions" => commands::admin::grant_permissions(&state, params).await,
        "allow_invite" => commands::admin::allow_invite(&state, params).await,
        "pre_approve" => commands::admin::pre_approve(&state, params).await,
        "unenroll" => commands::admin::unenroll(&state, params).await,
        "user_allocations" => commands::admin::user_allocations(&state, params).await,
        "platform_stats" => commands::admin::platform_stats(&state, params).await,
        "report_range" => commands::admin::report_range(&state, params).await,
        "monthly_commission_income" => {
            commands::admin::monthly_commission_income(&state, params).await
        }
        "users_info" => commands::admin::users_info(&state, params).await,

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => RpcResponse::error(id, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_codes() {
        assert_eq!(RpcError::validation("x").code, -32000);
        assert_eq!(RpcError::not_found("x").code, -32010);
        assert_eq!(RpcError::conflict("x").code, -32020);
        assert_eq!(RpcError::permission_denied().code, -32030);
        assert_eq!(RpcError::insufficient_balance("x").code, -32040);
        assert_eq!(RpcError::commission_ceiling("x").code, -32051);
        assert_eq!(RpcError::method_not_found("unknown").code, -32601);
    }

    #[test]
    fn test_ledger_error_mapping() {
        let err = LedgerError::InsufficientBalance {
            required: "131".to_string(),
            available: "100".to_string(),
        };
        assert_eq!(RpcError::from(&err).code, -32040);

        let err = LedgerError::WalletNotBound(7);
        assert_eq!(RpcError::from(&err).code, -32060);

        let err = LedgerError::AlreadyParticipating {
            offering: 1,
            account: 2,
        };
        assert_eq!(RpcError::from(&err).code, -32020);
    }

    #[test]
    fn test_queue_error_mapping() {
        let err = QueueError::PositionIneligible {
            number: 11,
            limit: 10,
        };
        assert_eq!(RpcError::from(&err).code, -32050);
    }

    #[test]
    fn test_rpc_response_shapes() {
        let resp = RpcResponse::success(serde_json::json!(1), serde_json::json!({"ok": true}));
        assert!(resp.result.is_some());
        assert!(resp.error.is_none());

        let resp = RpcResponse::error(serde_json::json!(1), RpcError::internal_error("test"));
        assert!(resp.result.is_none());
        assert!(resp.error.is_some());
    }
}
