//! IPC command handlers.
//!
//! Each submodule implements the commands for one category. The caller's
//! identity is resolved by the external identity service; requests carry
//! the resolved account email in a `caller` parameter, and admin commands
//! check the account's capability flags.

pub mod account;
pub mod admin;
pub mod ledger;
pub mod offering;
pub mod wallet;

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde_json::Value;

use idopad_db::queries::accounts::{self, AccountRow};

use crate::rpc::RpcError;

pub(crate) type Result = std::result::Result<Value, RpcError>;

/// Extract a required string parameter.
pub(crate) fn str_param<'a>(params: &'a Value, key: &str) -> std::result::Result<&'a str, RpcError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))
}

/// Extract a required integer parameter.
pub(crate) fn i64_param(params: &Value, key: &str) -> std::result::Result<i64, RpcError> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))
}

/// Extract a required decimal parameter (JSON number or string).
pub(crate) fn decimal_param(params: &Value, key: &str) -> std::result::Result<Decimal, RpcError> {
    let value = params
        .get(key)
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))?;
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return Err(RpcError::invalid_params(&format!("{key} must be a number"))),
    };
    text.parse()
        .map_err(|_| RpcError::invalid_params(&format!("{key} is not a valid amount")))
}

/// Minimal email shape validation.
pub(crate) fn validate_email(email: &str) -> std::result::Result<(), RpcError> {
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    if local.is_empty() || domain.is_empty() || !domain.contains('.') || email.contains(' ') {
        return Err(RpcError::validation("malformed email address"));
    }
    Ok(())
}

/// Resolve an account by email.
pub(crate) fn account_by_email(
    conn: &Connection,
    email: &str,
) -> std::result::Result<AccountRow, RpcError> {
    accounts::find_by_email(conn, email)
        .map_err(|e| RpcError::from(&e))?
        .ok_or_else(|| RpcError::not_found(&format!("account {email}")))
}

/// Resolve the calling account from the `caller` parameter.
pub(crate) fn caller(
    conn: &Connection,
    params: &Value,
) -> std::result::Result<AccountRow, RpcError> {
    let email = str_param(params, "caller")?;
    account_by_email(conn, email)
}

/// Require staff or superuser capability.
pub(crate) fn require_admin(account: &AccountRow) -> std::result::Result<(), RpcError> {
    if account.is_staff || account.is_superuser {
        Ok(())
    } else {
        Err(RpcError::permission_denied())
    }
}

/// Require a named permission (superusers pass).
pub(crate) fn require_perm(
    conn: &Connection,
    account: &AccountRow,
    perm: &str,
) -> std::result::Result<(), RpcError> {
    if account.is_superuser {
        return Ok(());
    }
    let held = accounts::has_permission(conn, account.id, perm).map_err(|e| RpcError::from(&e))?;
    if held {
        Ok(())
    } else {
        Err(RpcError::permission_denied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("user.name@sub.example.com").is_ok());
        assert!(validate_email("userexample.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@example").is_err());
        assert!(validate_email("us er@example.com").is_err());
    }

    #[test]
    fn test_decimal_param_accepts_string_and_number() {
        let params = serde_json::json!({"a": "1.3", "b": 100, "c": true});
        assert_eq!(
            decimal_param(&params, "a").expect("a"),
            "1.3".parse::<Decimal>().expect("dec")
        );
        assert_eq!(decimal_param(&params, "b").expect("b"), Decimal::from(100));
        assert!(decimal_param(&params, "c").is_err());
        assert!(decimal_param(&params, "missing").is_err());
    }
}
