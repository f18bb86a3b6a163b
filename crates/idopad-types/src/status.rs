//! Account activity status.

use serde::{Deserialize, Serialize};

/// Business status of an account.
///
/// - `Active`: holds at least one offering participation.
/// - `Passive`: no participation, but balance at or above the queue floor.
/// - `NotActive`: everything else.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Passive,
    NotActive,
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, thiserror::Error)]
#[error("unknown account status: {0}")]
pub struct ParseStatusError(pub String);

impl AccountStatus {
    /// The canonical storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Passive => "passive",
            AccountStatus::NotActive => "not_active",
        }
    }

    /// Parse the storage representation.
    pub fn parse(s: &str) -> Result<Self, ParseStatusError> {
        match s {
            "active" => Ok(AccountStatus::Active),
            "passive" => Ok(AccountStatus::Passive),
            "not_active" => Ok(AccountStatus::NotActive),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
