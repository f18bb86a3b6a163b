//! # idopad-ledger
//!
//! The balance ledger: every value movement between wallet-addressable
//! parties becomes a transaction row, written together with the
//! denormalized balance updates inside one SQLite transaction.
//!
//! ## Modules
//!
//! - [`reserve`] — deposits, withdrawals and referral-balance movements
//! - [`allocation`] — offering participation, refund and pre-approval
//! - [`takeoff`] — the token-income accrual and payout flow
//! - [`status`] — derived account status

pub mod allocation;
pub mod reserve;
pub mod status;
pub mod takeoff;

use rusqlite::{Connection, Transaction};

use idopad_db::queries::coins;
use idopad_db::queries::wallets::{self, AdminWalletRow, MemberWalletRow};
use idopad_db::DbError;
use idopad_types::{AccountId, OfferingId};

/// Error types for ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Commission(#[from] idopad_commission::CommissionError),

    #[error(transparent)]
    Queue(#[from] idopad_queue::QueueError),

    /// Amounts must be strictly positive.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The account has no bound wallet.
    #[error("account {0} has no bound wallet")]
    WalletNotBound(AccountId),

    /// The platform wallet for the quote coin is not configured.
    #[error("the main platform wallet does not exist")]
    AdminWalletMissing,

    /// The account balance cannot cover the movement.
    #[error("insufficient balance: need {required}, have {available}")]
    InsufficientBalance { required: String, available: String },

    /// The movement would dip into the frozen hold.
    #[error("funds are frozen: hold {hold} must remain untouched")]
    HoldLocked { hold: String },

    /// The platform reserve cannot cover the movement.
    #[error("insufficient platform reserve: need {required}, have {available}")]
    InsufficientReserve { required: String, available: String },

    /// The referral balance cannot cover the movement.
    #[error("insufficient referral balance: need {required}, have {available}")]
    InsufficientReferral { required: String, available: String },

    /// The offering's pool has no room left for this allocation.
    #[error("offering {0} allocation is exhausted")]
    AllocationExhausted(OfferingId),

    /// One participation per (offering, account).
    #[error("account {account} already participates in offering {offering}")]
    AlreadyParticipating {
        offering: OfferingId,
        account: AccountId,
    },

    /// The account holds no participation to reverse.
    #[error("account {account} does not participate in offering {offering}")]
    NotParticipating {
        offering: OfferingId,
        account: AccountId,
    },

    /// Participation requires a queue entry.
    #[error("account {account} is not queued for offering {offering}")]
    NotQueued {
        offering: OfferingId,
        account: AccountId,
    },

    /// Pre-approval applies only to manually assigned offerings.
    #[error("offering {0} does not take manual enrollment")]
    ManualEnrollmentOnly(OfferingId),

    /// No offering sells the named coin.
    #[error("no offering sells coin {0}")]
    NoOfferingForCoin(String),

    /// The named coin is not registered.
    #[error("unknown coin {0}")]
    CoinNotFound(String),

    /// The quote coin moves through the reserve flow, not token takeoff.
    #[error("the quote coin cannot be taken off as a token")]
    QuoteCoinNotAllowed,

    /// The coin has no stored quote price yet.
    #[error("coin {0} has no quote price")]
    PriceUnavailable(String),

    /// There are no pending token transactions to process.
    #[error("no pending token transactions")]
    NoPendingTokens,
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Begin the single SQLite transaction wrapping a compound mutation.
pub(crate) fn begin(conn: &mut Connection) -> Result<Transaction<'_>> {
    Ok(conn.transaction().map_err(DbError::from)?)
}

/// The main platform wallet (quote coin).
pub(crate) fn main_wallet(conn: &Connection) -> Result<AdminWalletRow> {
    let quote = coins::quote_coin(conn)?;
    wallets::admin_wallet_for_coin(conn, quote.id).map_err(|e| match e {
        DbError::NotFound(_) => LedgerError::AdminWalletMissing,
        other => LedgerError::Db(other),
    })
}

/// The wallet bound to an account.
pub(crate) fn bound_wallet(conn: &Connection, account_id: AccountId) -> Result<MemberWalletRow> {
    wallets::member_wallet(conn, account_id)?.ok_or(LedgerError::WalletNotBound(account_id))
}
