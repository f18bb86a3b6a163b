//! # idopad-queue
//!
//! Per-offering waiting-list manager. Each offering queue is a dense
//! 1-based ordering of accounts: after every insertion, removal or move the
//! set of numbers is exactly `{1..N}`. Slots come in two kinds — transient
//! (date-ordered, appended at the tail) and permanent (admin-assigned fixed
//! positions).
//!
//! ## Modules
//!
//! - [`placement`] — joining a queue and participation eligibility
//! - [`priority`] — permanent-slot assignment, clearing, and the queue
//!   refresh that keeps numbering dense

pub mod placement;
pub mod priority;

use idopad_types::{AccountId, OfferingId};

/// Error types for queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error(transparent)]
    Db(#[from] idopad_db::DbError),

    /// The account already holds an entry in this offering's queue.
    #[error("account {account} is already queued for offering {offering}")]
    AlreadyQueued {
        offering: OfferingId,
        account: AccountId,
    },

    /// The account's balance is below the queue floor.
    #[error("balance {available} is below the queue minimum {required}")]
    BalanceTooLow { required: String, available: String },

    /// The offering's queue is assigned manually (pre-approved rounds).
    #[error("offering {0} queue is assigned manually")]
    ManualQueue(OfferingId),

    /// Queue numbers are 1-based.
    #[error("queue number {0} is out of range")]
    InvalidNumber(i64),

    /// The account holds no permanent slot to clear.
    #[error("account {0} holds no permanent place")]
    NoPermanentPlace(AccountId),

    /// The account is not queued for the offering.
    #[error("account {account} is not queued for offering {offering}")]
    NotQueued {
        offering: OfferingId,
        account: AccountId,
    },

    /// The queue position is past the offering's participant capacity.
    #[error("queue position {number} exceeds the participant limit {limit}")]
    PositionIneligible { number: i64, limit: i64 },
}

pub type Result<T> = std::result::Result<T, QueueError>;
