//! # idopad-referral
//!
//! The referral graph walker: downline traversal with per-depth grouping
//! and status counts, upline (inviter chain) resolution, and write-time
//! maintenance of the inviter relationship — cycle rejection and `line`
//! bookkeeping.
//!
//! ## Modules
//!
//! - [`downline`] — work-stack depth-first downline traversal
//! - [`upline`] — inviter chain and inviter (re)assignment
//! - [`invite`] — invite-code resolution for registration

pub mod downline;
pub mod invite;
pub mod upline;

use idopad_types::AccountId;

/// Error types for referral operations.
#[derive(Debug, thiserror::Error)]
pub enum ReferralError {
    #[error(transparent)]
    Db(#[from] idopad_db::DbError),

    /// Assigning this inviter would make the account its own ancestor.
    #[error("inviter assignment would create a cycle: account {account} is an upline of {inviter}")]
    CycleDetected {
        account: AccountId,
        inviter: AccountId,
    },

    /// An account cannot invite itself.
    #[error("account {0} cannot be its own inviter")]
    SelfInvite(AccountId),

    /// No account owns the presented invite code.
    #[error("no account owns invite code {0}")]
    InviterNotFound(String),

    /// The invite-code owner is not allowed to invite.
    #[error("account {0} is not allowed to invite")]
    InviteNotAllowed(AccountId),
}

pub type Result<T> = std::result::Result<T, ReferralError>;
