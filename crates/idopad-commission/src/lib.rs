//! # idopad-commission
//!
//! Referral commission distribution.
//!
//! Of every eligible income, 35% is taken as commission — a hard ceiling —
//! and split between the payer's uplines (tiered 6/4/2 percent, VIP
//! overrides, at most four levels) and the platform reserve, which absorbs
//! the remainder.
//!
//! ## Modules
//!
//! - [`rates`] — pure share computation with ceiling validation
//! - [`distribute`] — ledger application of a computed plan
//! - [`scan`] — platform-wallet scan feeding pro-rata token distribution

pub mod distribute;
pub mod rates;
pub mod scan;

use idopad_types::AccountId;

/// Error types for commission operations.
#[derive(Debug, thiserror::Error)]
pub enum CommissionError {
    #[error(transparent)]
    Db(#[from] idopad_db::DbError),

    #[error(transparent)]
    Referral(#[from] idopad_referral::ReferralError),

    /// Configured upline shares exceed the 35% ceiling.
    #[error("upline shares total {total_pct}%, above the {ceiling_pct}% ceiling")]
    CeilingExceeded { total_pct: String, ceiling_pct: String },

    /// A paid party has no bound wallet; the distribution is aborted whole.
    #[error("account {0} has no bound wallet")]
    WalletNotBound(AccountId),

    /// The offering has no coin or contract configured for distribution.
    #[error("offering {0} is not configured for token distribution")]
    OfferingNotDistributable(idopad_types::OfferingId),
}

pub type Result<T> = std::result::Result<T, CommissionError>;
