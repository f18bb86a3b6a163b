//! Platform monetary constants.
//!
//! All amounts are `rust_decimal::Decimal`. `Decimal::new` is not `const`,
//! so fractional constants are exposed as constructor functions.

use rust_decimal::Decimal;

/// Ceiling on a participation's cumulative `refund_allocation`, and the
/// threshold at which referral commission distribution becomes active.
pub fn refund_allocation_cap() -> Decimal {
    Decimal::from(650)
}

/// Minimum account balance for joining offering queues and participating.
/// Crossing it from below auto-enrolls the account into open queues.
pub fn queue_min_balance() -> Decimal {
    Decimal::from(651)
}

/// Flat commission charged on every withdrawal.
pub fn withdraw_fee() -> Decimal {
    Decimal::ONE
}

/// Participation debit multiplier: principal plus the 30% reserve buffer.
pub fn reserve_factor() -> Decimal {
    Decimal::new(13, 1)
}

/// The reserve-buffer fraction of a participation (the 0.3 in 1.3x).
pub fn reserve_buffer_factor() -> Decimal {
    Decimal::new(3, 1)
}

/// Hard ceiling on the total commission taken from a distributed income,
/// as a whole-number percent.
pub fn base_commission_pct() -> Decimal {
    Decimal::from(35)
}

/// Default upline share for the given level (0 = immediate inviter), as a
/// whole-number percent. Levels past the tier table pay only VIP accounts.
pub fn tier_pct(level: usize) -> Option<Decimal> {
    match level {
        0 => Some(Decimal::from(6)),
        1 => Some(Decimal::from(4)),
        2 => Some(Decimal::from(2)),
        _ => None,
    }
}

/// Apply a whole-number percent to an amount.
pub fn percent_of(amount: Decimal, pct: Decimal) -> Decimal {
    amount * pct / Decimal::ONE_HUNDRED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(refund_allocation_cap(), Decimal::from(650));
        assert_eq!(queue_min_balance(), Decimal::from(651));
        assert_eq!(withdraw_fee(), Decimal::ONE);
        assert_eq!(reserve_factor().to_string(), "1.3");
        assert_eq!(reserve_buffer_factor().to_string(), "0.3");
        assert_eq!(base_commission_pct(), Decimal::from(35));
    }

    #[test]
    fn test_tier_table() {
        assert_eq!(tier_pct(0), Some(Decimal::from(6)));
        assert_eq!(tier_pct(1), Some(Decimal::from(4)));
        assert_eq!(tier_pct(2), Some(Decimal::from(2)));
        assert_eq!(tier_pct(3), None);
        assert_eq!(tier_pct(10), None);
    }

    #[test]
    fn test_percent_of() {
        let gross = Decimal::from(200);
        assert_eq!(percent_of(gross, Decimal::from(35)), Decimal::from(70));
        assert_eq!(percent_of(gross, Decimal::from(6)), Decimal::from(12));
    }

    #[test]
    fn test_reserve_factor_consistency() {
        // 1.3 = 1 + 0.3
        assert_eq!(reserve_factor(), Decimal::ONE + reserve_buffer_factor());
    }
}
