//! Commission share computation.
//!
//! Pure functions over the upline chain; no database access. Levels are
//! indexed from the immediate inviter (0). Defaults are 6/4/2 percent for
//! levels 0-2; a VIP override replaces the default at its level, and level
//! 3 pays only VIP uplines. Traversal never goes past level 3.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use idopad_types::{money, AccountId, MAX_COMMISSION_LEVELS};

use crate::{CommissionError, Result};

/// One upline as seen by the planner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Upline {
    pub account_id: AccountId,
    /// Admin-configured override, whole-number percent.
    pub vip_pct: Option<Decimal>,
}

/// A computed per-upline share, whole-number percent of the gross.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UplineShare {
    pub account_id: AccountId,
    pub level: usize,
    pub pct: Decimal,
}

/// The full commission plan for one distribution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionPlan {
    /// Paid upline shares, immediate inviter first.
    pub shares: Vec<UplineShare>,
    /// Remainder of the 35% flowing to the platform reserve.
    pub reserve_pct: Decimal,
}

/// Compute the commission plan for an upline chain (nearest first).
///
/// # Errors
///
/// - [`CommissionError::CeilingExceeded`] if the configured shares sum to
///   more than the 35% ceiling
pub fn commission_plan(uplines: &[Upline]) -> Result<CommissionPlan> {
    let ceiling = money::base_commission_pct();
    let mut shares = Vec::new();
    let mut paid_pct = Decimal::ZERO;

    for (level, upline) in uplines.iter().take(MAX_COMMISSION_LEVELS).enumerate() {
        let pct = match (upline.vip_pct, money::tier_pct(level)) {
            (Some(vip), _) => vip,
            (None, Some(default)) => default,
            // Non-VIP uplines past the tier table earn nothing.
            (None, None) => continue,
        };
        if pct.is_zero() {
            continue;
        }
        paid_pct += pct;
        shares.push(UplineShare {
            account_id: upline.account_id,
            level,
            pct,
        });
    }

    if paid_pct > ceiling {
        return Err(CommissionError::CeilingExceeded {
            total_pct: paid_pct.to_string(),
            ceiling_pct: ceiling.to_string(),
        });
    }

    Ok(CommissionPlan {
        shares,
        reserve_pct: ceiling - paid_pct,
    })
}

/// Amounts produced by applying a plan to a gross figure at a fixed scale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanAmounts {
    /// Total commission: exactly 35% of gross (rounded to scale).
    pub total: Decimal,
    /// Per-share payouts, aligned with the plan's shares.
    pub paid: Vec<Decimal>,
    /// Reserve remainder; absorbs per-share rounding so that
    /// `paid.sum() + reserve == total` exactly.
    pub reserve: Decimal,
}

/// Apply a plan to a gross amount with the wallet's decimal scale.
///
/// # Errors
///
/// - [`CommissionError::CeilingExceeded`] if per-share rounding pushes the
///   paid sum above the total commission
pub fn plan_amounts(plan: &CommissionPlan, gross: Decimal, scale: u32) -> Result<PlanAmounts> {
    let total = money::percent_of(gross, money::base_commission_pct()).round_dp(scale);
    let paid: Vec<Decimal> = plan
        .shares
        .iter()
        .map(|share| money::percent_of(gross, share.pct).round_dp(scale))
        .collect();
    let paid_sum: Decimal = paid.iter().copied().sum();
    if paid_sum > total {
        return Err(CommissionError::CeilingExceeded {
            total_pct: paid_sum.to_string(),
            ceiling_pct: total.to_string(),
        });
    }

    Ok(PlanAmounts {
        total,
        paid,
        reserve: total - paid_sum,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upline(id: AccountId, vip: Option<i64>) -> Upline {
        Upline {
            account_id: id,
            vip_pct: vip.map(Decimal::from),
        }
    }

    #[test]
    fn test_no_uplines_everything_to_reserve() {
        let plan = commission_plan(&[]).expect("plan");
        assert!(plan.shares.is_empty());
        assert_eq!(plan.reserve_pct, Decimal::from(35));
    }

    #[test]
    fn test_default_tiers() {
        let plan =
            commission_plan(&[upline(1, None), upline(2, None), upline(3, None)]).expect("plan");
        let pcts: Vec<Decimal> = plan.shares.iter().map(|s| s.pct).collect();
        assert_eq!(pcts, vec![Decimal::from(6), Decimal::from(4), Decimal::from(2)]);
        assert_eq!(plan.reserve_pct, Decimal::from(23));
    }

    #[test]
    fn test_vip_override_replaces_default() {
        let plan = commission_plan(&[upline(1, Some(10)), upline(2, None)]).expect("plan");
        assert_eq!(plan.shares[0].pct, Decimal::from(10));
        assert_eq!(plan.shares[1].pct, Decimal::from(4));
        assert_eq!(plan.reserve_pct, Decimal::from(21));
    }

    #[test]
    fn test_level_three_vip_only() {
        let plan = commission_plan(&[
            upline(1, None),
            upline(2, None),
            upline(3, None),
            upline(4, None),
        ])
        .expect("plan");
        assert_eq!(plan.shares.len(), 3, "non-VIP level 3 earns nothing");

        let plan = commission_plan(&[
            upline(1, None),
            upline(2, None),
            upline(3, None),
            upline(4, Some(5)),
        ])
        .expect("plan");
        assert_eq!(plan.shares.len(), 4);
        assert_eq!(plan.shares[3].level, 3);
        assert_eq!(plan.shares[3].pct, Decimal::from(5));
        assert_eq!(plan.reserve_pct, Decimal::from(35 - 6 - 4 - 2 - 5));
    }

    #[test]
    fn test_traversal_stops_after_level_three() {
        let plan = commission_plan(&[
            upline(1, None),
            upline(2, None),
            upline(3, None),
            upline(4, Some(5)),
            upline(5, Some(30)),
        ])
        .expect("plan");
        assert_eq!(plan.shares.len(), 4, "level 4 is never compensated");
    }

    #[test]
    fn test_ceiling_enforced() {
        let result = commission_plan(&[upline(1, Some(20)), upline(2, Some(20))]);
        assert!(matches!(result, Err(CommissionError::CeilingExceeded { .. })));
    }

    #[test]
    fn test_exact_ceiling_allowed() {
        let plan = commission_plan(&[upline(1, Some(35))]).expect("plan");
        assert_eq!(plan.reserve_pct, Decimal::ZERO);
    }

    #[test]
    fn test_plan_amounts_sum_exactly() {
        let plan =
            commission_plan(&[upline(1, None), upline(2, None), upline(3, None)]).expect("plan");
        let amounts = plan_amounts(&plan, Decimal::from(100), 8).expect("amounts");
        assert_eq!(amounts.total, Decimal::from(35));
        assert_eq!(
            amounts.paid,
            vec![Decimal::from(6), Decimal::from(4), Decimal::from(2)]
        );
        assert_eq!(amounts.reserve, Decimal::from(23));

        let paid_sum: Decimal = amounts.paid.iter().copied().sum();
        assert_eq!(paid_sum + amounts.reserve, amounts.total);
    }

    #[test]
    fn test_plan_amounts_vip_scenario() {
        // VIP inviter at 10%: 10 to the inviter, 25 to the reserve.
        let plan = commission_plan(&[upline(1, Some(10))]).expect("plan");
        let amounts = plan_amounts(&plan, Decimal::from(100), 8).expect("amounts");
        assert_eq!(amounts.paid, vec![Decimal::from(10)]);
        assert_eq!(amounts.reserve, Decimal::from(25));
    }

    #[test]
    fn test_plan_amounts_rounding_absorbed_by_reserve() {
        let plan = commission_plan(&[upline(1, None)]).expect("plan");
        // An awkward gross at scale 2.
        let gross: Decimal = "33.33".parse().expect("dec");
        let amounts = plan_amounts(&plan, gross, 2).expect("amounts");
        let paid_sum: Decimal = amounts.paid.iter().copied().sum();
        assert_eq!(paid_sum + amounts.reserve, amounts.total);
    }

    #[test]
    fn test_zero_vip_pct_skipped() {
        let plan = commission_plan(&[upline(1, Some(0))]).expect("plan");
        assert!(plan.shares.is_empty());
        assert_eq!(plan.reserve_pct, Decimal::from(35));
    }
}
