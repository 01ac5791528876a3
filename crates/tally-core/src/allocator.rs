//! # Money Allocator
//!
//! Pure arithmetic turning an order total plus a split rule into per-check
//! amounts that sum back to the order total EXACTLY.
//!
//! ## The Remainder Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  EVEN SPLIT, $57.21 FOUR WAYS                                           │
//! │                                                                         │
//! │  naive:    5721 / 4 = 1430.25   → floats forbidden                     │
//! │  floored:  1430 × 4 = 5720      → one cent vanished                    │
//! │                                                                         │
//! │  ours:     [1430, 1430, 1430, 1431]                                     │
//! │            first N-1 shares are floor(total/N); the LAST share is      │
//! │            total - sum(others). Drift never accumulates.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rule-based splits (seat / manual / by-person) need no rounding at all:
//! a check's total is the literal sum of its lines' discrete amounts.
//!
//! ## Integrity Gate
//! After any computation the caller runs [`verify_split`]. A divergence
//! beyond [`crate::ROUNDING_TOLERANCE_CENTS`] raises
//! [`SplitError::IntegrityFault`]; the allocator NEVER auto-corrects.

use crate::error::{SplitError, SplitResult};
use crate::money::Money;
use crate::types::{Check, Order};
use crate::ROUNDING_TOLERANCE_CENTS;

// =============================================================================
// Even Shares
// =============================================================================

/// Splits `total` into `ways` shares: the first `ways - 1` are
/// `floor(total / ways)` cents, the last takes the remainder.
///
/// ## Example
/// ```rust
/// use tally_core::allocator::even_shares;
/// use tally_core::money::Money;
///
/// let shares = even_shares(Money::from_cents(5721), 4).unwrap();
/// let cents: Vec<i64> = shares.iter().map(|m| m.cents()).collect();
/// assert_eq!(cents, vec![1430, 1430, 1430, 1431]);
/// ```
pub fn even_shares(total: Money, ways: u32) -> SplitResult<Vec<Money>> {
    if ways == 0 {
        return Err(SplitError::ZeroShares);
    }

    let ways_i = ways as i64;
    let base = total.cents().div_euclid(ways_i);
    let mut shares = vec![Money::from_cents(base); ways as usize];

    // Last share absorbs the remainder, so the shares sum exactly.
    let allocated = base * (ways_i - 1);
    shares[ways as usize - 1] = Money::from_cents(total.cents() - allocated);

    Ok(shares)
}

// =============================================================================
// Proportional Shares
// =============================================================================

/// Splits `amount` across `weights` proportionally, floor-rounded, with the
/// last non-degenerate share absorbing the remainder.
///
/// Used to allocate the order-level tax across checks in proportion to each
/// check's line subtotal. When every weight is zero (all-empty checks) the
/// allocation falls back to an even split so no money is ever stranded.
pub fn proportional_shares(amount: Money, weights: &[i64]) -> SplitResult<Vec<Money>> {
    if weights.is_empty() {
        return Err(SplitError::ZeroShares);
    }

    let weight_total: i64 = weights.iter().sum();
    if weight_total == 0 {
        return even_shares(amount, weights.len() as u32);
    }

    let mut shares = Vec::with_capacity(weights.len());
    let mut allocated: i64 = 0;
    for &w in &weights[..weights.len() - 1] {
        // i128 keeps the product safe for any realistic check amount.
        let share = (amount.cents() as i128 * w as i128 / weight_total as i128) as i64;
        shares.push(Money::from_cents(share));
        allocated += share;
    }
    shares.push(Money::from_cents(amount.cents() - allocated));

    Ok(shares)
}

// =============================================================================
// Integrity Verification
// =============================================================================

/// Sums the totals of every check, open and paid alike.
pub fn split_total(checks: &[Check]) -> Money {
    Money::from_cents(checks.iter().map(|c| c.total_cents()).sum())
}

/// The integrity gate: compares a computed split total against the order
/// total and raises [`SplitError::IntegrityFault`] when the absolute
/// difference exceeds the rounding tolerance (one cent).
pub fn verify_split(order_total: Money, actual: Money) -> SplitResult<()> {
    let drift = (order_total - actual).abs();
    if drift.cents() > ROUNDING_TOLERANCE_CENTS {
        return Err(SplitError::IntegrityFault {
            expected_cents: order_total.cents(),
            actual_cents: actual.cents(),
        });
    }
    Ok(())
}

/// Convenience wrapper: verifies a full check set against its order.
pub fn verify_checks(order: &Order, checks: &[Check]) -> SplitResult<()> {
    verify_split(order.total(), split_total(checks))
}

/// Allocates the order-level tax across checks in proportion to their line
/// subtotals, writing each check's `tax_cents`. Even-N checks carry their
/// tax inside the fixed share, so they are always allocated zero here.
pub fn allocate_tax(order: &Order, checks: &mut [Check]) -> SplitResult<()> {
    if checks.is_empty() {
        return Ok(());
    }
    if checks.iter().any(|c| c.even_amount_cents.is_some()) {
        for check in checks.iter_mut() {
            check.tax_cents = 0;
        }
        return Ok(());
    }

    let weights: Vec<i64> = checks.iter().map(|c| c.subtotal_cents()).collect();
    let shares = proportional_shares(Money::from_cents(order.tax_cents), &weights)?;
    for (check, share) in checks.iter_mut().zip(shares) {
        check.tax_cents = share.cents();
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CheckLine, Item};

    fn item(id: &str, cents: i64) -> Item {
        Item {
            id: id.to_string(),
            name: format!("Item {}", id),
            unit_price_cents: cents,
            quantity: 1,
            seat: None,
            modifiers: Vec::new(),
            sent_to_kitchen: false,
            paid: false,
        }
    }

    #[test]
    fn test_even_shares_5721_four_ways() {
        let shares = even_shares(Money::from_cents(5721), 4).unwrap();
        let cents: Vec<i64> = shares.iter().map(|m| m.cents()).collect();
        assert_eq!(cents, vec![1430, 1430, 1430, 1431]);
        assert_eq!(cents.iter().sum::<i64>(), 5721);
    }

    #[test]
    fn test_even_shares_exact_division_has_no_remainder() {
        let shares = even_shares(Money::from_cents(6000), 3).unwrap();
        assert!(shares.iter().all(|m| m.cents() == 2000));
    }

    #[test]
    fn test_even_shares_single_way_is_identity() {
        let shares = even_shares(Money::from_cents(5721), 1).unwrap();
        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].cents(), 5721);
    }

    #[test]
    fn test_even_shares_is_deterministic() {
        // Committing the same even split twice must yield identical totals.
        let a = even_shares(Money::from_cents(10000), 3).unwrap();
        let b = even_shares(Money::from_cents(10000), 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_even_shares_zero_ways_rejected() {
        assert_eq!(
            even_shares(Money::from_cents(100), 0),
            Err(SplitError::ZeroShares)
        );
    }

    #[test]
    fn test_proportional_shares_sum_exactly() {
        // $2.40 of tax over subtotals 1499 / 2598
        let shares = proportional_shares(Money::from_cents(240), &[1499, 2598]).unwrap();
        assert_eq!(shares.iter().map(|m| m.cents()).sum::<i64>(), 240);
        // 240 × 1499 / 4097 = 87.8… → 87, remainder 153 to the last
        assert_eq!(shares[0].cents(), 87);
        assert_eq!(shares[1].cents(), 153);
    }

    #[test]
    fn test_proportional_shares_zero_weights_falls_back_to_even() {
        let shares = proportional_shares(Money::from_cents(300), &[0, 0, 0]).unwrap();
        assert_eq!(shares.iter().map(|m| m.cents()).sum::<i64>(), 300);
        assert_eq!(shares[0].cents(), 100);
    }

    #[test]
    fn test_verify_split_within_tolerance() {
        assert!(verify_split(Money::from_cents(5721), Money::from_cents(5721)).is_ok());
        assert!(verify_split(Money::from_cents(5721), Money::from_cents(5720)).is_ok());
    }

    #[test]
    fn test_verify_split_beyond_tolerance_is_fault() {
        let err = verify_split(Money::from_cents(5721), Money::from_cents(5719)).unwrap_err();
        assert_eq!(
            err,
            SplitError::IntegrityFault {
                expected_cents: 5721,
                actual_cents: 5719,
            }
        );
    }

    #[test]
    fn test_allocate_tax_sums_to_order_tax() {
        let order = Order::new("o1", vec![item("a", 1499), item("b", 2598)], 240);

        let mut c1 = Check::new("c1", 1, "Check 1");
        c1.lines.push(CheckLine::Whole(item("a", 1499)));
        let mut c2 = Check::new("c2", 2, "Check 2");
        c2.lines.push(CheckLine::Whole(item("b", 2598)));
        let mut checks = vec![c1, c2];

        allocate_tax(&order, &mut checks).unwrap();
        assert_eq!(checks.iter().map(|c| c.tax_cents).sum::<i64>(), 240);
        verify_checks(&order, &checks).unwrap();
    }

    #[test]
    fn test_allocate_tax_skips_even_checks() {
        let order = Order::new("o1", vec![item("a", 5721)], 0);
        let mut c1 = Check::new("c1", 1, "Check 1");
        c1.even_amount_cents = Some(2861);
        let mut c2 = Check::new("c2", 2, "Check 2");
        c2.even_amount_cents = Some(2860);
        let mut checks = vec![c1, c2];

        allocate_tax(&order, &mut checks).unwrap();
        assert!(checks.iter().all(|c| c.tax_cents == 0));
        verify_checks(&order, &checks).unwrap();
    }
}
