//! # Item Fraction Splitter
//!
//! Divides one item line into K payable shares that can sit on different
//! checks ("split the nachos three ways").
//!
//! ## Share Arithmetic
//! The first K-1 shares are `floor(amount / K)` cents; the LAST share takes
//! the remainder. This is the same remainder rule the even allocator uses,
//! so a $10.00 item split 3 ways is always `[$3.33, $3.33, $3.34]` and
//! never any other distribution.
//!
//! ## No Nesting
//! Fractions cannot be re-split. Splitting an item that already has
//! fractions first collapses them back to the whole item, then re-splits at
//! the new count. Collapse/re-seed is owned by the draft and the gateway;
//! this module only produces correct fraction sets.

use uuid::Uuid;

use crate::error::{SplitError, SplitResult};
use crate::money::Money;
use crate::types::{Item, ItemFraction};
use crate::MAX_SPLIT_WAYS;

// =============================================================================
// Share Computation
// =============================================================================

/// Computes the K price shares for an amount: first K-1 floored, last takes
/// the remainder. `ways` must be between 2 and [`MAX_SPLIT_WAYS`].
///
/// ## Example
/// ```rust
/// use tally_core::fraction::fraction_shares;
/// use tally_core::money::Money;
///
/// let shares = fraction_shares(Money::from_cents(1000), 3).unwrap();
/// let cents: Vec<i64> = shares.iter().map(|m| m.cents()).collect();
/// assert_eq!(cents, vec![333, 333, 334]);
/// ```
pub fn fraction_shares(amount: Money, ways: u32) -> SplitResult<Vec<Money>> {
    if !(2..=MAX_SPLIT_WAYS).contains(&ways) {
        return Err(SplitError::InvalidWays {
            ways,
            max: MAX_SPLIT_WAYS,
        });
    }
    crate::allocator::even_shares(amount, ways)
}

// =============================================================================
// Fracturing
// =============================================================================

/// Replaces an item with `ways` fractions of it.
///
/// Each fraction gets a fresh uuid (fractions move between checks by id)
/// and a display label like `"1/3 Cheeseburger"`. The shares sum exactly to
/// the item's payable amount, modifiers included.
pub fn fracture(item: &Item, ways: u32) -> SplitResult<Vec<ItemFraction>> {
    let shares = fraction_shares(item.amount(), ways)?;

    Ok(shares
        .into_iter()
        .enumerate()
        .map(|(i, share)| ItemFraction {
            id: Uuid::new_v4().to_string(),
            item_id: item.id.clone(),
            fraction_index: i as u32 + 1,
            fraction_count: ways,
            share_cents: share.cents(),
            label: format!("{}/{} {}", i + 1, ways, item.name),
        })
        .collect())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn nachos(cents: i64, qty: i64) -> Item {
        Item {
            id: "i-nachos".to_string(),
            name: "Nachos".to_string(),
            unit_price_cents: cents,
            quantity: qty,
            seat: None,
            modifiers: Vec::new(),
            sent_to_kitchen: true,
            paid: false,
        }
    }

    #[test]
    fn test_ten_dollars_three_ways() {
        let shares = fraction_shares(Money::from_cents(1000), 3).unwrap();
        let cents: Vec<i64> = shares.iter().map(|m| m.cents()).collect();
        // The last fraction absorbs the remainder, never a different spread.
        assert_eq!(cents, vec![333, 333, 334]);
    }

    #[test]
    fn test_shares_always_sum_to_amount() {
        for ways in 2..=9 {
            let shares = fraction_shares(Money::from_cents(1737), ways).unwrap();
            assert_eq!(
                shares.iter().map(|m| m.cents()).sum::<i64>(),
                1737,
                "ways = {}",
                ways
            );
        }
    }

    #[test]
    fn test_ways_bounds() {
        assert!(matches!(
            fraction_shares(Money::from_cents(1000), 1),
            Err(SplitError::InvalidWays { ways: 1, .. })
        ));
        assert!(matches!(
            fraction_shares(Money::from_cents(1000), MAX_SPLIT_WAYS + 1),
            Err(SplitError::InvalidWays { .. })
        ));
    }

    #[test]
    fn test_fracture_labels_and_indices() {
        let item = nachos(1000, 1);
        let fractions = fracture(&item, 3).unwrap();

        assert_eq!(fractions.len(), 3);
        assert_eq!(fractions[0].label, "1/3 Nachos");
        assert_eq!(fractions[2].label, "3/3 Nachos");
        assert_eq!(fractions[2].fraction_index, 3);
        assert!(fractions.iter().all(|f| f.fraction_count == 3));
        assert!(fractions.iter().all(|f| f.item_id == "i-nachos"));
    }

    #[test]
    fn test_fracture_splits_full_line_amount() {
        // Quantity 2: fractions divide the full payable line, not the unit.
        let item = nachos(1000, 2);
        let fractions = fracture(&item, 3).unwrap();
        let total: i64 = fractions.iter().map(|f| f.share_cents).sum();
        assert_eq!(total, 2000);
        assert_eq!(fractions[2].share_cents, 668);
    }

    #[test]
    fn test_collapse_round_trip_restores_price() {
        // fracture → sum shares == the single-line amount we started with
        let item = nachos(1000, 1);
        let fractions = fracture(&item, 3).unwrap();
        let restored: i64 = fractions.iter().map(|f| f.share_cents).sum();
        assert_eq!(restored, item.amount_cents());
    }
}
