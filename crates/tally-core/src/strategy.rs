//! # Split Mode Strategies
//!
//! Four interchangeable algorithms that produce the INITIAL assignment of
//! items to candidate checks. Switching strategy re-seeds from scratch and
//! is destructive to any unsaved assignment (the confirmation prompt is a
//! UI concern, not ours).
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Mode        Seeding                          Money                    │
//! │  ─────────   ─────────────────────────────    ───────────────────────  │
//! │  BySeat      one check per distinct seat;     literal line sums        │
//! │              unseated items → check 1                                  │
//! │  Manual      single check holds everything    literal line sums        │
//! │  Even{N}     N virtual checks, NO lines       allocator even_shares    │
//! │  ByPerson    seeded like BySeat, then         literal line sums        │
//! │              freely rearranged by hand                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! None of these mutate the underlying order: the draft works on a clone.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::allocator::even_shares;
use crate::assignment::{DraftCheck, SplitDraft};
use crate::error::{SplitError, SplitResult};
use crate::types::{CheckLine, Order};
use crate::MAX_SPLIT_WAYS;

// =============================================================================
// Split Mode
// =============================================================================

/// How an order is initially carved into checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SplitMode {
    /// One check per distinct seat number; unseated items go to check 1.
    BySeat,
    /// A single seeded check; the operator moves items freely.
    Manual,
    /// N virtual checks with no item assignment at all; money comes
    /// purely from allocator arithmetic until commit.
    Even { ways: u32 },
    /// Seeded like BySeat but intended for free rearrangement afterward.
    ByPerson,
}

// =============================================================================
// Seeding
// =============================================================================

/// Builds a fresh edit-mode draft for the order under the given mode.
pub fn seed_draft(order: &Order, mode: SplitMode) -> SplitResult<SplitDraft> {
    let checks = seed_checks(order, mode)?;
    Ok(SplitDraft::from_parts(order.clone(), mode, checks))
}

/// Produces the initial draft checks for a mode. Exposed separately so
/// `SplitDraft::reset` can re-seed without rebuilding the whole draft.
pub(crate) fn seed_checks(order: &Order, mode: SplitMode) -> SplitResult<Vec<DraftCheck>> {
    match mode {
        SplitMode::BySeat | SplitMode::ByPerson => Ok(seed_by_seat(order)),
        SplitMode::Manual => Ok(seed_manual(order)),
        SplitMode::Even { ways } => seed_even(order, ways),
    }
}

/// One check per distinct seat, ascending; unseated items land in check 1.
fn seed_by_seat(order: &Order) -> Vec<DraftCheck> {
    let has_unseated = order.items.iter().any(|i| i.seat.is_none());
    let mut checks = Vec::new();

    if has_unseated {
        let mut default_check = DraftCheck::new(1, "Check 1");
        for item in order.items.iter().filter(|i| i.seat.is_none()) {
            default_check.lines.push(CheckLine::Whole(item.clone()));
        }
        checks.push(default_check);
    }

    for seat in order.seats() {
        let index = checks.len() as u32 + 1;
        let mut check = DraftCheck::new(index, format!("Seat {}", seat));
        for item in order.items.iter().filter(|i| i.seat == Some(seat)) {
            check.lines.push(CheckLine::Whole(item.clone()));
        }
        checks.push(check);
    }

    // An order with no items still gets one empty check to edit into.
    if checks.is_empty() {
        checks.push(DraftCheck::new(1, "Check 1"));
    }

    checks
}

/// A single check holding every item (manual knapsack starting point).
fn seed_manual(order: &Order) -> Vec<DraftCheck> {
    let mut check = DraftCheck::new(1, "Check 1");
    for item in &order.items {
        check.lines.push(CheckLine::Whole(item.clone()));
    }
    vec![check]
}

/// N virtual checks carrying fixed even shares of the order total.
fn seed_even(order: &Order, ways: u32) -> SplitResult<Vec<DraftCheck>> {
    if !(2..=MAX_SPLIT_WAYS).contains(&ways) {
        return Err(SplitError::InvalidWays {
            ways,
            max: MAX_SPLIT_WAYS,
        });
    }

    let shares = even_shares(order.total(), ways)?;
    Ok(shares
        .into_iter()
        .enumerate()
        .map(|(i, share)| {
            let mut check = DraftCheck::new(i as u32 + 1, format!("Check {}", i + 1));
            check.even_amount_cents = Some(share.cents());
            check
        })
        .collect())
}

// =============================================================================
// Unit Tests
// =============================================================================
