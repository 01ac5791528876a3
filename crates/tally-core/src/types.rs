//! # Domain Types
//!
//! Core domain types for the split-check engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Order       │   │     Check       │   │  ItemFraction   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  items          │   │  index/label    │   │  item_id (FK)   │       │
//! │  │  total_cents    │   │  status         │   │  share_cents    │       │
//! │  │  status         │   │  lines          │   │  label "1/3 …"  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  A Check's lines are CheckLine values: either a Whole item or a        │
//! │  Partial fraction of one. Fractions never nest.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Money Invariant
//! At every committed instant, the sum of all checks' totals (open and paid)
//! equals the order total to the cent. The types here make that sum cheap to
//! recompute; [`crate::allocator`] enforces it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Order
// =============================================================================

/// Lifecycle status of an order with respect to splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Single unsplit check; the parent order is payable as-is.
    Open,
    /// Order has been split into independently payable checks.
    Split,
    /// Every check has been paid; the order is settled.
    Closed,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Open
    }
}

/// The root aggregate: one table's open order.
///
/// Subtotal/tax/total are stored (snapshot pattern), not recomputed from
/// items on every read, because the split engine must compare against the
/// total the order was committed with, not a fresh derivation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Line items on the order.
    pub items: Vec<Item>,

    /// Sum of item line amounts, in cents.
    pub subtotal_cents: i64,

    /// Order-level tax, in cents.
    pub tax_cents: i64,

    /// Grand total (subtotal + tax), in cents.
    pub total_cents: i64,

    /// Split lifecycle status.
    pub status: OrderStatus,

    /// When the order was opened.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Creates an open order from items, deriving the subtotal.
    pub fn new(id: impl Into<String>, items: Vec<Item>, tax_cents: i64) -> Self {
        let subtotal: i64 = items.iter().map(|i| i.amount_cents()).sum();
        Order {
            id: id.into(),
            items,
            subtotal_cents: subtotal,
            tax_cents,
            total_cents: subtotal + tax_cents,
            status: OrderStatus::Open,
            created_at: Utc::now(),
        }
    }

    /// Returns the grand total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Looks up an item by id.
    pub fn item(&self, item_id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == item_id)
    }

    /// Distinct seat numbers present on the order, ascending.
    pub fn seats(&self) -> Vec<u32> {
        let mut seats: Vec<u32> = self.items.iter().filter_map(|i| i.seat).collect();
        seats.sort_unstable();
        seats.dedup();
        seats
    }
}

// =============================================================================
// Item & Modifier
// =============================================================================

/// A modifier on an item line (e.g. "EXTRA cheese", "NO onions").
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Modifier {
    /// Modifier name shown on the check.
    pub name: String,

    /// Price delta per item, in cents (may be zero).
    pub price_cents: i64,

    /// Optional pre-modifier label ("NO", "EXTRA", "SIDE").
    pub pre_label: Option<String>,
}

/// One line item on the order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown on checks.
    pub name: String,

    /// Unit price in cents.
    pub unit_price_cents: i64,

    /// Quantity ordered.
    pub quantity: i64,

    /// Seat number, when the server recorded one.
    pub seat: Option<u32>,

    /// Modifiers, each with its own price delta.
    pub modifiers: Vec<Modifier>,

    /// Whether the line has been fired to the kitchen.
    pub sent_to_kitchen: bool,

    /// Whether the line has already been paid for.
    pub paid: bool,
}

impl Item {
    /// The payable amount for this line:
    /// `(unit price + modifier deltas) × quantity`.
    pub fn amount_cents(&self) -> i64 {
        let per_unit: i64 =
            self.unit_price_cents + self.modifiers.iter().map(|m| m.price_cents).sum::<i64>();
        per_unit * self.quantity
    }

    /// The payable amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents())
    }
}

// =============================================================================
// Item Fraction
// =============================================================================

/// A partial, separately assignable share of a single item line.
///
/// ## Invariants
/// - `fraction_index` is 1-based and ≤ `fraction_count`
/// - All fractions of an item sum exactly to the item's payable amount;
///   the LAST fraction absorbs the rounding remainder
/// - Fractions never nest: re-splitting collapses first
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ItemFraction {
    /// Unique identifier (UUID v4); fractions move between checks by id.
    pub id: String,

    /// Id of the item this fraction belongs to.
    pub item_id: String,

    /// 1-based position among the item's fractions.
    pub fraction_index: u32,

    /// How many fractions the item was split into.
    pub fraction_count: u32,

    /// This fraction's price share, in cents.
    pub share_cents: i64,

    /// Display label, e.g. `"1/3 Cheeseburger"`.
    pub label: String,
}

impl ItemFraction {
    /// The price share as Money.
    #[inline]
    pub fn share(&self) -> Money {
        Money::from_cents(self.share_cents)
    }
}

// =============================================================================
// Check Line
// =============================================================================

/// One payable line on a check: a whole item or a fraction of one.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CheckLine {
    /// A whole, unsplit item.
    Whole(Item),
    /// A fractional share of an item.
    Partial(ItemFraction),
}

impl CheckLine {
    /// The id this line moves between checks by: the item id for a whole
    /// line, the fraction id for a partial one.
    pub fn line_id(&self) -> &str {
        match self {
            CheckLine::Whole(item) => &item.id,
            CheckLine::Partial(fraction) => &fraction.id,
        }
    }

    /// Id of the underlying order item.
    pub fn item_id(&self) -> &str {
        match self {
            CheckLine::Whole(item) => &item.id,
            CheckLine::Partial(fraction) => &fraction.item_id,
        }
    }

    /// The line's payable amount, in cents.
    pub fn amount_cents(&self) -> i64 {
        match self {
            CheckLine::Whole(item) => item.amount_cents(),
            CheckLine::Partial(fraction) => fraction.share_cents,
        }
    }

    /// True when the line is a fraction.
    pub fn is_partial(&self) -> bool {
        matches!(self, CheckLine::Partial(_))
    }
}

// =============================================================================
// Check
// =============================================================================

/// Payment status of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// Accepting mutations and awaiting payment.
    Open,
    /// Paid in full. Immutable: no line may enter or leave, and the check
    /// cannot be deleted or merged.
    Paid,
    /// Voided by a manager. Excluded from pay flows.
    Voided,
}

impl Default for CheckStatus {
    fn default() -> Self {
        CheckStatus::Open
    }
}

/// Card summary attached to a paid check (capture happens externally).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CardSummary {
    /// Card brand ("VISA", "MC", ...).
    pub brand: String,

    /// Last four digits for the receipt.
    pub last_four: String,
}

/// One independently payable subdivision of an order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// 1-based display position. Redistribution on delete targets the
    /// check with the lowest remaining index.
    pub index: u32,

    /// Display label ("Check 1", "Seat 2", ...).
    pub label: String,

    /// Payment status.
    pub status: CheckStatus,

    /// Ordered list of assigned items and fractions.
    pub lines: Vec<CheckLine>,

    /// Allocated share of the order-level tax, in cents.
    pub tax_cents: i64,

    /// For even-N splits only: the fixed share of the order total carried
    /// by this check. Even checks have no lines; their money comes purely
    /// from allocator arithmetic.
    pub even_amount_cents: Option<i64>,

    /// Card summary once paid by card.
    pub card: Option<CardSummary>,

    /// When the check was paid.
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl Check {
    /// Creates an empty open check.
    pub fn new(id: impl Into<String>, index: u32, label: impl Into<String>) -> Self {
        Check {
            id: id.into(),
            index,
            label: label.into(),
            status: CheckStatus::Open,
            lines: Vec::new(),
            tax_cents: 0,
            even_amount_cents: None,
            card: None,
            paid_at: None,
        }
    }

    /// Line subtotal in cents. For even-N checks this is the fixed share;
    /// otherwise the literal sum of line amounts (no rounding involved).
    pub fn subtotal_cents(&self) -> i64 {
        match self.even_amount_cents {
            Some(fixed) => fixed,
            None => self.lines.iter().map(|l| l.amount_cents()).sum(),
        }
    }

    /// Check total in cents (subtotal + allocated tax).
    pub fn total_cents(&self) -> i64 {
        self.subtotal_cents() + self.tax_cents
    }

    /// Check total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents())
    }

    /// True when the check accepts mutations.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == CheckStatus::Open
    }

    /// True when the check has been paid (and is therefore immutable).
    #[inline]
    pub fn is_paid(&self) -> bool {
        self.status == CheckStatus::Paid
    }

    /// Finds a line by its line id.
    pub fn line(&self, line_id: &str) -> Option<&CheckLine> {
        self.lines.iter().find(|l| l.line_id() == line_id)
    }

    /// Removes and returns a line by its line id.
    pub fn take_line(&mut self, line_id: &str) -> Option<CheckLine> {
        let pos = self.lines.iter().position(|l| l.line_id() == line_id)?;
        Some(self.lines.remove(pos))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn burger(id: &str, seat: Option<u32>) -> Item {
        Item {
            id: id.to_string(),
            name: "Burger".to_string(),
            unit_price_cents: 1499,
            quantity: 1,
            seat,
            modifiers: Vec::new(),
            sent_to_kitchen: true,
            paid: false,
        }
    }

    #[test]
    fn test_item_amount_includes_modifiers() {
        let mut item = burger("i1", None);
        item.quantity = 2;
        item.modifiers.push(Modifier {
            name: "Cheese".to_string(),
            price_cents: 100,
            pre_label: Some("EXTRA".to_string()),
        });

        // (1499 + 100) × 2
        assert_eq!(item.amount_cents(), 3198);
    }

    #[test]
    fn test_order_derives_subtotal() {
        let order = Order::new("o1", vec![burger("i1", None), burger("i2", Some(2))], 240);
        assert_eq!(order.subtotal_cents, 2998);
        assert_eq!(order.total_cents, 3238);
        assert_eq!(order.status, OrderStatus::Open);
    }

    #[test]
    fn test_order_seats_sorted_distinct() {
        let order = Order::new(
            "o1",
            vec![burger("i1", Some(3)), burger("i2", Some(1)), burger("i3", Some(3))],
            0,
        );
        assert_eq!(order.seats(), vec![1, 3]);
    }

    #[test]
    fn test_check_subtotal_is_literal_line_sum() {
        let mut check = Check::new("c1", 1, "Check 1");
        check.lines.push(CheckLine::Whole(burger("i1", None)));
        check.lines.push(CheckLine::Partial(ItemFraction {
            id: "f1".to_string(),
            item_id: "i2".to_string(),
            fraction_index: 1,
            fraction_count: 3,
            share_cents: 433,
            label: "1/3 Nachos".to_string(),
        }));

        assert_eq!(check.subtotal_cents(), 1932);
        assert_eq!(check.total_cents(), 1932);
    }

    #[test]
    fn test_even_check_uses_fixed_amount() {
        let mut check = Check::new("c1", 1, "Check 1");
        check.even_amount_cents = Some(1430);
        assert!(check.lines.is_empty());
        assert_eq!(check.total_cents(), 1430);
    }

    #[test]
    fn test_take_line() {
        let mut check = Check::new("c1", 1, "Check 1");
        check.lines.push(CheckLine::Whole(burger("i1", None)));

        let taken = check.take_line("i1").expect("line present");
        assert_eq!(taken.line_id(), "i1");
        assert!(check.lines.is_empty());
        assert!(check.take_line("i1").is_none());
    }
}
