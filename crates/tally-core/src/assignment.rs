//! # Assignment Store (Edit Mode)
//!
//! The transient, edit-time mapping of items to candidate checks. Nothing
//! here is durable: a draft becomes real checks only when its commit
//! payload goes through the Persistence Gateway, and it dies with the edit
//! screen otherwise.
//!
//! ## Single-Selection Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  At most ONE line is "picked up" at a time.                             │
//! │                                                                         │
//! │  select_line(a)      → a is picked up                                  │
//! │  select_line(b)      → b replaces a (a is put back untouched)          │
//! │  move_selected_to(2) → b moves to check 2, selection clears            │
//! │  reset()             → re-seed from the mode, selection clears         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Integrity
//! After every mutation the caller can ask for [`SplitDraft::issues`]: a
//! list of blocking/advisory findings. A blocking issue (split total
//! diverging from the order total) must prevent commit; the draft will also
//! refuse to produce a commit payload while one exists.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::allocator::{even_shares, proportional_shares, verify_split};
use crate::error::{SplitError, SplitResult};
use crate::fraction::fracture;
use crate::money::Money;
use crate::strategy::{seed_checks, SplitMode};
use crate::types::{CheckLine, ItemFraction, Order};

// =============================================================================
// Draft Check
// =============================================================================

/// A candidate check while editing. Has no id yet; identity is assigned by
/// the gateway at commit.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DraftCheck {
    /// 1-based display position within the draft.
    pub index: u32,

    /// Display label ("Check 1", "Seat 2", ...).
    pub label: String,

    /// Candidate lines (whole items and fractions).
    pub lines: Vec<CheckLine>,

    /// Fixed even-N share, for virtual checks with no lines.
    pub even_amount_cents: Option<i64>,
}

impl DraftCheck {
    /// Creates an empty draft check.
    pub fn new(index: u32, label: impl Into<String>) -> Self {
        DraftCheck {
            index,
            label: label.into(),
            lines: Vec::new(),
            even_amount_cents: None,
        }
    }

    /// Line subtotal, or the fixed even share for virtual checks.
    pub fn subtotal_cents(&self) -> i64 {
        match self.even_amount_cents {
            Some(fixed) => fixed,
            None => self.lines.iter().map(|l| l.amount_cents()).sum(),
        }
    }
}

// =============================================================================
// Integrity Issues
// =============================================================================

/// Severity of a draft integrity finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    /// Must be resolved before commit.
    Blocking,
    /// Worth showing, does not block.
    Advisory,
}

/// One finding from the post-mutation integrity pass.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityIssue {
    pub severity: IssueSeverity,
    pub message: String,
}

impl IntegrityIssue {
    /// True when this issue blocks commit.
    pub fn is_blocking(&self) -> bool {
        self.severity == IssueSeverity::Blocking
    }
}

// =============================================================================
// Commit Payload
// =============================================================================

/// One check in the initial-split commit payload.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InitialCheck {
    /// 1-based index after empty checks are dropped.
    pub index: u32,

    /// Display label carried into the persisted check.
    pub label: String,

    /// Line ids assigned to this check (item ids and fraction ids).
    pub line_ids: Vec<String>,
}

/// The first-commit payload handed to the Persistence Gateway.
///
/// For even-N splits `assignments` is empty and `even_ways` carries the
/// share count; the gateway materializes the virtual checks server-side
/// with the same allocator arithmetic.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InitialSplit {
    /// Checks to create, in display order.
    pub assignments: Vec<InitialCheck>,

    /// Fraction definitions referenced by fraction ids in `assignments`.
    pub fractions: Vec<ItemFraction>,

    /// Set for even-N splits: the number of virtual checks.
    pub even_ways: Option<u32>,
}

// =============================================================================
// Split Draft
// =============================================================================

/// The in-memory edit session: a clone of the order plus candidate checks.
#[derive(Debug, Clone)]
pub struct SplitDraft {
    order: Order,
    mode: SplitMode,
    checks: Vec<DraftCheck>,
    selected: Option<String>,
}

impl SplitDraft {
    /// Assembles a draft from seeded parts. Use [`crate::strategy::seed_draft`]
    /// to construct one.
    pub(crate) fn from_parts(order: Order, mode: SplitMode, checks: Vec<DraftCheck>) -> Self {
        SplitDraft {
            order,
            mode,
            checks,
            selected: None,
        }
    }

    /// The order snapshot this draft edits against (never mutated).
    pub fn order(&self) -> &Order {
        &self.order
    }

    /// The strategy that seeded this draft.
    pub fn mode(&self) -> SplitMode {
        self.mode
    }

    /// Candidate checks in display order.
    pub fn checks(&self) -> &[DraftCheck] {
        &self.checks
    }

    /// The currently picked-up line, if any.
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    // =========================================================================
    // Selection & Movement
    // =========================================================================

    /// Picks up a line. Selecting a second line replaces the first.
    pub fn select_line(&mut self, line_id: &str) -> SplitResult<()> {
        if self.find_line(line_id).is_none() {
            return Err(SplitError::LineNotFound(line_id.to_string()));
        }
        self.selected = Some(line_id.to_string());
        Ok(())
    }

    /// Moves the picked-up line to the check at `index`, then puts it down.
    pub fn move_selected_to(&mut self, index: u32) -> SplitResult<()> {
        let line_id = self.selected.take().ok_or(SplitError::NothingSelected)?;
        let result = self.move_line(&line_id, index);
        if result.is_err() {
            // Failed moves keep the line picked up so the operator can retry.
            self.selected = Some(line_id);
        }
        result
    }

    /// Moves the picked-up line onto a brand-new check, returning its index.
    pub fn move_selected_to_new_check(&mut self) -> SplitResult<u32> {
        if self.selected.is_none() {
            return Err(SplitError::NothingSelected);
        }
        let index = self.push_check();
        self.move_selected_to(index)?;
        Ok(index)
    }

    /// Discards all edits and re-seeds from the mode.
    pub fn reset(&mut self) -> SplitResult<()> {
        self.checks = seed_checks(&self.order, self.mode)?;
        self.selected = None;
        Ok(())
    }

    fn move_line(&mut self, line_id: &str, to_index: u32) -> SplitResult<()> {
        let to_pos = self
            .checks
            .iter()
            .position(|c| c.index == to_index)
            .ok_or(SplitError::CheckIndexOutOfRange { index: to_index })?;

        let from_pos = self
            .find_line(line_id)
            .ok_or_else(|| SplitError::LineNotFound(line_id.to_string()))?;

        if from_pos == to_pos {
            return Ok(());
        }

        let pos_in_check = self.checks[from_pos]
            .lines
            .iter()
            .position(|l| l.line_id() == line_id)
            .expect("line position verified above");
        let line = self.checks[from_pos].lines.remove(pos_in_check);
        self.checks[to_pos].lines.push(line);
        Ok(())
    }

    // =========================================================================
    // Fraction Splitting
    // =========================================================================

    /// Replaces an item's current assignment with `ways` fractions, seeded
    /// round-robin across the existing checks starting at the check that
    /// held the item. When fewer than `ways` checks exist, new checks are
    /// created to receive the overflow, so "split 4 ways" on a 2-check
    /// draft always yields 4 checks.
    ///
    /// Re-splitting an already-fractured item collapses its fractions
    /// first; fractions never nest.
    pub fn split_item(&mut self, item_id: &str, ways: u32) -> SplitResult<()> {
        let item = self
            .order
            .item(item_id)
            .cloned()
            .ok_or_else(|| SplitError::ItemNotFound(item_id.to_string()))?;

        // Locate where the item currently lives: the check holding the
        // whole line, or the lowest check holding one of its fractions.
        let start_pos = self
            .checks
            .iter()
            .position(|c| c.lines.iter().any(|l| l.item_id() == item_id))
            .ok_or_else(|| SplitError::LineNotFound(item_id.to_string()))?;

        let fractions = fracture(&item, ways)?;

        // Collapse any existing assignment of this item (whole or fractions).
        for check in &mut self.checks {
            check.lines.retain(|l| l.item_id() != item_id);
        }
        if let Some(selected) = &self.selected {
            if self.find_line(selected).is_none() {
                self.selected = None;
            }
        }

        while (self.checks.len() as u32) < ways {
            self.push_check();
        }

        let count = self.checks.len();
        for (i, fraction) in fractions.into_iter().enumerate() {
            let pos = (start_pos + i) % count;
            self.checks[pos].lines.push(CheckLine::Partial(fraction));
        }
        Ok(())
    }

    // =========================================================================
    // Totals & Integrity
    // =========================================================================

    /// Per-check display totals (line subtotal + allocated tax share), in
    /// draft order. Even-mode shares already divide the grand total.
    pub fn totals(&self) -> SplitResult<Vec<Money>> {
        if self.is_even() {
            return even_shares(self.order.total(), self.checks.len() as u32);
        }

        let weights: Vec<i64> = self.checks.iter().map(|c| c.subtotal_cents()).collect();
        let tax = proportional_shares(Money::from_cents(self.order.tax_cents), &weights)?;
        Ok(self
            .checks
            .iter()
            .zip(tax)
            .map(|(c, t)| Money::from_cents(c.subtotal_cents()) + t)
            .collect())
    }

    /// The sum of every check's display total.
    pub fn split_total(&self) -> SplitResult<Money> {
        Ok(self.totals()?.into_iter().sum())
    }

    /// Runs the integrity pass: blocking on total divergence, advisory for
    /// empty checks. Intended to be shown after every mutation.
    pub fn issues(&self) -> Vec<IntegrityIssue> {
        let mut issues = Vec::new();

        match self.split_total() {
            Ok(total) => {
                if let Err(SplitError::IntegrityFault {
                    expected_cents,
                    actual_cents,
                }) = verify_split(self.order.total(), total)
                {
                    issues.push(IntegrityIssue {
                        severity: IssueSeverity::Blocking,
                        message: format!(
                            "Checks total {} but the order total is {}",
                            Money::from_cents(actual_cents),
                            Money::from_cents(expected_cents)
                        ),
                    });
                }
            }
            Err(e) => issues.push(IntegrityIssue {
                severity: IssueSeverity::Blocking,
                message: e.to_string(),
            }),
        }

        if !self.is_even() {
            for check in &self.checks {
                if check.lines.is_empty() {
                    issues.push(IntegrityIssue {
                        severity: IssueSeverity::Advisory,
                        message: format!("{} is empty", check.label),
                    });
                }
            }
        }

        issues
    }

    /// True when any blocking issue is present.
    pub fn has_blocking_issues(&self) -> bool {
        self.issues().iter().any(|i| i.is_blocking())
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Builds the first-commit payload for the gateway. Empty checks are
    /// dropped and the survivors reindexed; even-mode drafts produce no
    /// assignments, only the share count. Refuses while a blocking
    /// integrity issue exists.
    pub fn commit_payload(&self) -> SplitResult<InitialSplit> {
        verify_split(self.order.total(), self.split_total()?)?;

        if self.is_even() {
            return Ok(InitialSplit {
                assignments: Vec::new(),
                fractions: Vec::new(),
                even_ways: Some(self.checks.len() as u32),
            });
        }

        let mut assignments = Vec::new();
        let mut fractions = Vec::new();
        let mut next_index = 1u32;
        for check in &self.checks {
            if check.lines.is_empty() {
                continue;
            }
            assignments.push(InitialCheck {
                index: next_index,
                label: check.label.clone(),
                line_ids: check.lines.iter().map(|l| l.line_id().to_string()).collect(),
            });
            next_index += 1;
            for line in &check.lines {
                if let CheckLine::Partial(f) = line {
                    fractions.push(f.clone());
                }
            }
        }

        Ok(InitialSplit {
            assignments,
            fractions,
            even_ways: None,
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn is_even(&self) -> bool {
        matches!(self.mode, SplitMode::Even { .. })
    }

    /// Appends a fresh empty check, returning its index.
    fn push_check(&mut self) -> u32 {
        let index = self.checks.iter().map(|c| c.index).max().unwrap_or(0) + 1;
        self.checks
            .push(DraftCheck::new(index, format!("Check {}", index)));
        index
    }

    /// Position of the check holding `line_id`, if any.
    fn find_line(&self, line_id: &str) -> Option<usize> {
        self.checks
            .iter()
            .position(|c| c.lines.iter().any(|l| l.line_id() == line_id))
    }

    /// A lookup map from check index to draft position (used by tests).
    #[cfg(test)]
    fn index_map(&self) -> std::collections::BTreeMap<u32, usize> {
        self.checks
            .iter()
            .enumerate()
            .map(|(pos, c)| (c.index, pos))
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::seed_draft;
    use crate::types::Item;

    fn item(id: &str, cents: i64, seat: Option<u32>) -> Item {
        Item {
            id: id.to_string(),
            name: format!("Item {}", id),
            unit_price_cents: cents,
            quantity: 1,
            seat,
            modifiers: Vec::new(),
            sent_to_kitchen: true,
            paid: false,
        }
    }

    fn draft() -> SplitDraft {
        let order = Order::new(
            "o1",
            vec![
                item("a", 1499, None),
                item("b", 1299, Some(2)),
                item("c", 1000, Some(2)),
            ],
            0,
        );
        seed_draft(&order, SplitMode::Manual).unwrap()
    }

    #[test]
    fn test_select_replaces_previous_selection() {
        let mut d = draft();
        d.select_line("a").unwrap();
        assert_eq!(d.selected(), Some("a"));
        d.select_line("b").unwrap();
        assert_eq!(d.selected(), Some("b"));
    }

    #[test]
    fn test_select_unknown_line_fails() {
        let mut d = draft();
        assert_eq!(
            d.select_line("ghost"),
            Err(SplitError::LineNotFound("ghost".to_string()))
        );
    }

    #[test]
    fn test_move_requires_selection() {
        let mut d = draft();
        assert_eq!(d.move_selected_to(1), Err(SplitError::NothingSelected));
    }

    #[test]
    fn test_move_to_new_check_clears_selection() {
        let mut d = draft();
        d.select_line("a").unwrap();
        let index = d.move_selected_to_new_check().unwrap();

        assert_eq!(index, 2);
        assert_eq!(d.selected(), None);
        let map = d.index_map();
        assert_eq!(d.checks()[map[&2]].subtotal_cents(), 1499);
        assert_eq!(d.checks()[map[&1]].subtotal_cents(), 2299);
    }

    #[test]
    fn test_failed_move_keeps_line_picked_up() {
        let mut d = draft();
        d.select_line("a").unwrap();
        assert!(matches!(
            d.move_selected_to(9),
            Err(SplitError::CheckIndexOutOfRange { index: 9 })
        ));
        assert_eq!(d.selected(), Some("a"));
    }

    #[test]
    fn test_moves_preserve_split_total() {
        let mut d = draft();
        let order_total = d.order().total();

        d.select_line("a").unwrap();
        d.move_selected_to_new_check().unwrap();
        d.select_line("c").unwrap();
        d.move_selected_to(2).unwrap();

        assert_eq!(d.split_total().unwrap(), order_total);
        assert!(!d.has_blocking_issues());
    }

    #[test]
    fn test_split_item_round_robin_creates_checks() {
        let mut d = draft();
        // One check exists; splitting 3 ways must grow the draft to 3.
        d.split_item("a", 3).unwrap();

        assert_eq!(d.checks().len(), 3);
        let fractions: Vec<&CheckLine> = d
            .checks()
            .iter()
            .flat_map(|c| c.lines.iter())
            .filter(|l| l.is_partial())
            .collect();
        assert_eq!(fractions.len(), 3);
        assert_eq!(d.split_total().unwrap(), d.order().total());
    }

    #[test]
    fn test_resplit_collapses_first() {
        let mut d = draft();
        d.split_item("a", 3).unwrap();
        d.split_item("a", 2).unwrap();

        let fractions: Vec<u32> = d
            .checks()
            .iter()
            .flat_map(|c| c.lines.iter())
            .filter_map(|l| match l {
                CheckLine::Partial(f) if f.item_id == "a" => Some(f.fraction_count),
                _ => None,
            })
            .collect();
        // Exactly 2 fractions remain and none claim the old 3-way count.
        assert_eq!(fractions, vec![2, 2]);
        assert_eq!(d.split_total().unwrap(), d.order().total());
    }

    #[test]
    fn test_reset_reseeds_and_clears_selection() {
        let mut d = draft();
        d.select_line("a").unwrap();
        d.move_selected_to_new_check().unwrap();
        d.select_line("b").unwrap();

        d.reset().unwrap();
        assert_eq!(d.checks().len(), 1);
        assert_eq!(d.selected(), None);
    }

    #[test]
    fn test_empty_check_is_advisory_not_blocking() {
        let mut d = draft();
        d.select_line("a").unwrap();
        d.move_selected_to_new_check().unwrap();
        d.select_line("a").unwrap();
        d.move_selected_to(1).unwrap();

        let issues = d.issues();
        assert!(issues.iter().any(|i| i.severity == IssueSeverity::Advisory));
        assert!(!d.has_blocking_issues());
    }

    #[test]
    fn test_commit_payload_drops_empty_checks() {
        let mut d = draft();
        d.select_line("a").unwrap();
        d.move_selected_to_new_check().unwrap();
        d.select_line("a").unwrap();
        d.move_selected_to(1).unwrap();

        let payload = d.commit_payload().unwrap();
        assert_eq!(payload.assignments.len(), 1);
        assert_eq!(payload.assignments[0].index, 1);
        assert_eq!(payload.assignments[0].line_ids.len(), 3);
        assert!(payload.even_ways.is_none());
    }

    #[test]
    fn test_commit_payload_carries_fractions() {
        let mut d = draft();
        d.split_item("a", 3).unwrap();

        let payload = d.commit_payload().unwrap();
        assert_eq!(payload.fractions.len(), 3);
        let fraction_total: i64 = payload.fractions.iter().map(|f| f.share_cents).sum();
        assert_eq!(fraction_total, 1499);
    }

    #[test]
    fn test_even_commit_payload_is_virtual() {
        let order = Order::new("o1", vec![item("a", 5721, None)], 0);
        let d = seed_draft(&order, SplitMode::Even { ways: 4 }).unwrap();

        let payload = d.commit_payload().unwrap();
        assert!(payload.assignments.is_empty());
        assert!(payload.fractions.is_empty());
        assert_eq!(payload.even_ways, Some(4));
    }

    #[test]
    fn test_draft_totals_allocate_tax_exactly() {
        let order = Order::new(
            "o1",
            vec![item("a", 1499, None), item("b", 2598, Some(2))],
            240,
        );
        let mut d = seed_draft(&order, SplitMode::BySeat).unwrap();
        let totals = d.totals().unwrap();
        assert_eq!(
            totals.iter().map(|m| m.cents()).sum::<i64>(),
            order.total_cents
        );

        // Still exact after a move.
        d.select_line("a").unwrap();
        d.move_selected_to(2).unwrap();
        assert_eq!(d.split_total().unwrap().cents(), order.total_cents);
    }
}
