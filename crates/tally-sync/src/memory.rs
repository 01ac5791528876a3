//! # In-Memory Gateway
//!
//! A reference [`CheckGateway`] implementing the documented server
//! semantics, used by tests and demos:
//!
//! - delete redistributes lines to the lowest-index remaining open check,
//!   and auto-merges when exactly one check would remain
//! - paid checks are immutable AT THE GATEWAY
//! - moves resolve by line id wherever the line currently is, so two
//!   terminals racing on the same item settle last-write-wins
//! - every successful mutation emits a [`ChangeEvent`] on the broadcast
//!   feed (order id; payment completions also key by check id)
//!
//! Failure injection (`fail_next`) lets tests exercise the synchronizer's
//! rollback path without a real transport.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use tally_core::allocator::{allocate_tax, even_shares, verify_checks};
use tally_core::fraction::fracture;
use tally_core::{CardSummary, Check, CheckLine, InitialSplit, Money, Order, OrderStatus};

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{ChangeEvent, CheckGateway, DeleteOutcome, OrderChecks};

/// Broadcast capacity: slow subscribers fall back to a full reload anyway.
const EVENT_CAPACITY: usize = 64;

// =============================================================================
// In-Memory Gateway
// =============================================================================

/// Server-side split state for every seeded order, behind one mutex.
pub struct InMemoryGateway {
    state: Mutex<HashMap<String, OrderChecks>>,
    events: broadcast::Sender<ChangeEvent>,
    fail_next: Mutex<Option<String>>,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    /// Creates an empty gateway.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        InMemoryGateway {
            state: Mutex::new(HashMap::new()),
            events,
            fail_next: Mutex::new(None),
        }
    }

    /// Seeds an unsplit order.
    pub fn seed_order(&self, order: Order) {
        let mut state = self.state.lock().expect("gateway mutex poisoned");
        state.insert(
            order.id.clone(),
            OrderChecks {
                order,
                checks: Vec::new(),
            },
        );
    }

    /// Subscribes to the change-notification feed.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    /// Makes the NEXT mutating call fail with `Unavailable(reason)`.
    pub fn fail_next(&self, reason: impl Into<String>) {
        *self.fail_next.lock().expect("gateway mutex poisoned") = Some(reason.into());
    }

    fn take_failure(&self) -> GatewayResult<()> {
        let injected = self.fail_next.lock().expect("gateway mutex poisoned").take();
        match injected {
            Some(reason) => Err(GatewayError::Unavailable(reason)),
            None => Ok(()),
        }
    }

    fn notify(&self, key: &str) {
        // No subscribers is fine; send only errors when the channel is empty.
        let _ = self.events.send(ChangeEvent::new(key));
    }

    /// Runs `f` against one order's state under the lock.
    fn with_order<R>(
        &self,
        order_id: &str,
        f: impl FnOnce(&mut OrderChecks) -> GatewayResult<R>,
    ) -> GatewayResult<R> {
        let mut state = self.state.lock().expect("gateway mutex poisoned");
        let entry = state
            .get_mut(order_id)
            .ok_or_else(|| GatewayError::OrderNotFound(order_id.to_string()))?;
        f(entry)
    }

    /// Reindexes checks, recomputes fixed even shares, and re-allocates the
    /// order tax.
    fn rebalance(entry: &mut OrderChecks) -> GatewayResult<()> {
        for (i, check) in entry.checks.iter_mut().enumerate() {
            check.index = i as u32 + 1;
        }

        // Virtual checks carry fixed shares of the grand total. After a
        // delete the survivors must re-divide the unpaid remainder, or the
        // deleted share would silently vanish. Paid shares stay frozen.
        if entry.checks.iter().any(|c| c.even_amount_cents.is_some()) {
            let frozen: i64 = entry
                .checks
                .iter()
                .filter(|c| !c.is_open())
                .map(|c| c.total_cents())
                .sum();
            let open: Vec<usize> = (0..entry.checks.len())
                .filter(|&i| entry.checks[i].is_open())
                .collect();
            if !open.is_empty() {
                let remainder = Money::from_cents(entry.order.total_cents - frozen);
                let shares = even_shares(remainder, open.len() as u32)
                    .map_err(|e| GatewayError::Integrity(e.to_string()))?;
                for (&pos, share) in open.iter().zip(shares) {
                    entry.checks[pos].even_amount_cents = Some(share.cents());
                }
            }
        }

        allocate_tax(&entry.order, &mut entry.checks)
            .map_err(|e| GatewayError::Integrity(e.to_string()))
    }
}

// =============================================================================
// Gateway Implementation
// =============================================================================

#[async_trait]
impl CheckGateway for InMemoryGateway {
    async fn read(&self, order_id: &str) -> GatewayResult<OrderChecks> {
        let state = self.state.lock().expect("gateway mutex poisoned");
        state
            .get(order_id)
            .cloned()
            .ok_or_else(|| GatewayError::OrderNotFound(order_id.to_string()))
    }

    async fn create_check(&self, order_id: &str) -> GatewayResult<String> {
        self.take_failure()?;
        let id = self.with_order(order_id, |entry| {
            let id = Uuid::new_v4().to_string();
            let index = entry.checks.len() as u32 + 1;
            entry
                .checks
                .push(Check::new(id.clone(), index, format!("Check {}", index)));
            Ok(id)
        })?;
        self.notify(order_id);
        Ok(id)
    }

    async fn delete_check(&self, order_id: &str, check_id: &str) -> GatewayResult<DeleteOutcome> {
        self.take_failure()?;
        let outcome = self.with_order(order_id, |entry| {
            let pos = entry
                .checks
                .iter()
                .position(|c| c.id == check_id)
                .ok_or_else(|| GatewayError::CheckNotFound(check_id.to_string()))?;
            if entry.checks[pos].is_paid() {
                return Err(GatewayError::PaidCheckImmutable(check_id.to_string()));
            }

            // A virtual check's fixed share must land on another open
            // check; with none left the unpaid remainder would vanish.
            if entry.checks[pos].even_amount_cents.is_some()
                && !entry
                    .checks
                    .iter()
                    .enumerate()
                    .any(|(i, c)| i != pos && c.is_open())
            {
                return Err(GatewayError::PaidCheckImmutable(check_id.to_string()));
            }

            let removed = entry.checks.remove(pos);

            // Redistribute into the open check with the lowest remaining
            // index; a non-empty check can never be deleted into a wall of
            // paid checks.
            if !removed.lines.is_empty() {
                let target = entry
                    .checks
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| c.is_open())
                    .min_by_key(|(_, c)| c.index)
                    .map(|(i, _)| i);
                match target {
                    Some(i) => entry.checks[i].lines.extend(removed.lines),
                    None => {
                        // No open check can absorb the lines; undo and reject.
                        let at = pos.min(entry.checks.len());
                        entry.checks.insert(at, removed);
                        return Err(GatewayError::PaidCheckImmutable(check_id.to_string()));
                    }
                }
            }

            // Deleting down to one unpaid check implicitly merges the
            // order back to unsplit.
            if entry.checks.len() == 1 && entry.checks[0].is_open() {
                entry.checks.clear();
                entry.order.status = OrderStatus::Open;
                return Ok(DeleteOutcome { merged: true });
            }

            Self::rebalance(entry)?;
            verify_checks(&entry.order, &entry.checks)
                .map_err(|e| GatewayError::Integrity(e.to_string()))?;
            Ok(DeleteOutcome { merged: false })
        })?;
        self.notify(order_id);
        Ok(outcome)
    }

    async fn move_item(
        &self,
        order_id: &str,
        line_id: &str,
        _from_check_id: &str,
        to_check_id: &str,
    ) -> GatewayResult<()> {
        self.take_failure()?;
        self.with_order(order_id, |entry| {
            let to_pos = entry
                .checks
                .iter()
                .position(|c| c.id == to_check_id)
                .ok_or_else(|| GatewayError::CheckNotFound(to_check_id.to_string()))?;
            if entry.checks[to_pos].is_paid() {
                return Err(GatewayError::PaidCheckImmutable(to_check_id.to_string()));
            }

            // Resolve by line id wherever the line is now, not where the
            // caller last saw it: concurrent movers settle last-write-wins.
            let from_pos = entry
                .checks
                .iter()
                .position(|c| c.line(line_id).is_some())
                .ok_or_else(|| GatewayError::LineNotFound(line_id.to_string()))?;
            if entry.checks[from_pos].is_paid() {
                return Err(GatewayError::PaidCheckImmutable(
                    entry.checks[from_pos].id.clone(),
                ));
            }

            let line = entry.checks[from_pos]
                .take_line(line_id)
                .expect("line position verified above");
            entry.checks[to_pos].lines.push(line);
            Self::rebalance(entry)
        })?;
        self.notify(order_id);
        Ok(())
    }

    async fn split_item(
        &self,
        order_id: &str,
        item_id: &str,
        from_check_id: &str,
        ways: u32,
    ) -> GatewayResult<()> {
        self.take_failure()?;
        self.with_order(order_id, |entry| {
            let item = entry
                .order
                .item(item_id)
                .cloned()
                .ok_or_else(|| GatewayError::LineNotFound(item_id.to_string()))?;
            let start_pos = entry
                .checks
                .iter()
                .position(|c| c.id == from_check_id)
                .ok_or_else(|| GatewayError::CheckNotFound(from_check_id.to_string()))?;

            // Paid checks freeze their fractions; the split is rejected
            // before anything is collapsed.
            if entry
                .checks
                .iter()
                .any(|c| c.is_paid() && c.lines.iter().any(|l| l.item_id() == item_id))
            {
                return Err(GatewayError::PaidCheckImmutable(item_id.to_string()));
            }

            let fractions =
                fracture(&item, ways).map_err(|e| GatewayError::Integrity(e.to_string()))?;

            // Collapse any current assignment (whole line or fractions).
            let mut removed = 0usize;
            for check in &mut entry.checks {
                let before = check.lines.len();
                check.lines.retain(|l| l.item_id() != item_id);
                removed += before - check.lines.len();
            }
            if removed == 0 {
                return Err(GatewayError::LineNotFound(item_id.to_string()));
            }

            while (entry.checks.len() as u32) < ways {
                let index = entry.checks.len() as u32 + 1;
                entry.checks.push(Check::new(
                    Uuid::new_v4().to_string(),
                    index,
                    format!("Check {}", index),
                ));
            }

            // Round-robin across open checks, starting at the originating
            // check.
            let open: Vec<usize> = (0..entry.checks.len())
                .map(|i| (start_pos + i) % entry.checks.len())
                .filter(|&i| entry.checks[i].is_open())
                .collect();
            for (i, fraction) in fractions.into_iter().enumerate() {
                let pos = open[i % open.len()];
                entry.checks[pos].lines.push(CheckLine::Partial(fraction));
            }
            Self::rebalance(entry)
        })?;
        self.notify(order_id);
        Ok(())
    }

    async fn commit_initial_split(
        &self,
        order_id: &str,
        payload: InitialSplit,
    ) -> GatewayResult<()> {
        self.take_failure()?;
        self.with_order(order_id, |entry| {
            if entry.order.status == OrderStatus::Split {
                return Err(GatewayError::AlreadySplit(order_id.to_string()));
            }

            let mut checks = Vec::new();
            if let Some(ways) = payload.even_ways {
                let shares = even_shares(entry.order.total(), ways)
                    .map_err(|e| GatewayError::Integrity(e.to_string()))?;
                for (i, share) in shares.into_iter().enumerate() {
                    let mut check = Check::new(
                        Uuid::new_v4().to_string(),
                        i as u32 + 1,
                        format!("Check {}", i + 1),
                    );
                    check.even_amount_cents = Some(share.cents());
                    checks.push(check);
                }
            } else {
                for assigned in &payload.assignments {
                    let mut check = Check::new(
                        Uuid::new_v4().to_string(),
                        assigned.index,
                        assigned.label.clone(),
                    );
                    for line_id in &assigned.line_ids {
                        let line = match payload.fractions.iter().find(|f| &f.id == line_id) {
                            Some(fraction) => CheckLine::Partial(fraction.clone()),
                            None => CheckLine::Whole(
                                entry
                                    .order
                                    .item(line_id)
                                    .cloned()
                                    .ok_or_else(|| {
                                        GatewayError::LineNotFound(line_id.to_string())
                                    })?,
                            ),
                        };
                        check.lines.push(line);
                    }
                    checks.push(check);
                }
            }

            entry.checks = checks;
            Self::rebalance(entry)?;
            verify_checks(&entry.order, &entry.checks)
                .map_err(|e| GatewayError::Integrity(e.to_string()))?;
            entry.order.status = OrderStatus::Split;
            Ok(())
        })?;
        self.notify(order_id);
        Ok(())
    }

    async fn mark_paid(
        &self,
        order_id: &str,
        check_id: &str,
        card: Option<CardSummary>,
    ) -> GatewayResult<()> {
        self.take_failure()?;
        self.with_order(order_id, |entry| {
            let check = entry
                .checks
                .iter_mut()
                .find(|c| c.id == check_id)
                .ok_or_else(|| GatewayError::CheckNotFound(check_id.to_string()))?;
            if check.is_paid() {
                return Err(GatewayError::PaidCheckImmutable(check_id.to_string()));
            }
            check.status = tally_core::CheckStatus::Paid;
            check.paid_at = Some(Utc::now());
            check.card = card;

            if entry.checks.iter().all(|c| !c.is_open()) {
                entry.order.status = OrderStatus::Closed;
            }
            Ok(())
        })?;
        self.notify(order_id);
        // Payment completions also key by check id for per-check viewers.
        self.notify(check_id);
        Ok(())
    }

    async fn merge(&self, order_id: &str) -> GatewayResult<()> {
        self.take_failure()?;
        self.with_order(order_id, |entry| {
            if entry.checks.iter().any(|c| c.is_paid()) {
                return Err(GatewayError::PaidChecksPresent);
            }
            entry.checks.clear();
            entry.order.status = OrderStatus::Open;
            Ok(())
        })?;
        self.notify(order_id);
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{InitialCheck, Item};

    fn item(id: &str, cents: i64) -> Item {
        Item {
            id: id.to_string(),
            name: format!("Item {}", id),
            unit_price_cents: cents,
            quantity: 1,
            seat: None,
            modifiers: Vec::new(),
            sent_to_kitchen: true,
            paid: false,
        }
    }

    fn seeded() -> (InMemoryGateway, String) {
        let gateway = InMemoryGateway::new();
        let order = Order::new("o1", vec![item("a", 1499), item("b", 2598)], 0);
        let order_id = order.id.clone();
        gateway.seed_order(order);
        (gateway, order_id)
    }

    async fn split_two_ways(gateway: &InMemoryGateway, order_id: &str) {
        let payload = InitialSplit {
            assignments: vec![
                InitialCheck {
                    index: 1,
                    label: "Check 1".to_string(),
                    line_ids: vec!["a".to_string()],
                },
                InitialCheck {
                    index: 2,
                    label: "Check 2".to_string(),
                    line_ids: vec!["b".to_string()],
                },
            ],
            fractions: Vec::new(),
            even_ways: None,
        };
        gateway.commit_initial_split(order_id, payload).await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_then_read_preserves_total() {
        let (gateway, order_id) = seeded();
        split_two_ways(&gateway, &order_id).await;

        let view = gateway.read(&order_id).await.unwrap();
        assert_eq!(view.checks.len(), 2);
        assert_eq!(view.split_total_cents(), view.order.total_cents);
        assert_eq!(view.order.status, OrderStatus::Split);
    }

    #[tokio::test]
    async fn test_double_initial_commit_rejected() {
        let (gateway, order_id) = seeded();
        split_two_ways(&gateway, &order_id).await;

        let payload = InitialSplit {
            assignments: Vec::new(),
            fractions: Vec::new(),
            even_ways: Some(2),
        };
        let err = gateway
            .commit_initial_split(&order_id, payload)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::AlreadySplit(_)));
    }

    #[tokio::test]
    async fn test_delete_redistributes_then_auto_merges() {
        let (gateway, order_id) = seeded();
        split_two_ways(&gateway, &order_id).await;
        let view = gateway.read(&order_id).await.unwrap();

        // Deleting the only other check leaves one → implicit merge-back.
        let outcome = gateway
            .delete_check(&order_id, &view.checks[1].id)
            .await
            .unwrap();
        assert!(outcome.merged);

        let after = gateway.read(&order_id).await.unwrap();
        assert!(after.checks.is_empty());
        assert_eq!(after.order.status, OrderStatus::Open);
    }

    #[tokio::test]
    async fn test_delete_redistributes_to_lowest_index() {
        let (gateway, order_id) = seeded();
        split_two_ways(&gateway, &order_id).await;
        gateway.create_check(&order_id).await.unwrap();

        let view = gateway.read(&order_id).await.unwrap();
        let outcome = gateway
            .delete_check(&order_id, &view.checks[1].id)
            .await
            .unwrap();
        assert!(!outcome.merged);

        let after = gateway.read(&order_id).await.unwrap();
        // Check 1 absorbed check 2's line; the empty third check remains.
        assert_eq!(after.checks.len(), 2);
        assert_eq!(after.checks[0].lines.len(), 2);
        assert_eq!(after.split_total_cents(), after.order.total_cents);
    }

    #[tokio::test]
    async fn test_merge_with_paid_check_rejected_without_mutation() {
        let (gateway, order_id) = seeded();
        split_two_ways(&gateway, &order_id).await;
        let view = gateway.read(&order_id).await.unwrap();
        gateway
            .mark_paid(&order_id, &view.checks[0].id, None)
            .await
            .unwrap();

        let err = gateway.merge(&order_id).await.unwrap_err();
        assert_eq!(err, GatewayError::PaidChecksPresent);

        let after = gateway.read(&order_id).await.unwrap();
        assert_eq!(after.checks.len(), 2);
        assert_eq!(after.order.status, OrderStatus::Split);
    }

    #[tokio::test]
    async fn test_paid_check_is_immutable_at_gateway() {
        let (gateway, order_id) = seeded();
        split_two_ways(&gateway, &order_id).await;
        let view = gateway.read(&order_id).await.unwrap();
        let paid_id = view.checks[0].id.clone();
        let open_id = view.checks[1].id.clone();
        gateway.mark_paid(&order_id, &paid_id, None).await.unwrap();

        // Out of a paid check.
        let err = gateway
            .move_item(&order_id, "a", &paid_id, &open_id)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::PaidCheckImmutable(_)));

        // Into a paid check.
        let err = gateway
            .move_item(&order_id, "b", &open_id, &paid_id)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::PaidCheckImmutable(_)));

        // Delete of a paid check.
        let err = gateway.delete_check(&order_id, &paid_id).await.unwrap_err();
        assert!(matches!(err, GatewayError::PaidCheckImmutable(_)));
    }

    #[tokio::test]
    async fn test_move_resolves_stale_from_check() {
        let (gateway, order_id) = seeded();
        split_two_ways(&gateway, &order_id).await;
        let view = gateway.read(&order_id).await.unwrap();
        let c1 = view.checks[0].id.clone();
        let c2 = view.checks[1].id.clone();

        // Terminal B already moved "a" to check 2; terminal A's request
        // still names check 1 as the source. Last write wins.
        gateway.move_item(&order_id, "a", &c1, &c2).await.unwrap();
        gateway.move_item(&order_id, "a", &c1, &c1).await.unwrap();

        let after = gateway.read(&order_id).await.unwrap();
        assert!(after.check(&c1).unwrap().line("a").is_some());
        assert_eq!(after.split_total_cents(), after.order.total_cents);
    }

    #[tokio::test]
    async fn test_split_item_round_robin_from_origin() {
        let (gateway, order_id) = seeded();
        split_two_ways(&gateway, &order_id).await;
        let view = gateway.read(&order_id).await.unwrap();
        let c1 = view.checks[0].id.clone();

        gateway.split_item(&order_id, "a", &c1, 3).await.unwrap();

        let after = gateway.read(&order_id).await.unwrap();
        assert_eq!(after.checks.len(), 3);
        let fraction_total: i64 = after
            .checks
            .iter()
            .flat_map(|c| c.lines.iter())
            .filter(|l| l.is_partial())
            .map(|l| l.amount_cents())
            .sum();
        assert_eq!(fraction_total, 1499);
        assert_eq!(after.split_total_cents(), after.order.total_cents);
    }

    #[tokio::test]
    async fn test_even_commit_materializes_virtual_checks() {
        let gateway = InMemoryGateway::new();
        let order = Order::new("o2", vec![item("a", 5721)], 0);
        gateway.seed_order(order);

        let payload = InitialSplit {
            assignments: Vec::new(),
            fractions: Vec::new(),
            even_ways: Some(4),
        };
        gateway.commit_initial_split("o2", payload).await.unwrap();

        let view = gateway.read("o2").await.unwrap();
        let totals: Vec<i64> = view.checks.iter().map(|c| c.total_cents()).collect();
        assert_eq!(totals, vec![1430, 1430, 1430, 1431]);
    }

    async fn split_even_four(gateway: &InMemoryGateway) {
        gateway.seed_order(Order::new("o2", vec![item("a", 5721)], 0));
        let payload = InitialSplit {
            assignments: Vec::new(),
            fractions: Vec::new(),
            even_ways: Some(4),
        };
        gateway.commit_initial_split("o2", payload).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_even_check_redivides_fixed_shares() {
        let gateway = InMemoryGateway::new();
        split_even_four(&gateway).await;
        let view = gateway.read("o2").await.unwrap();

        // Dropping one virtual check hands its share to the survivors.
        gateway
            .delete_check("o2", &view.checks[3].id)
            .await
            .unwrap();

        let after = gateway.read("o2").await.unwrap();
        let amounts: Vec<i64> = after.checks.iter().map(|c| c.total_cents()).collect();
        assert_eq!(amounts, vec![1907, 1907, 1907]);
        assert_eq!(after.split_total_cents(), after.order.total_cents);
    }

    #[tokio::test]
    async fn test_delete_even_check_keeps_paid_share_frozen() {
        let gateway = InMemoryGateway::new();
        split_even_four(&gateway).await;
        let view = gateway.read("o2").await.unwrap();
        gateway
            .mark_paid("o2", &view.checks[0].id, None)
            .await
            .unwrap();

        gateway
            .delete_check("o2", &view.checks[1].id)
            .await
            .unwrap();

        let after = gateway.read("o2").await.unwrap();
        let amounts: Vec<i64> = after.checks.iter().map(|c| c.total_cents()).collect();
        // The paid $14.30 share is untouched; the open survivors re-divide
        // the unpaid remainder.
        assert_eq!(amounts, vec![1430, 2145, 2146]);
        assert_eq!(after.split_total_cents(), after.order.total_cents);
    }

    #[tokio::test]
    async fn test_delete_last_open_even_check_rejected() {
        let gateway = InMemoryGateway::new();
        gateway.seed_order(Order::new("o2", vec![item("a", 5721)], 0));
        let payload = InitialSplit {
            assignments: Vec::new(),
            fractions: Vec::new(),
            even_ways: Some(2),
        };
        gateway.commit_initial_split("o2", payload).await.unwrap();
        let view = gateway.read("o2").await.unwrap();
        gateway
            .mark_paid("o2", &view.checks[0].id, None)
            .await
            .unwrap();

        let err = gateway
            .delete_check("o2", &view.checks[1].id)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::PaidCheckImmutable(_)));

        let after = gateway.read("o2").await.unwrap();
        assert_eq!(after.checks.len(), 2);
        assert_eq!(after.split_total_cents(), after.order.total_cents);
    }

    #[tokio::test]
    async fn test_fail_next_rejects_one_mutation() {
        let (gateway, order_id) = seeded();
        split_two_ways(&gateway, &order_id).await;

        gateway.fail_next("socket hangup");
        let err = gateway.create_check(&order_id).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable(_)));

        // The injected failure is consumed; the next call succeeds.
        gateway.create_check(&order_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_mutations_emit_change_events() {
        let (gateway, order_id) = seeded();
        let mut feed = gateway.subscribe();
        split_two_ways(&gateway, &order_id).await;

        let event = feed.recv().await.unwrap();
        assert_eq!(event.key, order_id);
    }
}
