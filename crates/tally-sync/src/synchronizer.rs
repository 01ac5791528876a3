//! # Managed Split Synchronizer
//!
//! Keeps one terminal's projection of a split order in step with the
//! authoritative gateway. Every mutation runs the same pipeline:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   single-flight guard ──► optimistic apply ──► remote commit           │
//! │                                                      │                  │
//! │                        success ◄─────────────────────┤                  │
//! │                           │                          │ failure/timeout  │
//! │            wholesale authoritative reload      exact snapshot rollback  │
//! │            (server wins, no delta merge)       + rolled-back event      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The guard is per terminal, not global: it stops THIS terminal from
//! stacking a second guess on an unconfirmed one. Cross-terminal races are
//! resolved last-write-wins at the gateway and repaired by reload.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use tally_core::allocator::{allocate_tax, even_shares};
use tally_core::fraction::fracture;
use tally_core::{
    CardSummary, Check, CheckLine, CheckStatus, InitialSplit, Money, OrderStatus, SplitError,
    MAX_SPLIT_WAYS,
};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::gateway::{ChangeEvent, CheckGateway, DeleteOutcome, OrderChecks};
use crate::ports::{NoOpEmitter, NoOpPayment, NoOpPrinter, PaymentPort, SplitEventEmitter, TicketPrinter};
use crate::reload::{self, ReloadHandle, ReloadTarget};

// =============================================================================
// Mutation Lifecycle
// =============================================================================

/// Where a mutation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    /// Applied locally, remote commit unresolved.
    Pending,
    /// Remote commit confirmed; the snapshot is obsolete.
    Committed,
    /// Remote commit failed; the snapshot was restored verbatim.
    RolledBack,
}

/// One optimistic mutation: the pre-mutation snapshot plus its lifecycle
/// state. Capturing the snapshot BEFORE the local guess is what makes
/// rollback exact rather than best-effort.
pub struct Mutation {
    snapshot: OrderChecks,
    state: MutationState,
}

impl Mutation {
    /// Captures the current projection as the rollback point.
    pub fn begin(current: &OrderChecks) -> Self {
        Mutation {
            snapshot: current.clone(),
            state: MutationState::Pending,
        }
    }

    pub fn state(&self) -> MutationState {
        self.state
    }

    /// Marks the remote commit confirmed. The snapshot is dropped; the
    /// authoritative reload supersedes the optimistic guess.
    pub fn commit(mut self) -> MutationState {
        self.state = MutationState::Committed;
        self.state
    }

    /// Restores the pre-mutation snapshot into `target`, byte for byte.
    pub fn roll_back(self, target: &mut OrderChecks) -> MutationState {
        *target = self.snapshot;
        MutationState::RolledBack
    }
}

// =============================================================================
// Shared Core + Single-Flight Guard
// =============================================================================

/// State shared between the synchronizer, the reload coalescer, and any
/// background commit tasks.
pub(crate) struct SplitCore {
    pub(crate) order_id: String,
    pub(crate) gateway: Arc<dyn CheckGateway>,
    pub(crate) emitter: Arc<dyn SplitEventEmitter>,
    pub(crate) config: SyncConfig,
    pub(crate) state: Mutex<OrderChecks>,
    in_flight: AtomicBool,
}

/// RAII token for the single-flight guard. Holding it means this terminal
/// has exactly one unconfirmed mutation; dropping it (on any exit path)
/// re-opens the gate.
pub(crate) struct FlightGuard {
    core: Arc<SplitCore>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.core.in_flight.store(false, Ordering::Release);
    }
}

impl SplitCore {
    /// Claims the single-flight slot, or reports a mutation already in
    /// flight.
    pub(crate) fn begin(self: &Arc<Self>) -> SyncResult<FlightGuard> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SyncError::MutationInFlight);
        }
        Ok(FlightGuard {
            core: Arc::clone(self),
        })
    }

    /// Replaces the projection with a fresh authoritative read and tells
    /// the UI. Never merges: the server's answer wins wholesale.
    pub(crate) async fn refresh(&self) -> SyncResult<()> {
        let fresh = self.gateway.read(&self.order_id).await?;
        let mut state = self.state.lock().await;
        *state = fresh;
        self.emitter.emit_refreshed(&state);
        Ok(())
    }

    /// True when a change-feed key concerns this order: the order id
    /// itself, or any currently displayed check id (payment completions
    /// are keyed by check).
    pub(crate) async fn matches(&self, event: &ChangeEvent) -> bool {
        if event.key == self.order_id {
            return true;
        }
        let state = self.state.lock().await;
        state.checks.iter().any(|c| c.id == event.key)
    }
}

#[async_trait]
impl ReloadTarget for SplitCore {
    async fn reload(&self) {
        if let Err(e) = self.refresh().await {
            // Reload failures are transient by nature; the next trigger or
            // fallback poll retries.
            warn!(order_id = %self.order_id, error = %e, "reload failed");
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`ManagedSplit`]. Only the gateway is mandatory; emitter,
/// payment, and printer default to no-ops so the engine runs headless.
pub struct ManagedSplitBuilder {
    gateway: Arc<dyn CheckGateway>,
    emitter: Arc<dyn SplitEventEmitter>,
    payment: Arc<dyn PaymentPort>,
    printer: Arc<dyn TicketPrinter>,
    config: SyncConfig,
}

impl ManagedSplitBuilder {
    pub fn new(gateway: Arc<dyn CheckGateway>) -> Self {
        ManagedSplitBuilder {
            gateway,
            emitter: Arc::new(NoOpEmitter),
            payment: Arc::new(NoOpPayment),
            printer: Arc::new(NoOpPrinter),
            config: SyncConfig::default(),
        }
    }

    pub fn emitter(mut self, emitter: Arc<dyn SplitEventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn payment(mut self, payment: Arc<dyn PaymentPort>) -> Self {
        self.payment = payment;
        self
    }

    pub fn printer(mut self, printer: Arc<dyn TicketPrinter>) -> Self {
        self.printer = printer;
        self
    }

    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Reads the order's current split state and starts the reload
    /// coalescer for it.
    pub async fn open(self, order_id: impl Into<String>) -> SyncResult<ManagedSplit> {
        self.config.validate()?;
        let order_id = order_id.into();
        let initial = self.gateway.read(&order_id).await?;
        info!(order_id = %order_id, checks = initial.checks.len(), "split view opened");

        let core = Arc::new(SplitCore {
            order_id,
            gateway: self.gateway,
            emitter: self.emitter,
            config: self.config.clone(),
            state: Mutex::new(initial),
            in_flight: AtomicBool::new(false),
        });
        let target: Arc<dyn ReloadTarget> = core.clone();
        let reload = reload::spawn(target, self.config);

        Ok(ManagedSplit {
            core,
            reload,
            payment: self.payment,
            printer: self.printer,
        })
    }

    /// Commits an initial split from edit mode, then opens the managed
    /// view on the result.
    pub async fn commit_initial(
        self,
        order_id: impl Into<String>,
        payload: InitialSplit,
    ) -> SyncResult<ManagedSplit> {
        let order_id = order_id.into();
        self.gateway.commit_initial_split(&order_id, payload).await?;
        self.open(order_id).await
    }
}

// =============================================================================
// Managed Split
// =============================================================================

/// One terminal's live handle on a split order. Mutations are optimistic
/// with exact rollback; freshness comes from the coalesced reload queue.
pub struct ManagedSplit {
    pub(crate) core: Arc<SplitCore>,
    pub(crate) reload: ReloadHandle,
    payment: Arc<dyn PaymentPort>,
    printer: Arc<dyn TicketPrinter>,
}

impl ManagedSplit {
    pub fn order_id(&self) -> &str {
        &self.core.order_id
    }

    /// Current projection (optimistic guesses included).
    pub async fn state(&self) -> OrderChecks {
        self.core.state.lock().await.clone()
    }

    /// Sum of every displayed check's total.
    pub async fn split_total(&self) -> Money {
        Money::from_cents(self.core.state.lock().await.split_total_cents())
    }

    // -------------------------------------------------------------------------
    // Change feed / lifecycle hooks
    // -------------------------------------------------------------------------

    /// Subscribes a change-notification feed: matching keys schedule a
    /// debounced reload, lag schedules one unconditionally.
    pub fn watch(&self, mut rx: broadcast::Receiver<ChangeEvent>) -> tokio::task::JoinHandle<()> {
        let core = Arc::clone(&self.core);
        let reload = self.reload.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if core.matches(&event).await {
                            debug!(key = %event.key, "change notification matched");
                            reload.request();
                        }
                    }
                    // Missed events may have concerned us; reload to be sure.
                    Err(broadcast::error::RecvError::Lagged(_)) => reload.request(),
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Feeds one change-notification key manually (hosts without a
    /// broadcast feed).
    pub async fn handle_change(&self, key: &str) {
        if self.core.matches(&ChangeEvent::new(key)).await {
            self.reload.request();
        }
    }

    /// The terminal became the active view again; reload immediately.
    pub fn regained_visibility(&self) {
        self.reload.request_immediate();
    }

    /// Toggles the disconnected fallback poll.
    pub fn set_offline(&self, offline: bool) {
        self.reload.set_offline(offline);
    }

    /// Stops the reload coalescer.
    pub fn shutdown(&self) {
        self.reload.shutdown();
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Moves an item or fraction between checks.
    pub async fn move_item(
        &self,
        line_id: &str,
        from_check_id: &str,
        to_check_id: &str,
    ) -> SyncResult<()> {
        let gateway = Arc::clone(&self.core.gateway);
        let order_id = self.core.order_id.clone();
        let (line, from, to) = (
            line_id.to_string(),
            from_check_id.to_string(),
            to_check_id.to_string(),
        );
        let (line2, from2, to2) = (line.clone(), from.clone(), to.clone());
        self.mutate(
            "move_item",
            move |state| apply_move(state, &line2, &from2, &to2),
            async move { gateway.move_item(&order_id, &line, &from, &to).await },
        )
        .await
    }

    /// Splits an item into `ways` equal fractions, seeded round-robin from
    /// the originating check.
    pub async fn split_item(
        &self,
        item_id: &str,
        from_check_id: &str,
        ways: u32,
    ) -> SyncResult<()> {
        let gateway = Arc::clone(&self.core.gateway);
        let order_id = self.core.order_id.clone();
        let (item, from) = (item_id.to_string(), from_check_id.to_string());
        let (item2, from2) = (item.clone(), from.clone());
        self.mutate(
            "split_item",
            move |state| apply_split_item(state, &item2, &from2, ways),
            async move { gateway.split_item(&order_id, &item, &from, ways).await },
        )
        .await
    }

    /// Appends an empty check; returns the server-assigned id.
    pub async fn create_check(&self) -> SyncResult<String> {
        let gateway = Arc::clone(&self.core.gateway);
        let order_id = self.core.order_id.clone();
        self.mutate(
            "create_check",
            apply_create_check,
            async move { gateway.create_check(&order_id).await },
        )
        .await
    }

    /// Deletes a check, redistributing its lines. Emits a view-closed event
    /// when the server auto-merged the order back to unsplit.
    pub async fn delete_check(&self, check_id: &str) -> SyncResult<DeleteOutcome> {
        let gateway = Arc::clone(&self.core.gateway);
        let order_id = self.core.order_id.clone();
        let id = check_id.to_string();
        let id2 = id.clone();
        let outcome = self
            .mutate(
                "delete_check",
                move |state| apply_delete_check(state, &id2),
                async move { gateway.delete_check(&order_id, &id).await },
            )
            .await?;
        if outcome.merged {
            info!(order_id = %self.core.order_id, "delete left one check; order merged");
            self.core.emitter.emit_view_closed(&self.core.order_id);
        }
        Ok(outcome)
    }

    /// Records a completed payment against a check.
    pub async fn mark_paid(&self, check_id: &str, card: Option<CardSummary>) -> SyncResult<()> {
        let gateway = Arc::clone(&self.core.gateway);
        let order_id = self.core.order_id.clone();
        let id = check_id.to_string();
        let id2 = id.clone();
        let card2 = card.clone();
        self.mutate(
            "mark_paid",
            move |state| apply_mark_paid(state, &id2, card2),
            async move { gateway.mark_paid(&order_id, &id, card).await },
        )
        .await
    }

    /// The shared mutation pipeline: guard, snapshot, optimistic apply,
    /// bounded remote commit, then reconcile or exact rollback.
    async fn mutate<T, F, Fut>(&self, op: &'static str, optimistic: F, commit: Fut) -> SyncResult<T>
    where
        F: FnOnce(&mut OrderChecks) -> SyncResult<()>,
        Fut: std::future::Future<Output = crate::error::GatewayResult<T>>,
    {
        let _guard = self.core.begin()?;

        let mutation = {
            let mut state = self.core.state.lock().await;
            let mutation = Mutation::begin(&state);
            if let Err(e) = optimistic(&mut state) {
                // Local precondition failed; undo any partial guess and
                // never touch the gateway.
                mutation.roll_back(&mut state);
                return Err(e);
            }
            mutation
        };
        debug!(op, order_id = %self.core.order_id, "optimistic apply");

        match tokio::time::timeout(self.core.config.commit_timeout(), commit).await {
            Ok(Ok(value)) => {
                mutation.commit();
                if let Err(e) = self.core.refresh().await {
                    // Commit landed but the reconcile read failed; the
                    // optimistic state stands until the next reload.
                    warn!(op, error = %e, "reconcile read failed");
                }
                Ok(value)
            }
            Ok(Err(gateway_err)) => {
                let mut state = self.core.state.lock().await;
                mutation.roll_back(&mut state);
                drop(state);
                warn!(op, error = %gateway_err, "commit rejected; rolled back");
                self.core
                    .emitter
                    .emit_rolled_back(&self.core.order_id, &gateway_err.to_string());
                Err(SyncError::Gateway(gateway_err))
            }
            Err(_) => {
                let mut state = self.core.state.lock().await;
                mutation.roll_back(&mut state);
                drop(state);
                let secs = self.core.config.commit_timeout_secs;
                warn!(op, timeout_secs = secs, "commit timed out; rolled back");
                self.core
                    .emitter
                    .emit_rolled_back(&self.core.order_id, "saving timed out");
                Err(SyncError::Timeout(secs))
            }
        }
    }

    // -------------------------------------------------------------------------
    // Payment + Print Routing
    // -------------------------------------------------------------------------

    /// Checks still awaiting payment, in display order.
    pub async fn unpaid_checks(&self) -> Vec<Check> {
        let state = self.core.state.lock().await;
        state
            .checks
            .iter()
            .filter(|c| c.is_open())
            .cloned()
            .collect()
    }

    /// Routes one check to the payment collaborator. Completion arrives
    /// later as a change notification keyed by the check id.
    pub async fn on_pay_split(&self, check_id: &str) -> SyncResult<()> {
        let amount = {
            let state = self.core.state.lock().await;
            let check = state
                .check(check_id)
                .ok_or_else(|| SplitError::CheckNotFound(check_id.to_string()))?;
            if !check.is_open() {
                return Err(SplitError::PaidCheckImmutable {
                    check_id: check_id.to_string(),
                }
                .into());
            }
            Money::from_cents(check.total_cents())
        };
        info!(check_id, amount = %amount, "payment requested");
        self.payment.request_payment(check_id, amount);
        Ok(())
    }

    /// Routes every unpaid check to the payment collaborator as one
    /// combined capture. Returns the check ids and combined total; a fully
    /// paid split requests nothing.
    pub async fn on_pay_all_splits(&self) -> SyncResult<(Vec<String>, Money)> {
        let (ids, combined) = {
            let state = self.core.state.lock().await;
            let unpaid: Vec<&Check> = state.checks.iter().filter(|c| c.is_open()).collect();
            let ids: Vec<String> = unpaid.iter().map(|c| c.id.clone()).collect();
            let combined = Money::from_cents(unpaid.iter().map(|c| c.total_cents()).sum());
            (ids, combined)
        };
        if ids.is_empty() {
            return Ok((ids, combined));
        }
        info!(checks = ids.len(), combined = %combined, "combined payment requested");
        self.payment.request_combined_payment(&ids, combined);
        Ok((ids, combined))
    }

    /// Fire-and-forget check print; failures are logged, never retried.
    pub async fn request_print(&self, check_id: &str) {
        if let Err(message) = self.printer.print_check(check_id) {
            warn!(check_id, message, "check print failed");
        }
    }
}

// =============================================================================
// Optimistic Apply Functions
// =============================================================================
// Pure projection edits, separated from the pipeline so each guess is
// testable without a runtime. Each checks its preconditions before
// touching the projection.

fn apply_move(
    state: &mut OrderChecks,
    line_id: &str,
    from_check_id: &str,
    to_check_id: &str,
) -> SyncResult<()> {
    let from = check_position(state, from_check_id)?;
    let to = check_position(state, to_check_id)?;
    for pos in [from, to] {
        if !state.checks[pos].is_open() {
            return Err(SplitError::PaidCheckImmutable {
                check_id: state.checks[pos].id.clone(),
            }
            .into());
        }
    }
    let line = state.checks[from]
        .take_line(line_id)
        .ok_or_else(|| SplitError::LineNotFound(line_id.to_string()))?;
    state.checks[to].lines.push(line);
    allocate_tax(&state.order, &mut state.checks)?;
    Ok(())
}

fn apply_split_item(
    state: &mut OrderChecks,
    item_id: &str,
    from_check_id: &str,
    ways: u32,
) -> SyncResult<()> {
    if !(2..=MAX_SPLIT_WAYS).contains(&ways) {
        return Err(SplitError::InvalidWays {
            ways,
            max: MAX_SPLIT_WAYS,
        }
        .into());
    }
    let item = state
        .order
        .item(item_id)
        .ok_or_else(|| SplitError::ItemNotFound(item_id.to_string()))?
        .clone();

    // Existing fractions collapse first; one on a paid check blocks the
    // re-split entirely.
    for check in &state.checks {
        let holds_item = check.lines.iter().any(|l| l.item_id() == item_id);
        if holds_item && !check.is_open() {
            return Err(SplitError::PaidCheckImmutable {
                check_id: check.id.clone(),
            }
            .into());
        }
    }
    for check in &mut state.checks {
        check.lines.retain(|l| l.item_id() != item_id);
    }

    let from = check_position(state, from_check_id)?;
    while (state.checks.len() as u32) < ways {
        let index = state.checks.iter().map(|c| c.index).max().unwrap_or(0) + 1;
        // Placeholder id; the reconcile read replaces it with the
        // server-assigned one.
        let id = format!("local-{}", uuid::Uuid::new_v4());
        state
            .checks
            .push(Check::new(id, index, format!("Check {index}")));
    }

    let open: Vec<usize> = (0..state.checks.len())
        .filter(|&i| state.checks[i].is_open())
        .collect();
    if open.is_empty() {
        return Err(SplitError::PaidChecksPresent.into());
    }
    let start = open.iter().position(|&i| i == from).unwrap_or(0);
    let fractions = fracture(&item, ways)?;
    for (offset, fraction) in fractions.into_iter().enumerate() {
        let slot = open[(start + offset) % open.len()];
        state.checks[slot].lines.push(CheckLine::Partial(fraction));
    }
    allocate_tax(&state.order, &mut state.checks)?;
    Ok(())
}

fn apply_create_check(state: &mut OrderChecks) -> SyncResult<()> {
    let index = state.checks.iter().map(|c| c.index).max().unwrap_or(0) + 1;
    let id = format!("local-{}", uuid::Uuid::new_v4());
    state
        .checks
        .push(Check::new(id, index, format!("Check {index}")));
    Ok(())
}

fn apply_delete_check(state: &mut OrderChecks, check_id: &str) -> SyncResult<()> {
    let pos = check_position(state, check_id)?;
    if !state.checks[pos].is_open() {
        return Err(SplitError::PaidCheckImmutable {
            check_id: check_id.to_string(),
        }
        .into());
    }
    // A virtual check's fixed share needs another open check to absorb it.
    if state.checks[pos].even_amount_cents.is_some()
        && !state
            .checks
            .iter()
            .enumerate()
            .any(|(i, c)| i != pos && c.is_open())
    {
        return Err(SplitError::PaidChecksPresent.into());
    }
    let removed = state.checks.remove(pos);
    if !removed.lines.is_empty() {
        let target = state
            .checks
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_open())
            .min_by_key(|(_, c)| c.index)
            .map(|(i, _)| i)
            .ok_or(SplitError::PaidChecksPresent)?;
        state.checks[target].lines.extend(removed.lines);
    }
    // Whether one remaining check means "merged" is the server's call; the
    // reconcile read settles it.
    for (i, check) in state.checks.iter_mut().enumerate() {
        check.index = i as u32 + 1;
    }
    rebalance_even_shares(state)?;
    allocate_tax(&state.order, &mut state.checks)?;
    Ok(())
}

/// Re-divides the unpaid remainder across surviving virtual checks after a
/// delete, so the removed fixed share never vanishes. Paid shares stay
/// frozen. No-op for rule-based splits.
fn rebalance_even_shares(state: &mut OrderChecks) -> SyncResult<()> {
    if !state.checks.iter().any(|c| c.even_amount_cents.is_some()) {
        return Ok(());
    }
    let frozen: i64 = state
        .checks
        .iter()
        .filter(|c| !c.is_open())
        .map(|c| c.total_cents())
        .sum();
    let open: Vec<usize> = (0..state.checks.len())
        .filter(|&i| state.checks[i].is_open())
        .collect();
    if open.is_empty() {
        return Ok(());
    }
    let remainder = Money::from_cents(state.order.total_cents - frozen);
    let shares = even_shares(remainder, open.len() as u32)?;
    for (&pos, share) in open.iter().zip(shares) {
        state.checks[pos].even_amount_cents = Some(share.cents());
    }
    Ok(())
}

fn apply_mark_paid(
    state: &mut OrderChecks,
    check_id: &str,
    card: Option<CardSummary>,
) -> SyncResult<()> {
    let pos = check_position(state, check_id)?;
    if !state.checks[pos].is_open() {
        return Err(SplitError::PaidCheckImmutable {
            check_id: check_id.to_string(),
        }
        .into());
    }
    let check = &mut state.checks[pos];
    check.status = CheckStatus::Paid;
    check.card = card;
    check.paid_at = Some(Utc::now());
    if state.checks.iter().all(|c| !c.is_open()) {
        state.order.status = OrderStatus::Closed;
    }
    Ok(())
}

fn check_position(state: &OrderChecks, check_id: &str) -> SyncResult<usize> {
    state
        .checks
        .iter()
        .position(|c| c.id == check_id)
        .ok_or_else(|| SplitError::CheckNotFound(check_id.to_string()).into())
}

// =============================================================================
// Unit Tests
// =============================================================================
