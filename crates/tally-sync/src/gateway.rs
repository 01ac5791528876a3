//! # Persistence Gateway
//!
//! The consumed boundary: the ONLY component that durably commits or reads
//! checks. Everything in this crate mutates through [`CheckGateway`]; local
//! projections are disposable guesses that the gateway's answers overwrite.
//!
//! ## Contract Highlights
//! - `delete_check` redistributes a non-empty check's lines into the check
//!   with the lowest remaining index; deleting down to one remaining check
//!   auto-merges server-side and reports `merged = true`
//! - `split_item` seeds fractions round-robin starting at the originating
//!   check, creating checks when fewer than `ways` exist
//! - Paid checks are read-only AT THE GATEWAY, not just in display logic
//! - No cross-terminal ordering: concurrent writers are resolved last-write-
//!   wins at the gateway, and every terminal converges by reloading
//!
//! The change-notification channel is modeled alongside: the gateway's host
//! emits [`ChangeEvent`]s keyed by order id (and check id for payment
//! completions), and the synchronizer treats any matching key as an
//! unconditional reload trigger.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tally_core::{CardSummary, Check, InitialSplit, Order};

use crate::error::GatewayResult;

// =============================================================================
// Read Model
// =============================================================================

/// Authoritative read of one order's split: the order plus every check with
/// its lines, card summary, and paid status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderChecks {
    pub order: Order,
    pub checks: Vec<Check>,
}

impl OrderChecks {
    /// Finds a check by id.
    pub fn check(&self, check_id: &str) -> Option<&Check> {
        self.checks.iter().find(|c| c.id == check_id)
    }

    /// Sum of every check's total, in cents.
    pub fn split_total_cents(&self) -> i64 {
        self.checks.iter().map(|c| c.total_cents()).sum()
    }
}

/// Result of deleting a check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    /// True when the delete left a single check and the server implicitly
    /// merged the order back to unsplit.
    pub merged: bool,
}

// =============================================================================
// Change Notifications
// =============================================================================

/// One "something changed" event from the realtime channel.
///
/// Events carry a single key: the order id for order-level mutations, or a
/// check id for payment completions. Subscribers match against the parent
/// order id and every displayed check id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub key: String,
}

impl ChangeEvent {
    pub fn new(key: impl Into<String>) -> Self {
        ChangeEvent { key: key.into() }
    }
}

// =============================================================================
// Gateway Trait
// =============================================================================

/// The durable commit/read boundary, per order id.
///
/// Implementations live with the host application (HTTP client, IPC bridge,
/// …); [`crate::memory::InMemoryGateway`] implements the documented server
/// semantics for tests and demos.
#[async_trait]
pub trait CheckGateway: Send + Sync {
    /// Reads the authoritative split state for an order.
    async fn read(&self, order_id: &str) -> GatewayResult<OrderChecks>;

    /// Appends an empty check and returns its id.
    async fn create_check(&self, order_id: &str) -> GatewayResult<String>;

    /// Removes a check. Non-empty checks redistribute their lines to the
    /// check with the lowest remaining index; when exactly one check would
    /// remain, the server auto-merges and reports `merged = true`.
    async fn delete_check(&self, order_id: &str, check_id: &str) -> GatewayResult<DeleteOutcome>;

    /// Reassigns one item or fraction between checks.
    async fn move_item(
        &self,
        order_id: &str,
        line_id: &str,
        from_check_id: &str,
        to_check_id: &str,
    ) -> GatewayResult<()>;

    /// Replaces an item with `ways` fractions, round-robin seeded starting
    /// at `from_check_id`. Re-splitting collapses existing fractions first.
    async fn split_item(
        &self,
        order_id: &str,
        item_id: &str,
        from_check_id: &str,
        ways: u32,
    ) -> GatewayResult<()>;

    /// Commits the first split from edit mode.
    async fn commit_initial_split(
        &self,
        order_id: &str,
        payload: InitialSplit,
    ) -> GatewayResult<()>;

    /// Records a completed payment against a check, freezing it.
    async fn mark_paid(
        &self,
        order_id: &str,
        check_id: &str,
        card: Option<CardSummary>,
    ) -> GatewayResult<()>;

    /// Deletes all checks and reverts the order to unsplit. Fails if any
    /// check is paid.
    async fn merge(&self, order_id: &str) -> GatewayResult<()>;
}

// =============================================================================
// Unit Tests
// =============================================================================
