//! # Merge-Back Controller
//!
//! Un-splitting an order. The one mutation where the view closes BEFORE the
//! commit resolves: merging back is how operators abandon a split, so the
//! UI must not hold them hostage to a slow gateway.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  any paid check? ──yes──► reject, nothing changes                      │
//! │        │no                                                              │
//! │  close view + set projection unsplit (optimistic)                       │
//! │        │                                                                │
//! │  background commit ──ok──► authoritative reload                        │
//! │        │fail/timeout                                                    │
//! │  restore snapshot + operator-facing error (view STAYS closed; the      │
//! │  order list is the recovery surface, not a resurrected split view)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tracing::{info, warn};

use tally_core::{OrderStatus, SplitError};

use crate::error::SyncResult;
use crate::synchronizer::{ManagedSplit, Mutation};

impl ManagedSplit {
    /// Merges every check back into the unsplit order.
    ///
    /// Rejected up front if any check is paid; otherwise the split view is
    /// closed immediately and the gateway commit runs in the background.
    /// Returns once the optimistic close has happened, not once the commit
    /// resolves.
    pub async fn merge_back(&self) -> SyncResult<()> {
        let guard = self.core.begin()?;

        let mutation = {
            let mut state = self.core.state.lock().await;
            if state.checks.iter().any(|c| c.is_paid()) {
                return Err(SplitError::PaidChecksPresent.into());
            }
            let mutation = Mutation::begin(&state);
            state.checks.clear();
            state.order.status = OrderStatus::Open;
            mutation
        };

        info!(order_id = %self.core.order_id, "merging back; view closed optimistically");
        self.core.emitter.emit_view_closed(&self.core.order_id);

        let core = Arc::clone(&self.core);
        tokio::spawn(async move {
            // The guard rides along: no new mutation until this resolves.
            let _guard = guard;
            let commit = core.gateway.merge(&core.order_id);
            match tokio::time::timeout(core.config.commit_timeout(), commit).await {
                Ok(Ok(())) => {
                    if let Err(e) = core.refresh().await {
                        warn!(order_id = %core.order_id, error = %e, "post-merge reload failed");
                    }
                }
                Ok(Err(gateway_err)) => {
                    let mut state = core.state.lock().await;
                    mutation.roll_back(&mut state);
                    drop(state);
                    warn!(order_id = %core.order_id, error = %gateway_err, "merge rejected");
                    core.emitter.emit_error(&gateway_err.to_string());
                }
                Err(_) => {
                    let mut state = core.state.lock().await;
                    mutation.roll_back(&mut state);
                    drop(state);
                    warn!(order_id = %core.order_id, "merge timed out");
                    core.emitter.emit_error("merge timed out; the split still exists");
                }
            }
        });

        Ok(())
    }
}
