//! # Sync Error Types
//!
//! Error types for managed-split operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Sync Error Categories                              │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Terminal-local │  │   Transport     │  │     Gateway             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  MutationIn-    │  │  Timeout        │  │  CheckNotFound          │ │
//! │  │  Flight         │  │  (rolls back)   │  │  PaidCheckImmutable     │ │
//! │  │                 │  │                 │  │  PaidChecksPresent      │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Every remote fault is surfaced to the operator; none is auto-retried  │
//! │  (the disconnected fallback poll re-READS, it never re-mutates).       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use tally_core::SplitError;

// =============================================================================
// Gateway Error
// =============================================================================

/// What the Persistence Gateway reports back. These are the server-side
/// precondition and lookup failures; paid-check immutability is enforced
/// HERE, not merely in display logic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Order id unknown to the gateway.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Check id unknown on this order.
    #[error("Check not found: {0}")]
    CheckNotFound(String),

    /// Item or fraction id not on the named check.
    #[error("Line not found: {0}")]
    LineNotFound(String),

    /// Mutation touched a paid (immutable) check.
    #[error("Check {0} is paid and cannot be modified")]
    PaidCheckImmutable(String),

    /// Merge attempted while at least one check is paid.
    #[error("Cannot merge: one or more checks are already paid")]
    PaidChecksPresent,

    /// Initial split committed twice for the same order.
    #[error("Order {0} is already split")]
    AlreadySplit(String),

    /// The committed split failed the server-side integrity gate.
    #[error("Split integrity rejected: {0}")]
    Integrity(String),

    /// Transport-level failure talking to the gateway.
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

// =============================================================================
// Sync Error
// =============================================================================

/// Managed-split error type covering terminal-local guards, transport
/// faults, and gateway rejections.
#[derive(Debug, Error)]
pub enum SyncError {
    /// This terminal already has a mutation in flight (single-flight
    /// guard). Not a global lock: other terminals are unaffected.
    #[error("Another change is still being saved; try again in a moment")]
    MutationInFlight,

    /// The remote commit did not resolve within the configured timeout.
    /// The local projection has been rolled back to the pre-mutation
    /// snapshot.
    #[error("Saving timed out after {0} seconds; the change was undone")]
    Timeout(u64),

    /// The gateway rejected or failed the commit. Rolled back locally.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A pure split-logic fault (integrity or precondition), raised before
    /// any mutation was applied.
    #[error(transparent)]
    Split(#[from] SplitError),

    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    /// True when the fault left local state rolled back to the last
    /// known-good snapshot (transport and gateway commit failures).
    pub fn rolled_back(&self) -> bool {
        matches!(self, SyncError::Timeout(_) | SyncError::Gateway(_))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_messages() {
        assert_eq!(
            GatewayError::PaidCheckImmutable("c7".into()).to_string(),
            "Check c7 is paid and cannot be modified"
        );
        assert_eq!(
            GatewayError::PaidChecksPresent.to_string(),
            "Cannot merge: one or more checks are already paid"
        );
    }

    #[test]
    fn test_rolled_back_classification() {
        assert!(SyncError::Timeout(10).rolled_back());
        assert!(SyncError::Gateway(GatewayError::PaidChecksPresent).rolled_back());
        assert!(!SyncError::MutationInFlight.rolled_back());
    }
}
