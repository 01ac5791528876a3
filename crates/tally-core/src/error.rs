//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  └── SplitError      - Integrity and precondition faults               │
//! │                                                                         │
//! │  tally-sync errors (separate crate)                                    │
//! │  ├── GatewayError    - What the persistence gateway reports            │
//! │  └── SyncError       - Transport, timeout, single-flight faults        │
//! │                                                                         │
//! │  Flow: SplitError → SyncError → operator-facing message                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (check id, cents, ways)
//! 3. Errors are enum variants, never String
//! 4. Integrity faults are REPORTED, never silently corrected

use thiserror::Error;

// =============================================================================
// Split Error
// =============================================================================

/// Split-engine errors: money-integrity violations and precondition faults.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SplitError {
    /// The computed split total diverged from the order total beyond the
    /// rounding tolerance.
    ///
    /// ## When This Occurs
    /// - A strategy or draft mutation dropped or duplicated a line
    /// - A fraction set no longer sums to its item's amount
    ///
    /// This fault blocks commit and is surfaced to the operator. The engine
    /// never auto-corrects the amounts.
    #[error("Split total {actual_cents} diverges from order total {expected_cents} beyond tolerance")]
    IntegrityFault {
        expected_cents: i64,
        actual_cents: i64,
    },

    /// Mutation attempted against a paid (immutable) check.
    #[error("Check {check_id} is paid and cannot be modified")]
    PaidCheckImmutable { check_id: String },

    /// Merge-back attempted while at least one check is paid.
    #[error("Cannot merge: one or more checks are already paid")]
    PaidChecksPresent,

    /// Referenced check does not exist.
    #[error("Check not found: {0}")]
    CheckNotFound(String),

    /// Referenced check index is not in the draft.
    #[error("Check index {index} is out of range")]
    CheckIndexOutOfRange { index: u32 },

    /// Referenced item does not exist on the order.
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// Referenced line (item or fraction) is not on any open check.
    #[error("Line not found: {0}")]
    LineNotFound(String),

    /// A move was requested with no line selected.
    #[error("No line is selected")]
    NothingSelected,

    /// Split count outside the allowed range.
    #[error("Cannot split {ways} ways (allowed: 2-{max})")]
    InvalidWays { ways: u32, max: u32 },

    /// Even split requested with zero checks.
    #[error("Even split requires at least one share")]
    ZeroShares,
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with SplitError.
pub type SplitResult<T> = Result<T, SplitError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_fault_message() {
        let err = SplitError::IntegrityFault {
            expected_cents: 5721,
            actual_cents: 5720,
        };
        assert_eq!(
            err.to_string(),
            "Split total 5720 diverges from order total 5721 beyond tolerance"
        );
    }

    #[test]
    fn test_paid_check_message() {
        let err = SplitError::PaidCheckImmutable {
            check_id: "c42".to_string(),
        };
        assert_eq!(err.to_string(), "Check c42 is paid and cannot be modified");
    }
}
