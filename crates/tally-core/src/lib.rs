//! # tally-core: Pure Split Logic for Tally POS
//!
//! This crate is the **heart** of the split-check engine. It contains all
//! allocation logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Tally POS Split Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Terminal Front End (TypeScript)                 │   │
//! │  │     Split UI ──► Check Cards ──► Pay Buttons ──► Receipts      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ exported TS bindings                   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 tally-sync (Managed Splits)                     │   │
//! │  │   optimistic apply ──► gateway commit ──► reconcile/rollback   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │  ┌──────────┐ ┌───────────┐ ┌──────────┐ ┌──────────────────┐  │   │
//! │  │  │  types   │ │ allocator │ │ fraction │ │ strategy +       │  │   │
//! │  │  │  Order   │ │ even/tax  │ │ splitter │ │ assignment draft │  │   │
//! │  │  │  Check   │ │ shares    │ │          │ │                  │  │   │
//! │  │  └──────────┘ └───────────┘ └──────────┘ └──────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO GATEWAY • NO TIMERS • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Order, Item, Check, ItemFraction)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`allocator`] - Even/proportional shares and the integrity gate
//! - [`fraction`] - Item fraction splitting
//! - [`strategy`] - The four split mode strategies
//! - [`assignment`] - Edit-mode draft (transient assignment store)
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Exact Money**: every split sums back to the order total to the cent;
//!    the last share absorbs any rounding remainder
//! 2. **No I/O**: gateway, network, and timer access is FORBIDDEN here
//! 3. **Report, Never Correct**: integrity drift raises a fault; amounts
//!    are never silently adjusted
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocator;
pub mod assignment;
pub mod error;
pub mod fraction;
pub mod money;
pub mod strategy;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use tally_core::Money` instead of
// `use tally_core::money::Money`

pub use assignment::{InitialCheck, InitialSplit, IntegrityIssue, IssueSeverity, SplitDraft};
pub use error::{SplitError, SplitResult};
pub use money::Money;
pub use strategy::SplitMode;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum ways a single item or order may be split.
///
/// ## Business Reason
/// Prevents accidental runaway splits (e.g. typing 300 instead of 3).
/// Twenty covers the largest table the floor plan supports.
pub const MAX_SPLIT_WAYS: u32 = 20;

/// Allowed drift between the order total and a computed split total, in
/// cents. Anything beyond this is an integrity fault, reported and never
/// auto-corrected.
pub const ROUNDING_TOLERANCE_CENTS: i64 = 1;
