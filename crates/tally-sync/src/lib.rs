//! # tally-sync: Managed Splits for Tally POS
//!
//! Everything between the pure split logic in `tally-core` and the durable
//! gateway: optimistic mutations with exact rollback, the single-flight
//! guard, coalesced reloads, and merge-back.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Tally POS Split Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Terminal Front End (TypeScript)                 │   │
//! │  └───────┬─────────────────────────────────────────────▲───────────┘   │
//! │          │ mutations                                   │ events         │
//! │  ┌───────▼─────────────────────────────────────────────┴───────────┐   │
//! │  │               ★ tally-sync (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │  ┌──────────────┐ ┌──────────┐ ┌─────────┐ ┌────────────────┐  │   │
//! │  │  │ synchronizer │ │  reload  │ │  merge  │ │ gateway trait  │  │   │
//! │  │  │ optimistic + │ │ debounce │ │  back   │ │ + in-memory    │  │   │
//! │  │  │ rollback     │ │ + poll   │ │         │ │   impl         │  │   │
//! │  │  └──────────────┘ └──────────┘ └─────────┘ └────────────────┘  │   │
//! │  └───────┬─────────────────────────────────────────────────────────┘   │
//! │          │ CheckGateway (async boundary)                                │
//! │  ┌───────▼─────────────────────────────────────────────────────────┐   │
//! │  │            Persistence host (HTTP / IPC / in-memory)            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`synchronizer`] - [`ManagedSplit`]: the mutation pipeline
//! - [`reload`] - Coalesced reload queue (debounce / immediate / poll)
//! - [`merge`] - Merge-back controller
//! - [`gateway`] - The consumed persistence boundary
//! - [`memory`] - In-memory gateway implementing the server semantics
//! - [`ports`] - Event emitter, payment, and printer collaborator traits
//! - [`config`] - `tally.toml` tunables
//! - [`error`] - Gateway and sync error types
//!
//! ## Concurrency Model
//!
//! One unconfirmed mutation per terminal (single-flight guard), last-write-
//! wins between terminals at the gateway, and convergence by wholesale
//! reload. Local projections are guesses; the gateway's answer always wins.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod merge;
pub mod ports;
pub mod reload;
pub mod synchronizer;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use config::SyncConfig;
pub use error::{GatewayError, GatewayResult, SyncError, SyncResult};
pub use gateway::{ChangeEvent, CheckGateway, DeleteOutcome, OrderChecks};
pub use memory::InMemoryGateway;
pub use ports::{
    NoOpEmitter, NoOpPayment, NoOpPrinter, PaymentPort, SplitEventEmitter, TicketPrinter,
};
pub use reload::ReloadHandle;
pub use synchronizer::{ManagedSplit, ManagedSplitBuilder, Mutation, MutationState};
