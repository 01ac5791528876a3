//! # Collaborator Ports
//!
//! Outbound interfaces to the external collaborators this core delegates
//! to: the event surface for the terminal UI, the payment collaborator,
//! and the ticket printer. Each has a no-op implementation so the engine
//! runs headless in tests.
//!
//! Payment capture and receipt formatting are entirely out of scope here.
//! This core only decides WHICH checks are unpaid and WHAT they sum to,
//! then hands off.

use tally_core::Money;

use crate::gateway::OrderChecks;

// =============================================================================
// Event Emitter
// =============================================================================

/// Trait for emitting split events to the host UI (implemented by the
/// terminal integration layer).
pub trait SplitEventEmitter: Send + Sync {
    /// The projection was replaced by a fresh authoritative read.
    fn emit_refreshed(&self, state: &OrderChecks);

    /// A mutation failed remotely and the local guess was undone.
    fn emit_rolled_back(&self, order_id: &str, message: &str);

    /// The split view should close (merge-back, or delete-to-one merged).
    fn emit_view_closed(&self, order_id: &str);

    /// A non-blocking operator-facing error.
    fn emit_error(&self, message: &str);
}

/// No-op event emitter for testing.
pub struct NoOpEmitter;

impl SplitEventEmitter for NoOpEmitter {
    fn emit_refreshed(&self, _state: &OrderChecks) {}
    fn emit_rolled_back(&self, _order_id: &str, _message: &str) {}
    fn emit_view_closed(&self, _order_id: &str) {}
    fn emit_error(&self, _message: &str) {}
}

// =============================================================================
// Payment Port
// =============================================================================

/// Hand-off to the external payment collaborator. Capture, tender UI, and
/// gateway protocol all live on the other side of this trait; completion
/// comes back asynchronously as a change notification.
pub trait PaymentPort: Send + Sync {
    /// Requests capture for a single check.
    fn request_payment(&self, check_id: &str, amount: Money);

    /// Requests one combined capture covering several checks.
    fn request_combined_payment(&self, check_ids: &[String], combined: Money);
}

/// No-op payment port for testing.
pub struct NoOpPayment;

impl PaymentPort for NoOpPayment {
    fn request_payment(&self, _check_id: &str, _amount: Money) {}
    fn request_combined_payment(&self, _check_ids: &[String], _combined: Money) {}
}

// =============================================================================
// Ticket Printer
// =============================================================================

/// Fire-and-forget check printing. Failures are reported back for logging
/// only; this core never blocks on or retries a print.
pub trait TicketPrinter: Send + Sync {
    fn print_check(&self, check_id: &str) -> Result<(), String>;
}

/// No-op printer for testing.
pub struct NoOpPrinter;

impl TicketPrinter for NoOpPrinter {
    fn print_check(&self, _check_id: &str) -> Result<(), String> {
        Ok(())
    }
}
