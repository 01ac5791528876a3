//! # Reload Coalescer
//!
//! One queue replaces the three notional refresh triggers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   peer notification ──► debounced (~200 ms) ─┐                          │
//! │   visibility regained ─► immediate ──────────┼──► ONE reload at a time  │
//! │   disconnected ────────► fixed poll (~20 s) ─┘    (wholesale read;      │
//! │                                                    server always wins)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! At most one reload is ever in flight; triggers arriving while one runs
//! collapse into a single trailing reload. Reloads never merge deltas: a
//! full authoritative read replaces the projection, which is what makes
//! optimistic-vs-authoritative races impossible to compound.

use std::future::pending;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

use crate::config::SyncConfig;

/// Queued triggers beyond this are guaranteed redundant.
const COMMAND_CAPACITY: usize = 16;

// =============================================================================
// Reload Target
// =============================================================================

/// What the coalescer drives: a wholesale authoritative refresh. Errors are
/// the target's to log; the coalescer just keeps scheduling.
#[async_trait]
pub(crate) trait ReloadTarget: Send + Sync + 'static {
    async fn reload(&self);
}

// =============================================================================
// Handle
// =============================================================================

enum ReloadCommand {
    Debounced,
    Immediate,
    SetOffline(bool),
    Shutdown,
}

/// Control handle for a running coalescer task.
#[derive(Clone)]
pub struct ReloadHandle {
    tx: mpsc::Sender<ReloadCommand>,
}

impl ReloadHandle {
    /// Schedules a debounced reload. Requests inside the window coalesce.
    pub fn request(&self) {
        self.send(ReloadCommand::Debounced);
    }

    /// Reloads as soon as possible, regardless of timer phase (used when a
    /// terminal regains an active viewing state).
    pub fn request_immediate(&self) {
        self.send(ReloadCommand::Immediate);
    }

    /// Switches the slow fallback poll on or off.
    pub fn set_offline(&self, offline: bool) {
        self.send(ReloadCommand::SetOffline(offline));
    }

    /// Stops the coalescer task.
    pub fn shutdown(&self) {
        self.send(ReloadCommand::Shutdown);
    }

    fn send(&self, command: ReloadCommand) {
        // A full queue means a reload is already owed; dropping is safe.
        if self.tx.try_send(command).is_err() {
            trace!("reload queue full; trigger coalesced");
        }
    }
}

// =============================================================================
// Coalescer Task
// =============================================================================

/// Spawns the coalescer loop for a target.
pub(crate) fn spawn(target: Arc<dyn ReloadTarget>, config: SyncConfig) -> ReloadHandle {
    let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
    tokio::spawn(run(target, config, rx));
    ReloadHandle { tx }
}

async fn run(
    target: Arc<dyn ReloadTarget>,
    config: SyncConfig,
    mut rx: mpsc::Receiver<ReloadCommand>,
) {
    // When Some, a debounced reload is owed at that instant.
    let mut deadline: Option<Instant> = None;
    let mut offline = false;
    let mut next_poll = Instant::now() + config.fallback_poll();

    loop {
        let debounce_due = async {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => pending().await,
            }
        };
        let poll_due = async {
            if offline {
                sleep_until(next_poll).await
            } else {
                pending().await
            }
        };

        tokio::select! {
            command = rx.recv() => match command {
                Some(ReloadCommand::Debounced) => {
                    // Only the FIRST trigger arms the timer; followers
                    // collapse into the pending reload.
                    if deadline.is_none() {
                        deadline = Some(Instant::now() + config.debounce());
                    }
                }
                Some(ReloadCommand::Immediate) => {
                    deadline = None;
                    target.reload().await;
                }
                Some(ReloadCommand::SetOffline(value)) => {
                    offline = value;
                    if offline {
                        next_poll = Instant::now() + config.fallback_poll();
                    }
                }
                Some(ReloadCommand::Shutdown) | None => break,
            },
            _ = debounce_due => {
                deadline = None;
                target.reload().await;
            }
            _ = poll_due => {
                next_poll = Instant::now() + config.fallback_poll();
                target.reload().await;
            }
        }
    }

    debug!("reload coalescer stopped");
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Counter(AtomicUsize);

    #[async_trait]
    impl ReloadTarget for Counter {
        async fn reload(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fast_config() -> SyncConfig {
        SyncConfig {
            debounce_ms: 200,
            fallback_poll_secs: 20,
            commit_timeout_secs: 10,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_triggers_coalesces_to_one_reload() {
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let handle = spawn(counter.clone(), fast_config());

        for _ in 0..5 {
            handle.request();
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        // Quiet window: nothing further fires.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_windows_reload_separately() {
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let handle = spawn(counter.clone(), fast_config());

        handle.request();
        tokio::time::sleep(Duration::from_millis(250)).await;
        handle.request();
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_skips_the_debounce_window() {
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let handle = spawn(counter.clone(), fast_config());

        handle.request();
        handle.request_immediate();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        // The pending debounced trigger was absorbed by the immediate one.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_mode_polls_on_interval() {
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let handle = spawn(counter.clone(), fast_config());

        handle.set_offline(true);
        tokio::time::sleep(Duration::from_secs(21)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);

        handle.set_offline(false);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_scheduling() {
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let handle = spawn(counter.clone(), fast_config());

        handle.request();
        handle.shutdown();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }
}
