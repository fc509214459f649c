//! Signal handling for graceful shutdown (SIGINT/SIGTERM)
//!
//! On the first SIGINT or SIGTERM the bot stops taking commands, waits for
//! running ones and closes. A second signal requests an immediate exit.
//! Further signals are ignored.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Exit code after a second signal
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// How often waiters re-check the shutdown state
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shared shutdown state
#[derive(Debug, Default)]
pub struct ShutdownState {
    shutdown_requested: AtomicBool,
    immediate_exit: AtomicBool,
    signal_count: AtomicU8,
}

impl ShutdownState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    pub fn is_immediate_exit(&self) -> bool {
        self.immediate_exit.load(Ordering::SeqCst)
    }

    pub fn signal_count(&self) -> u8 {
        self.signal_count.load(Ordering::SeqCst)
    }

    /// Record a signal and return what to do about it
    pub fn handle_signal(&self) -> SignalAction {
        let count = self.signal_count.fetch_add(1, Ordering::SeqCst);

        match count {
            0 => {
                self.shutdown_requested.store(true, Ordering::SeqCst);
                SignalAction::GracefulShutdown
            }
            1 => {
                self.immediate_exit.store(true, Ordering::SeqCst);
                SignalAction::ImmediateExit
            }
            _ => SignalAction::Ignore,
        }
    }

    /// Request shutdown without a signal (e.g. an owner command)
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }
}

/// Action to take after receiving a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    GracefulShutdown,
    ImmediateExit,
    Ignore,
}

/// Installs the process signal handler and exposes the shared state
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    state: Arc<ShutdownState>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Arc<ShutdownState> {
        Arc::clone(&self.state)
    }

    /// Install handlers for SIGINT and SIGTERM.
    ///
    /// Must be called at most once per process.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let state = Arc::clone(&self.state);
        ctrlc::set_handler(move || match state.handle_signal() {
            SignalAction::GracefulShutdown => {
                tracing::info!("received shutdown signal, closing");
            }
            SignalAction::ImmediateExit => {
                tracing::warn!("received second shutdown signal, exiting immediately");
            }
            SignalAction::Ignore => {}
        })
    }

    /// Block until shutdown is requested
    pub fn wait(&self) {
        while !self.state.is_shutdown_requested() {
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Wait up to `grace` for `done` to hold.
    ///
    /// Returns false if the grace period ran out or an immediate exit was
    /// requested first.
    pub fn wait_until<F>(&self, grace: Duration, mut done: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let start = std::time::Instant::now();
        while start.elapsed() < grace {
            if done() {
                return true;
            }
            if self.state.is_immediate_exit() {
                return false;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
        done()
    }
}
